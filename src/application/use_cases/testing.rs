use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::repository::{Repository, RepositoryOwner};
use crate::domain::models::run::WorkflowRun;
use crate::domain::models::session::{Session, SessionUser};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Repositories { page: u32, per_page: u32 },
    WorkflowRuns { repo: String, page: u32 },
    Logs { run_id: u64 },
}

/// Holds a request open until released. `started` fires when the request
/// arrives.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Default)]
pub struct MockGitHubApi {
    repositories: Mutex<Vec<Repository>>,
    runs: Mutex<HashMap<String, Vec<WorkflowRun>>>,
    run_gates: Mutex<HashMap<String, Gate>>,
    log_gates: Mutex<HashMap<u64, Gate>>,
    failing_logs: Mutex<HashSet<u64>>,
    failing_runs: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl MockGitHubApi {
    pub fn with_repositories(count: usize) -> Self {
        let api = Self::default();
        *api.repositories.lock().unwrap() = (0..count)
            .map(|i| repository("octocat", &format!("repo-{i:03}")))
            .collect();
        api
    }

    pub fn set_runs(&self, repo: &str, count: usize, first_id: u64) {
        let runs = (0..count as u64).map(|i| workflow_run(first_id + i)).collect();
        self.runs.lock().unwrap().insert(repo.to_string(), runs);
    }

    /// Inserts newer runs ahead of the existing history.
    pub fn prepend_runs(&self, repo: &str, count: usize, first_id: u64) {
        let newer: Vec<WorkflowRun> = (0..count as u64).map(|i| workflow_run(first_id + i)).collect();
        self.runs
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default()
            .splice(0..0, newer);
    }

    pub fn gate_runs(&self, repo: &str) -> Gate {
        let gate = Gate::default();
        self.run_gates
            .lock()
            .unwrap()
            .insert(repo.to_string(), gate.clone());
        gate
    }

    pub fn gate_logs(&self, run_id: u64) -> Gate {
        let gate = Gate::default();
        self.log_gates.lock().unwrap().insert(run_id, gate.clone());
        gate
    }

    pub fn fail_logs(&self, run_id: u64) {
        self.failing_logs.lock().unwrap().insert(run_id);
    }

    pub fn fail_runs(&self, repo: &str) {
        self.failing_runs.lock().unwrap().insert(repo.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn page_of<T: Clone>(items: &[T], page: u32, per_page: u32) -> Vec<T> {
    let start = ((page.saturating_sub(1)) * per_page) as usize;
    items
        .iter()
        .skip(start)
        .take(per_page as usize)
        .cloned()
        .collect()
}

async fn pass(gate: Option<Gate>) {
    if let Some(gate) = gate {
        gate.started.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl GitHubApi for MockGitHubApi {
    async fn list_repositories(
        &self,
        _token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, Error> {
        self.record(Call::Repositories { page, per_page });
        let repositories = self.repositories.lock().unwrap().clone();
        Ok(page_of(&repositories, page, per_page))
    }

    async fn list_workflow_runs(
        &self,
        _token: &str,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<WorkflowRun>, Error> {
        let full_name = format!("{owner}/{repo}");
        self.record(Call::WorkflowRuns {
            repo: full_name.clone(),
            page,
        });
        let gate = self.run_gates.lock().unwrap().get(&full_name).cloned();
        pass(gate).await;
        if self.failing_runs.lock().unwrap().contains(&full_name) {
            return Err(anyhow!("500 Internal Server Error"));
        }
        let runs = self
            .runs
            .lock()
            .unwrap()
            .get(&full_name)
            .cloned()
            .unwrap_or_default();
        Ok(page_of(&runs, page, per_page))
    }

    async fn download_log(
        &self,
        _token: &str,
        _owner: &str,
        _repo: &str,
        run_id: u64,
    ) -> Result<Bytes, Error> {
        self.record(Call::Logs { run_id });
        let gate = self.log_gates.lock().unwrap().get(&run_id).cloned();
        pass(gate).await;
        if self.failing_logs.lock().unwrap().contains(&run_id) {
            return Err(anyhow!("410 Gone"));
        }
        Ok(Bytes::from(format!("PK-logs-{run_id}")))
    }
}

pub fn repository(owner: &str, name: &str) -> Repository {
    Repository {
        full_name: format!("{owner}/{name}"),
        name: name.to_string(),
        owner: RepositoryOwner {
            login: owner.to_string(),
        },
    }
}

pub fn workflow_run(id: u64) -> WorkflowRun {
    let created_at = Utc.with_ymd_and_hms(2024, 11, 4, 10, 30, 0).unwrap();
    WorkflowRun {
        id,
        name: "CI".to_string(),
        display_title: format!("Run {id}"),
        status: "completed".to_string(),
        conclusion: Some("success".to_string()),
        head_branch: Some("main".to_string()),
        created_at,
        updated_at: created_at + Duration::minutes(3),
        logs_url: format!("https://api.github.com/repos/octocat/hello/actions/runs/{id}/logs"),
        html_url: format!("https://github.com/octocat/hello/actions/runs/{id}"),
    }
}

pub fn session(login: &str) -> Session {
    Session {
        access_token: format!("gho_{login}"),
        user: SessionUser {
            login: login.to_string(),
            name: Some("The Octocat".to_string()),
        },
        expires_at: Utc::now() + Duration::days(1),
    }
}
