use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::repository::{Repository, RepositoryOwner};
use crate::domain::models::run::WorkflowRun;
use anyhow::{Context, Error};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::future::Future;
use tokio::time::{Duration, sleep};

pub const USER_AGENT: &str = "actions-dashboard-rust-app";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Deserialize, Debug, Clone)]
struct GitHubRepositoryResponse {
    full_name: String,
    name: String,
    owner: GitHubOwnerResponse,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubOwnerResponse {
    login: String,
}

#[derive(Deserialize, Debug, Clone)]
struct GitHubWorkflowRunResponse {
    id: u64,
    name: Option<String>, // workflow name, null for some legacy runs
    display_title: String,
    status: Option<String>,
    conclusion: Option<String>, // Only set once status is "completed"
    head_branch: Option<String>,
    created_at: String, // ISO 8601, parsed during domain model conversion
    updated_at: String,
    logs_url: String,
    html_url: String,
}

// /actions/runs wraps the runs in an object keyed by workflow_runs.
#[derive(Deserialize, Debug)]
struct GitHubWorkflowRunsApiResponse {
    workflow_runs: Vec<GitHubWorkflowRunResponse>,
}

impl TryFrom<GitHubWorkflowRunResponse> for WorkflowRun {
    type Error = Error;

    fn try_from(run_res: GitHubWorkflowRunResponse) -> Result<Self, Self::Error> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&run_res.created_at)
            .with_context(|| format!("Failed to parse created_at for run {}", run_res.id))?
            .with_timezone(&chrono::Utc);
        let updated_at = chrono::DateTime::parse_from_rfc3339(&run_res.updated_at)
            .with_context(|| format!("Failed to parse updated_at for run {}", run_res.id))?
            .with_timezone(&chrono::Utc);

        Ok(WorkflowRun {
            id: run_res.id,
            name: run_res.name.unwrap_or_default(),
            display_title: run_res.display_title,
            status: run_res.status.unwrap_or_default(),
            conclusion: run_res.conclusion,
            head_branch: run_res.head_branch,
            created_at,
            updated_at,
            logs_url: run_res.logs_url,
            html_url: run_res.html_url,
        })
    }
}

/// Exponential backoff for listing requests. Zero retries by default: a failed
/// listing is reported to the viewer, who reloads by hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_wait_secs: f64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_wait_secs: 1.0,
            backoff_multiplier: 1.5,
        }
    }
}

pub struct GitHubApiAdapter {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GitHubApiAdapter {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn get(&self, url: &str, token: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_name: &str,
        request_fn: F,
    ) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
        T: serde::de::DeserializeOwned,
    {
        let max_retries = self.retry.max_retries;
        let mut retries = 0;
        let mut wait_time = self.retry.initial_wait_secs;

        loop {
            let error = match request_fn().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.json::<T>().await {
                        Ok(result) => return Ok(result),
                        Err(e) => Error::new(e).context(format!(
                            "Failed to deserialize response for {operation_name}"
                        )),
                    },
                    Err(e) => {
                        Error::new(e).context(format!("API returned an error for {operation_name}"))
                    }
                },
                Err(e) => {
                    Error::new(e).context(format!("Failed to send request for {operation_name}"))
                }
            };

            if retries >= max_retries {
                return Err(error);
            }
            tracing::warn!(
                "{}, retry {} of {}: {:#}",
                operation_name,
                retries + 1,
                max_retries,
                error
            );

            retries += 1;
            sleep(Duration::from_secs_f64(wait_time)).await;
            wait_time *= self.retry.backoff_multiplier;
        }
    }
}

#[async_trait]
impl GitHubApi for GitHubApiAdapter {
    #[tracing::instrument(name = "GitHubApiAdapter::list_repositories", skip(self, token))]
    async fn list_repositories(
        &self,
        token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, Error> {
        let url = format!(
            "{}/user/repos?visibility=all&per_page={}&page={}",
            self.base_url, per_page, page
        );

        let response_items: Vec<GitHubRepositoryResponse> = self
            .execute_with_retry("list_repositories", || self.get(&url, token).send())
            .await?;

        Ok(response_items
            .into_iter()
            .map(|repo_res| Repository {
                full_name: repo_res.full_name,
                name: repo_res.name,
                owner: RepositoryOwner {
                    login: repo_res.owner.login,
                },
            })
            .collect())
    }

    #[tracing::instrument(name = "GitHubApiAdapter::list_workflow_runs", skip(self, token))]
    async fn list_workflow_runs(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<WorkflowRun>, Error> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs?per_page={}&page={}",
            self.base_url, owner, repo, per_page, page
        );

        let api_response: GitHubWorkflowRunsApiResponse = self
            .execute_with_retry(&format!("workflow runs for {owner}/{repo}"), || {
                self.get(&url, token).send()
            })
            .await?;

        api_response
            .workflow_runs
            .into_iter()
            .map(WorkflowRun::try_from)
            .collect()
    }

    #[tracing::instrument(name = "GitHubApiAdapter::download_log", skip(self, token))]
    async fn download_log(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Bytes, Error> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs/{}/logs",
            self.base_url, owner, repo, run_id
        );

        // GitHub answers with a redirect to a short-lived archive URL; reqwest
        // follows it and drops the Authorization header on the way.
        let response = self
            .get(&url, token)
            .send()
            .await
            .with_context(|| format!("Failed to send log request for run {run_id}"))?
            .error_for_status()
            .with_context(|| format!("API returned an error for logs of run {run_id}"))?;

        response
            .bytes()
            .await
            .with_context(|| format!("Failed to read log archive for run {run_id}"))
    }
}
