use crate::application::use_cases::download_workflow_logs::LogRetrievalController;
use crate::application::use_cases::workflow_run_feed::{WorkflowRunCache, WorkflowRunController};
use crate::domain::external_apis::github::GitHubApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Run feed and log-download flags of one signed-in browser.
pub struct ViewerState<G: GitHubApi + Send + Sync + 'static> {
    pub runs: WorkflowRunController<G>,
    pub logs: LogRetrievalController<G>,
}

pub struct ViewerRegistry<G: GitHubApi + Send + Sync + 'static> {
    github_api: Arc<G>,
    run_cache: Arc<WorkflowRunCache>,
    page_size: u32,
    viewers: Mutex<HashMap<String, Arc<ViewerState<G>>>>,
}

impl<G: GitHubApi + Send + Sync + 'static> ViewerRegistry<G> {
    pub fn new(github_api: Arc<G>, run_cache: Arc<WorkflowRunCache>, page_size: u32) -> Self {
        Self {
            github_api,
            run_cache,
            page_size,
            viewers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ViewerState<G>>>> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_or_create(&self, session_key: &str) -> Arc<ViewerState<G>> {
        self.lock()
            .entry(session_key.to_string())
            .or_insert_with(|| {
                Arc::new(ViewerState {
                    runs: WorkflowRunController::new(
                        self.github_api.clone(),
                        self.run_cache.clone(),
                        self.page_size,
                    ),
                    logs: LogRetrievalController::new(self.github_api.clone()),
                })
            })
            .clone()
    }

    pub fn remove(&self, session_key: &str) {
        self.lock().remove(session_key);
    }

    /// Drops every viewer whose session key fails `live`. Returns how many
    /// were dropped.
    pub fn retain_live<F>(&self, live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut viewers = self.lock();
        let before = viewers.len();
        viewers.retain(|key, _| live(key));
        before - viewers.len()
    }
}
