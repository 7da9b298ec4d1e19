use crate::application::query_cache::{QueryCache, QueryError, QueryKey};
use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::run::WorkflowRun;
use crate::domain::models::session::Session;
use anyhow::Context;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const WORKFLOW_RUNS_OPERATION: &str = "workflow_runs";

/// Every page loaded so far for one repository, in page order.
pub type RunPages = Arc<Vec<Arc<Vec<WorkflowRun>>>>;

pub type WorkflowRunCache = QueryCache<RunPages>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "page", rename_all = "snake_case")]
pub enum FeedPhase {
    Idle,
    RepoSelected,
    FetchingPage(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchOutcome {
    Appended { page: u32, count: usize },
    /// The last page was short; there is nothing more to load.
    Exhausted,
    /// A page for the current selection is already being fetched.
    AlreadyFetching,
    NoSelection,
    /// The selection changed while the page was in flight.
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFeed {
    pub repository: Option<RepositoryRef>,
    pub phase: FeedPhase,
    pub runs: Vec<WorkflowRun>,
    #[serde(rename = "pagesLoaded")]
    pub pages_loaded: usize,
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
}

#[derive(Debug)]
struct FeedState {
    selection: Option<RepositoryRef>,
    generation: u64,
    pages: Vec<Arc<Vec<WorkflowRun>>>,
    phase: FeedPhase,
}

impl FeedState {
    fn has_next_page(&self, page_size: usize) -> bool {
        self.selection.is_some() && self.pages.last().is_none_or(|page| page.len() >= page_size)
    }

    fn resting_phase(&self) -> FeedPhase {
        if self.selection.is_some() && self.pages.is_empty() {
            FeedPhase::RepoSelected
        } else {
            FeedPhase::Idle
        }
    }
}

/// Run history of the repository a viewer has selected.
///
/// ```text
/// Idle --select--> RepoSelected --fetch--> FetchingPage(n) --> Idle
///                                                 \-- (next fetch) --> FetchingPage(n+1)
/// ```
///
/// Selecting another repository clears the pages and bumps the generation, so
/// a page that lands for an older generation is dropped. The page sequence of
/// a repository is cached as one entry: the first page comes from the cache
/// along with everything loaded after it, and each later page replaces that
/// entry with the extended sequence.
pub struct WorkflowRunController<G: GitHubApi + Send + Sync + 'static> {
    github_api: Arc<G>,
    cache: Arc<WorkflowRunCache>,
    page_size: u32,
    state: Mutex<FeedState>,
}

impl<G: GitHubApi + Send + Sync + 'static> WorkflowRunController<G> {
    pub fn new(github_api: Arc<G>, cache: Arc<WorkflowRunCache>, page_size: u32) -> Self {
        Self {
            github_api,
            cache,
            page_size,
            state: Mutex::new(FeedState {
                selection: None,
                generation: 0,
                pages: Vec::new(),
                phase: FeedPhase::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches the feed to `repository`. Returns `false` if it was already
    /// selected, in which case the accumulated pages are kept.
    pub fn select(&self, repository: RepositoryRef) -> bool {
        let mut state = self.lock();
        if state.selection.as_ref() == Some(&repository) {
            return false;
        }

        tracing::info!(repository = %repository, "Selected repository");
        state.phase = FeedPhase::Idle;
        state.pages.clear();
        state.generation += 1;
        state.selection = Some(repository);
        state.phase = FeedPhase::RepoSelected;
        true
    }

    /// Fetches exactly one more page for the current selection.
    #[tracing::instrument(name = "WorkflowRunController::fetch_next_page", skip_all, fields(login = %session.user.login))]
    pub async fn fetch_next_page(&self, session: &Session) -> Result<FetchOutcome, QueryError> {
        let page_size = self.page_size as usize;
        let (repository, generation, page, loaded) = {
            let mut state = self.lock();
            let Some(repository) = state.selection.clone() else {
                return Ok(FetchOutcome::NoSelection);
            };
            if let FeedPhase::FetchingPage(page) = state.phase {
                tracing::debug!(page, "Page fetch already in flight");
                return Ok(FetchOutcome::AlreadyFetching);
            }
            if !state.has_next_page(page_size) {
                return Ok(FetchOutcome::Exhausted);
            }
            let page = u32::try_from(state.pages.len() + 1).unwrap_or(u32::MAX);
            state.phase = FeedPhase::FetchingPage(page);
            (repository, state.generation, page, state.pages.clone())
        };

        let key = QueryKey::new(
            WORKFLOW_RUNS_OPERATION,
            [session.user.login.clone(), repository.full_name()],
        );
        let github_api = self.github_api.clone();
        let token = session.access_token.clone();
        let per_page = self.page_size;
        let RepositoryRef { owner, name } = repository;
        let fetch_page = move || async move {
            let runs = github_api
                .list_workflow_runs(&token, &owner, &name, page, per_page)
                .await
                .with_context(|| format!("Failed to fetch workflow runs for {owner}/{name}"))?;
            let mut pages = loaded;
            pages.push(Arc::new(runs));
            Ok::<_, anyhow::Error>(Arc::new(pages))
        };

        let result = if page == 1 {
            self.cache.fetch(key, fetch_page).await
        } else {
            self.cache.refetch(key, fetch_page).await
        };

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(page, "Discarding page for a previous selection");
            return Ok(FetchOutcome::Discarded);
        }

        match result {
            Ok(pages) => {
                let count = pages
                    .iter()
                    .skip(state.pages.len())
                    .map(|runs| runs.len())
                    .sum::<usize>();
                let page = u32::try_from(pages.len()).unwrap_or(u32::MAX);
                state.pages = pages.to_vec();
                state.phase = FeedPhase::Idle;
                tracing::info!(page, count, "Appended workflow run page");
                Ok(FetchOutcome::Appended { page, count })
            }
            Err(e) => {
                let phase = state.resting_phase();
                state.phase = phase;
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> RunFeed {
        let state = self.lock();
        RunFeed {
            repository: state.selection.clone(),
            phase: state.phase,
            runs: state
                .pages
                .iter()
                .flat_map(|page| page.iter().cloned())
                .collect(),
            pages_loaded: state.pages.len(),
            has_next_page: state.has_next_page(self.page_size as usize),
        }
    }
}
