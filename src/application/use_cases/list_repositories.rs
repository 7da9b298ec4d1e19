use crate::application::query_cache::{QueryCache, QueryError, QueryKey};
use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::repository::Repository;
use crate::domain::models::session::Session;
use crate::domain::services::listing::{Page, SortState, filter_by_substring, paginate};
use anyhow::{Context, Error};
use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

pub const REPOSITORIES_OPERATION: &str = "repositories";

/// The only sortable repository column.
pub const NAME_COLUMN: &str = "name";

pub type RepositoryCache = QueryCache<Arc<Vec<Repository>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryQuery {
    pub search: String,
    pub page_index: usize,
    pub sort: Option<SortState>,
}

/// Requests pages 1, 2, ... one after another and yields each as it arrives.
/// Ends after the first page shorter than `per_page`.
fn repository_pages<G>(
    github_api: Arc<G>,
    token: String,
    per_page: u32,
) -> impl Stream<Item = Result<Vec<Repository>, Error>> + Send
where
    G: GitHubApi + Send + Sync + 'static,
{
    try_stream! {
        let mut page = 1;
        loop {
            tracing::debug!("Fetching repository page {}", page);
            let batch = github_api
                .list_repositories(&token, page, per_page)
                .await
                .with_context(|| format!("Failed to fetch repository page {page}"))?;
            let is_last = batch.len() < per_page as usize;
            yield batch;
            if is_last {
                break;
            }
            page += 1;
        }
    }
}

/// Filters by name, applies the sort if it targets the name column, then
/// slices out the requested page.
pub fn view_repositories(
    repositories: &[Repository],
    query: &RepositoryQuery,
    page_size: usize,
) -> Page<Repository> {
    let mut matching: Vec<Repository> =
        filter_by_substring(repositories, &query.search, |repo| repo.name.as_str())
            .into_iter()
            .cloned()
            .collect();

    if let Some(sort) = query.sort.as_ref().filter(|sort| sort.column == NAME_COLUMN) {
        matching.sort_by_cached_key(|repo| repo.name.to_lowercase());
        if sort.desc {
            matching.reverse();
        }
    }

    paginate(&matching, query.page_index, page_size)
}

pub struct RepositoryListController<G: GitHubApi + Send + Sync + 'static> {
    github_api: Arc<G>,
    cache: Arc<RepositoryCache>,
    page_size: u32,
}

impl<G: GitHubApi + Send + Sync + 'static> RepositoryListController<G> {
    pub fn new(github_api: Arc<G>, cache: Arc<RepositoryCache>, page_size: u32) -> Self {
        Self {
            github_api,
            cache,
            page_size,
        }
    }

    fn cache_key(session: &Session) -> QueryKey {
        QueryKey::new(REPOSITORIES_OPERATION, [session.user.login.as_str()])
    }

    /// Every repository visible to the viewer, in the order the pages arrived.
    /// Nothing is returned until the last page is in.
    #[tracing::instrument(name = "RepositoryListController::fetch_all", skip_all, fields(login = %session.user.login))]
    pub async fn fetch_all(&self, session: &Session) -> Result<Arc<Vec<Repository>>, QueryError> {
        let github_api = self.github_api.clone();
        let token = session.access_token.clone();
        let per_page = self.page_size;

        self.cache
            .fetch(Self::cache_key(session), move || async move {
                let pages = repository_pages(github_api, token, per_page);
                tokio::pin!(pages);

                let mut repositories = Vec::new();
                while let Some(batch) = pages.next().await {
                    repositories.extend(batch?);
                }
                tracing::info!("Fetched {} repositories", repositories.len());
                Ok(Arc::new(repositories))
            })
            .await
    }

    pub async fn view(
        &self,
        session: &Session,
        query: &RepositoryQuery,
    ) -> Result<Page<Repository>, QueryError> {
        let repositories = self.fetch_all(session).await?;
        Ok(view_repositories(
            &repositories,
            query,
            self.page_size as usize,
        ))
    }

    /// Forgets the cached list so the next view pages through it again.
    pub fn refresh(&self, session: &Session) {
        self.cache.invalidate(&Self::cache_key(session));
    }
}
