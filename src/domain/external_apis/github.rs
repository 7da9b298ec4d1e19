use crate::domain::models::repository::Repository;
use crate::domain::models::run::WorkflowRun;
use anyhow::Error;
use async_trait::async_trait;
use bytes::Bytes;

/// Authenticated calls against the source-hosting service. Every call takes
/// the viewer's access token; implementations hold no credential of their own.
#[async_trait]
pub trait GitHubApi {
    /// One page (1-based) of the repositories visible to the token's owner.
    async fn list_repositories(
        &self,
        token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Repository>, Error>;

    /// One page (1-based) of a repository's workflow-run history.
    async fn list_workflow_runs(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<WorkflowRun>, Error>;

    /// The zip archive holding all logs of one run.
    async fn download_log(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        run_id: u64,
    ) -> Result<Bytes, Error>;
}
