use crate::application::operation_tracker::OperationTracker;
use crate::domain::external_apis::github::GitHubApi;
use crate::domain::models::repository::RepositoryRef;
use crate::domain::models::run::WorkflowRun;
use crate::domain::models::session::Session;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const LOG_ARCHIVE_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Error)]
pub enum LogDownloadError {
    #[error("logs for run {0} are already being downloaded")]
    InFlight(u64),

    #[error("failed to download logs for run {run_id}")]
    Fetch {
        run_id: u64,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LogArchive {
    pub file_name: String,
    pub bytes: Bytes,
}

pub struct LogRetrievalController<G: GitHubApi + Send + Sync + 'static> {
    github_api: Arc<G>,
    loading_logs: OperationTracker<u64>,
}

impl<G: GitHubApi + Send + Sync + 'static> LogRetrievalController<G> {
    pub fn new(github_api: Arc<G>) -> Self {
        Self {
            github_api,
            loading_logs: OperationTracker::new(),
        }
    }

    /// Fetches one run's log archive. The run is flagged as loading for the
    /// duration of the request, whatever its outcome. Failures are logged here
    /// and not retried.
    #[tracing::instrument(name = "LogRetrievalController::download", skip(self, session), fields(repository = %repository))]
    pub async fn download(
        &self,
        session: &Session,
        repository: &RepositoryRef,
        run_id: u64,
    ) -> Result<LogArchive, LogDownloadError> {
        let Some(_loading) = self.loading_logs.start(run_id) else {
            tracing::warn!("Log download already in flight");
            return Err(LogDownloadError::InFlight(run_id));
        };

        match self
            .github_api
            .download_log(
                &session.access_token,
                &repository.owner,
                &repository.name,
                run_id,
            )
            .await
        {
            Ok(bytes) => {
                tracing::info!(size = bytes.len(), "Downloaded workflow logs");
                Ok(LogArchive {
                    file_name: WorkflowRun::log_archive_name(run_id),
                    bytes,
                })
            }
            Err(source) => {
                tracing::error!("Failed to download workflow logs: {:#}", source);
                Err(LogDownloadError::Fetch { run_id, source })
            }
        }
    }

    pub fn loading_logs(&self) -> HashMap<u64, bool> {
        self.loading_logs.snapshot()
    }
}
