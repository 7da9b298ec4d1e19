use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    #[serde(rename = "displayTitle")]
    pub display_title: String,
    /// Raw API vocabulary, e.g. `queued`, `in_progress`, `completed`.
    pub status: String,
    /// Raw API vocabulary; `None` until the run completes.
    pub conclusion: Option<String>,
    #[serde(rename = "headBranch")]
    pub head_branch: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "logsUrl")]
    pub logs_url: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
}

impl WorkflowRun {
    /// File name offered to the browser when the run's log archive is saved.
    pub fn log_archive_name(run_id: u64) -> String {
        format!("workflow_logs_{run_id}.zip")
    }
}
