pub mod download_workflow_logs;
pub mod list_repositories;
pub mod workflow_run_feed;

#[cfg(test)]
pub(crate) mod testing;
