pub mod github;
pub mod github_oauth;
