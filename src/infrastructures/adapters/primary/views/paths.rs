use crate::domain::models::repository::RepositoryRef;
use crate::domain::services::listing::SortState;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const PROFILE_PATH: &str = "/profile";
pub const SIGN_IN_PATH: &str = "/auth/signin/github";
pub const SIGN_OUT_PATH: &str = "/auth/signout";

// RFC 3986 unreserved characters pass through.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

pub fn runs_path(repository: &RepositoryRef) -> String {
    format!(
        "{DASHBOARD_PATH}/repos/{}/{}",
        encode(&repository.owner),
        encode(&repository.name)
    )
}

pub fn more_runs_path(repository: &RepositoryRef) -> String {
    format!("{}/more", runs_path(repository))
}

pub fn logs_path(repository: &RepositoryRef, run_id: u64) -> String {
    format!("{}/runs/{run_id}/logs", runs_path(repository))
}

/// Dashboard URL for a given search, page and sort. Defaults are omitted.
pub fn dashboard_path(search: &str, page_index: usize, sort: Option<&SortState>) -> String {
    let mut params = Vec::new();
    if !search.is_empty() {
        params.push(format!("search={}", encode(search)));
    }
    if page_index > 0 {
        params.push(format!("page={page_index}"));
    }
    if let Some(sort) = sort {
        params.push(format!("sort={}", encode(&sort.column)));
        if sort.desc {
            params.push("desc=true".to_string());
        }
    }

    if params.is_empty() {
        DASHBOARD_PATH.to_string()
    } else {
        format!("{DASHBOARD_PATH}?{}", params.join("&"))
    }
}
