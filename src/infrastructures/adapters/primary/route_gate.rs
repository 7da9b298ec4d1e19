use crate::infrastructures::adapters::primary::session_cookie::resolve_session;
use crate::infrastructures::adapters::primary::views::paths::{
    DASHBOARD_PATH, LOGIN_PATH, PROFILE_PATH,
};
use crate::infrastructures::adapters::primary::web::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

const PROTECTED_PREFIXES: [&str; 2] = [DASHBOARD_PATH, PROFILE_PATH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(&'static str),
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn decide(path: &str, authenticated: bool) -> GateDecision {
    if path == LOGIN_PATH {
        return if authenticated {
            GateDecision::Redirect(DASHBOARD_PATH)
        } else {
            GateDecision::Pass
        };
    }

    let protected = PROTECTED_PREFIXES
        .iter()
        .any(|prefix| is_under(path, prefix));
    if protected && !authenticated {
        GateDecision::Redirect(LOGIN_PATH)
    } else {
        GateDecision::Pass
    }
}

pub async fn gate(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let authenticated = resolve_session(request.headers(), &state).is_some();
    match decide(request.uri().path(), authenticated) {
        GateDecision::Pass => next.run(request).await,
        GateDecision::Redirect(target) => {
            tracing::debug!(path = %request.uri().path(), target, "Redirecting");
            Redirect::temporary(target).into_response()
        }
    }
}
