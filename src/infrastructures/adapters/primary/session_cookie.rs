use crate::domain::external_apis::session::{SessionProvider, SessionToken};
use crate::domain::models::session::Session;
use crate::infrastructures::adapters::primary::errors::{ApiError, PageError};
use crate::infrastructures::adapters::primary::web::AppState;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "dashboard.session-token";

pub fn read_session_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| SessionToken(value.to_string()))
}

fn secure_attribute(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

pub fn session_cookie(token: &SessionToken, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{}",
        token.0,
        secure_attribute(secure)
    )
}

pub fn expired_session_cookie(secure: bool) -> String {
    format!(
        "{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        secure_attribute(secure)
    )
}

/// The live session behind the request's cookie, if any.
pub fn resolve_session(headers: &HeaderMap, state: &AppState) -> Option<CurrentSession> {
    let token = read_session_token(headers)?;
    let session = state.sessions.get_session(&token)?;
    Some(CurrentSession { token, session })
}

/// A signed-in viewer on an HTML route.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: SessionToken,
    pub session: Session,
}

impl CurrentSession {
    /// Key for the viewer's per-session state.
    pub fn viewer_key(&self) -> &str {
        &self.token.0
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = PageError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(&parts.headers, state).ok_or(PageError::AccessDenied(None))
    }
}

/// A signed-in viewer on a JSON route.
#[derive(Debug, Clone)]
pub struct ApiSession(pub CurrentSession);

impl FromRequestParts<Arc<AppState>> for ApiSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(&parts.headers, state)
            .map(ApiSession)
            .ok_or(ApiError::Unauthorized)
    }
}
