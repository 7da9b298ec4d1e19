use crate::domain::models::session::Session;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sign-in state is unknown or expired")]
    UnknownState,

    #[error("identity provider rejected the sign-in: {0}")]
    Rejected(String),

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

/// Where to send the browser to start signing in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRedirect {
    pub url: String,
}

/// Opaque token handed to the browser after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

#[async_trait]
pub trait SessionProvider {
    /// The live session behind `token`, if any.
    fn get_session(&self, token: &SessionToken) -> Option<Session>;

    fn begin_sign_in(&self) -> Result<SignInRedirect, SessionError>;

    async fn complete_sign_in(&self, code: &str, state: &str)
    -> Result<SessionToken, SessionError>;

    fn sign_out(&self, token: &SessionToken);
}
