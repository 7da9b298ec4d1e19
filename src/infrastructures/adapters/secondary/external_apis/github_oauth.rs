use crate::domain::external_apis::session::{
    SessionError, SessionProvider, SessionToken, SignInRedirect,
};
use crate::domain::models::session::{Session, SessionUser};
use crate::infrastructures::adapters::secondary::external_apis::github::USER_AGENT;
use crate::infrastructures::adapters::secondary::session_store::InMemorySessionStore;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// The dashboard needs read access to private repositories and their runs.
pub const OAUTH_SCOPE: &str = "repo";

const SIGN_IN_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub oauth_base_url: String,
    pub api_base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Serialize)]
struct AccessTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

// GitHub answers 200 for rejected codes too and reports them in `error`.
#[derive(Deserialize, Debug)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GitHubUserResponse {
    login: String,
    name: Option<String>,
}

pub struct GitHubOAuthClient {
    client: Client,
    settings: OAuthSettings,
}

impl GitHubOAuthClient {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    fn oauth_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.oauth_base_url.trim_end_matches('/'), path)
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, SessionError> {
        let url = Url::parse_with_params(
            &self.oauth_url("/login/oauth/authorize"),
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", OAUTH_SCOPE),
                ("state", state),
            ],
        )
        .context("Failed to build the GitHub authorize URL")?;
        Ok(url.into())
    }

    #[tracing::instrument(name = "GitHubOAuthClient::exchange_code", skip_all)]
    pub async fn exchange_code(&self, code: &str) -> Result<String, SessionError> {
        let response: AccessTokenResponse = self
            .client
            .post(self.oauth_url("/login/oauth/access_token"))
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(&AccessTokenRequest {
                client_id: &self.settings.client_id,
                client_secret: &self.settings.client_secret,
                code,
                redirect_uri: &self.settings.redirect_uri,
            })
            .send()
            .await
            .context("Failed to send the access token request")?
            .error_for_status()
            .context("GitHub rejected the access token request")?
            .json::<AccessTokenResponse>()
            .await
            .context("Failed to deserialize the access token response")?;

        match response {
            AccessTokenResponse {
                access_token: Some(token),
                ..
            } => Ok(token),
            AccessTokenResponse {
                error,
                error_description,
                ..
            } => Err(SessionError::Rejected(
                error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token returned".to_string()),
            )),
        }
    }

    #[tracing::instrument(name = "GitHubOAuthClient::fetch_user", skip_all)]
    pub async fn fetch_user(&self, access_token: &str) -> Result<SessionUser, SessionError> {
        let url = format!(
            "{}/user",
            self.settings.api_base_url.trim_end_matches('/')
        );
        let user: GitHubUserResponse = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .context("Failed to send the user request")?
            .error_for_status()
            .context("GitHub rejected the user request")?
            .json::<GitHubUserResponse>()
            .await
            .context("Failed to deserialize the user response")?;

        Ok(SessionUser {
            login: user.login,
            name: user.name,
        })
    }
}

/// Signs viewers in through GitHub and keeps their sessions in memory.
pub struct GitHubSessionProvider {
    oauth: GitHubOAuthClient,
    store: InMemorySessionStore,
    pending_states: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl GitHubSessionProvider {
    pub fn new(oauth: GitHubOAuthClient, store: InMemorySessionStore) -> Self {
        Self {
            oauth,
            store,
            pending_states: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &InMemorySessionStore {
        &self.store
    }

    fn pending_states(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.pending_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Consumes `state` if it was issued by this process and has not expired.
    fn take_state(&self, state: &str) -> bool {
        let now = Utc::now();
        let mut pending = self.pending_states();
        pending.retain(|_, expires_at| *expires_at > now);
        pending.remove(state).is_some()
    }
}

#[async_trait]
impl SessionProvider for GitHubSessionProvider {
    fn get_session(&self, token: &SessionToken) -> Option<Session> {
        self.store.get(token)
    }

    fn begin_sign_in(&self) -> Result<SignInRedirect, SessionError> {
        let state = Uuid::new_v4().simple().to_string();
        let url = self.oauth.authorize_url(&state)?;
        self.pending_states().insert(
            state.clone(),
            Utc::now() + Duration::minutes(SIGN_IN_STATE_TTL_MINUTES),
        );
        Ok(SignInRedirect { url })
    }

    async fn complete_sign_in(
        &self,
        code: &str,
        state: &str,
    ) -> Result<SessionToken, SessionError> {
        if !self.take_state(state) {
            return Err(SessionError::UnknownState);
        }
        let access_token = self.oauth.exchange_code(code).await?;
        let user = self.oauth.fetch_user(&access_token).await?;
        tracing::info!(login = %user.login, "Signed in");
        Ok(self.store.create(access_token, user))
    }

    fn sign_out(&self, token: &SessionToken) {
        if let Some(session) = self.store.remove(token) {
            tracing::info!(login = %session.user.login, "Signed out");
        }
    }
}
