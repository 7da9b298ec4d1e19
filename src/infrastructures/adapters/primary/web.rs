use crate::application::query_cache::{QueryCache, QueryError};
use crate::application::use_cases::download_workflow_logs::{
    LOG_ARCHIVE_CONTENT_TYPE, LogDownloadError,
};
use crate::application::use_cases::list_repositories::{RepositoryListController, RepositoryQuery};
use crate::application::use_cases::workflow_run_feed::{FetchOutcome, RunFeed};
use crate::application::viewer_registry::{ViewerRegistry, ViewerState};
use crate::config::AppConfig;
use crate::domain::external_apis::session::{SessionProvider, SessionToken};
use crate::domain::models::repository::{InvalidRepositoryRef, Repository, RepositoryRef};
use crate::domain::services::listing::{Page, SortState};
use crate::infrastructures::adapters::primary::errors::{ApiError, PageError};
use crate::infrastructures::adapters::primary::route_gate;
use crate::infrastructures::adapters::primary::session_cookie::{
    ApiSession, CurrentSession, expired_session_cookie, read_session_token, session_cookie,
};
use crate::infrastructures::adapters::primary::views::columns::{repository_table, run_table};
use crate::infrastructures::adapters::primary::views::pages;
use crate::infrastructures::adapters::primary::views::paths::{
    DASHBOARD_PATH, LOGIN_PATH, dashboard_path, runs_path,
};
use crate::infrastructures::adapters::primary::views::table::TableView;
use crate::infrastructures::adapters::secondary::external_apis::github::{
    GitHubApiAdapter, RetryPolicy,
};
use crate::infrastructures::adapters::secondary::external_apis::github_oauth::{
    GitHubOAuthClient, GitHubSessionProvider, OAuthSettings,
};
use crate::infrastructures::adapters::secondary::session_store::InMemorySessionStore;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// Times a run page takes the selection back from a concurrent request.
const OPEN_FEED_ATTEMPTS: usize = 3;

/// Shared by every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<GitHubSessionProvider>,
    pub repositories: Arc<RepositoryListController<GitHubApiAdapter>>,
    pub viewers: Arc<ViewerRegistry<GitHubApiAdapter>>,
    pub session_ttl_secs: i64,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        let github_api = Arc::new(
            GitHubApiAdapter::new(config.github_api_url.clone()).with_retry_policy(RetryPolicy {
                max_retries: config.github_max_retries,
                ..RetryPolicy::default()
            }),
        );
        let oauth = GitHubOAuthClient::new(OAuthSettings {
            oauth_base_url: config.github_oauth_url.clone(),
            api_base_url: config.github_api_url.clone(),
            client_id: config.github_client_id.clone(),
            client_secret: config.github_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri(),
        });
        let store = InMemorySessionStore::new(chrono::Duration::seconds(config.session_ttl_secs));

        Self {
            sessions: Arc::new(GitHubSessionProvider::new(oauth, store)),
            repositories: Arc::new(RepositoryListController::new(
                github_api.clone(),
                Arc::new(QueryCache::new(config.query_stale_after)),
                config.page_size,
            )),
            viewers: Arc::new(ViewerRegistry::new(
                github_api,
                Arc::new(QueryCache::new(config.query_stale_after)),
                config.page_size,
            )),
            session_ttl_secs: config.session_ttl_secs,
            secure_cookies: config.secure_cookies(),
        }
    }

    fn viewer(&self, current: &CurrentSession) -> Arc<ViewerState<GitHubApiAdapter>> {
        self.viewers.get_or_create(current.viewer_key())
    }

    /// Evicts expired sessions along with the viewer state of every session
    /// that no longer exists.
    pub fn sweep_sessions(&self) -> SessionSweep {
        let store = self.sessions.store();
        let sessions = store.sweep_expired();
        let viewers = self
            .viewers
            .retain_live(|key| store.get(&SessionToken(key.to_string())).is_some());
        if sessions > 0 || viewers > 0 {
            tracing::info!(sessions, viewers, "Swept ended sessions");
        }
        SessionSweep { sessions, viewers }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSweep {
    pub sessions: usize,
    pub viewers: usize,
}

pub fn spawn_session_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        loop {
            ticks.tick().await;
            state.sweep_sessions();
        }
    })
}

fn repository_from_path(owner: &str, repo: &str) -> Result<RepositoryRef, InvalidRepositoryRef> {
    format!("{owner}/{repo}").parse()
}

#[tracing::instrument(name = "health_check")]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn login() -> Html<String> {
    Html(pages::login_page())
}

#[tracing::instrument(name = "sign_in", skip_all)]
async fn sign_in(State(state): State<Arc<AppState>>) -> Result<Redirect, PageError> {
    let redirect = state.sessions.begin_sign_in().map_err(|e| {
        tracing::error!("Failed to start sign-in: {:#}", e);
        PageError::AccessDenied(None)
    })?;
    Ok(Redirect::to(&redirect.url))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[tracing::instrument(name = "sign_in_callback", skip_all)]
async fn sign_in_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, PageError> {
    if let Some(error) = params.error_description.or(params.error) {
        tracing::warn!("GitHub declined the sign-in: {}", error);
        return Err(PageError::AccessDenied(Some(error)));
    }
    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return Err(PageError::BadRequest(
            "The sign-in callback is missing its code or state.".to_string(),
        ));
    };

    let token = state
        .sessions
        .complete_sign_in(&code, &oauth_state)
        .await
        .map_err(|e| {
            tracing::warn!("Sign-in failed: {:#}", e);
            PageError::AccessDenied(Some(e.to_string()))
        })?;

    Ok((
        [(
            SET_COOKIE,
            session_cookie(&token, state.session_ttl_secs, state.secure_cookies),
        )],
        Redirect::to(DASHBOARD_PATH),
    )
        .into_response())
}

#[tracing::instrument(name = "sign_out", skip_all)]
async fn sign_out(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = read_session_token(&headers) {
        state.sessions.sign_out(&token);
        state.viewers.remove(&token.0);
    }
    (
        [(SET_COOKIE, expired_session_cookie(state.secure_cookies))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryParams {
    search: Option<String>,
    page: Option<usize>,
    sort: Option<String>,
    desc: Option<bool>,
    refresh: Option<bool>,
}

impl RepositoryParams {
    fn query(&self) -> RepositoryQuery {
        RepositoryQuery {
            search: self.search.clone().unwrap_or_default(),
            page_index: self.page.unwrap_or(0),
            sort: self.sort.clone().map(|column| SortState {
                column,
                desc: self.desc.unwrap_or(false),
            }),
        }
    }
}

#[tracing::instrument(name = "dashboard", skip_all, fields(login = %current.session.user.login))]
async fn dashboard(
    State(state): State<Arc<AppState>>,
    current: CurrentSession,
    Query(params): Query<RepositoryParams>,
) -> Result<Response, PageError> {
    let query = params.query();
    if params.refresh.unwrap_or(false) {
        state.repositories.refresh(&current.session);
        return Ok(Redirect::to(&dashboard_path(
            &query.search,
            query.page_index,
            query.sort.as_ref(),
        ))
        .into_response());
    }

    let page = state
        .repositories
        .view(&current.session, &query)
        .await
        .map_err(PageError::LoadFailed)?;
    let table = repository_table(&page, query.sort.as_ref());
    Ok(Html(pages::dashboard_page(&current.session.user, &query, &table)).into_response())
}

/// A feed snapshot whose selection is the requested repository.
struct SelectedFeed {
    repository: RepositoryRef,
    feed: RunFeed,
}

impl SelectedFeed {
    fn of(feed: RunFeed, requested: &RepositoryRef) -> Option<Self> {
        let repository = feed.repository.clone().filter(|selected| selected == requested)?;
        Some(Self { repository, feed })
    }
}

/// Selects `repository` and loads its first page if nothing is loaded yet.
/// Returns `None` if other requests on the same session kept switching the
/// selection away.
async fn open_feed(
    viewer: &ViewerState<GitHubApiAdapter>,
    current: &CurrentSession,
    repository: &RepositoryRef,
) -> Result<Option<SelectedFeed>, QueryError> {
    for attempt in 1..=OPEN_FEED_ATTEMPTS {
        viewer.runs.select(repository.clone());
        if viewer.runs.snapshot().pages_loaded == 0 {
            viewer.runs.fetch_next_page(&current.session).await?;
        }
        if let Some(selected) = SelectedFeed::of(viewer.runs.snapshot(), repository) {
            return Ok(Some(selected));
        }
        tracing::debug!(attempt, repository = %repository, "Selection changed while loading");
    }
    Ok(None)
}

#[tracing::instrument(name = "workflow_runs_page", skip_all)]
async fn workflow_runs_page(
    State(state): State<Arc<AppState>>,
    current: CurrentSession,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Html<String>, PageError> {
    let requested = repository_from_path(&owner, &repo)?;
    let viewer = state.viewer(&current);
    let SelectedFeed { repository, feed } = open_feed(&viewer, &current, &requested)
        .await
        .map_err(PageError::LoadFailed)?
        .ok_or(PageError::SelectionChanged)?;

    let table = run_table(&repository, &feed.runs, &viewer.logs.loading_logs());
    Ok(Html(pages::runs_page(
        &current.session.user,
        &repository,
        &feed,
        &table,
    )))
}

#[tracing::instrument(name = "load_more_runs", skip_all)]
async fn load_more_runs(
    State(state): State<Arc<AppState>>,
    current: CurrentSession,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Redirect, PageError> {
    let repository = repository_from_path(&owner, &repo)?;
    let viewer = state.viewer(&current);
    viewer.runs.select(repository.clone());
    let outcome = viewer
        .runs
        .fetch_next_page(&current.session)
        .await
        .map_err(PageError::LoadFailed)?;
    tracing::debug!(?outcome, "Load more finished");
    Ok(Redirect::to(&runs_path(&repository)))
}

#[tracing::instrument(name = "download_logs", skip_all)]
async fn download_logs(
    State(state): State<Arc<AppState>>,
    current: CurrentSession,
    Path((owner, repo, run_id)): Path<(String, String, u64)>,
) -> Response {
    let repository = match repository_from_path(&owner, &repo) {
        Ok(repository) => repository,
        Err(e) => return PageError::from(e).into_response(),
    };
    let viewer = state.viewer(&current);

    match viewer
        .logs
        .download(&current.session, &repository, run_id)
        .await
    {
        Ok(archive) => (
            [
                (CONTENT_TYPE, LOG_ARCHIVE_CONTENT_TYPE.to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", archive.file_name),
                ),
            ],
            archive.bytes,
        )
            .into_response(),
        Err(LogDownloadError::InFlight(_)) => StatusCode::CONFLICT.into_response(),
        // Already logged; the viewer gets no message.
        Err(LogDownloadError::Fetch { .. }) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn profile(current: CurrentSession) -> Html<String> {
    Html(pages::profile_page(&current.session))
}

#[derive(Debug, Serialize)]
struct RepositoryListResponse {
    repositories: Page<Repository>,
    table: TableView,
}

#[tracing::instrument(name = "api_repositories", skip_all)]
async fn api_repositories(
    State(state): State<Arc<AppState>>,
    ApiSession(current): ApiSession,
    Query(params): Query<RepositoryParams>,
) -> Result<Json<RepositoryListResponse>, ApiError> {
    if params.refresh.unwrap_or(false) {
        state.repositories.refresh(&current.session);
    }
    let query = params.query();
    let repositories = state
        .repositories
        .view(&current.session, &query)
        .await
        .map_err(ApiError::LoadFailed)?;
    let table = repository_table(&repositories, query.sort.as_ref());
    Ok(Json(RepositoryListResponse {
        repositories,
        table,
    }))
}

#[tracing::instrument(name = "api_run_feed", skip_all)]
async fn api_run_feed(
    State(state): State<Arc<AppState>>,
    ApiSession(current): ApiSession,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RunFeed>, ApiError> {
    let repository = repository_from_path(&owner, &repo)?;
    let viewer = state.viewer(&current);
    let selected = open_feed(&viewer, &current, &repository)
        .await
        .map_err(ApiError::LoadFailed)?
        .ok_or(ApiError::SelectionChanged)?;
    Ok(Json(selected.feed))
}

#[derive(Debug, Serialize)]
struct NextPageResponse {
    outcome: FetchOutcome,
    feed: RunFeed,
}

#[tracing::instrument(name = "api_next_run_page", skip_all)]
async fn api_next_run_page(
    State(state): State<Arc<AppState>>,
    ApiSession(current): ApiSession,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<NextPageResponse>, ApiError> {
    let repository = repository_from_path(&owner, &repo)?;
    let viewer = state.viewer(&current);
    viewer.runs.select(repository.clone());
    let outcome = viewer
        .runs
        .fetch_next_page(&current.session)
        .await
        .map_err(ApiError::LoadFailed)?;
    let selected = SelectedFeed::of(viewer.runs.snapshot(), &repository)
        .ok_or(ApiError::SelectionChanged)?;
    Ok(Json(NextPageResponse {
        outcome,
        feed: selected.feed,
    }))
}

#[derive(Debug, Serialize)]
struct LogStatusResponse {
    #[serde(rename = "loadingLogs")]
    loading_logs: HashMap<u64, bool>,
}

async fn api_log_status(
    State(state): State<Arc<AppState>>,
    ApiSession(current): ApiSession,
) -> Json<LogStatusResponse> {
    Json(LogStatusResponse {
        loading_logs: state.viewer(&current).logs.loading_logs(),
    })
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/login", get(login))
        .route("/auth/signin/github", get(sign_in))
        .route("/auth/callback/github", get(sign_in_callback))
        .route("/auth/signout", post(sign_out))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/repos/{owner}/{repo}", get(workflow_runs_page))
        .route("/dashboard/repos/{owner}/{repo}/more", post(load_more_runs))
        .route(
            "/dashboard/repos/{owner}/{repo}/runs/{run_id}/logs",
            get(download_logs),
        )
        .route("/profile", get(profile))
        .route("/api/repositories", get(api_repositories))
        .route("/api/repos/{owner}/{repo}/runs", get(api_run_feed))
        .route("/api/repos/{owner}/{repo}/runs/next", post(api_next_run_page))
        .route("/api/logs/status", get(api_log_status))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            route_gate::gate,
        ))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::session::SessionUser;
    use crate::infrastructures::adapters::primary::session_cookie::SESSION_COOKIE;
    use axum::body::{Body, to_bytes};
    use axum::http::header::{COOKIE, LOCATION};
    use axum::http::Request;
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    const RUN_COUNT: u64 = 18;
    const REPOSITORY_COUNT: usize = 16;

    fn page_params(params: &HashMap<String, String>) -> (usize, usize) {
        let page = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let per_page = params
            .get("per_page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(30);
        (page, per_page)
    }

    async fn user_repos(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
        let (page, per_page) = page_params(&params);
        let start = (page - 1) * per_page;
        let end = (start + per_page).min(REPOSITORY_COUNT);
        let repos: Vec<Value> = (start..end.max(start))
            .map(|i| {
                let name = if i == 0 {
                    "hello".to_string()
                } else {
                    format!("repo-{i:03}")
                };
                json!({
                    "full_name": format!("octocat/{name}"),
                    "name": name,
                    "owner": { "login": "octocat" },
                })
            })
            .collect();
        Json(Value::Array(repos))
    }

    /// Stand-in GitHub that can hold the next run listing of one repository
    /// open until released.
    #[derive(Default)]
    struct GitHubStub {
        held_repo: Mutex<Option<String>>,
        started: Notify,
        release: Notify,
    }

    impl GitHubStub {
        fn hold_runs(&self, repo: &str) {
            *self.held_repo.lock().unwrap() = Some(repo.to_string());
        }
    }

    fn first_run_id(repo: &str) -> u64 {
        match repo {
            "slow" => 1000,
            "fast" => 2000,
            _ => 0,
        }
    }

    async fn runs(
        State(stub): State<Arc<GitHubStub>>,
        Path((_, repo)): Path<(String, String)>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let held = {
            let mut held_repo = stub.held_repo.lock().unwrap();
            if held_repo.as_deref() == Some(repo.as_str()) {
                held_repo.take()
            } else {
                None
            }
        };
        if held.is_some() {
            stub.started.notify_one();
            stub.release.notified().await;
        }

        let (page, per_page) = page_params(&params);
        let start = (page as u64 - 1) * per_page as u64;
        let end = (start + per_page as u64).min(RUN_COUNT);
        let runs: Vec<Value> = (start..end.max(start))
            .map(|i| {
                let id = first_run_id(&repo) + RUN_COUNT - i;
                json!({
                    "id": id,
                    "name": "CI",
                    "display_title": format!("Build {id}"),
                    "status": "completed",
                    "conclusion": "success",
                    "head_branch": "main",
                    "created_at": "2024-11-04T10:30:00Z",
                    "updated_at": "2024-11-04T10:33:00Z",
                    "logs_url": format!("https://api.github.com/repos/octocat/hello/actions/runs/{id}/logs"),
                    "html_url": format!("https://github.com/octocat/hello/actions/runs/{id}"),
                })
            })
            .collect();
        Json(json!({ "total_count": RUN_COUNT, "workflow_runs": runs }))
    }

    async fn logs(Path((_, _, run_id)): Path<(String, String, u64)>) -> Response {
        if run_id == 500 {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        format!("PK-logs-{run_id}").into_response()
    }

    async fn start_github(stub: Arc<GitHubStub>) -> SocketAddr {
        let app = Router::new()
            .route("/user/repos", get(user_repos))
            .route("/repos/{owner}/{repo}/actions/runs", get(runs))
            .route("/repos/{owner}/{repo}/actions/runs/{run_id}/logs", get(logs))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
        github: Arc<GitHubStub>,
        token: SessionToken,
        cookie: String,
    }

    impl TestApp {
        async fn start() -> Self {
            let github = Arc::new(GitHubStub::default());
            let base = format!("http://{}", start_github(github.clone()).await);
            let config = AppConfig::from_lookup(|name: &str| match name {
                "GITHUB_CLIENT_ID" => Some("client-123".to_string()),
                "GITHUB_CLIENT_SECRET" => Some("shh".to_string()),
                "GITHUB_API_URL" | "GITHUB_OAUTH_URL" => Some(base.clone()),
                _ => None,
            })
            .unwrap();
            let state = Arc::new(AppState::from_config(&config));
            let token = state.sessions.store().create(
                "gho_token".to_string(),
                SessionUser {
                    login: "octocat".to_string(),
                    name: Some("The Octocat".to_string()),
                },
            );
            Self {
                router: create_router(state.clone()),
                state,
                github,
                cookie: format!("{SESSION_COOKIE}={}", token.0),
                token,
            }
        }

        fn request(&self, method: &str, uri: &str, signed_in: bool) -> Request<Body> {
            let mut request = Request::builder().method(method).uri(uri);
            if signed_in {
                request = request.header(COOKIE, &self.cookie);
            }
            request.body(Body::empty()).unwrap()
        }

        async fn send(&self, method: &str, uri: &str, signed_in: bool) -> Response {
            self.router
                .clone()
                .oneshot(self.request(method, uri, signed_in))
                .await
                .unwrap()
        }
    }

    async fn body_text(response: Response) -> String {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = TestApp::start().await;
        let response = app.send("GET", "/health", false).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn protected_pages_redirect_anonymous_viewers() {
        let app = TestApp::start().await;

        for uri in ["/dashboard", "/dashboard/repos/octocat/hello", "/profile"] {
            let response = app.send("GET", uri, false).await;
            assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{uri}");
            assert_eq!(location(&response), "/login");
        }
    }

    #[tokio::test]
    async fn login_redirects_signed_in_viewers() {
        let app = TestApp::start().await;

        let response = app.send("GET", "/login", true).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/dashboard");

        let response = app.send("GET", "/login", false).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Sign in with GitHub"));
    }

    #[tokio::test]
    async fn sign_in_redirects_to_github() {
        let app = TestApp::start().await;
        let response = app.send("GET", "/auth/signin/github", false).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.contains("/login/oauth/authorize?"));
        assert!(target.contains("scope=repo"));
    }

    #[tokio::test]
    async fn callback_with_unknown_state_is_denied() {
        let app = TestApp::start().await;
        let response = app
            .send("GET", "/auth/callback/github?code=abc&state=forged", false)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Access denied"));
    }

    #[tokio::test]
    async fn callback_reports_provider_error() {
        let app = TestApp::start().await;
        let response = app
            .send(
                "GET",
                "/auth/callback/github?error=access_denied&error_description=The+user+declined",
                false,
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("The user declined"));
    }

    #[tokio::test]
    async fn dashboard_lists_first_page_of_repositories() {
        let app = TestApp::start().await;
        let response = app.send("GET", "/dashboard", true).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains(r#"href="/dashboard/repos/octocat/hello""#));
        assert!(html.contains("repo-014"));
        assert!(!html.contains("repo-015"));
        assert!(html.contains("Page 1 of 2"));
    }

    #[tokio::test]
    async fn api_repositories_filters_and_paginates() {
        let app = TestApp::start().await;
        let response = app
            .send("GET", "/api/repositories?search=REPO-01&page=0", true)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["repositories"]["totalItems"], 6);
        assert_eq!(json["repositories"]["pageCount"], 1);
        assert_eq!(json["table"]["headers"][0]["sortable"], true);
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let app = TestApp::start().await;
        let response = app.send("GET", "/api/repositories", false).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "access denied");
    }

    #[tokio::test]
    async fn runs_page_loads_first_page_and_more_appends() {
        let app = TestApp::start().await;

        let response = app.send("GET", "/dashboard/repos/octocat/hello", true).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Build 18"));
        assert!(!html.contains("Build 3<"));
        assert!(html.contains("/dashboard/repos/octocat/hello/more"));

        let response = app
            .send("POST", "/dashboard/repos/octocat/hello/more", true)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/dashboard/repos/octocat/hello");

        let feed = body_json(app.send("GET", "/api/repos/octocat/hello/runs", true).await).await;
        assert_eq!(feed["pagesLoaded"], 2);
        assert_eq!(feed["hasNextPage"], false);
        assert_eq!(feed["runs"].as_array().unwrap().len(), 18);
    }

    #[tokio::test]
    async fn runs_page_never_shows_a_repository_selected_concurrently() {
        let app = TestApp::start().await;
        app.github.hold_runs("slow");

        let slow = tokio::spawn(
            app.router
                .clone()
                .oneshot(app.request("GET", "/dashboard/repos/octocat/slow", true)),
        );
        app.github.started.notified().await;

        let fast = app.send("GET", "/dashboard/repos/octocat/fast", true).await;
        assert_eq!(fast.status(), StatusCode::OK);
        assert!(body_text(fast).await.contains("Build 2018"));

        app.github.release.notify_one();
        let response = slow.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<h1>octocat/slow</h1>"));
        assert!(html.contains("Build 1018"));
        assert!(!html.contains("Build 20"));
        assert!(html.contains("/dashboard/repos/octocat/slow/runs/1018/logs"));
        assert!(!html.contains("/runs/20"));

        let feed = body_json(app.send("GET", "/api/repos/octocat/slow/runs", true).await).await;
        assert_eq!(feed["repository"]["name"], "slow");
    }

    #[tokio::test]
    async fn malformed_repository_path_is_rejected() {
        let app = TestApp::start().await;

        let response = app
            .send("GET", "/dashboard/repos/octo%2Fcat/hello", true)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.send("GET", "/api/repos/octo%2Fcat/hello/runs", true).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body_json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("owner/name")
        );
    }

    #[tokio::test]
    async fn sweep_drops_state_of_ended_sessions() {
        let app = TestApp::start().await;
        app.send("GET", "/dashboard/repos/octocat/hello", true).await;
        app.state.viewers.get_or_create("signed-out-elsewhere");

        let sweep = app.state.sweep_sessions();
        assert_eq!(
            sweep,
            SessionSweep {
                sessions: 0,
                viewers: 1
            }
        );

        let feed = body_json(app.send("GET", "/api/repos/octocat/hello/runs", true).await).await;
        assert_eq!(feed["pagesLoaded"], 1);
        assert_eq!(app.state.sweep_sessions().viewers, 0);
    }

    #[tokio::test]
    async fn api_next_page_reports_outcome() {
        let app = TestApp::start().await;

        let first = body_json(
            app.send("POST", "/api/repos/octocat/hello/runs/next", true)
                .await,
        )
        .await;
        assert_eq!(first["outcome"]["kind"], "appended");
        assert_eq!(first["outcome"]["count"], 15);

        app.send("POST", "/api/repos/octocat/hello/runs/next", true)
            .await;
        let last = body_json(
            app.send("POST", "/api/repos/octocat/hello/runs/next", true)
                .await,
        )
        .await;
        assert_eq!(last["outcome"]["kind"], "exhausted");
        assert_eq!(last["feed"]["runs"].as_array().unwrap().len(), 18);
    }

    #[tokio::test]
    async fn log_download_is_a_zip_attachment() {
        let app = TestApp::start().await;
        let response = app
            .send("GET", "/dashboard/repos/octocat/hello/runs/7/logs", true)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/zip");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"workflow_logs_7.zip\""
        );
        assert_eq!(body_text(response).await, "PK-logs-7");

        let status = body_json(app.send("GET", "/api/logs/status", true).await).await;
        assert_eq!(status["loadingLogs"]["7"], false);
    }

    #[tokio::test]
    async fn failed_log_download_is_bad_gateway_without_body() {
        let app = TestApp::start().await;
        let response = app
            .send("GET", "/dashboard/repos/octocat/hello/runs/500/logs", true)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn profile_shows_signed_in_user() {
        let app = TestApp::start().await;
        let response = app.send("GET", "/profile", true).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("The Octocat"));
    }

    #[tokio::test]
    async fn sign_out_ends_the_session() {
        let app = TestApp::start().await;

        let response = app.send("POST", "/auth/signout", true).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        assert!(
            response.headers()[SET_COOKIE]
                .to_str()
                .unwrap()
                .contains("Max-Age=0")
        );

        let response = app.send("GET", "/dashboard", true).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login");
        assert!(app.state.sessions.get_session(&app.token).is_none());
    }
}
