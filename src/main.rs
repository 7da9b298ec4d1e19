use actions_dashboard::config::AppConfig;
use actions_dashboard::infrastructures::adapters::primary::web::{
    AppState, SESSION_SWEEP_INTERVAL, create_router, spawn_session_sweeper,
};
use actions_dashboard::telemetry;
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, info_span};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let telemetry = telemetry::init()?;

    let (app, sweeper, addr) = {
        let initialize_span = info_span!("initialize");
        let _enter = initialize_span.enter();
        info!("Application starting");

        let config = AppConfig::from_env().context("Failed to read configuration")?;
        info!("Loaded configuration: {:?}", config);

        let app_state = Arc::new(AppState::from_config(&config));
        let sweeper = spawn_session_sweeper(app_state.clone(), SESSION_SWEEP_INTERVAL);
        (create_router(app_state), sweeper, config.bind_addr)
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
