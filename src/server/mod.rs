// HTTP surface: /download, /check-tools, /health and static files

pub mod emitter;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::backends::build_executor;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::DownloadRequestBody;
use crate::downloader::orchestrator::StrategyExecutor;
use crate::downloader::tools::{ToolCommand, ToolManager};
use crate::downloader::utils::build_http_client;
use crate::downloader::workspace::WorkspaceManager;
use emitter::{error_response, Emitter};

pub struct AppState {
    pub executor: StrategyExecutor,
    pub emitter: Emitter,
    pub tools: ToolManager,
    pub workspaces: WorkspaceManager,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = build_http_client(config.proxy.as_deref()).map_err(anyhow::Error::msg)?;
        let command = ToolCommand::from_config(&config.tool);
        let workspaces = WorkspaceManager::new(&config.temp_root);

        Ok(Self {
            executor: build_executor(config, &command, &workspaces, &client),
            emitter: Emitter::new(client, config.link_mode, config.tool_timeout()),
            tools: ToolManager::new(command, config.tool.ffmpeg_program.clone()),
            workspaces,
            static_dir: config.static_dir.clone(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/download", post(download))
        .route("/check-tools", get(check_tools))
        .route("/health", get(health));

    if let Some(dir) = state.static_dir.as_deref().filter(|d| d.is_dir()) {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config).context("building application state")?);
    log_startup(&config, &state);

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    Ok(())
}

fn log_startup(config: &Config, state: &AppState) {
    tracing::info!(
        strategies = ?state.executor.strategy_names(),
        temp_root = %state.workspaces.root().display(),
        link_mode = ?config.link_mode,
        proxy = config.proxy.is_some(),
        "retrieval pipeline ready"
    );
    if let Some(dir) = state.static_dir.as_deref().filter(|d| !d.is_dir()) {
        tracing::info!(dir = %dir.display(), "static directory missing, not serving files");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }
}

async fn download(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DownloadRequestBody>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return error_response(&DownloadError::InvalidInput(rejection.body_text()));
        }
    };

    let request = match body.into_request() {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    match state.executor.execute(&request).await {
        Ok(retrieval) => {
            tracing::info!(strategy = %retrieval.strategy, url = request.source_url(), "emitting result");
            state.emitter.emit(&request, retrieval).await
        }
        Err(e) => {
            if let DownloadError::AggregateFailure(failures) = &e {
                for failure in failures {
                    tracing::debug!(%failure, "strategy failure detail");
                }
            }
            error_response(&e)
        }
    }
}

async fn check_tools(State(state): State<Arc<AppState>>) -> Response {
    Json(state.tools.report().await).into_response()
}

async fn health() -> Response {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(json!({
        "status": "healthy",
        "message": "ClipFetch Backend is running",
        "timestamp": timestamp,
    }))
    .into_response()
}
