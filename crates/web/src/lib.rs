use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use harvest::{DailyRunOptions, HarvestError, Orchestrator};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct WebState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn routes(state: WebState) -> Router {
    Router::new()
        .route("/run", post(trigger_run))
        .route("/status", get(run_status))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_web_server(state: WebState, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("listening on 0.0.0.0:{}", port);
    axum::serve(listener, routes(state).into_make_service()).await?;
    Ok(())
}

/// Starts today's harvest on a background task. The response only confirms
/// the start; progress is observable via `/status`.
async fn trigger_run(State(state): State<WebState>) -> impl IntoResponse {
    let options = DailyRunOptions::new(Local::now().date_naive());
    match state.orchestrator.start(options) {
        Ok(handle) => {
            tokio::spawn(async move {
                match handle.await {
                    Ok(Ok(report)) => log::info!(
                        "triggered run finished: {}/{} successful",
                        report.stats.successful,
                        report.stats.processed,
                    ),
                    Ok(Err(why)) => log::error!("triggered run failed: {}", why),
                    Err(why) => log::error!("triggered run paniced: {:?}", why),
                }
            });
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "started": true })),
            )
        }
        Err(HarvestError::Conflict) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": "a run is already active" })),
        ),
        Err(why) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": why.to_string() })),
        ),
    }
}

async fn run_status(State(state): State<WebState>) -> impl IntoResponse {
    Json(state.orchestrator.status())
}

async fn health(State(state): State<WebState>) -> impl IntoResponse {
    match state.orchestrator.health_check().await {
        Ok(()) => (StatusCode::OK, "ok".to_owned()),
        Err(why) => (StatusCode::SERVICE_UNAVAILABLE, why.to_string()),
    }
}
