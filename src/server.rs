//! Inbound HTTP surface for web clients

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::api::{ProxyError, ProxyRequest, ProxyService};

pub struct AppState {
    pub service: ProxyService,
    pub request_deadline: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(proxy_handler))
        .route("/proxy", post(proxy_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("VMS proxy listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "vms-proxy"
    }))
}

async fn proxy_handler(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> Response {
    let request_id = uuid::Uuid::new_v4();

    let request: ProxyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("[{}] Rejected malformed request body: {}", request_id, e);
            return error_response(&ProxyError::InvalidRequest(format!("malformed JSON body: {}", e)));
        }
    };

    info!(
        "[{}] {} {} (server: {})",
        request_id,
        if request.batch_snapshots.is_some() { "BATCH" } else { request.method_name() },
        request.endpoint.as_deref().unwrap_or("-"),
        request.server_id.as_deref().unwrap_or("default")
    );

    let outcome = match tokio::time::timeout(state.request_deadline, state.service.handle(request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProxyError::DeadlineExceeded(state.request_deadline)),
    };

    match outcome {
        Ok(reply) => {
            info!("[{}] Completed with {}", request_id, reply.status);
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(reply.body)).into_response()
        }
        Err(e) => {
            error!("[{}] Proxy request failed ({:?}): {}", request_id, e.kind(), e);
            error_response(&e)
        }
    }
}

fn error_response(error: &ProxyError) -> Response {
    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = json!({ "error": error.to_string() });
    (status, Json(body)).into_response()
}
