//! HTTP surface for anonymize / deanonymize

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use pii_shield_core::{
    contains_tokens, AnonymizeResponse, Config, DeanonymizeResponse, Deanonymized,
    MappingStatistics, PiiError, PiiService, RawMatch,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub struct AppState {
    /// A service that failed to build is kept as its error so that every
    /// request can report it.
    service: Result<PiiService, PiiError>,
    store_timeout: Duration,
}

impl AppState {
    pub fn new(service: Result<PiiService, PiiError>, store_timeout: Duration) -> Self {
        Self {
            service,
            store_timeout,
        }
    }

    fn service(&self) -> Result<PiiService, PiiError> {
        self.service.clone()
    }

    /// Runs a store-touching call off the async runtime, bounded by the
    /// configured timeout.
    async fn run_blocking<T, F>(&self, call: F) -> Result<T, PiiError>
    where
        T: Send + 'static,
        F: FnOnce(&PiiService) -> Result<T, PiiError> + Send + 'static,
    {
        let service = self.service()?;
        let task = tokio::task::spawn_blocking(move || call(&service));

        match tokio::time::timeout(self.store_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Store task failed: {}", e);
                Err(PiiError::Storage(format!("store task failed: {}", e)))
            }
            Err(_) => {
                error!(
                    "Mapping store did not answer within {} ms",
                    self.store_timeout.as_millis()
                );
                Err(PiiError::Storage(format!(
                    "mapping store did not answer within {} ms",
                    self.store_timeout.as_millis()
                )))
            }
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/pii", routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/anonymize", post(anonymize))
        .route("/deanonymize", post(deanonymize))
        .route("/detect", post(detect))
        .route("/stats", get(stats))
        .route("/mappings", delete(clear_mappings))
        .route("/health", get(health))
}

pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let service = PiiService::from_config(config);
    if let Err(e) = &service {
        warn!("PII service unavailable, requests needing it will fail: {}", e);
    }

    let state = Arc::new(AppState::new(
        service,
        Duration::from_millis(config.server.store_timeout_ms),
    ));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: String,
    error_kind: &'static str,
}

#[derive(Debug, Serialize)]
struct DetectBody {
    success: bool,
    items: Vec<RawMatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsBody {
    success: bool,
    backend: &'static str,
    #[serde(flatten)]
    statistics: MappingStatistics,
}

#[derive(Debug, Serialize)]
struct ClearBody {
    success: bool,
    removed: usize,
}

fn status_of(err: &PiiError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn failure(err: PiiError) -> Response {
    let body = ErrorBody {
        success: false,
        error: err.to_string(),
        error_kind: err.kind(),
    };
    (status_of(&err), Json(body)).into_response()
}

/// Pulls a non-empty string `text` out of a JSON body. Anything else is
/// the caller's fault.
fn extract_text(body: &Bytes) -> Result<String, PiiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| PiiError::Validation("request body must be a JSON object".to_string()))?;

    match value.get("text") {
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(PiiError::Validation("text must not be empty".to_string()))
        }
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => Err(PiiError::Validation("text must be a string".to_string())),
        None => Err(PiiError::Validation("text is required".to_string())),
    }
}

async fn anonymize(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let result = match extract_text(&body) {
        Ok(text) => state.run_blocking(move |s| s.anonymize(&text)).await,
        Err(e) => Err(e),
    };

    let status = result.as_ref().err().map_or(StatusCode::OK, status_of);
    (status, Json(AnonymizeResponse::from_result(&result))).into_response()
}

async fn deanonymize(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let result = match extract_text(&body) {
        // Nothing to resolve, so neither the service nor the store is needed.
        Ok(text) if !contains_tokens(&text) => Ok(Deanonymized {
            text,
            tokens_processed: 0,
            unresolved: Vec::new(),
        }),
        Ok(text) => state.run_blocking(move |s| s.deanonymize(&text)).await,
        Err(e) => Err(e),
    };

    let status = result.as_ref().err().map_or(StatusCode::OK, status_of);
    (status, Json(DeanonymizeResponse::from_result(&result))).into_response()
}

async fn detect(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let text = match extract_text(&body) {
        Ok(text) => text,
        Err(e) => return failure(e),
    };
    match state.service() {
        Ok(service) => Json(DetectBody {
            success: true,
            items: service.detect(&text),
        })
        .into_response(),
        Err(e) => failure(e),
    }
}

async fn stats(State(state): State<Arc<AppState>>) -> Response {
    let result = state
        .run_blocking(|s| {
            s.statistics()
                .map(|statistics| (s.store().backend_name(), statistics))
        })
        .await;

    match result {
        Ok((backend, statistics)) => Json(StatsBody {
            success: true,
            backend,
            statistics,
        })
        .into_response(),
        Err(e) => failure(e),
    }
}

async fn clear_mappings(State(state): State<Arc<AppState>>) -> Response {
    match state.run_blocking(|s| s.clear_mappings()).await {
        Ok(removed) => {
            info!("Cleared {} mappings", removed);
            Json(ClearBody {
                success: true,
                removed,
            })
            .into_response()
        }
        Err(e) => failure(e),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "ready": state.service.is_ok(),
    }))
}
