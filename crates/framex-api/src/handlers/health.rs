//! Health check handlers.

use std::future::Future;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::{CatalogState, StatusState};

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: Vec<NamedCheck>,
}

#[derive(Serialize)]
pub struct NamedCheck {
    pub name: String,
    #[serde(flatten)]
    pub check: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

async fn timed<E, F>(name: &str, check: F) -> NamedCheck
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    let start = Instant::now();
    let check = match check.await {
        Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
        Err(e) => CheckStatus::error(e.to_string()),
    };
    NamedCheck {
        name: name.to_string(),
        check,
    }
}

fn readiness(checks: Vec<NamedCheck>) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let all_ok = checks.iter().all(|c| c.check.is_ok());
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// Readiness of the processing service: the broker must answer and the
/// intake queue must be inspectable.
pub async fn ready_status(
    State(state): State<StatusState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let broker = timed("broker", state.broker.health_check()).await;
    let intake = timed("intake_queue", async {
        state
            .broker
            .depth(state.projector.intake_queue())
            .await
            .map(|_| ())
    })
    .await;

    readiness(vec![broker, intake])
}

/// Readiness of the storage service: the processed bucket must be reachable.
pub async fn ready_catalog(
    State(state): State<CatalogState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let storage = timed("storage", state.store.check_connectivity(&state.processed_bucket)).await;
    readiness(vec![storage])
}
