//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::services::BreakerState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub store: CheckResult,
    pub transcription: CheckResult,
    pub completion: CheckResult,
    pub synthesis: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: Some(message.into()),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    const fn breaker(state: BreakerState) -> Self {
        Self {
            status: state.as_str(),
            message: None,
        }
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can requests be served end to end?
///
/// An open breaker degrades the status but does not fail readiness; the
/// breaker recovers on its own once the cooldown passes.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let orchestrator = &state.orchestrator;

    let store = match orchestrator.probe_store().await {
        Ok(()) => CheckResult::ok(orchestrator.store_backend()),
        Err(e) => CheckResult::fail(e.to_string()),
    };

    let [transcription, completion, synthesis] =
        orchestrator.upstream_states().map(|(_, s)| s);
    let breakers_closed = [transcription, completion, synthesis]
        .iter()
        .all(|s| *s == BreakerState::Closed);

    let store_ok = store.status == "ok";
    let status = match (store_ok, breakers_closed) {
        (true, true) => "ok",
        (true, false) => "degraded",
        (false, _) => "unavailable",
    };
    let http_status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                store,
                transcription: CheckResult::breaker(transcription),
                completion: CheckResult::breaker(completion),
                synthesis: CheckResult::breaker(synthesis),
            },
        }),
    )
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
