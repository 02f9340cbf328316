//! Voice processing endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use super::ApiState;
use crate::Error;
use crate::protocol::{ErrorReply, VoiceReply, VoiceRequest};

/// Build voice router
///
/// The endpoint is also mounted under the hosted-function path so clients
/// built against either deployment keep working.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-voice", post(process_voice))
        .route("/functions/v1/process-voice", post(process_voice))
        .with_state(state)
}

/// Transcribe, answer, synthesize and store one utterance
async fn process_voice(
    State(state): State<Arc<ApiState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<VoiceReply>, VoiceError> {
    let body = body.map_err(VoiceError::Body)?;
    let request: VoiceRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("invalid request body: {e}")))?;

    let reply = state.orchestrator.process(&request).await?;
    Ok(Json(reply))
}

/// Voice API error, rendered as `{ "error": <message> }`
#[derive(Debug)]
pub enum VoiceError {
    /// The pipeline failed
    Pipeline(Error),
    /// The request body could not be read (too large, aborted)
    Body(BytesRejection),
}

impl From<Error> for VoiceError {
    fn from(err: Error) -> Self {
        Self::Pipeline(err)
    }
}

impl VoiceError {
    /// HTTP status for the wrapped error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pipeline(Error::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Pipeline(Error::Upstream { .. } | Error::EmptyResult(_)) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Pipeline(Error::CircuitOpen(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Pipeline(err) => err.to_string(),
            Self::Body(rejection) => rejection.body_text(),
        }
    }
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            let service = match &self {
                Self::Pipeline(err) => err.service().map(|s| s.as_str()),
                Self::Body(_) => None,
            };
            tracing::error!(
                status = status.as_u16(),
                service,
                error = %message,
                "voice request failed"
            );
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "voice request rejected");
        }

        let body = ErrorReply { error: message };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Service;

    #[test]
    fn maps_errors_to_statuses() {
        let cases = [
            (Error::Validation("no audio data provided".into()), 400),
            (Error::upstream(Service::Transcription, "status 500"), 502),
            (Error::EmptyResult(Service::Completion), 502),
            (Error::CircuitOpen(Service::Synthesis), 503),
            (Error::Persistence("disk full".into()), 500),
            (Error::Config("missing key".into()), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(VoiceError::from(err).status().as_u16(), expected);
        }
    }
}
