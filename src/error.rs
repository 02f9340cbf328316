//! Error types for the maitre voice assistant

use std::fmt;

use thiserror::Error;

/// Result type alias for maitre operations
pub type Result<T> = std::result::Result<T, Error>;

/// External service a call was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Speech-to-text
    Transcription,
    /// Chat completion
    Completion,
    /// Text-to-speech
    Synthesis,
    /// The voice orchestrator endpoint, as seen from the recorder
    Orchestrator,
}

impl Service {
    /// Stable lowercase name used in logs and readiness output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Completion => "completion",
            Self::Synthesis => "synthesis",
            Self::Orchestrator => "orchestrator",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in maitre
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input from the caller
    #[error("{0}")]
    Validation(String),

    /// An external service failed or returned a non-success status
    #[error("{service} service error: {message}")]
    Upstream { service: Service, message: String },

    /// An external service succeeded but produced nothing usable
    #[error("{0} service returned no usable result")]
    EmptyResult(Service),

    /// Calls to a service are suspended after repeated failures
    #[error("{0} service temporarily unavailable")]
    CircuitOpen(Service),

    /// Writing the conversation record failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Microphone access was denied or no input device exists
    #[error("microphone unavailable: {0}")]
    Permission(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Build an upstream error for `service`
    pub fn upstream(service: Service, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Whether the caller is at fault rather than the server or its dependencies
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The external service this error originated from, if any
    #[must_use]
    pub const fn service(&self) -> Option<Service> {
        match self {
            Self::Upstream { service, .. } => Some(*service),
            Self::EmptyResult(service) | Self::CircuitOpen(service) => Some(*service),
            _ => None,
        }
    }
}
