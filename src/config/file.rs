//! TOML configuration file loading
//!
//! Supports `~/.config/maitre/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MaitreConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Upstream speech and language services
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Conversation store
    #[serde(default)]
    pub store: StoreFileConfig,

    /// Recorder (client) configuration
    #[serde(default)]
    pub recorder: RecorderFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub deepgram: Option<String>,
    pub groq: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory with a web frontend to serve
    pub static_dir: Option<String>,

    /// Global request budget per minute
    pub rate_limit_rpm: Option<u32>,

    /// Maximum accepted request body in bytes
    pub body_limit_bytes: Option<usize>,
}

/// Upstream service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// Transcription service base URL
    pub transcription_url: Option<String>,

    /// Transcription model (e.g. "nova-2")
    pub stt_model: Option<String>,

    /// Completion service base URL
    pub completion_url: Option<String>,

    /// Completion model (e.g. "gemma2-9b-it")
    pub llm_model: Option<String>,

    /// Completion token budget
    pub max_tokens: Option<u32>,

    /// Completion sampling temperature
    pub temperature: Option<f32>,

    /// System instruction sent ahead of every transcript
    pub system_prompt: Option<String>,

    /// Synthesis service base URL
    pub synthesis_url: Option<String>,

    /// Synthesis voice model (e.g. "aura-helios-en")
    pub tts_voice: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Consecutive failures before a service is suspended
    pub failure_threshold: Option<u32>,

    /// Seconds a suspended service stays suspended
    pub cooldown_secs: Option<u64>,
}

/// Conversation store configuration
#[derive(Debug, Default, Deserialize)]
pub struct StoreFileConfig {
    /// `SQLite` path, `sqlite://` URL, `:memory:`, or REST base URL
    pub url: Option<String>,

    /// Service credential for REST stores
    pub key: Option<String>,

    /// "fatal" or "best-effort"
    pub persistence_policy: Option<String>,
}

/// Recorder configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecorderFileConfig {
    /// Orchestrator endpoint URL
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MaitreConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MaitreConfigFile {
    config_file_path().map_or_else(MaitreConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or unparseable files yield the defaults.
pub fn load_config_file_from(path: &Path) -> MaitreConfigFile {
    if !path.exists() {
        return MaitreConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MaitreConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MaitreConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/maitre/config.toml`
///
/// `MAITRE_CONFIG` overrides the location.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MAITRE_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("maitre").join("config.toml"))
}
