//! Configuration management for maitre
//!
//! Configuration is assembled once at process start from the environment,
//! the optional TOML file and built-in defaults (in that order of priority),
//! then handed to the orchestrator and API state by reference.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::db::StoreLocation;
use crate::services::BreakerConfig;
use crate::{Error, Result};

pub use file::MaitreConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 8787;

/// Default system instruction for the completion service
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a restaurant AI assistant helping with orders and reservations. Keep responses brief and friendly.";

/// maitre server configuration
#[derive(Debug)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// API keys
    pub api_keys: ApiKeys,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Upstream service configuration
    pub services: ServicesConfig,

    /// Conversation store configuration
    pub store: StoreConfig,
}

/// API keys for external services
///
/// Both keys are required; a server without them refuses to start.
#[derive(Debug)]
pub struct ApiKeys {
    /// Deepgram key (transcription and synthesis)
    pub deepgram: SecretString,

    /// Groq key (chat completion)
    pub groq: SecretString,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Global requests-per-minute budget; `None` disables rate limiting
    pub rate_limit_rpm: Option<u32>,

    /// Maximum request body size in bytes
    pub body_limit_bytes: usize,
}

/// Upstream speech and language service configuration
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// Transcription base URL (e.g. `https://api.deepgram.com`)
    pub transcription_url: String,

    /// Transcription model
    pub stt_model: String,

    /// Completion base URL (OpenAI-compatible, e.g. `https://api.groq.com/openai`)
    pub completion_url: String,

    /// Completion model
    pub llm_model: String,

    /// Upper bound on completion length
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// System instruction prepended to every transcript
    pub system_prompt: String,

    /// Synthesis base URL
    pub synthesis_url: String,

    /// Synthesis voice model
    pub tts_voice: String,

    /// Per-call request timeout
    pub timeout: Duration,

    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// Circuit breaker settings shared by all upstream clients
    pub breaker: BreakerConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            transcription_url: "https://api.deepgram.com".to_string(),
            stt_model: "nova-2".to_string(),
            completion_url: "https://api.groq.com/openai".to_string(),
            llm_model: "gemma2-9b-it".to_string(),
            max_tokens: 150,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            synthesis_url: "https://api.deepgram.com".to_string(),
            tts_voice: "aura-helios-en".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            breaker: BreakerConfig::default(),
        }
    }
}

/// What to do when the conversation record cannot be written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersistencePolicy {
    /// Fail the whole request
    #[default]
    Fatal,
    /// Log the failure and still return the reply
    BestEffort,
}

impl PersistencePolicy {
    /// Parse a policy name ("fatal", "best-effort")
    ///
    /// # Errors
    ///
    /// Returns error for unknown names
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fatal" | "strict" => Ok(Self::Fatal),
            "best-effort" | "best_effort" | "log" => Ok(Self::BestEffort),
            other => Err(Error::Config(format!("unknown persistence policy: {other}"))),
        }
    }
}

/// Conversation store configuration
#[derive(Debug)]
pub struct StoreConfig {
    /// Where records are written
    pub location: StoreLocation,

    /// Service credential (required for REST stores)
    pub key: Option<SecretString>,

    /// Fatality of store failures
    pub policy: PersistencePolicy,
}

/// Recorder (client) configuration
///
/// Loaded separately from [`Config`] because the client needs no service keys.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Orchestrator endpoint
    pub endpoint: String,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("http://localhost:{DEFAULT_PORT}/process-voice"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl RecorderConfig {
    /// Load recorder configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), env_lookup)
    }

    /// Build recorder configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a valid URL
    pub fn from_sources<F>(fc: MaitreConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let endpoint = env("MAITRE_ENDPOINT")
            .or(fc.recorder.endpoint)
            .unwrap_or(default.endpoint);
        validate_url("recorder endpoint", &endpoint)?;

        let timeout = env("MAITRE_CLIENT_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .or(fc.recorder.timeout_secs)
            .map_or(default.timeout, Duration::from_secs);

        Ok(Self { endpoint, timeout })
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing or a value is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), env_lookup)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required API key is missing or a value is invalid
    #[allow(clippy::too_many_lines)]
    pub fn from_sources<F>(fc: MaitreConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let location = store_location_from_sources(&fc, &env)?;

        // API keys (env > toml), both required
        let api_keys = ApiKeys {
            deepgram: required_key(
                "DEEPGRAM_API_KEY",
                env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            )?,
            groq: required_key("GROQ_API_KEY", env("GROQ_API_KEY").or(fc.api_keys.groq))?,
        };

        // Server config (env > toml > default)
        let server = ServerConfig {
            port: env("MAITRE_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            static_dir: env("MAITRE_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            rate_limit_rpm: env("MAITRE_RATE_LIMIT_RPM")
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_rpm)
                .filter(|rpm| *rpm > 0),
            body_limit_bytes: env("MAITRE_BODY_LIMIT_BYTES")
                .and_then(|s| s.parse().ok())
                .or(fc.server.body_limit_bytes)
                .unwrap_or(10 * 1024 * 1024),
        };

        // Upstream services (env > toml > default)
        let default = ServicesConfig::default();
        let sc = fc.services;
        let services = ServicesConfig {
            transcription_url: env("MAITRE_TRANSCRIPTION_URL")
                .or(sc.transcription_url)
                .unwrap_or(default.transcription_url),
            stt_model: env("MAITRE_STT_MODEL")
                .or(sc.stt_model)
                .unwrap_or(default.stt_model),
            completion_url: env("MAITRE_COMPLETION_URL")
                .or(sc.completion_url)
                .unwrap_or(default.completion_url),
            llm_model: env("MAITRE_LLM_MODEL")
                .or(sc.llm_model)
                .unwrap_or(default.llm_model),
            max_tokens: env("MAITRE_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .or(sc.max_tokens)
                .unwrap_or(default.max_tokens),
            temperature: env("MAITRE_TEMPERATURE")
                .and_then(|s| s.parse().ok())
                .or(sc.temperature)
                .unwrap_or(default.temperature),
            system_prompt: sc.system_prompt.unwrap_or(default.system_prompt),
            synthesis_url: env("MAITRE_SYNTHESIS_URL")
                .or(sc.synthesis_url)
                .unwrap_or(default.synthesis_url),
            tts_voice: env("MAITRE_TTS_VOICE")
                .or(sc.tts_voice)
                .unwrap_or(default.tts_voice),
            timeout: env("MAITRE_UPSTREAM_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .or(sc.timeout_secs)
                .map_or(default.timeout, Duration::from_secs),
            connect_timeout: default.connect_timeout,
            breaker: BreakerConfig {
                failure_threshold: sc
                    .failure_threshold
                    .unwrap_or(default.breaker.failure_threshold)
                    .max(1),
                cooldown: sc
                    .cooldown_secs
                    .map_or(default.breaker.cooldown, Duration::from_secs),
            },
        };

        validate_url("transcription url", &services.transcription_url)?;
        validate_url("completion url", &services.completion_url)?;
        validate_url("synthesis url", &services.synthesis_url)?;

        if !(0.0..=2.0).contains(&services.temperature) {
            return Err(Error::Config(format!(
                "temperature must be between 0 and 2, got {}",
                services.temperature
            )));
        }

        let data_dir = resolve_data_dir(&env);

        let key = env("MAITRE_STORE_KEY")
            .or_else(|| env("SUPABASE_SERVICE_ROLE_KEY"))
            .or(fc.store.key)
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        if matches!(location, StoreLocation::Rest(_)) && key.is_none() {
            return Err(Error::Config(
                "a service credential (MAITRE_STORE_KEY) is required for REST stores".to_string(),
            ));
        }

        let policy = env("MAITRE_PERSISTENCE_POLICY")
            .or(fc.store.persistence_policy)
            .map(|s| PersistencePolicy::parse(&s))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            data_dir,
            api_keys,
            server,
            services,
            store: StoreConfig {
                location,
                key,
                policy,
            },
        })
    }

    /// Ensure the data directory exists when the store lives inside it
    pub fn prepare_data_dir(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.data_dir) {
            tracing::warn!(
                path = %self.data_dir.display(),
                error = %e,
                "failed to create data directory"
            );
        }
    }

    /// Copy of the Deepgram key for a service client
    #[must_use]
    pub fn deepgram_key(&self) -> SecretString {
        SecretString::from(self.api_keys.deepgram.expose_secret().to_owned())
    }

    /// Copy of the Groq key for a service client
    #[must_use]
    pub fn groq_key(&self) -> SecretString {
        SecretString::from(self.api_keys.groq.expose_secret().to_owned())
    }
}

/// Configured conversation store location
///
/// Needs no API keys, so offline commands read the same store the server writes.
///
/// # Errors
///
/// Returns error if the configured store URL is malformed
pub fn store_location() -> Result<StoreLocation> {
    store_location_from_sources(&file::load_config_file(), env_lookup)
}

/// Resolve the store location (env > hosted-function env names > toml > default SQLite file)
///
/// # Errors
///
/// Returns error if the configured store URL is malformed
pub fn store_location_from_sources<F>(fc: &MaitreConfigFile, env: F) -> Result<StoreLocation>
where
    F: Fn(&str) -> Option<String>,
{
    let store_url = env("MAITRE_STORE_URL")
        .or_else(|| env("SUPABASE_URL"))
        .or_else(|| fc.store.url.clone());

    match store_url {
        Some(url) => StoreLocation::parse(&url),
        None => Ok(StoreLocation::Sqlite(resolve_data_dir(&env).join("maitre.db"))),
    }
}

// ~/.local/share/maitre on Linux
fn resolve_data_dir<F>(env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    env("MAITRE_DATA_DIR").map_or_else(
        || {
            directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("maitre"))
        },
        PathBuf::from,
    )
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn required_key(name: &str, value: Option<String>) -> Result<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| Error::Config(format!("{name} is required")))
}

fn validate_url(what: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("invalid {what} '{value}': {e}")))
}
