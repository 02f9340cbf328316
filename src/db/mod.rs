//! Conversation persistence
//!
//! Every successful exchange is appended to a durable store. Two backends
//! exist: a local `SQLite` database (the default) and a `PostgREST` table for
//! hosted deployments.

pub mod conversation;
pub mod rest;
mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::{Error, Result};

pub use conversation::{ConversationRepo, StoredConversation};
pub use rest::RestStore;
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// One user utterance and the assistant's reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_input: String,
    pub ai_response: String,
}

/// Append-only sink for conversation records
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one record
    ///
    /// Failures are reported as `Error::Persistence`.
    async fn append(&self, record: &ConversationRecord) -> Result<()>;

    /// Check that the store is reachable
    async fn probe(&self) -> Result<()>;

    /// Short backend name for logs and readiness output
    fn backend(&self) -> &'static str;
}

/// Where conversation records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `SQLite` database file
    Sqlite(PathBuf),
    /// Throwaway in-memory `SQLite` database
    Memory,
    /// `PostgREST` base URL
    Rest(url::Url),
}

impl StoreLocation {
    /// Parse a store URL
    ///
    /// Accepts `http(s)://` REST base URLs, `sqlite://<path>`, `:memory:`,
    /// or a bare filesystem path.
    ///
    /// # Errors
    ///
    /// Returns error for empty values or malformed REST URLs
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Config("store url is empty".to_string()));
        }

        if value == ":memory:" || value == "sqlite::memory:" {
            return Ok(Self::Memory);
        }

        if value.starts_with("http://") || value.starts_with("https://") {
            let url = url::Url::parse(value)
                .map_err(|e| Error::Config(format!("invalid store url '{value}': {e}")))?;
            return Ok(Self::Rest(url));
        }

        let path = value.strip_prefix("sqlite://").unwrap_or(value);
        Ok(Self::Sqlite(PathBuf::from(path)))
    }
}

/// Open the configured conversation store
///
/// # Errors
///
/// Returns error if the database cannot be opened or the REST store is misconfigured
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ConversationStore>> {
    match &config.location {
        StoreLocation::Sqlite(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let pool = init(path)?;
            tracing::info!(path = %path.display(), "using sqlite conversation store");
            Ok(Arc::new(ConversationRepo::new(pool)))
        }
        StoreLocation::Memory => {
            tracing::warn!("using in-memory conversation store, records will not survive restart");
            Ok(Arc::new(ConversationRepo::new(init_memory()?)))
        }
        StoreLocation::Rest(url) => {
            let key = config
                .key
                .as_ref()
                .ok_or_else(|| Error::Config("store service credential required".to_string()))?;
            let key = SecretString::from(key.expose_secret().to_owned());
            tracing::info!(url = %url, "using REST conversation store");
            Ok(Arc::new(RestStore::new(
                url,
                key,
                std::time::Duration::from_secs(30),
            )?))
        }
    }
}

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    // Run migrations on first connection
    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}
