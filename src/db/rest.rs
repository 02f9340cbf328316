//! Conversation store over a `PostgREST` endpoint
//!
//! Rows are appended with `POST {base}/rest/v1/conversations`, authenticated
//! with the service credential in both the `apikey` and bearer headers.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{ConversationRecord, ConversationStore};
use crate::{Error, Result};

const TABLE_PATH: &str = "/rest/v1/conversations";

/// Append-only REST conversation store
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    key: SecretString,
}

impl RestStore {
    /// Create a store for `base_url` authenticated with `key`
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty or the HTTP client cannot be built
    pub fn new(base_url: &url::Url, key: SecretString, timeout: std::time::Duration) -> Result<Self> {
        if key.expose_secret().trim().is_empty() {
            return Err(Error::Config("store service credential required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            key,
        })
    }

    fn table_url(&self) -> String {
        format!("{}{TABLE_PATH}", self.base_url)
    }
}

#[async_trait]
impl ConversationStore for RestStore {
    async fn append(&self, record: &ConversationRecord) -> Result<()> {
        let key = self.key.expose_secret();
        let response = self
            .client
            .post(self.table_url())
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
            .header("Prefer", "return=minimal")
            .json(&[record])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "store request failed");
                Error::Persistence(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "store rejected insert");
            return Err(Error::Persistence(format!("insert rejected {status}: {body}")));
        }

        tracing::debug!("conversation stored");
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let key = self.key.expose_secret();
        let response = self
            .client
            .get(self.table_url())
            .query(&[("select", "id"), ("limit", "1")])
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
            .send()
            .await
            .map_err(|e| Error::Persistence(format!("store unreachable: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Persistence(format!(
                "store probe returned {}",
                response.status()
            )))
        }
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}
