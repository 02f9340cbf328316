//! Conversation repository backed by `SQLite`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ConversationRecord, ConversationStore, DbPool};
use crate::{Error, Result};

/// A persisted exchange
#[derive(Debug, Clone)]
pub struct StoredConversation {
    pub id: String,
    pub user_input: String,
    pub ai_response: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation repository
#[derive(Clone)]
pub struct ConversationRepo {
    pool: DbPool,
}

impl ConversationRepo {
    /// Create a new conversation repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a record, returning its generated ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, record: &ConversationRecord) -> Result<String> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversations (id, user_input, ai_response, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            [&id, &record.user_input, &record.ai_response, &now],
        )?;

        Ok(id)
    }

    /// Most recent records, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_recent(&self, limit: usize) -> Result<Vec<StoredConversation>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_input, ai_response, created_at
             FROM conversations
             ORDER BY rowid DESC
             LIMIT ?1",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map([limit], |row| {
            Ok(StoredConversation {
                id: row.get(0)?,
                user_input: row.get(1)?,
                ai_response: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Number of stored records
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl ConversationStore for ConversationRepo {
    async fn append(&self, record: &ConversationRecord) -> Result<()> {
        let id = self
            .insert(record)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        tracing::debug!(id = %id, "conversation stored");
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Persistence(format!("connection failed: {e}")))?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| Error::Persistence(format!("query failed: {e}")))
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn record(user: &str, ai: &str) -> ConversationRecord {
        ConversationRecord {
            user_input: user.to_string(),
            ai_response: ai.to_string(),
        }
    }

    #[test]
    fn insert_and_list() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        repo.insert(&record("Book a table for two", "Sure, what time?"))
            .unwrap();
        repo.insert(&record("Seven please", "Done!")).unwrap();

        let recent = repo.list_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_input, "Seven please");
        assert_eq!(recent[1].ai_response, "Sure, what time?");
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn duplicates_are_kept() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        let r = record("Menu?", "We have pasta.");
        let a = repo.insert(&r).unwrap();
        let b = repo.insert(&r).unwrap();

        assert_ne!(a, b);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn list_respects_limit() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        for i in 0..5 {
            repo.insert(&record(&format!("q{i}"), "a")).unwrap();
        }
        assert_eq!(repo.list_recent(3).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn store_trait_appends_and_probes() {
        let repo = ConversationRepo::new(init_memory().unwrap());
        let store: &dyn ConversationStore = &repo;

        store.probe().await.unwrap();
        store.append(&record("Hi", "Hello!")).await.unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(store.backend(), "sqlite");
    }
}
