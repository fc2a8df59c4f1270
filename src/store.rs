use crate::models::{Contact, Conversation};
use crate::render::DateFormat;
use anyhow::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{sqlite::SqlitePool, Row};

/// Store keys shared between the worker and the UI surface.
pub mod keys {
    pub const ALL_CONTACTS: &str = "allContacts";
    pub const CONVERSATION_DATA: &str = "conversationData";
    pub const CURRENT_USERNAME: &str = "currentUsername";
    pub const CURRENT_CONVERSATION_USERNAME: &str = "currentConversationUsername";
    pub const DATE_FORMAT: &str = "dateFormat";
    pub const MARKDOWN_CONTENT: &str = "markdownContent";
    pub const JSON_CONTENT: &str = "jsonContent";
    pub const LAST_CONTACTS_FETCH: &str = "lastContactsFetch";
    pub const LAST_EXTRACTED_TIME: &str = "lastExtractedTime";
    pub const LAST_CONTACT_COUNT: &str = "lastContactCount";
}

/// Key-value store backed by SQLite: the single source of truth shared by
/// the background worker and the UI. Values are JSON; reads and writes are
/// whole-key and last-write-wins, with no multi-key transaction.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(database_url: &str) -> Result<Self> {
        use sqlx::sqlite::SqliteConnectOptions;
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        sqlx::query(schema).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT value FROM store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let raw: String = row.get(0);
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
        )
        .bind(key)
        .bind(raw)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM store ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }

    // Typed accessors for the shared keys.

    pub async fn contacts(&self) -> Result<Option<Vec<Contact>>> {
        self.get(keys::ALL_CONTACTS).await
    }

    pub async fn set_contacts(&self, contacts: &[Contact]) -> Result<()> {
        self.set(keys::ALL_CONTACTS, &contacts).await
    }

    pub async fn conversation(&self) -> Result<Option<Conversation>> {
        self.get(keys::CONVERSATION_DATA).await
    }

    pub async fn set_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.set(keys::CONVERSATION_DATA, conversation).await
    }

    pub async fn current_username(&self) -> Result<Option<String>> {
        self.get(keys::CURRENT_USERNAME).await
    }

    pub async fn set_current_username(&self, username: &str) -> Result<()> {
        self.set(keys::CURRENT_USERNAME, &username).await
    }

    pub async fn current_conversation_username(&self) -> Result<Option<String>> {
        self.get(keys::CURRENT_CONVERSATION_USERNAME).await
    }

    pub async fn set_current_conversation_username(&self, username: &str) -> Result<()> {
        self.set(keys::CURRENT_CONVERSATION_USERNAME, &username).await
    }

    pub async fn date_format(&self) -> Result<DateFormat> {
        Ok(self.get(keys::DATE_FORMAT).await?.unwrap_or_default())
    }

    pub async fn set_date_format(&self, format: DateFormat) -> Result<()> {
        self.set(keys::DATE_FORMAT, &format).await
    }

    pub async fn markdown_content(&self) -> Result<Option<String>> {
        self.get(keys::MARKDOWN_CONTENT).await
    }

    pub async fn json_content(&self) -> Result<Option<Value>> {
        self.get(keys::JSON_CONTENT).await
    }

    pub async fn set_rendered(&self, markdown: &str, json: &Value) -> Result<()> {
        self.set(keys::MARKDOWN_CONTENT, &markdown).await?;
        self.set(keys::JSON_CONTENT, json).await
    }

    pub async fn last_contacts_fetch(&self) -> Result<Option<i64>> {
        self.get(keys::LAST_CONTACTS_FETCH).await
    }

    pub async fn set_last_contacts_fetch(&self, timestamp: i64) -> Result<()> {
        self.set(keys::LAST_CONTACTS_FETCH, &timestamp).await
    }

    pub async fn last_extracted_time(&self) -> Result<Option<i64>> {
        self.get(keys::LAST_EXTRACTED_TIME).await
    }

    pub async fn set_last_extracted_time(&self, timestamp: i64) -> Result<()> {
        self.set(keys::LAST_EXTRACTED_TIME, &timestamp).await
    }

    pub async fn set_last_contact_count(&self, count: usize) -> Result<()> {
        self.set(keys::LAST_CONTACT_COUNT, &count).await
    }
}
