use crate::models::{Contact, Conversation};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no contact export found at {0}")]
    MissingContacts(PathBuf),
    #[error("no conversation export for {0}")]
    UnknownContact(String),
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("malformed export: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Seam to the external page scraper. The scraping itself happens outside
/// this process; implementations only hand over the records it produced.
#[async_trait]
pub trait InboxSource: Send + Sync {
    async fn list_contacts(&self) -> Result<Vec<Contact>, SourceError>;
    async fn fetch_conversation(&self, username: &str) -> Result<Conversation, SourceError>;
}

/// Reads scraper exports from a data directory: `contacts.json` for the
/// contact list and `<username>.json` per conversation.
pub struct JsonSource {
    data_dir: PathBuf,
}

impl JsonSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn conversation_path(&self, username: &str) -> Result<PathBuf, SourceError> {
        if !is_valid_username(username) {
            return Err(SourceError::InvalidUsername(username.to_string()));
        }
        Ok(self.data_dir.join(format!("{}.json", username)))
    }
}

/// Inbox usernames are URL path segments; anything else is rejected before
/// it can reach the filesystem.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && username != "."
        && username != ".."
}

#[async_trait]
impl InboxSource for JsonSource {
    async fn list_contacts(&self) -> Result<Vec<Contact>, SourceError> {
        let path = self.data_dir.join("contacts.json");
        if !path.exists() {
            return Err(SourceError::MissingContacts(path));
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn fetch_conversation(&self, username: &str) -> Result<Conversation, SourceError> {
        let path = self.conversation_path(username)?;
        if !path.exists() {
            return Err(SourceError::UnknownContact(username.to_string()));
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}
