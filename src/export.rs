use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Relative path for the Markdown artifact:
/// `{username}/conversations/fiverr_conversation_{username}_{YYYY-MM-DD}.md`.
pub fn markdown_path(username: &str, date: NaiveDate) -> PathBuf {
    PathBuf::from(username).join("conversations").join(format!(
        "fiverr_conversation_{}_{}.md",
        username,
        date.format("%Y-%m-%d")
    ))
}

/// Relative path for the JSON artifact:
/// `{username}/conversations/{username}_conversation.json`.
pub fn json_path(username: &str) -> PathBuf {
    PathBuf::from(username)
        .join("conversations")
        .join(format!("{}_conversation.json", username))
}

/// Writes both cached documents under `output_dir`, creating directories as
/// needed. Returns the written paths.
pub fn export_documents(
    output_dir: &Path,
    username: &str,
    date: NaiveDate,
    markdown: &str,
    json: &Value,
) -> Result<(PathBuf, PathBuf)> {
    let md_path = output_dir.join(markdown_path(username, date));
    let json_file = output_dir.join(json_path(username));

    if let Some(parent) = md_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(&md_path, markdown)
        .with_context(|| format!("Failed to write {}", md_path.display()))?;
    let pretty = serde_json::to_string_pretty(json)?;
    std::fs::write(&json_file, pretty)
        .with_context(|| format!("Failed to write {}", json_file.display()))?;

    Ok((md_path, json_file))
}
