use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A contact from the marketplace inbox. The full set is replaced wholesale
/// on every fetch; the stored order is the fetch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub username: String,
    pub recent_message_date: i64,
}

/// One canonical attachment type. Scraper exports use two spellings for the
/// name and size fields (`filename`/`file_name`, `fileSize`/`file_size`);
/// both are accepted at the deserialization boundary, with the explicit
/// `filename`/`fileSize` variant winning when both appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttachmentWire")]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "fileSize", skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(rename = "downloadUrl", skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AttachmentWire {
    filename: Option<String>,
    file_name: Option<String>,
    #[serde(rename = "fileSize")]
    file_size: Option<u64>,
    #[serde(rename = "file_size")]
    file_size_legacy: Option<u64>,
    #[serde(rename = "downloadUrl", alias = "download_url")]
    download_url: Option<String>,
    created_at: Option<i64>,
}

impl From<AttachmentWire> for Attachment {
    fn from(wire: AttachmentWire) -> Self {
        Self {
            filename: wire.filename.or(wire.file_name),
            file_size: wire.file_size.or(wire.file_size_legacy),
            download_url: wire.download_url,
            created_at: wire.created_at,
        }
    }
}

/// Attachment list entry. Scraper exports occasionally contain entries that
/// are not objects at all; those are kept as raw values so the renderer can
/// degrade to a placeholder instead of rejecting the whole conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentEntry {
    File(Attachment),
    Other(Value),
}

impl AttachmentEntry {
    pub fn as_file(&self) -> Option<&Attachment> {
        match self {
            AttachmentEntry::File(att) => Some(att),
            AttachmentEntry::Other(_) => None,
        }
    }
}

/// A single message. Immutable once extracted; identity is its position in
/// the conversation. `formatted_time` is presentation-only and filled in by
/// the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentEntry>>,
    /// One level only; replies never chain transitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied_to_message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub username: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// The other party shown in document titles, derived from the first
    /// message: whichever of sender/recipient is not the conversation owner.
    /// Empty conversations resolve to the empty string.
    pub fn counterpart(&self) -> &str {
        match self.messages.first() {
            Some(first) if first.sender == self.username => &first.recipient,
            Some(first) => &first.sender,
            None => "",
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.messages
            .iter()
            .filter_map(|m| m.attachments.as_ref())
            .map(|atts| atts.len())
            .sum()
    }

    pub fn total_attachment_size(&self) -> u64 {
        self.messages
            .iter()
            .filter_map(|m| m.attachments.as_ref())
            .flatten()
            .filter_map(|entry| entry.as_file())
            .filter_map(|att| att.file_size)
            .sum()
    }
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1_048_576 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    }
}

/// Size formatting for the grid/statistics views: a missing size shows as
/// "0 B". The document renderer uses its own variant that shows
/// "size unknown" instead; the two call sites intentionally differ.
pub fn format_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => human_size(b),
        None => "0 B".to_string(),
    }
}

/// Size formatting for rendered documents: missing or zero sizes show as
/// "size unknown".
pub fn format_document_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) if b > 0 => human_size(b),
        _ => "size unknown".to_string(),
    }
}
