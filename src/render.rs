use crate::models::{format_document_size, AttachmentEntry, Conversation, Message};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Date format selector for rendered timestamps. Stored under the
/// `dateFormat` key using the display spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYear,
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYear,
    #[serde(rename = "YYYY/MM/DD")]
    YearMonthDay,
    #[serde(rename = "DD-MM-YYYY")]
    DayMonthYearDashed,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFormat::DayMonthYear => "DD/MM/YYYY",
            DateFormat::MonthDayYear => "MM/DD/YYYY",
            DateFormat::YearMonthDay => "YYYY/MM/DD",
            DateFormat::DayMonthYearDashed => "DD-MM-YYYY",
        }
    }

    /// Next format in the settings cycle.
    pub fn next(&self) -> DateFormat {
        match self {
            DateFormat::DayMonthYear => DateFormat::MonthDayYear,
            DateFormat::MonthDayYear => DateFormat::YearMonthDay,
            DateFormat::YearMonthDay => DateFormat::DayMonthYearDashed,
            DateFormat::DayMonthYearDashed => DateFormat::DayMonthYear,
        }
    }
}

/// Formats an epoch-milliseconds timestamp as `<date>, <time>` in local
/// time, with zero-padded day/month and a 12-hour clock with seconds.
pub fn format_timestamp(ms: i64, format: DateFormat) -> String {
    let date = DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .with_timezone(&Local);
    let date_str = match format {
        DateFormat::DayMonthYear => date.format("%d/%m/%Y"),
        DateFormat::MonthDayYear => date.format("%m/%d/%Y"),
        DateFormat::YearMonthDay => date.format("%Y/%m/%d"),
        DateFormat::DayMonthYearDashed => date.format("%d-%m-%Y"),
    };
    format!("{}, {}", date_str, date.format("%-I:%M:%S %p"))
}

/// Derived, cached render artifacts for the current conversation. Must be
/// regenerated whenever the conversation or the date format changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub markdown: String,
    pub json: Value,
}

/// Renders a conversation into a Markdown document and the matching JSON
/// form. The JSON output is the conversation itself annotated with
/// `formattedTime` on every message (and on replied-to messages), not a
/// separate schema. Fully recomputes on every call; never fails on missing
/// optional fields.
pub fn render(conversation: &Conversation, format: DateFormat) -> RenderedDocument {
    let annotated = annotate(conversation, format);
    let markdown = to_markdown(&annotated, format);
    let json = serde_json::to_value(&annotated).unwrap_or(Value::Null);
    RenderedDocument { markdown, json }
}

/// Clones the conversation with `formatted_time` resolved on every message
/// and on each one-level reply.
fn annotate(conversation: &Conversation, format: DateFormat) -> Conversation {
    let mut annotated = conversation.clone();
    for message in &mut annotated.messages {
        message.formatted_time = Some(format_timestamp(message.created_at, format));
        if let Some(replied) = &mut message.replied_to_message {
            replied.formatted_time = Some(format_timestamp(replied.created_at, format));
        }
    }
    annotated
}

fn to_markdown(conversation: &Conversation, format: DateFormat) -> String {
    let mut markdown = format!("# Conversation with {}\n\n", conversation.counterpart());

    for message in &conversation.messages {
        push_message(&mut markdown, message, format);
        markdown.push_str("\n---\n\n");
    }

    markdown
}

fn push_message(markdown: &mut String, message: &Message, format: DateFormat) {
    let timestamp = resolved_time(message, format);
    let sender = if message.sender.is_empty() {
        "Unknown"
    } else {
        &message.sender
    };
    markdown.push_str(&format!("### {} ({})\n", sender, timestamp));

    if let Some(replied) = &message.replied_to_message {
        let replied_time = resolved_time(replied, format);
        markdown.push_str(&format!(
            "> Replying to {} ({}):\n",
            replied.sender, replied_time
        ));
        // Every internal line of the quoted body gets its own "> " prefix.
        let body = replied.body.as_deref().unwrap_or("");
        markdown.push_str(&format!("> {}\n\n", body.replace('\n', "\n> ")));
    }

    if let Some(body) = message.body.as_deref() {
        if !body.is_empty() {
            markdown.push_str(body);
            markdown.push('\n');
        }
    }

    if let Some(attachments) = &message.attachments {
        if !attachments.is_empty() {
            markdown.push_str("\n**Attachments:**\n");
            for entry in attachments {
                match entry {
                    AttachmentEntry::File(att) => {
                        let name = att.filename.as_deref().unwrap_or("Unnamed File");
                        let size = format_document_size(att.file_size);
                        let uploaded = att
                            .created_at
                            .map(|ts| format!(" (uploaded on {})", format_timestamp(ts, format)))
                            .unwrap_or_default();
                        markdown.push_str(&format!("- {} ({}){}\n", name, size, uploaded));
                    }
                    AttachmentEntry::Other(_) => {
                        markdown.push_str("- File attachment (size unknown)\n");
                    }
                }
            }
        }
    }
}

fn resolved_time(message: &Message, format: DateFormat) -> String {
    message
        .formatted_time
        .clone()
        .unwrap_or_else(|| format_timestamp(message.created_at, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, recipient: &str, body: Option<&str>, created_at: i64) -> Message {
        Message {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            body: body.map(str::to_string),
            created_at,
            attachments: None,
            replied_to_message: None,
            formatted_time: None,
        }
    }

    fn conversation(username: &str, messages: Vec<Message>) -> Conversation {
        Conversation {
            username: username.to_string(),
            messages,
        }
    }

    #[test]
    fn test_render_basic_scenario() {
        let conv = conversation(
            "alice",
            vec![message("alice", "bob", Some("Hi"), 1_700_000_000_000)],
        );
        let doc = render(&conv, DateFormat::DayMonthYear);

        let expected_time = format_timestamp(1_700_000_000_000, DateFormat::DayMonthYear);
        assert!(doc.markdown.starts_with("# Conversation with bob\n\n"));
        assert!(
            doc.markdown
                .contains(&format!("### alice ({})\n", expected_time))
        );
        assert!(doc.markdown.contains("Hi\n"));
        assert!(doc.markdown.ends_with("\n---\n\n"));
    }

    #[test]
    fn test_render_heading_and_separator_per_message() {
        let messages: Vec<Message> = (0..5)
            .map(|i| message("bob", "alice", Some("hello"), 1_700_000_000_000 + i))
            .collect();
        let conv = conversation("alice", messages);
        let doc = render(&conv, DateFormat::DayMonthYear);

        assert_eq!(doc.markdown.matches("### bob (").count(), 5);
        assert_eq!(doc.markdown.matches("\n---\n").count(), 5);
    }

    #[test]
    fn test_render_empty_conversation_is_title_only() {
        let conv = conversation("alice", vec![]);
        let doc = render(&conv, DateFormat::DayMonthYear);
        assert_eq!(doc.markdown, "# Conversation with \n\n");
    }

    #[test]
    fn test_render_message_without_body_or_attachments() {
        let conv = conversation("alice", vec![message("bob", "alice", None, 0)]);
        let doc = render(&conv, DateFormat::DayMonthYear);
        assert!(doc.markdown.contains("### bob ("));
        assert!(doc.markdown.ends_with("\n---\n\n"));
    }

    #[test]
    fn test_render_quotes_every_reply_line() {
        let mut msg = message("alice", "bob", Some("sure"), 2_000);
        msg.replied_to_message = Some(Box::new(message(
            "bob",
            "alice",
            Some("line one\nline two\nline three"),
            1_000,
        )));
        let conv = conversation("alice", vec![msg]);
        let doc = render(&conv, DateFormat::DayMonthYear);

        assert!(doc.markdown.contains("> Replying to bob ("));
        assert!(doc.markdown.contains("> line one\n> line two\n> line three\n"));
    }

    #[test]
    fn test_render_attachments_with_legacy_names() {
        let mut msg = message("bob", "alice", None, 1_000);
        msg.attachments = Some(
            serde_json::from_str(r#"[{"file_name":"a.pdf","file_size":2048}]"#).unwrap(),
        );
        let conv = conversation("alice", vec![msg]);
        let doc = render(&conv, DateFormat::DayMonthYear);

        assert!(doc.markdown.contains("**Attachments:**\n- a.pdf (2.0 KB)\n"));
    }

    #[test]
    fn test_render_malformed_attachment_placeholder() {
        let mut msg = message("bob", "alice", None, 1_000);
        msg.attachments =
            Some(serde_json::from_str(r#"[{"filename":"ok.txt","fileSize":10}, 7]"#).unwrap());
        let conv = conversation("alice", vec![msg]);
        let doc = render(&conv, DateFormat::DayMonthYear);

        assert!(doc.markdown.contains("- ok.txt (10 B)\n"));
        assert!(doc.markdown.contains("- File attachment (size unknown)\n"));
    }

    #[test]
    fn test_render_attachment_uploaded_clause() {
        let mut msg = message("bob", "alice", None, 1_000);
        msg.attachments = Some(
            serde_json::from_str(r#"[{"filename":"a.pdf","fileSize":100,"created_at":5000}]"#)
                .unwrap(),
        );
        let conv = conversation("alice", vec![msg]);
        let doc = render(&conv, DateFormat::DayMonthYear);

        let uploaded = format_timestamp(5000, DateFormat::DayMonthYear);
        assert!(
            doc.markdown
                .contains(&format!("- a.pdf (100 B) (uploaded on {})\n", uploaded))
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut msg = message("alice", "bob", Some("Hi\nthere"), 1_700_000_000_000);
        msg.replied_to_message = Some(Box::new(message("bob", "alice", Some("q"), 1_000)));
        let conv = conversation("alice", vec![msg]);

        let first = render(&conv, DateFormat::YearMonthDay);
        let second = render(&conv, DateFormat::YearMonthDay);
        assert_eq!(first.markdown, second.markdown);
        assert_eq!(first.json, second.json);
    }

    #[test]
    fn test_date_format_change_only_affects_timestamps() {
        let conv = conversation(
            "alice",
            vec![message("alice", "bob", Some("unchanged body"), 1_700_000_000_000)],
        );
        let slash = render(&conv, DateFormat::DayMonthYear);
        let dashed = render(&conv, DateFormat::DayMonthYearDashed);

        assert_ne!(slash.markdown, dashed.markdown);
        assert!(slash.markdown.contains("unchanged body"));
        assert!(dashed.markdown.contains("unchanged body"));

        let slash_time = format_timestamp(1_700_000_000_000, DateFormat::DayMonthYear);
        let dashed_time = format_timestamp(1_700_000_000_000, DateFormat::DayMonthYearDashed);
        assert_eq!(
            slash.markdown.replace(&slash_time, "<TS>"),
            dashed.markdown.replace(&dashed_time, "<TS>")
        );
    }

    #[test]
    fn test_json_carries_formatted_time() {
        let mut msg = message("alice", "bob", Some("Hi"), 1_700_000_000_000);
        msg.replied_to_message = Some(Box::new(message("bob", "alice", Some("q"), 1_000)));
        let conv = conversation("alice", vec![msg]);
        let doc = render(&conv, DateFormat::MonthDayYear);

        let first = &doc.json["messages"][0];
        assert_eq!(
            first["formattedTime"].as_str(),
            Some(format_timestamp(1_700_000_000_000, DateFormat::MonthDayYear).as_str())
        );
        assert_eq!(
            first["repliedToMessage"]["formattedTime"].as_str(),
            Some(format_timestamp(1_000, DateFormat::MonthDayYear).as_str())
        );
    }

    #[test]
    fn test_format_timestamp_zero_pads_date() {
        // 2023-01-05 known date; only the date half is asserted to keep the
        // test independent of the local timezone's time-of-day.
        let ms = 1_672_898_400_000; // 2023-01-05 06:00:00 UTC
        let formatted = format_timestamp(ms, DateFormat::YearMonthDay);
        let date_part = formatted.split(", ").next().unwrap();
        assert_eq!(date_part.len(), 10);
        assert!(date_part.chars().all(|c| c.is_ascii_digit() || c == '/'));
    }

    #[test]
    fn test_date_format_round_trips_through_serde() {
        for fmt in [
            DateFormat::DayMonthYear,
            DateFormat::MonthDayYear,
            DateFormat::YearMonthDay,
            DateFormat::DayMonthYearDashed,
        ] {
            let json = serde_json::to_string(&fmt).unwrap();
            assert_eq!(json, format!("\"{}\"", fmt.as_str()));
            let back: DateFormat = serde_json::from_str(&json).unwrap();
            assert_eq!(back, fmt);
        }
    }
}
