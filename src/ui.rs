use crate::models::{format_size, AttachmentEntry, Contact, Conversation};
use crate::render::{format_timestamp, DateFormat};
use crate::status::{OperationState, ProcessStatus};
use crate::worker::Event;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum FocusedPanel {
    #[default]
    Contacts,
    Conversation,
    Attachments,
}

/// One attachment flattened out of the current conversation for the grid
/// view, with the sender and time of its parent message.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRow {
    pub filename: String,
    pub file_size: Option<u64>,
    pub sender: String,
    pub message_time: i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReloadFlags {
    pub contacts: bool,
    pub conversation: bool,
}

/// All controller state for the surface, built at startup and dropped on
/// exit. The polled status and the pushed events funnel into the same
/// fields, so a completion arriving twice is a no-op.
pub struct UIState {
    pub contacts: Vec<Contact>,
    pub conversation: Option<Conversation>,
    pub conversation_username: Option<String>,
    pub markdown_preview: Option<String>,
    pub attachments: Vec<AttachmentRow>,
    pub selected_contact_index: usize,
    pub selected_attachment_index: usize,
    pub detail_scroll: u16,
    pub focused_panel: FocusedPanel,
    pub date_format: DateFormat,
    pub status_line: Option<String>,
    pub contacts_busy: bool,
    pub contacts_progress: Option<String>,
    pub extraction_busy: bool,
    pub extraction_progress: Option<String>,
    pub last_status_version: u64,
    pub last_contacts_fetch: Option<i64>,
    pub last_extracted_time: Option<i64>,
    pub reload: ReloadFlags,
}

impl Default for UIState {
    fn default() -> Self {
        Self {
            contacts: Vec::new(),
            conversation: None,
            conversation_username: None,
            markdown_preview: None,
            attachments: Vec::new(),
            selected_contact_index: 0,
            selected_attachment_index: 0,
            detail_scroll: 0,
            focused_panel: FocusedPanel::Contacts,
            date_format: DateFormat::default(),
            status_line: None,
            contacts_busy: false,
            contacts_progress: None,
            extraction_busy: false,
            extraction_progress: None,
            last_status_version: 0,
            last_contacts_fetch: None,
            last_extracted_time: None,
            reload: ReloadFlags::default(),
        }
    }
}

impl UIState {
    /// Reconciles a polled status snapshot. Snapshots that do not advance
    /// the version are ignored, so redundant poll/push deliveries never
    /// re-trigger transitions. Returns whether anything was applied.
    pub fn apply_status(&mut self, snapshot: &ProcessStatus) -> bool {
        if snapshot.version <= self.last_status_version {
            return false;
        }
        self.last_status_version = snapshot.version;

        match snapshot.contacts.status {
            OperationState::Running => {
                self.contacts_busy = true;
                self.contacts_progress = Some(
                    snapshot
                        .contacts
                        .progress
                        .clone()
                        .unwrap_or_else(|| "Processing...".to_string()),
                );
            }
            OperationState::Completed => {
                self.contacts_busy = false;
                self.contacts_progress = None;
                self.reload.contacts = true;
                if let Some(message) = &snapshot.contacts.message {
                    self.status_line = Some(message.clone());
                }
            }
            OperationState::Error => {
                self.contacts_busy = false;
                self.contacts_progress = None;
                if let Some(error) = &snapshot.contacts.error {
                    self.status_line = Some(format!("Error: {}", error));
                }
            }
            OperationState::Idle => {
                self.contacts_busy = false;
                self.contacts_progress = None;
            }
        }

        match snapshot.conversations.status {
            OperationState::Running => {
                self.extraction_busy = true;
                self.extraction_progress = Some(
                    snapshot
                        .conversations
                        .progress
                        .clone()
                        .unwrap_or_else(|| "Processing...".to_string()),
                );
            }
            OperationState::Completed => {
                self.extraction_busy = false;
                self.extraction_progress = None;
                self.reload.conversation = true;
                if let Some(message) = &snapshot.conversations.message {
                    self.status_line = Some(message.clone());
                }
            }
            OperationState::Error => {
                self.extraction_busy = false;
                self.extraction_progress = None;
                if let Some(error) = &snapshot.conversations.error {
                    self.status_line = Some(format!("Error: {}", error));
                }
            }
            OperationState::Idle => {
                self.extraction_busy = false;
                self.extraction_progress = None;
            }
        }

        true
    }

    /// Applies a pushed worker event. Data payloads replace state wholesale,
    /// so a push followed by the matching poll (or the reverse) lands on the
    /// same UI state.
    pub fn apply_event(&mut self, event: Event) {
        match event {
            Event::ContactsProgress {
                message, is_error, ..
            } => {
                if is_error {
                    self.status_line = Some(format!("Error: {}", message));
                } else {
                    self.status_line = Some(message.clone());
                    if self.contacts_busy {
                        self.contacts_progress = Some(message);
                    }
                }
            }
            Event::ContactsFetched { message, data } => {
                self.contacts = data;
                self.clamp_contact_selection();
                self.contacts_busy = false;
                self.contacts_progress = None;
                self.status_line = Some(message);
                self.reload.contacts = true;
            }
            Event::ConversationExtracted { message, .. } => {
                self.extraction_busy = false;
                self.extraction_progress = None;
                self.status_line = Some(message);
                // Pull the conversation plus its cached renders together.
                self.reload.conversation = true;
            }
            Event::ExtractionError { error } => {
                self.extraction_busy = false;
                self.extraction_progress = None;
                self.status_line = Some(format!("Error: {}", error));
            }
            Event::RendersRefreshed => {
                self.reload.contacts = true;
                self.reload.conversation = true;
            }
        }
    }

    pub fn set_conversation(&mut self, conversation: Option<Conversation>) {
        self.attachments = conversation
            .as_ref()
            .map(attachment_rows)
            .unwrap_or_default();
        if self.selected_attachment_index >= self.attachments.len() {
            self.selected_attachment_index = self.attachments.len().saturating_sub(1);
        }
        self.detail_scroll = 0;
        self.conversation = conversation;
    }

    pub fn selected_contact(&self) -> Option<&Contact> {
        self.contacts.get(self.selected_contact_index)
    }

    fn clamp_contact_selection(&mut self) {
        if self.selected_contact_index >= self.contacts.len() {
            self.selected_contact_index = self.contacts.len().saturating_sub(1);
        }
    }

    pub fn take_reload(&mut self) -> ReloadFlags {
        std::mem::take(&mut self.reload)
    }
}

fn attachment_rows(conversation: &Conversation) -> Vec<AttachmentRow> {
    let mut rows = Vec::new();
    for message in &conversation.messages {
        let Some(attachments) = &message.attachments else {
            continue;
        };
        for entry in attachments {
            let row = match entry {
                AttachmentEntry::File(att) => AttachmentRow {
                    filename: att
                        .filename
                        .clone()
                        .unwrap_or_else(|| "Unnamed File".to_string()),
                    file_size: att.file_size,
                    sender: message.sender.clone(),
                    message_time: message.created_at,
                },
                AttachmentEntry::Other(_) => AttachmentRow {
                    filename: "File attachment".to_string(),
                    file_size: None,
                    sender: message.sender.clone(),
                    message_time: message.created_at,
                },
            };
            rows.push(row);
        }
    }
    rows
}

fn panel_border(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

pub fn render(f: &mut Frame, state: &mut UIState) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Statistics header
            Constraint::Min(5),    // Panels
            Constraint::Length(3), // Status line
        ])
        .split(f.area());

    // Statistics header
    let message_count = state
        .conversation
        .as_ref()
        .map(|c| c.messages.len())
        .unwrap_or(0);
    let attachment_count = state
        .conversation
        .as_ref()
        .map(|c| c.attachment_count())
        .unwrap_or(0);
    let total_size = state
        .conversation
        .as_ref()
        .map(|c| c.total_attachment_size());
    let last_fetch = state
        .last_contacts_fetch
        .map(|ts| format_timestamp(ts, state.date_format))
        .unwrap_or_else(|| "never".to_string());
    let stats = format!(
        "Contacts: {}   Messages: {}   Attachments: {} ({})   Last fetch: {}",
        state.contacts.len(),
        message_count,
        attachment_count,
        format_size(total_size),
        last_fetch,
    );
    let header = Paragraph::new(stats).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Fiverr Inbox Archive"),
    );
    f.render_widget(header, outer[0]);

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25), // Contacts
            Constraint::Percentage(50), // Conversation document
            Constraint::Percentage(25), // Attachments
        ])
        .split(outer[1]);

    // Panel 1: Contacts
    let contacts_title = match (&state.contacts_busy, &state.contacts_progress) {
        (true, Some(progress)) => format!("Contacts - {}", progress),
        (true, None) => "Contacts - Processing...".to_string(),
        _ => "Contacts".to_string(),
    };
    let contact_items: Vec<ListItem> = state
        .contacts
        .iter()
        .enumerate()
        .map(|(i, contact)| {
            let style = if i == state.selected_contact_index {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let last = format_timestamp(contact.recent_message_date, state.date_format);
            ListItem::new(format!("{}\n  Last message: {}", contact.username, last)).style(style)
        })
        .collect();
    let contacts_block = Block::default()
        .borders(Borders::ALL)
        .title(contacts_title)
        .border_style(panel_border(state.focused_panel == FocusedPanel::Contacts));
    if state.contacts.is_empty() {
        let placeholder = Paragraph::new("No contacts found\n\nPress 'c' to fetch contacts")
            .block(contacts_block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(placeholder, panels[0]);
    } else {
        f.render_widget(List::new(contact_items).block(contacts_block), panels[0]);
    }

    // Panel 2: Conversation document preview
    let conversation_title = if state.extraction_busy {
        format!(
            "Conversation - {}",
            state
                .extraction_progress
                .as_deref()
                .unwrap_or("Processing...")
        )
    } else {
        match &state.conversation_username {
            Some(username) => format!("Conversation with {}", username),
            None => "Conversation".to_string(),
        }
    };
    let conversation_block = Block::default()
        .borders(Borders::ALL)
        .title(conversation_title)
        .border_style(panel_border(
            state.focused_panel == FocusedPanel::Conversation,
        ));
    let preview = state
        .markdown_preview
        .as_deref()
        .unwrap_or("No conversation extracted\n\nSelect a contact and press 'e'");
    let conversation_paragraph = Paragraph::new(preview)
        .block(conversation_block)
        .wrap(ratatui::widgets::Wrap { trim: false })
        .scroll((state.detail_scroll, 0));
    f.render_widget(conversation_paragraph, panels[1]);

    // Panel 3: Attachments
    let attachment_items: Vec<ListItem> = state
        .attachments
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let style = if i == state.selected_attachment_index {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            let line = format!(
                "{} ({})\n  {} - {}",
                row.filename,
                format_size(row.file_size),
                row.sender,
                format_timestamp(row.message_time, state.date_format),
            );
            ListItem::new(line).style(style)
        })
        .collect();
    let attachments_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Attachments ({})", state.attachments.len()))
        .border_style(panel_border(
            state.focused_panel == FocusedPanel::Attachments,
        ));
    if state.attachments.is_empty() {
        let placeholder = Paragraph::new("No attachments")
            .block(attachments_block)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(placeholder, panels[2]);
    } else {
        f.render_widget(
            List::new(attachment_items).block(attachments_block),
            panels[2],
        );
    }

    // Status line
    let status_text = state.status_line.as_deref().unwrap_or(
        "c: fetch contacts  e: extract  s: export  f: date format  q: quit",
    );
    let status = Paragraph::new(status_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Status [{}]", state.date_format.as_str())),
    );
    f.render_widget(status, outer[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Operation;

    fn running_contacts_snapshot() -> ProcessStatus {
        let mut status = ProcessStatus::default();
        status.begin(Operation::Contacts);
        status.progress(Operation::Contacts, "50/120");
        status
    }

    #[test]
    fn test_running_contacts_disables_control_and_shows_progress() {
        let mut state = UIState::default();
        let snapshot = running_contacts_snapshot();

        assert!(state.apply_status(&snapshot));
        assert!(state.contacts_busy);
        assert_eq!(state.contacts_progress.as_deref(), Some("50/120"));
        // Conversation side untouched.
        assert!(!state.extraction_busy);
        assert!(state.extraction_progress.is_none());
    }

    #[test]
    fn test_running_without_progress_shows_placeholder() {
        let mut state = UIState::default();
        let mut snapshot = ProcessStatus::default();
        snapshot.begin(Operation::Conversations);

        state.apply_status(&snapshot);
        assert_eq!(state.extraction_progress.as_deref(), Some("Processing..."));
    }

    #[test]
    fn test_stale_snapshot_is_a_no_op() {
        let mut state = UIState::default();
        let snapshot = running_contacts_snapshot();

        assert!(state.apply_status(&snapshot));
        state.contacts_progress = Some("mutated by later events".to_string());
        // Same version arrives again via the other delivery path.
        assert!(!state.apply_status(&snapshot));
        assert_eq!(
            state.contacts_progress.as_deref(),
            Some("mutated by later events")
        );
    }

    #[test]
    fn test_completed_reenables_and_requests_reload() {
        let mut state = UIState::default();
        let mut snapshot = running_contacts_snapshot();
        state.apply_status(&snapshot);

        snapshot.complete(Operation::Contacts, "Fetched 120 contacts successfully!");
        assert!(state.apply_status(&snapshot));
        assert!(!state.contacts_busy);
        assert!(state.contacts_progress.is_none());
        assert!(state.reload.contacts);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Fetched 120 contacts successfully!")
        );
    }

    #[test]
    fn test_error_reenables_and_surfaces_message() {
        let mut state = UIState::default();
        let mut snapshot = ProcessStatus::default();
        snapshot.begin(Operation::Conversations);
        state.apply_status(&snapshot);

        snapshot.fail(Operation::Conversations, "scrape failed");
        state.apply_status(&snapshot);
        assert!(!state.extraction_busy);
        assert!(state.extraction_progress.is_none());
        assert_eq!(state.status_line.as_deref(), Some("Error: scrape failed"));
    }

    #[test]
    fn test_idle_snapshot_changes_nothing_visible() {
        let mut state = UIState::default();
        let mut snapshot = ProcessStatus::default();
        snapshot.version = 1; // versioned but both operations idle

        state.apply_status(&snapshot);
        assert!(!state.contacts_busy);
        assert!(!state.extraction_busy);
        assert!(state.status_line.is_none());
        assert!(!state.reload.contacts);
        assert!(!state.reload.conversation);
    }

    #[test]
    fn test_push_then_poll_is_idempotent() {
        let mut state = UIState::default();
        let contacts = vec![Contact {
            username: "bob".to_string(),
            recent_message_date: 5,
        }];

        // Push arrives first.
        state.apply_event(Event::ContactsFetched {
            message: "Fetched 1 contacts successfully!".to_string(),
            data: contacts.clone(),
        });
        let after_push = (state.contacts.clone(), state.contacts_busy);

        // Poll reports the same completion.
        let mut snapshot = ProcessStatus::default();
        snapshot.begin(Operation::Contacts);
        snapshot.complete(Operation::Contacts, "Fetched 1 contacts successfully!");
        state.apply_status(&snapshot);

        assert_eq!(state.contacts, after_push.0);
        assert_eq!(state.contacts_busy, after_push.1);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Fetched 1 contacts successfully!")
        );
    }

    #[test]
    fn test_set_conversation_rebuilds_attachment_rows() {
        let mut state = UIState::default();
        let conversation: Conversation = serde_json::from_str(
            r#"{"username":"alice","messages":[
                {"sender":"bob","recipient":"alice","createdAt":1000,
                 "attachments":[{"filename":"a.pdf","fileSize":2048}, "junk"]}
            ]}"#,
        )
        .unwrap();

        state.set_conversation(Some(conversation));
        assert_eq!(state.attachments.len(), 2);
        assert_eq!(state.attachments[0].filename, "a.pdf");
        assert_eq!(state.attachments[0].file_size, Some(2048));
        assert_eq!(state.attachments[1].filename, "File attachment");
        assert_eq!(state.attachments[1].file_size, None);

        state.set_conversation(None);
        assert!(state.attachments.is_empty());
    }

    #[test]
    fn test_extraction_error_event() {
        let mut state = UIState::default();
        state.extraction_busy = true;
        state.apply_event(Event::ExtractionError {
            error: "no conversation selected".to_string(),
        });
        assert!(!state.extraction_busy);
        assert_eq!(
            state.status_line.as_deref(),
            Some("Error: no conversation selected")
        );
    }

    #[test]
    fn test_take_reload_clears_flags() {
        let mut state = UIState::default();
        state.reload.contacts = true;
        let flags = state.take_reload();
        assert!(flags.contacts);
        assert!(!state.reload.contacts);
        assert!(!state.reload.conversation);
    }
}
