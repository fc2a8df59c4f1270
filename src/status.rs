use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Lifecycle of one background operation. Starts `Idle`, moves to `Running`
/// on a start request, and stays `Completed`/`Error` until the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub status: OperationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The two independently long-running operations. They may both be
/// `Running` at once; updates to one never touch the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Contacts,
    Conversations,
}

/// Authoritative status snapshot held by the background worker. `version`
/// increments on every mutation, so surfaces can treat redundant push/poll
/// deliveries of the same state as no-ops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub contacts: OperationStatus,
    pub conversations: OperationStatus,
    pub version: u64,
}

impl ProcessStatus {
    fn slot_mut(&mut self, op: Operation) -> &mut OperationStatus {
        match op {
            Operation::Contacts => &mut self.contacts,
            Operation::Conversations => &mut self.conversations,
        }
    }

    pub fn begin(&mut self, op: Operation) {
        let slot = self.slot_mut(op);
        *slot = OperationStatus {
            status: OperationState::Running,
            ..OperationStatus::default()
        };
        self.version += 1;
    }

    pub fn progress(&mut self, op: Operation, text: impl Into<String>) {
        let slot = self.slot_mut(op);
        slot.progress = Some(text.into());
        self.version += 1;
    }

    pub fn complete(&mut self, op: Operation, message: impl Into<String>) {
        let slot = self.slot_mut(op);
        slot.status = OperationState::Completed;
        slot.message = Some(message.into());
        slot.progress = None;
        slot.error = None;
        self.version += 1;
    }

    pub fn fail(&mut self, op: Operation, error: impl Into<String>) {
        let slot = self.slot_mut(op);
        slot.status = OperationState::Error;
        slot.error = Some(error.into());
        slot.progress = None;
        self.version += 1;
    }
}

/// Shared handle between the worker and status snapshots.
pub type SharedStatus = Arc<Mutex<ProcessStatus>>;

pub fn shared() -> SharedStatus {
    Arc::new(Mutex::new(ProcessStatus::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_start_idle() {
        let status = ProcessStatus::default();
        assert_eq!(status.contacts.status, OperationState::Idle);
        assert_eq!(status.conversations.status, OperationState::Idle);
        assert_eq!(status.version, 0);
    }

    #[test]
    fn test_begin_clears_previous_outcome() {
        let mut status = ProcessStatus::default();
        status.fail(Operation::Contacts, "boom");
        status.begin(Operation::Contacts);
        assert_eq!(status.contacts.status, OperationState::Running);
        assert!(status.contacts.error.is_none());
        assert!(status.contacts.message.is_none());
    }

    #[test]
    fn test_operations_are_independent() {
        let mut status = ProcessStatus::default();
        status.begin(Operation::Contacts);
        status.progress(Operation::Contacts, "50/120");
        status.begin(Operation::Conversations);
        status.fail(Operation::Conversations, "scrape failed");

        assert_eq!(status.contacts.status, OperationState::Running);
        assert_eq!(status.contacts.progress.as_deref(), Some("50/120"));
        assert_eq!(status.conversations.status, OperationState::Error);
        assert_eq!(status.conversations.error.as_deref(), Some("scrape failed"));
    }

    #[test]
    fn test_version_is_monotonic() {
        let mut status = ProcessStatus::default();
        let mut last = status.version;
        status.begin(Operation::Contacts);
        assert!(status.version > last);
        last = status.version;
        status.progress(Operation::Contacts, "1/2");
        assert!(status.version > last);
        last = status.version;
        status.complete(Operation::Contacts, "done");
        assert!(status.version > last);
    }

    #[test]
    fn test_complete_drops_progress_text() {
        let mut status = ProcessStatus::default();
        status.begin(Operation::Conversations);
        status.progress(Operation::Conversations, "Extracting...");
        status.complete(Operation::Conversations, "Extracted!");
        assert!(status.conversations.progress.is_none());
        assert_eq!(status.conversations.message.as_deref(), Some("Extracted!"));
    }

    #[test]
    fn test_status_serializes_with_lowercase_tags() {
        let mut status = ProcessStatus::default();
        status.begin(Operation::Contacts);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["contacts"]["status"], "running");
        assert_eq!(json["conversations"]["status"], "idle");
    }
}
