use crate::models::{Contact, Conversation};
use crate::render::{self, DateFormat};
use crate::source::InboxSource;
use crate::status::{Operation, ProcessStatus, SharedStatus};
use crate::store::Store;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Requests from a surface to the background worker. Start requests are
/// fire-and-forget; only the status request carries a reply channel.
pub enum Request {
    InitPopup,
    FetchAllContacts,
    ExtractConversation,
    GetProcessStatus { reply: mpsc::Sender<ProcessStatus> },
    SetDateFormat(DateFormat),
}

/// One-shot notifications pushed by the worker. Surfaces must treat these
/// as redundant with the polled status: applying the same completion twice
/// is a no-op.
#[derive(Debug, Clone)]
pub enum Event {
    ContactsProgress {
        message: String,
        is_error: bool,
        total_contacts: Option<usize>,
    },
    ContactsFetched {
        message: String,
        data: Vec<Contact>,
    },
    ConversationExtracted {
        message: String,
        data: Conversation,
    },
    ExtractionError {
        error: String,
    },
    RendersRefreshed,
}

/// Background worker owning the authoritative process status. Each start
/// request spawns its operation, so the contacts fetch and the conversation
/// extraction can run at the same time without touching each other's slot.
#[derive(Clone)]
pub struct Worker {
    store: Store,
    source: Arc<dyn InboxSource>,
    status: SharedStatus,
    events: mpsc::Sender<Event>,
}

impl Worker {
    pub fn new(
        store: Store,
        source: Arc<dyn InboxSource>,
        status: SharedStatus,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            store,
            source,
            status,
            events,
        }
    }

    pub async fn run(self, mut requests: mpsc::Receiver<Request>) {
        while let Some(request) = requests.recv().await {
            match request {
                Request::InitPopup => {
                    tracing::info!("surface connected");
                }
                Request::GetProcessStatus { reply } => {
                    let snapshot = match self.status.lock() {
                        Ok(status) => status.clone(),
                        Err(_) => continue,
                    };
                    let _ = reply.send(snapshot).await;
                }
                Request::FetchAllContacts => {
                    let worker = self.clone();
                    tokio::spawn(async move { worker.fetch_all_contacts().await });
                }
                Request::ExtractConversation => {
                    let worker = self.clone();
                    tokio::spawn(async move { worker.extract_conversation().await });
                }
                Request::SetDateFormat(format) => {
                    let worker = self.clone();
                    tokio::spawn(async move { worker.apply_date_format(format).await });
                }
            }
        }
        tracing::info!("worker shutting down");
    }

    fn with_status(&self, apply: impl FnOnce(&mut ProcessStatus)) {
        if let Ok(mut status) = self.status.lock() {
            apply(&mut status);
        }
    }

    async fn push(&self, event: Event) {
        let _ = self.events.send(event).await;
    }

    async fn fetch_all_contacts(&self) {
        self.with_status(|s| s.begin(Operation::Contacts));
        self.with_status(|s| s.progress(Operation::Contacts, "Fetching contact list..."));
        self.push(Event::ContactsProgress {
            message: "Fetching all contacts...".to_string(),
            is_error: false,
            total_contacts: None,
        })
        .await;

        match self.source.list_contacts().await {
            Ok(contacts) => {
                let count = contacts.len();
                self.with_status(|s| {
                    s.progress(Operation::Contacts, format!("{}/{} contacts", count, count))
                });
                self.push(Event::ContactsProgress {
                    message: format!("Fetched {} contacts", count),
                    is_error: false,
                    total_contacts: Some(count),
                })
                .await;

                if let Err(e) = self.persist_contacts(&contacts).await {
                    tracing::error!("failed to persist contacts: {e:#}");
                    self.with_status(|s| s.fail(Operation::Contacts, e.to_string()));
                    self.push(Event::ContactsProgress {
                        message: e.to_string(),
                        is_error: true,
                        total_contacts: None,
                    })
                    .await;
                    return;
                }

                let message = format!("Fetched {} contacts successfully!", count);
                self.with_status(|s| s.complete(Operation::Contacts, message.clone()));
                self.push(Event::ContactsFetched {
                    message,
                    data: contacts,
                })
                .await;
            }
            Err(e) => {
                tracing::warn!("contact fetch failed: {e}");
                self.with_status(|s| s.fail(Operation::Contacts, e.to_string()));
                self.push(Event::ContactsProgress {
                    message: e.to_string(),
                    is_error: true,
                    total_contacts: None,
                })
                .await;
            }
        }
    }

    async fn persist_contacts(&self, contacts: &[Contact]) -> anyhow::Result<()> {
        self.store.set_contacts(contacts).await?;
        self.store
            .set_last_contacts_fetch(Utc::now().timestamp_millis())
            .await?;
        self.store.set_last_contact_count(contacts.len()).await?;
        Ok(())
    }

    async fn extract_conversation(&self) {
        // Input-context check: without a selected username the operation
        // never starts and the status slot stays untouched.
        let username = match self.store.current_username().await {
            Ok(Some(username)) => username,
            Ok(None) => {
                self.push(Event::ExtractionError {
                    error: "No conversation selected. Open a contact before extracting."
                        .to_string(),
                })
                .await;
                return;
            }
            Err(e) => {
                self.push(Event::ExtractionError {
                    error: e.to_string(),
                })
                .await;
                return;
            }
        };

        self.with_status(|s| s.begin(Operation::Conversations));
        self.with_status(|s| {
            s.progress(
                Operation::Conversations,
                format!("Extracting conversation with {}...", username),
            )
        });

        match self.source.fetch_conversation(&username).await {
            Ok(conversation) => {
                if let Err(e) = self.persist_conversation(&conversation, &username).await {
                    tracing::error!("failed to persist conversation: {e:#}");
                    self.with_status(|s| s.fail(Operation::Conversations, e.to_string()));
                    self.push(Event::ExtractionError {
                        error: e.to_string(),
                    })
                    .await;
                    return;
                }

                let message = format!("Conversation with {} extracted successfully!", username);
                self.with_status(|s| s.complete(Operation::Conversations, message.clone()));
                self.push(Event::ConversationExtracted {
                    message,
                    data: conversation,
                })
                .await;
            }
            Err(e) => {
                tracing::warn!("extraction failed for {username}: {e}");
                self.with_status(|s| s.fail(Operation::Conversations, e.to_string()));
                self.push(Event::ExtractionError {
                    error: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn persist_conversation(
        &self,
        conversation: &Conversation,
        username: &str,
    ) -> anyhow::Result<()> {
        let format = self.store.date_format().await?;
        let doc = render::render(conversation, format);

        self.store.set_conversation(conversation).await?;
        self.store
            .set_current_conversation_username(username)
            .await?;
        self.store
            .set_last_extracted_time(Utc::now().timestamp_millis())
            .await?;
        self.store.set_rendered(&doc.markdown, &doc.json).await?;
        Ok(())
    }

    /// Persists a new date format and regenerates the cached renders so the
    /// stored documents never reflect a stale setting.
    async fn apply_date_format(&self, format: DateFormat) {
        if let Err(e) = self.store.set_date_format(format).await {
            tracing::error!("failed to persist date format: {e:#}");
            return;
        }

        match self.store.conversation().await {
            Ok(Some(conversation)) => {
                let doc = render::render(&conversation, format);
                if let Err(e) = self.store.set_rendered(&doc.markdown, &doc.json).await {
                    tracing::error!("failed to refresh renders: {e:#}");
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("failed to load conversation for re-render: {e:#}");
                return;
            }
        }

        self.push(Event::RendersRefreshed).await;
    }
}
