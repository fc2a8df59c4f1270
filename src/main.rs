mod config;
mod export;
mod models;
mod render;
mod source;
mod status;
mod store;
mod ui;
mod worker;

use crate::config::{matches_key, Config};
use crate::source::{is_valid_username, JsonSource};
use crate::ui::FocusedPanel;
use crate::worker::{Request, Worker};
use chrono::Local;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The TUI owns the terminal, so logs go to a file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("ftui.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    let config = Config::load();
    let db_url = "sqlite:ftui.db?mode=rwc".to_string();
    let store = store::Store::new(&db_url).await?;
    store.run_migrations().await?;

    let shared_status = status::shared();
    let source = Arc::new(JsonSource::new(config.data_dir.clone()));

    let (req_tx, req_rx) = mpsc::channel::<Request>(16);
    let (event_tx, mut event_rx) = mpsc::channel::<worker::Event>(64);
    let (status_tx, mut status_rx) = mpsc::channel(4);

    let background = Worker::new(store.clone(), source, shared_status.clone(), event_tx);
    tokio::spawn(background.run(req_rx));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut ui_state = ui::UIState::default();
    ui_state.date_format = store.date_format().await?;
    ui_state.contacts = store.contacts().await?.unwrap_or_default();
    ui_state.last_contacts_fetch = store.last_contacts_fetch().await?;
    ui_state.last_extracted_time = store.last_extracted_time().await?;
    ui_state.conversation_username = store.current_conversation_username().await?;
    ui_state.markdown_preview = store.markdown_content().await?;
    let initial_conversation = store.conversation().await?;
    ui_state.set_conversation(initial_conversation);

    let _ = req_tx.send(Request::InitPopup).await;

    // First status poll happens immediately; later polls on the fixed
    // interval. The poll dies with this loop, so no timer outlives the
    // surface.
    let mut last_poll: Option<Instant> = None;

    loop {
        if last_poll.is_none_or(|t| t.elapsed() >= POLL_INTERVAL) {
            let _ = req_tx.try_send(Request::GetProcessStatus {
                reply: status_tx.clone(),
            });
            last_poll = Some(Instant::now());
        }

        // Poll path: reconcile snapshots against the last seen version.
        while let Ok(snapshot) = status_rx.try_recv() {
            ui_state.apply_status(&snapshot);
        }

        // Push path: one-shot notifications with payload data.
        while let Ok(worker_event) = event_rx.try_recv() {
            ui_state.apply_event(worker_event);
        }

        let flags = ui_state.take_reload();
        if flags.contacts {
            ui_state.contacts = store.contacts().await?.unwrap_or_default();
            if ui_state.selected_contact_index >= ui_state.contacts.len() {
                ui_state.selected_contact_index = ui_state.contacts.len().saturating_sub(1);
            }
            ui_state.last_contacts_fetch = store.last_contacts_fetch().await?;
        }
        if flags.conversation {
            ui_state.date_format = store.date_format().await?;
            ui_state.conversation_username = store.current_conversation_username().await?;
            ui_state.markdown_preview = store.markdown_content().await?;
            ui_state.last_extracted_time = store.last_extracted_time().await?;
            let conversation = store.conversation().await?;
            ui_state.set_conversation(conversation);
        }

        terminal.draw(|f| ui::render(f, &mut ui_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if matches_key(key, &config.keybindings.quit) {
                break;
            } else if matches_key(key, &config.keybindings.next_panel) {
                ui_state.focused_panel = match ui_state.focused_panel {
                    FocusedPanel::Contacts => FocusedPanel::Conversation,
                    FocusedPanel::Conversation => FocusedPanel::Attachments,
                    FocusedPanel::Attachments => FocusedPanel::Attachments,
                };
            } else if matches_key(key, &config.keybindings.prev_panel) {
                ui_state.focused_panel = match ui_state.focused_panel {
                    FocusedPanel::Attachments => FocusedPanel::Conversation,
                    FocusedPanel::Conversation => FocusedPanel::Contacts,
                    FocusedPanel::Contacts => FocusedPanel::Contacts,
                };
            } else if matches_key(key, &config.keybindings.move_down) {
                match ui_state.focused_panel {
                    FocusedPanel::Contacts => {
                        if ui_state.selected_contact_index
                            < ui_state.contacts.len().saturating_sub(1)
                        {
                            ui_state.selected_contact_index += 1;
                        }
                    }
                    FocusedPanel::Conversation => {
                        ui_state.detail_scroll = ui_state.detail_scroll.saturating_add(1);
                    }
                    FocusedPanel::Attachments => {
                        if ui_state.selected_attachment_index
                            < ui_state.attachments.len().saturating_sub(1)
                        {
                            ui_state.selected_attachment_index += 1;
                        }
                    }
                }
            } else if matches_key(key, &config.keybindings.move_up) {
                match ui_state.focused_panel {
                    FocusedPanel::Contacts => {
                        ui_state.selected_contact_index =
                            ui_state.selected_contact_index.saturating_sub(1);
                    }
                    FocusedPanel::Conversation => {
                        ui_state.detail_scroll = ui_state.detail_scroll.saturating_sub(1);
                    }
                    FocusedPanel::Attachments => {
                        ui_state.selected_attachment_index =
                            ui_state.selected_attachment_index.saturating_sub(1);
                    }
                }
            } else if matches_key(key, &config.keybindings.fetch_contacts) {
                if !ui_state.contacts_busy {
                    ui_state.contacts_busy = true;
                    ui_state.status_line = Some("Fetching all contacts...".to_string());
                    let _ = req_tx.send(Request::FetchAllContacts).await;
                }
            } else if matches_key(key, &config.keybindings.extract) {
                if !ui_state.extraction_busy {
                    match ui_state.selected_contact().map(|c| c.username.clone()) {
                        Some(username) if is_valid_username(&username) => {
                            // The username lands in the store before the
                            // request goes out, so the worker always sees it.
                            store.set_current_username(&username).await?;
                            ui_state.extraction_busy = true;
                            ui_state.status_line =
                                Some(format!("Extracting conversation with {}...", username));
                            let _ = req_tx.send(Request::ExtractConversation).await;
                        }
                        Some(username) => {
                            ui_state.status_line =
                                Some(format!("Error: invalid username: {}", username));
                        }
                        None => {
                            ui_state.status_line = Some(
                                "Error: no contact selected. Fetch contacts first.".to_string(),
                            );
                        }
                    }
                }
            } else if matches_key(key, &config.keybindings.export) {
                let markdown = store.markdown_content().await?;
                let json = store.json_content().await?;
                let username = store.current_username().await?;
                match (markdown, json, username) {
                    (Some(markdown), Some(json), Some(username)) => {
                        let today = Local::now().date_naive();
                        match export::export_documents(
                            &config.output_dir,
                            &username,
                            today,
                            &markdown,
                            &json,
                        ) {
                            Ok((md_path, json_file)) => {
                                tracing::info!(
                                    "exported {} and {}",
                                    md_path.display(),
                                    json_file.display()
                                );
                                ui_state.status_line =
                                    Some(format!("Saved {}", md_path.display()));
                            }
                            Err(e) => {
                                ui_state.status_line = Some(format!("Error: {}", e));
                            }
                        }
                    }
                    _ => {
                        ui_state.status_line =
                            Some("Please extract the conversation first.".to_string());
                    }
                }
            } else if matches_key(key, &config.keybindings.cycle_date_format) {
                let next = ui_state.date_format.next();
                ui_state.date_format = next;
                ui_state.status_line = Some(format!("Date format: {}", next.as_str()));
                let _ = req_tx.send(Request::SetDateFormat(next)).await;
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    Ok(())
}
