use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::{ApiClient, ApiError, AskResponse, PageTotal, SalesPage, SalesRecord};
use crate::chat::{ChatOutcome, ChatState};
use crate::config::AppConfig;
use crate::format::Formatter;
use crate::pagination::{PageIntent, PageWindow};

/// Seconds a status message stays on the info line
const STATUS_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
    Detail,  // All fields of the selected record
}

/// Results coming back from background requests
#[derive(Debug)]
pub enum AppEvent {
    SalesLoaded {
        window: PageWindow,
        result: Result<SalesPage, ApiError>,
    },
    AskFinished {
        request_id: u64,
        result: Result<AskResponse, ApiError>,
    },
}

pub struct App {
    pub focus: Focus,
    pub popup: Popup,

    pub config: AppConfig,
    pub formatter: Formatter,
    client: ApiClient,

    // Table state
    pub window: PageWindow,
    pub page: Option<SalesPage>,
    pub total: Option<PageTotal>,  // Table size as far as fetched pages tell
    pub loading: bool,
    pub load_error: Option<String>,
    pub selected_row: usize,

    // Chat panel
    pub chat: ChatState,
    pub chat_open: bool,
    pub chat_scroll: u16,          // Lines scrolled back from the newest message

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    pub ticks: u64,                // Drives the loading spinner

    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
}

impl App {
    pub fn new(config: AppConfig, client: ApiClient) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let formatter = Formatter::new(config.locale.clone());
        let window = PageWindow::new(config.page_size);

        Self {
            focus: Focus::Table,
            popup: Popup::None,

            config,
            formatter,
            client,

            window,
            page: None,
            total: None,
            loading: false,
            load_error: None,
            selected_row: 0,

            chat: ChatState::default(),
            chat_open: false,
            chat_scroll: 0,

            status_message: None,
            status_message_time: None,

            ticks: 0,

            events_tx,
            events_rx,
        }
    }

    pub fn api_url(&self) -> &str {
        self.client.base_url()
    }

    /// Set a status message (auto-clears after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn records(&self) -> &[SalesRecord] {
        self.page.as_ref().map(|p| p.data.as_slice()).unwrap_or_default()
    }

    pub fn selected_record(&self) -> Option<&SalesRecord> {
        self.records().get(self.selected_row)
    }

    /// Total the window is clamped against; a lower bound does not clamp
    pub fn exact_total(&self) -> Option<u64> {
        self.total.and_then(PageTotal::exact)
    }

    /// Fetch the current window in the background
    pub fn request_page(&mut self) {
        self.loading = true;
        let window = self.window;
        let client = self.client.clone();
        let tx = self.events_tx.clone();

        tracing::debug!(offset = window.offset, size = window.page_size, "requesting page");
        tokio::spawn(async move {
            let result = client.fetch_sales(window.offset, window.page_size).await;
            if tx.send(AppEvent::SalesLoaded { window, result }).is_err() {
                tracing::debug!("App closed before the sales page arrived");
            }
        });
    }

    /// Run a page-change intent through the reducer and fetch if the window moved
    pub fn apply_intent(&mut self, intent: PageIntent) {
        let next = self.window.reduce(intent, self.exact_total());
        if next == self.window {
            return;
        }
        self.window = next;
        self.selected_row = 0;
        self.request_page();
    }

    /// Submit the chat question in the background
    pub fn submit_question(&mut self) {
        if self.chat.is_pending() {
            self.set_status("Still waiting for the previous answer");
            return;
        }

        let Some(ticket) = self.chat.submit() else {
            return;
        };

        self.chat_scroll = 0;
        let client = self.client.clone();
        let tx = self.events_tx.clone();

        tracing::info!(request_id = ticket.request_id, "asking question");
        tokio::spawn(async move {
            let result = client.ask(&ticket.question).await;
            let event = AppEvent::AskFinished {
                request_id: ticket.request_id,
                result,
            };
            if tx.send(event).is_err() {
                tracing::debug!("App closed before the answer arrived");
            }
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SalesLoaded { window, result } => self.on_sales_loaded(window, result),
            AppEvent::AskFinished { request_id, result } => self.on_ask_finished(request_id, result),
        }
    }

    fn on_sales_loaded(&mut self, window: PageWindow, result: Result<SalesPage, ApiError>) {
        if window != self.window {
            tracing::debug!(offset = window.offset, "dropping page for a superseded window");
            return;
        }

        match result {
            Ok(page) => {
                // A full page never undoes an exact total it fits inside
                let total = match (page.total(), self.exact_total()) {
                    (PageTotal::AtLeast(seen), Some(known)) if seen <= known => PageTotal::Exact(known),
                    (total, _) => total,
                };
                self.total = Some(total);

                // The count may have shrunk since the window was chosen
                if let PageTotal::Exact(total) = total {
                    let clamped = self.window.reduce(PageIntent::Goto(self.window.page_index), Some(total));
                    if clamped != self.window {
                        tracing::debug!(total, "window out of range, refetching");
                        self.window = clamped;
                        self.request_page();
                        return;
                    }
                }

                self.loading = false;
                self.load_error = None;
                self.selected_row = self.selected_row.min(page.data.len().saturating_sub(1));
                self.page = Some(page);
            }
            Err(e) => {
                tracing::warn!("Failed to load sales: {}", e);
                self.loading = false;
                self.page = None;
                self.load_error = Some(e.to_string());
                self.set_status("Could not load sales (r to retry)");
            }
        }
    }

    fn on_ask_finished(&mut self, request_id: u64, result: Result<AskResponse, ApiError>) {
        match self.chat.resolve(request_id, result) {
            ChatOutcome::Answered => {
                self.chat_scroll = 0;
                if !self.chat_open {
                    self.set_status("Answer received (a to open)");
                    self.notify("Answer received", "Open the chat panel to read it");
                }
            }
            ChatOutcome::Failed(reason) => {
                self.set_status(format!("Ask failed: {reason}"));
                self.notify("Ask failed", &reason);
            }
            ChatOutcome::Discarded => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Handle popups first
        if self.popup != Popup::None {
            self.handle_popup_key(key);
            return Ok(());
        }

        match self.focus {
            Focus::Table => self.handle_table_key(key),
            Focus::Chat => self.handle_chat_key(key),
        }
        Ok(())
    }

    fn handle_popup_key(&mut self, key: KeyEvent) {
        if matches!(
            key.code,
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Char('h')
        ) {
            self.popup = Popup::None;
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent) {
        match key.code {
            // Row selection within the page
            KeyCode::Char('j') | KeyCode::Down => {
                let len = self.records().len();
                if len > 0 {
                    self.selected_row = (self.selected_row + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected_row = self.selected_row.saturating_sub(1);
            }

            // Paging
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => self.apply_intent(PageIntent::Next),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => self.apply_intent(PageIntent::Previous),
            KeyCode::Char('g') | KeyCode::Home => self.apply_intent(PageIntent::First),
            KeyCode::Char('G') | KeyCode::End => self.apply_intent(PageIntent::Last),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let size = self.window.step_page_size(true);
                self.apply_intent(PageIntent::SetPageSize(size));
            }
            KeyCode::Char('-') => {
                let size = self.window.step_page_size(false);
                self.apply_intent(PageIntent::SetPageSize(size));
            }

            KeyCode::Char('r') => {
                self.set_status("Refreshing");
                self.request_page();
            }

            KeyCode::Enter => {
                if self.selected_record().is_some() {
                    self.popup = Popup::Detail;
                }
            }

            // Chat panel
            KeyCode::Char('a') | KeyCode::Char('/') => {
                self.chat_open = true;
                self.focus = Focus::Chat;
            }
            KeyCode::Tab if self.chat_open => self.focus = Focus::Chat,

            // Help (? or h)
            KeyCode::Char('?') | KeyCode::Char('h') => self.popup = Popup::Help,

            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                self.chat_open = false;
                self.focus = Focus::Table;
            }
            KeyCode::Tab | KeyCode::BackTab => self.focus = Focus::Table,

            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => self.chat.push_newline(),
            KeyCode::Enter => self.submit_question(),

            KeyCode::Char('u') if ctrl => self.chat.clear_input(),
            KeyCode::Char(c) if !ctrl => self.chat.push_char(c),
            KeyCode::Backspace => self.chat.backspace(),

            // History scrollback
            KeyCode::Up => self.chat_scroll = self.chat_scroll.saturating_add(1),
            KeyCode::Down => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            KeyCode::PageUp => self.chat_scroll = self.chat_scroll.saturating_add(10),
            KeyCode::PageDown => self.chat_scroll = self.chat_scroll.saturating_sub(10),

            _ => {}
        }
    }

    /// Whether `q` should quit rather than be typed
    pub fn accepts_quit(&self) -> bool {
        self.popup == Popup::None && self.focus == Focus::Table
    }

    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);

        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }

        // Clear status message after timeout
        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_TIMEOUT_SECS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    fn notify(&self, summary: &str, body: &str) {
        if !self.config.notifications {
            return;
        }
        if let Err(e) = notify_rust::Notification::new()
            .summary(summary)
            .body(body)
            .appname("brewtab")
            .show()
        {
            tracing::debug!("Desktop notification failed: {}", e);
        }
    }
}
