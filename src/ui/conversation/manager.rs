use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatReply, HistoryPage, StatusInfo};
use crate::error::{Error, Result};
use crate::history::{HistoryFetch, HistorySearch};
use crate::markup::sanitize_terminal;
use crate::session::{FeedbackForm, MessageId, SendOutcome, SendTicket, Sentiment, SessionManager};
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::{
    get_help_text, ConversationComposer, ConversationHistory, ParsedCommand, SlashCommand,
    TypingIndicator,
};
use crate::ui::sidebar::{Sidebar, SidebarMode};

/// Results of background requests, fed back into the UI loop
#[derive(Debug)]
pub enum AppEvent {
    SendFinished(SendTicket, Result<ChatReply>),
    HistoryLoaded(HistoryFetch, Result<HistoryPage>),
}

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Composer,
    HistorySearch,
}

#[derive(Debug, Clone, PartialEq)]
struct Notice {
    text: String,
    is_error: bool,
}

/// Owns the session and every piece of UI state around it
pub struct ConversationManager {
    session: SessionManager,
    history: HistorySearch,
    composer: ConversationComposer,
    typing: TypingIndicator,
    sidebar: SidebarMode,
    focus: Focus,
    samples: Vec<String>,
    status: Option<StatusInfo>,
    api_url: String,
    notice: Option<Notice>,
    show_help: bool,
    scroll: usize,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl ConversationManager {
    pub fn new(
        session: SessionManager,
        history: HistorySearch,
        api_url: impl Into<String>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            session,
            history,
            composer: ConversationComposer::new(
                "Ask about a threat actor, malware family or technique...",
                "Ask (Enter to send, / for commands)",
            ),
            typing: TypingIndicator::new(),
            sidebar: SidebarMode::Conversations,
            focus: Focus::Composer,
            samples: Vec::new(),
            status: None,
            api_url: api_url.into(),
            notice: None,
            show_help: false,
            scroll: 0,
            events,
        }
    }

    /// Service status and sample questions, fetched once at startup
    pub fn set_service_info(&mut self, status: Option<StatusInfo>, samples: Vec<String>) {
        self.status = status;
        self.samples = samples;
    }

    /// Open a fresh conversation so there is always one to send into
    pub async fn start(&mut self) {
        // A successful create already reloads the list
        let Err(e) = self.session.create_conversation().await else {
            return;
        };
        warn!(error = %e, "Could not start a conversation");
        self.notify_error(format!("Could not start a conversation: {}", e));
        if let Err(e) = self.session.refresh_conversations().await {
            warn!(error = %e, "Could not load conversations");
        }
    }

    /// Handle key input
    pub async fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return ConversationAction::Exit;
        }
        if self.show_help {
            self.show_help = false;
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_add(5);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_sub(5);
                return ConversationAction::None;
            }
            KeyCode::Tab if !self.composer.palette_open() => {
                self.toggle_history_focus();
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.focus {
            Focus::HistorySearch => {
                self.handle_search_key(key);
                ConversationAction::None
            }
            Focus::Composer => {
                if key.code == KeyCode::Esc {
                    return ConversationAction::Exit;
                }
                match self.composer.handle_key(key) {
                    ConversationResult::Submitted(input) => {
                        self.submit(&input).await;
                        ConversationAction::None
                    }
                    ConversationResult::Command(command) => self.handle_slash_command(command).await,
                    ConversationResult::None => ConversationAction::None,
                }
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let mut term = self.history.input().to_string();
        match key.code {
            KeyCode::Esc => {
                self.set_focus(Focus::Composer);
                return;
            }
            KeyCode::Enter => {
                let fetch = self.history.fetch_now(&term);
                self.spawn_history(fetch);
                return;
            }
            KeyCode::Backspace => {
                term.pop();
            }
            KeyCode::Char(c) => term.push(c),
            _ => return,
        }
        self.history.on_input(&term, Instant::now());
    }

    fn toggle_history_focus(&mut self) {
        match self.focus {
            Focus::Composer => self.open_history(None),
            Focus::HistorySearch => self.set_focus(Focus::Composer),
        }
    }

    fn open_history(&mut self, term: Option<&str>) {
        self.sidebar = SidebarMode::History;
        self.set_focus(Focus::HistorySearch);
        let term = term.map(str::to_string).unwrap_or_else(|| self.history.input().to_string());
        let fetch = self.history.fetch_now(&term);
        self.spawn_history(fetch);
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.composer.set_focus(focus == Focus::Composer);
    }

    /// Send a chat message; the reply arrives later as `AppEvent::SendFinished`
    pub async fn submit(&mut self, input: &str) {
        let blank = input.trim().is_empty();
        if !blank && self.session.active().is_none() && !self.session.is_pending() {
            if let Err(e) = self.session.create_conversation().await {
                self.notify_error(format!("Could not start a conversation: {}", e));
                return;
            }
        }

        match self.session.begin_send(input) {
            Ok(ticket) => {
                self.scroll = 0;
                self.notice = None;
                self.typing.start(Instant::now());
                self.spawn_send(ticket);
            }
            Err(e) => self.notify_error(e.to_string()),
        }
    }

    fn spawn_send(&self, ticket: SendTicket) {
        let api = self.session.api();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = api.send_message(&ticket.conversation_id, &ticket.text).await;
            let _ = events.send(AppEvent::SendFinished(ticket, result));
        });
    }

    fn spawn_history(&self, fetch: HistoryFetch) {
        let api = self.session.api();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = fetch.run(api.as_ref()).await;
            let _ = events.send(AppEvent::HistoryLoaded(fetch, result));
        });
    }

    /// Apply the result of a background request
    pub async fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::SendFinished(ticket, result) => match self.session.complete_send(ticket, result) {
                SendOutcome::Replied(_) => {
                    self.scroll = 0;
                    if let Err(e) = self.session.refresh_conversations().await {
                        debug!(error = %e, "Conversation list refresh failed");
                    }
                }
                SendOutcome::Failed(message) => self.notify_error(message),
                SendOutcome::Discarded => {}
            },
            AppEvent::HistoryLoaded(fetch, Ok(page)) => {
                self.history.apply(&fetch, page);
            }
            AppEvent::HistoryLoaded(fetch, Err(e)) => {
                warn!(seq = fetch.seq, error = %e, "History request failed");
                self.notify_error(format!("History unavailable: {}", e));
            }
        }
        self.typing.sync(self.session.transcript().is_typing(), Instant::now());
    }

    /// Per-frame housekeeping: typing indicator and debounced history search
    pub fn tick(&mut self, now: Instant) {
        self.typing.sync(self.session.transcript().is_typing(), now);
        if let Some(fetch) = self.history.poll(now) {
            self.spawn_history(fetch);
        }
    }

    /// Handle slash commands
    async fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match self.run_command(&command).await {
            Ok(Some(message)) => self.notify(message),
            Ok(None) => {}
            Err(e) => {
                if !e.is_local() {
                    warn!(command = command.command.command(), error = %e, "Command failed");
                }
                self.notify_error(e.to_string());
            }
        }

        if command.command == SlashCommand::Quit {
            ConversationAction::Exit
        } else {
            ConversationAction::None
        }
    }

    async fn run_command(&mut self, command: &ParsedCommand) -> Result<Option<String>> {
        match command.command {
            SlashCommand::New => {
                self.session.create_conversation().await?;
                self.scroll = 0;
                Ok(Some("Started a new conversation".to_string()))
            }
            SlashCommand::Chats => {
                self.sidebar = SidebarMode::Conversations;
                self.set_focus(Focus::Composer);
                self.session.refresh_conversations().await?;
                Ok(None)
            }
            SlashCommand::Open => {
                let n = command
                    .index()?
                    .ok_or_else(|| Error::Validation("Usage: /open <n>".to_string()))?;
                let id = self.conversation_at(n)?;
                self.session.load_conversation(&id).await?;
                self.scroll = 0;
                Ok(Some(format!("Opened '{}'", self.session.display_title())))
            }
            SlashCommand::Delete => {
                let id = match command.index()? {
                    Some(n) => self.conversation_at(n)?,
                    None => self
                        .session
                        .active_id()
                        .map(str::to_string)
                        .ok_or_else(|| Error::Validation("No active conversation".to_string()))?,
                };
                self.session.delete_conversation(&id).await?;
                Ok(Some("Conversation deleted".to_string()))
            }
            SlashCommand::Export => {
                let (format, index) = command.export_target()?;
                let message_id = self.answer_at(index)?;
                let path = self.session.export_message(&message_id, format).await?;
                Ok(Some(format!("Saved {} report to {}", format.as_ref(), path.display())))
            }
            SlashCommand::Good | SlashCommand::Bad => {
                let sentiment = if command.command == SlashCommand::Good {
                    Sentiment::Positive
                } else {
                    Sentiment::Negative
                };
                let message_id = self.answer_at(command.index()?)?;
                self.session.quick_feedback(&message_id, sentiment).await?;
                Ok(Some("Thanks for the feedback".to_string()))
            }
            SlashCommand::Feedback => {
                let (rating, comment) = command.rating()?;
                let mut form = FeedbackForm::rating(rating);
                if let Some(comment) = comment {
                    form = form.with_comments(comment);
                }
                let message_id = self.answer_at(None)?;
                self.session.submit_feedback(&message_id, form).await?;
                Ok(Some(format!("Rated the latest answer {}/5", rating)))
            }
            SlashCommand::History => {
                if command.argument() == Some("--clear") {
                    let api = self.session.api();
                    self.history.clear(api.as_ref()).await?;
                    self.sidebar = SidebarMode::History;
                    return Ok(Some("Query history cleared".to_string()));
                }
                self.open_history(Some(command.argument().unwrap_or_default()));
                Ok(None)
            }
            SlashCommand::Save => {
                let path = match command.argument() {
                    Some(path) => PathBuf::from(path),
                    None => self.session.download_dir().join(format!(
                        "conversation-{}.html",
                        Utc::now().format("%Y%m%d-%H%M%S")
                    )),
                };
                self.session.save_transcript_html(&path)?;
                Ok(Some(format!("Transcript saved to {}", path.display())))
            }
            SlashCommand::Help => {
                self.show_help = true;
                Ok(None)
            }
            SlashCommand::Quit => Ok(None),
        }
    }

    fn conversation_at(&self, n: usize) -> Result<String> {
        n.checked_sub(1)
            .and_then(|i| self.session.conversations().get(i))
            .map(|c| c.id.clone())
            .ok_or_else(|| Error::Validation(format!("No conversation #{} in the list", n)))
    }

    /// Answer `n` of the transcript, or the latest one
    fn answer_at(&self, n: Option<usize>) -> Result<MessageId> {
        let found = match n {
            Some(n) => self.session.assistant_message(n),
            None => self.session.latest_assistant_message(),
        };
        match (found, n) {
            (Some(id), _) => Ok(id.clone()),
            (None, Some(n)) => Err(Error::Validation(format!("No answer #{} in this conversation", n))),
            (None, None) => Err(Error::NoResult),
        }
    }

    fn notify(&mut self, text: String) {
        self.notice = Some(Notice {
            text,
            is_error: false,
        });
    }

    fn notify_error(&mut self, text: String) {
        self.notice = Some(Notice {
            text,
            is_error: true,
        });
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn history(&self) -> &HistorySearch {
        &self.history
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.text.as_str())
    }

    fn header_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled(
                "🛡️ Threat Intel ",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(Color::DarkGray)),
            Span::raw(sanitize_terminal(&self.session.display_title())),
            Span::styled(" │ ", Style::default().fg(Color::DarkGray)),
        ];

        match &self.status {
            Some(status) if status.initialized => {
                spans.push(Span::styled("● online", Style::default().fg(Color::Green)));
                spans.push(Span::styled(
                    format!(" │ model {} │ LLM {}", status.model, status.llm_mode),
                    Style::default().fg(Color::Gray),
                ));
            }
            Some(_) => spans.push(Span::styled("◐ initializing", Style::default().fg(Color::Yellow))),
            None => spans.push(Span::styled(
                format!("○ offline ({})", self.api_url),
                Style::default().fg(Color::Red),
            )),
        }
        Line::from(spans)
    }

    /// Render the full screen
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(5),    // Sidebar + transcript
                Constraint::Length(1), // Typing indicator / notice
                Constraint::Length(3), // Composer
            ])
            .split(area);

        Paragraph::new(self.header_line())
            .block(Block::default().borders(Borders::ALL))
            .render(rows[0], buf);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(20)])
            .split(rows[1]);

        Sidebar::new(
            self.sidebar,
            self.session.conversations(),
            self.session.active_id(),
            &self.history,
        )
        .focused(self.focus == Focus::HistorySearch)
        .render(columns[0], buf);

        let title = self.session.display_title();
        ConversationHistory::new(self.session.transcript(), &self.samples, &title)
            .scroll(self.scroll)
            .render(columns[1], buf);

        if self.typing.is_active() {
            self.typing.widget(Instant::now()).render(rows[2], buf);
        } else if let Some(notice) = &self.notice {
            let color = if notice.is_error { Color::Red } else { Color::Cyan };
            let line = Line::from(Span::styled(
                sanitize_terminal(&notice.text),
                Style::default().fg(color),
            ));
            buf.set_line(rows[2].x, rows[2].y, &line, rows[2].width);
        }

        self.composer.render(rows[3], buf);

        if self.show_help {
            self.render_help(area, buf);
        }
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let width = area.width.saturating_sub(8).min(90);
        let height = area.height.saturating_sub(4).min(22);
        let popup = Rect {
            x: area.x + (area.width.saturating_sub(width)) / 2,
            y: area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        };
        Clear.render(popup, buf);
        Paragraph::new(get_help_text())
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help (any key to close)")
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .render(popup, buf);
    }
}
