use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as CEvent},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::ThreatIntelApi;
use crate::config::Config;
use crate::history::HistorySearch;
use crate::session::SessionManager;
use crate::ui::conversation::{AppEvent, ConversationAction, ConversationManager};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Run the interactive chat until the user quits
pub async fn run_tui(config: &Config, api: Arc<dyn ThreatIntelApi>) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AppEvent>();

    let session = SessionManager::new(Arc::clone(&api), config.resolved_download_dir());
    let history = HistorySearch::new(config.history_debounce());
    let mut manager = ConversationManager::new(session, history, config.api_base_url.clone(), event_tx);

    let (status, samples) = futures::join!(api.status(), api.samples());
    let status = status
        .inspect_err(|e| warn!(error = %e, "Service status unavailable"))
        .ok();
    let samples = samples
        .inspect_err(|e| warn!(error = %e, "Sample questions unavailable"))
        .unwrap_or_default();
    manager.set_service_info(status, samples);
    manager.start().await;

    let mut stdout = io::stdout();
    enable_raw_mode().context("Failed to enable raw mode")?;
    stdout.execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    info!(api = %config.api_base_url, "Terminal UI started");

    let result = event_loop(&mut terminal, &mut manager, &mut event_rx).await;

    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!("Terminal UI stopped");
    result
}

async fn event_loop(
    terminal: &mut Tui,
    manager: &mut ConversationManager,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        while let Ok(evt) = event_rx.try_recv() {
            manager.apply(evt).await;
        }
        manager.tick(Instant::now());

        terminal.draw(|frame| {
            let area = frame.size();
            manager.render(area, frame.buffer_mut());
        })?;

        if event::poll(Duration::from_millis(60))? {
            if let CEvent::Key(key) = event::read()? {
                if manager.handle_key(key).await == ConversationAction::Exit {
                    return Ok(());
                }
            }
        }
    }
}
