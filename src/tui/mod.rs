pub mod app;
pub mod event;
pub mod layout;

use std::io::{self, Stdout};
use std::time::Instant;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, MouseButton, MouseEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::debug;

use crate::app::{AppContext, Result};
use crate::config::DisplayConfig;
use crate::scheduler::{Batch, PollScheduler};

use self::app::TuiApp;
use self::event::{Action, AppEvent, EventHandler};

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub async fn run(ctx: AppContext) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, ctx).await;
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(terminal: &mut Tui, ctx: AppContext) -> Result<()> {
    let config = ctx.config.clone();
    let size = terminal.size()?;
    let mut tui_app = TuiApp::new(size.width, size.height);
    tui_app.stage.set_seen_limit(config.polling.max_history);
    let event_handler = EventHandler::new(config.display.tick_rate());

    let (mut scheduler, mut batches) = PollScheduler::new(ctx.aggregator(), config.clone());
    scheduler.start().await;

    let mut last_tick = Instant::now();

    loop {
        drain_batches(
            &mut tui_app,
            &mut batches,
            scheduler.generation(),
            &config.display,
        );
        tui_app.last_error = scheduler.last_error().map(|e| e.to_string());

        terminal.draw(|frame| layout::render(frame, &tui_app, &config))?;

        match event_handler.next()? {
            AppEvent::Key(key) => match config.keybindings.get_action(&key) {
                Action::Quit => {
                    tui_app.should_quit = true;
                }
                Action::TogglePause => {
                    tui_app.toggle_pause();
                    tui_app.status_message = None;
                }
                Action::Restart => {
                    // Batches still queued from before carry the old generation
                    // and are dropped by the next drain.
                    scheduler.stop();
                    tui_app.restart();
                    scheduler.start().await;
                }
                Action::OpenLatest => {
                    if let Some(link) = tui_app.latest.as_ref().map(|p| p.permalink()) {
                        open_link(&mut tui_app, &link);
                    }
                }
                Action::None => {}
            },
            AppEvent::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Moved => {
                    tui_app.hover(mouse.column, mouse.row);
                }
                MouseEventKind::Down(MouseButton::Left) => {
                    if let Some(link) =
                        tui_app.link_at_cell(mouse.column, mouse.row, &config.display)
                    {
                        open_link(&mut tui_app, &link);
                    }
                }
                _ => {}
            },
            AppEvent::Resize(cols, rows) => {
                tui_app.resize(cols, rows);
            }
            AppEvent::Tick => {}
        }

        if last_tick.elapsed() >= event_handler.tick_rate() {
            tui_app.tick(config.display.speed);
            last_tick = Instant::now();
        }

        if tui_app.should_quit {
            break;
        }
    }

    scheduler.stop();
    Ok(())
}

/// Hand queued batches to the stage, skipping ones from before a restart.
fn drain_batches(
    tui_app: &mut TuiApp,
    batches: &mut mpsc::UnboundedReceiver<Batch>,
    generation: u64,
    display: &DisplayConfig,
) {
    while let Ok(batch) = batches.try_recv() {
        if batch.generation != generation {
            debug!(
                stale = batch.generation,
                current = generation,
                posts = batch.posts.len(),
                "Dropping batch from before restart"
            );
            continue;
        }
        tui_app.ingest(batch.posts, display);
    }
}

fn open_link(tui_app: &mut TuiApp, link: &str) {
    match open::that(link) {
        Ok(()) => tui_app.set_status(format!("Opened {}", link)),
        Err(e) => tui_app.set_status(format!("Failed to open browser: {}", e)),
    }
}
