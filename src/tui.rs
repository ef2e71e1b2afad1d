//! Terminal front-end
//!
//! Renders every state snapshot the runtime broadcasts and turns key presses
//! into reducer events. Logging goes to a file, never to this terminal.

pub mod app;
pub mod markdown;
pub mod palette;
pub mod render;

use crate::state_machine::{ConversationState, Event};
use app::{Action, App};
use crossterm::event::{Event as TermEvent, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stderr};
use tokio::sync::{broadcast, mpsc};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

pub fn init() -> io::Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(io::stderr()))
}

pub fn restore() -> io::Result<()> {
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()
}

/// Put the terminal back before a panic message is printed
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

/// Draw and handle input until the user quits or the runtime goes away
pub async fn run(
    terminal: &mut Tui,
    mut state: ConversationState,
    mut updates: broadcast::Receiver<ConversationState>,
    events: mpsc::Sender<Event>,
) -> io::Result<()> {
    let mut app = App::default();
    let mut input = EventStream::new();

    loop {
        terminal.draw(|frame| render::draw(frame, &mut app, &state))?;

        tokio::select! {
            update = updates.recv() => match update {
                Ok(next) => state = next,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Renderer skipped stale snapshots");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            term_event = input.next() => match term_event {
                Some(Ok(TermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                    let event = match app.handle_key(key, &state) {
                        Action::None => continue,
                        Action::Quit => break,
                        Action::Submit(text) => Event::Submit { text },
                        Action::ToggleTheme => Event::ToggleTheme,
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                // Resize and the rest only need a redraw
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }

    tracing::info!("Front-end closed");
    Ok(())
}
