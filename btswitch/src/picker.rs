/*!
 * Terminal device picker
 * Full-screen selection on the alternate screen, driven by crossterm events
 */

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use btswitch_core::{Device, DevicePicker, PickError};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::{App, Outcome, PickMode};
use crate::ui::render_ui;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SPINNER_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default)]
pub struct TerminalPicker;

impl TerminalPicker {
    pub fn new() -> Self {
        Self
    }

    async fn run(
        &self,
        app: App,
        updates: Option<mpsc::Receiver<Vec<Device>>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>, PickError> {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || event_loop(app, updates, &cancel))
            .await
            .map_err(|e| PickError::Terminal(io::Error::other(e)))?
    }
}

/// Raw mode and the alternate screen, undone on drop so every exit path
/// leaves the terminal usable.
struct Session {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Session {
    fn open() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn event_loop(
    mut app: App,
    mut updates: Option<mpsc::Receiver<Vec<Device>>>,
    cancel: &CancellationToken,
) -> Result<Vec<Device>, PickError> {
    let mut session = Session::open()?;
    let mut last_tick = Instant::now();

    loop {
        if cancel.is_cancelled() {
            debug!(title = %app.title, "picker cancelled by caller");
            return Err(PickError::Canceled);
        }

        if let Some(rx) = updates.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(devices) => app.update_devices(devices),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        updates = None;
                        break;
                    }
                }
            }
        }

        if last_tick.elapsed() >= SPINNER_INTERVAL {
            app.tick();
            last_tick = Instant::now();
        }

        session.terminal.draw(|f| render_ui(f, &app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match app.handle_key(key) {
                    Outcome::Continue => {}
                    Outcome::Picked(devices) => return Ok(devices),
                    Outcome::Canceled => return Err(PickError::Canceled),
                }
            }
        }
    }
}

fn first(mut devices: Vec<Device>) -> Result<Device, PickError> {
    if devices.is_empty() {
        return Err(PickError::Canceled);
    }
    Ok(devices.swap_remove(0))
}

#[async_trait]
impl DevicePicker for TerminalPicker {
    async fn pick_one(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        let app = App::new(title, PickMode::Single, devices);
        first(self.run(app, None, cancel).await?)
    }

    async fn pick_many(
        &self,
        title: &str,
        devices: Vec<Device>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Device>, PickError> {
        let app = App::new(title, PickMode::Multi, devices);
        self.run(app, None, cancel).await
    }

    async fn pick_from_stream(
        &self,
        title: &str,
        updates: mpsc::Receiver<Vec<Device>>,
        cancel: &CancellationToken,
    ) -> Result<Device, PickError> {
        let app = App::new(title, PickMode::Stream, Vec::new());
        first(self.run(app, Some(updates), cancel).await?)
    }
}
