use std::collections::{BTreeMap, HashSet};

use btswitch_core::Device;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_input::{Input, InputRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    Single,
    Multi,
    /// Single choice over a list that keeps being replaced.
    Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue,
    Picked(Vec<Device>),
    Canceled,
}

/// Picker state, independent of the terminal.
pub struct App {
    pub title: String,
    pub mode: PickMode,
    pub input: Input,
    /// Index into `filtered`.
    pub selected: usize,
    /// True in stream mode until the first non-empty update.
    pub searching: bool,
    pub spinner_step: usize,
    devices: Vec<Device>,
    filtered: Vec<Device>,
    checked: HashSet<String>,
}

impl App {
    pub fn new(title: &str, mode: PickMode, devices: Vec<Device>) -> Self {
        let mut app = Self {
            title: title.to_string(),
            mode,
            input: Input::default(),
            selected: 0,
            searching: mode == PickMode::Stream,
            spinner_step: 0,
            devices: arrange(title, devices),
            filtered: Vec::new(),
            checked: HashSet::new(),
        };
        app.apply_filter();
        app
    }

    pub fn filtered(&self) -> &[Device] {
        &self.filtered
    }

    pub fn is_checked(&self, device: &Device) -> bool {
        self.checked.contains(&device.address)
    }

    pub fn query(&self) -> &str {
        self.input.value().trim()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Outcome {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Outcome::Canceled,
            KeyCode::Char('c') if ctrl => return Outcome::Canceled,
            KeyCode::Enter => return self.confirm(),
            KeyCode::Up => self.previous(),
            KeyCode::Char('p') if ctrl => self.previous(),
            KeyCode::Down => self.next(),
            KeyCode::Char('n') if ctrl => self.next(),
            KeyCode::Char(' ') if self.mode == PickMode::Multi => self.toggle(),
            _ => {
                if let Some(request) = input_request(key) {
                    if self.input.handle(request).is_some() {
                        self.apply_filter();
                    }
                }
            }
        }
        Outcome::Continue
    }

    /// Replaces the list with a fresh discovery snapshot.
    pub fn update_devices(&mut self, devices: Vec<Device>) {
        self.devices = normalize(devices);
        if !self.devices.is_empty() {
            self.searching = false;
        }
        self.apply_filter();
    }

    pub fn tick(&mut self) {
        if self.searching {
            self.spinner_step = (self.spinner_step + 1) % 4;
        }
    }

    fn previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn next(&mut self) {
        if self.selected + 1 < self.filtered.len() {
            self.selected += 1;
        }
    }

    fn toggle(&mut self) {
        if let Some(device) = self.filtered.get(self.selected) {
            if !self.checked.remove(&device.address) {
                self.checked.insert(device.address.clone());
            }
        }
    }

    fn confirm(&self) -> Outcome {
        match self.mode {
            // Only what is checked and still visible.
            PickMode::Multi => Outcome::Picked(
                self.filtered
                    .iter()
                    .filter(|d| self.checked.contains(&d.address))
                    .cloned()
                    .collect(),
            ),
            PickMode::Single | PickMode::Stream => match self.filtered.get(self.selected) {
                Some(device) => Outcome::Picked(vec![device.clone()]),
                None => Outcome::Continue,
            },
        }
    }

    fn apply_filter(&mut self) {
        let query = self.query().to_lowercase();
        self.filtered = self
            .devices
            .iter()
            .filter(|d| query.is_empty() || search_key(d).contains(&query))
            .cloned()
            .collect();
        if self.selected >= self.filtered.len() {
            self.selected = self.filtered.len().saturating_sub(1);
        }
    }
}

fn search_key(device: &Device) -> String {
    format!("{} {}", device.name, device.address)
        .trim()
        .to_lowercase()
}

/// Hides devices the action cannot apply to and orders the rest.
fn arrange(title: &str, devices: Vec<Device>) -> Vec<Device> {
    let mut devices: Vec<Device> = devices
        .into_iter()
        .filter(|d| match title {
            "Connect" => !d.connected,
            "Disconnect" => d.connected,
            _ => true,
        })
        .collect();
    let connected_first = title.starts_with("Repair:");
    devices.sort_by(|a, b| {
        let by_state = if connected_first {
            b.connected.cmp(&a.connected)
        } else {
            std::cmp::Ordering::Equal
        };
        by_state.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    devices
}

/// One entry per address, nameless or addressless entries dropped, sorted by name.
fn normalize(devices: Vec<Device>) -> Vec<Device> {
    let mut by_address = BTreeMap::new();
    for device in devices {
        let address = device.address.trim();
        if address.is_empty() || device.name.trim().is_empty() {
            continue;
        }
        by_address.insert(address.to_string(), device);
    }
    let mut devices: Vec<Device> = by_address.into_values().collect();
    devices.sort_by_key(|d| d.name.to_lowercase());
    devices
}

fn input_request(key: KeyEvent) -> Option<InputRequest> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let request = match key.code {
        KeyCode::Char('u') if ctrl => InputRequest::DeleteLine,
        KeyCode::Char('w') if ctrl => InputRequest::DeletePrevWord,
        KeyCode::Char('a') if ctrl => InputRequest::GoToStart,
        KeyCode::Char('e') if ctrl => InputRequest::GoToEnd,
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => InputRequest::InsertChar(c),
        KeyCode::Backspace => InputRequest::DeletePrevChar,
        KeyCode::Delete => InputRequest::DeleteNextChar,
        KeyCode::Left => InputRequest::GoToPrevChar,
        KeyCode::Right => InputRequest::GoToNextChar,
        KeyCode::Home => InputRequest::GoToStart,
        KeyCode::End => InputRequest::GoToEnd,
        _ => return None,
    };
    Some(request)
}
