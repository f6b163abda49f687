/*!
 * Device picker rendering
 * Title, filter box, device list, key help
 */

use btswitch_core::Device;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, PickMode};

// Conservative color palette
const BLUE: Color = Color::Rgb(100, 149, 237);
const GRAY: Color = Color::Rgb(128, 128, 128);
const WHITE: Color = Color::Rgb(255, 255, 255);
const GREEN: Color = Color::Rgb(34, 139, 34);

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(1), // Status
            Constraint::Length(3), // Filter box
            Constraint::Min(3),    // Devices
            Constraint::Length(1), // Key help
        ])
        .split(f.area());

    f.render_widget(
        Paragraph::new(Span::styled(
            app.title.as_str(),
            Style::default().fg(WHITE).add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );
    render_status(f, chunks[1], app);
    render_filter(f, chunks[2], app);
    render_devices(f, chunks[3], app);
    f.render_widget(
        Paragraph::new(Span::styled(help_text(app.mode), Style::default().fg(GRAY))),
        chunks[4],
    );
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let status = if app.searching {
        Span::styled(
            format!("searching{}", ".".repeat(app.spinner_step)),
            Style::default().fg(BLUE),
        )
    } else {
        Span::styled(
            format!("{} device(s)", app.filtered().len()),
            Style::default().fg(GRAY),
        )
    };
    f.render_widget(Paragraph::new(status), area);
}

fn render_filter(f: &mut Frame, area: Rect, app: &App) {
    // Inner width, minus the borders and the cursor cell.
    let width = area.width.saturating_sub(3) as usize;
    let scroll = app.input.visual_scroll(width);

    let (text, style) = if app.input.value().is_empty() {
        ("search", Style::default().fg(GRAY))
    } else {
        (app.input.value(), Style::default().fg(WHITE))
    };
    let filter = Paragraph::new(text)
        .style(style)
        .scroll((0, scroll as u16))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Filter")
                .border_style(Style::default().fg(BLUE)),
        );
    f.render_widget(filter, area);

    let cursor = app.input.visual_cursor().saturating_sub(scroll) as u16;
    f.set_cursor_position((area.x + 1 + cursor, area.y + 1));
}

fn render_devices(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Devices")
        .border_style(Style::default().fg(GRAY));

    if app.filtered().is_empty() {
        let message = match app.query() {
            _ if app.searching => String::new(),
            "" => "(no devices found)".to_string(),
            query => format!("(no matches for {query:?})"),
        };
        let empty = Paragraph::new(Span::styled(message, Style::default().fg(GRAY))).block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .filtered()
        .iter()
        .enumerate()
        .map(|(i, device)| device_item(app, device, i == app.selected))
        .collect();

    let list = List::new(items).block(block);
    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn device_item<'a>(app: &App, device: &'a Device, selected: bool) -> ListItem<'a> {
    let prefix = if selected { "▶ " } else { "  " };
    let name = if device.name.is_empty() {
        "(unknown)"
    } else {
        device.name.as_str()
    };

    let mut spans = vec![Span::raw(prefix)];
    if app.mode == PickMode::Multi {
        let check = if app.is_checked(device) { "[x] " } else { "[ ] " };
        spans.push(Span::styled(check, Style::default().fg(BLUE)));
    }
    let status_indicator = if device.connected { "●" } else { "○" };
    let status_color = if device.connected { GREEN } else { GRAY };
    spans.push(Span::styled(status_indicator, Style::default().fg(status_color)));
    spans.push(Span::raw(" "));
    spans.push(Span::styled(name, Style::default().fg(WHITE)));
    if !device.address.trim().is_empty() {
        spans.push(Span::styled(
            format!("  {}", device.address),
            Style::default().fg(GRAY),
        ));
    }
    if let Some(rssi) = device.rssi {
        spans.push(Span::styled(format!("  {rssi} dBm"), Style::default().fg(GRAY)));
    }

    let item = ListItem::new(Line::from(spans));
    if selected {
        item.style(Style::default().bg(BLUE).fg(WHITE))
    } else {
        item
    }
}

fn help_text(mode: PickMode) -> &'static str {
    match mode {
        PickMode::Multi => {
            "type to filter • ↑/↓ (ctrl+p/ctrl+n) move • space toggle • enter confirm • esc cancel"
        }
        PickMode::Single | PickMode::Stream => {
            "type to filter • ↑/↓ (ctrl+p/ctrl+n) move • enter select • esc cancel"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|f| render_ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_title_devices_and_help() {
        let app = App::new(
            "Connect",
            PickMode::Single,
            vec![Device::new("MX Keys", "aa:bb")],
        );
        let text = screen(&app);
        assert!(text.contains("Connect"));
        assert!(text.contains("MX Keys"));
        assert!(text.contains("aa:bb"));
        assert!(text.contains("enter select"));
    }

    #[test]
    fn stream_shows_searching_before_first_update() {
        let app = App::new("Pair: select device", PickMode::Stream, Vec::new());
        assert!(screen(&app).contains("searching"));
    }

    #[test]
    fn multi_mode_shows_checkboxes() {
        let app = App::new(
            "Disconnect",
            PickMode::Multi,
            vec![Device {
                connected: true,
                ..Device::new("AirPods", "cc:dd")
            }],
        );
        assert!(screen(&app).contains("[ ] ● AirPods"));
    }
}
