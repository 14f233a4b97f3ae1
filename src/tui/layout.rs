use chrono::Utc;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::Paragraph,
    Frame,
};

use crate::config::{ColorConfig, Config, PollingConfig};
use crate::domain::{Chain, DisplayItem};
use crate::tui::app::{
    badge_label, body_label, crypto_badges, handle_label, item_column, max_label_cells, TuiApp,
    CELL_HEIGHT, STATUS_ROWS,
};

pub fn render(frame: &mut Frame, app: &TuiApp, config: &Config) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),              // Stage
            Constraint::Length(STATUS_ROWS), // Status bar
        ])
        .split(frame.area());

    render_stage(frame.buffer_mut(), app, chunks[0], config);
    render_status_bar(frame, app, chunks[1], config);
}

fn render_stage(buf: &mut Buffer, app: &TuiApp, area: Rect, config: &Config) {
    let now = Utc::now();
    let max_cells = max_label_cells(&config.display);

    for item in app.stage.items() {
        let row = (item.y / CELL_HEIGHT).floor();
        if row < 0.0 || row >= area.height as f64 {
            continue;
        }
        let row = row as u16;

        let (handle_style, text_style) = item_styles(item, &config.colors);
        let mut segments = vec![(handle_label(&item.post), handle_style)];
        for address in crypto_badges(&item.post, &config.display) {
            let style = badge_style(item, address.chain, &config.colors);
            segments.push((badge_label(address.chain), style));
        }
        segments.push((body_label(&item.post, now), text_style));

        // Segments share one width budget, left to right.
        let mut col = item_column(item);
        let mut budget = max_cells;
        for (text, style) in segments {
            let shown: String = text.chars().take(budget).collect();
            let len = shown.chars().count();
            draw_clipped(buf, area, col, row, &shown, style);
            col += len as i64;
            budget -= len;
        }
    }
}

fn badge_style(item: &DisplayItem, chain: Chain, colors: &ColorConfig) -> Style {
    if item.paused {
        return item_styles(item, colors).0;
    }
    let color = match chain {
        Chain::Solana => colors.sol_badge,
        Chain::Evm => colors.evm_badge,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn item_styles(item: &DisplayItem, colors: &ColorConfig) -> (Style, Style) {
    if item.paused {
        let style = Style::default()
            .fg(colors.paused)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        return (style, style);
    }

    let handle_color = if item.post.is_verified == Some(true) {
        colors.verified
    } else {
        colors.handle
    };
    (
        Style::default().fg(handle_color).add_modifier(Modifier::BOLD),
        Style::default().fg(colors.text),
    )
}

/// Draw `text` starting at a column that may lie left of or beyond the area.
fn draw_clipped(buf: &mut Buffer, area: Rect, col: i64, row: u16, text: &str, style: Style) {
    let skip = (-col).max(0) as usize;
    let start = col.max(0);
    if start >= area.width as i64 {
        return;
    }

    let visible: String = text.chars().skip(skip).collect();
    if visible.is_empty() {
        return;
    }

    let start = start as u16;
    buf.set_stringn(
        area.x + start,
        area.y + row,
        visible,
        (area.width - start) as usize,
        style,
    );
}

fn render_status_bar(frame: &mut Frame, app: &TuiApp, area: Rect, config: &Config) {
    let colors = &config.colors;
    let base = Style::default().fg(colors.status_fg).bg(colors.status_bg);

    let (status, style) = if let Some(ref err) = app.last_error {
        (format!("Error: {}", err), base.fg(colors.error))
    } else if let Some(ref msg) = app.status_message {
        (msg.clone(), base)
    } else {
        let state = if app.paused { "PAUSED" } else { "live" };
        (
            format!(
                "{}  {} on stage  {} accepted  every {}  {}  p:Pause  r:Restart  o:Open latest  q:Quit",
                state,
                app.stage.len(),
                app.accepted_total,
                PollingConfig::format_interval(config.polling.interval_secs()),
                config.provider.kind,
            ),
            base,
        )
    };

    frame.render_widget(Paragraph::new(status).style(style), area);
}
