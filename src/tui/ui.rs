//! UI rendering for the dashboard

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::msg::ViewKind;
use super::update::Model;
use super::views::{timeline, traces, versions};

/// Main draw function: header, active view, footer, overlays
pub fn draw(frame: &mut Frame, model: &Model) {
    let area = frame.area();

    let main_layout = Layout::vertical([
        Constraint::Length(1), // Header
        Constraint::Min(5),    // Content
        Constraint::Length(1), // Footer/status
    ])
    .split(area);

    draw_header(frame, model, main_layout[0]);

    match model.view {
        ViewKind::Versions => versions::draw(frame, model, main_layout[1]),
        ViewKind::Traces => traces::draw(frame, model, main_layout[1]),
        ViewKind::Timeline => timeline::draw(frame, model, main_layout[1]),
    }

    draw_footer(frame, model, main_layout[2]);

    if model.dialog.is_visible() {
        versions::draw_commit_dialog(frame, model, area);
    }
    if model.help_open {
        draw_help_overlay(frame, area);
    }
}

fn draw_header(frame: &mut Frame, model: &Model, area: Rect) {
    let mut spans = vec![Span::styled(
        " agensight studio ",
        Style::default().fg(Color::White).bold(),
    )];
    for (i, view) in ViewKind::ALL.iter().enumerate() {
        let label = format!(" {} {} ", i + 1, view.title());
        let style = if *view == model.view {
            Style::default().fg(Color::Black).bg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::raw("│"));
        spans.push(Span::styled(label, style));
    }
    if let Some(version) = model.versions.selected() {
        spans.push(Span::raw("│ "));
        spans.push(Span::styled(
            format!("v{}", version),
            Style::default().fg(Color::Yellow),
        ));
    }
    if model.versions.is_fallback() || model.traces_fallback || model.detail_fallback {
        spans.push(Span::styled(
            "  [offline data]",
            Style::default().fg(Color::LightRed),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Blue));
    frame.render_widget(header, area);
}

fn keybinds(view: ViewKind) -> &'static str {
    match view {
        ViewKind::Versions => "j/k:move  Enter:select  c:commit  s:sync  r:refresh  Tab:view  ?:help  q:quit",
        ViewKind::Traces => "j/k:move  Enter:open timeline  r:refresh  Tab:view  ?:help  q:quit",
        ViewKind::Timeline => {
            "j/k:focus  Enter:select  t/T:tools  b:back  Esc:clear  r:reload  ?:help  q:quit"
        }
    }
}

fn draw_footer(frame: &mut Frame, model: &Model, area: Rect) {
    let text = model
        .status_message
        .clone()
        .unwrap_or_else(|| keybinds(model.view).to_string());

    let footer = Paragraph::new(format!(" {}", text))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(footer, area);
}

/// Rectangle of the given size centered in `area`
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 26, area);
    frame.render_widget(Clear, popup_area);

    let help_text = r#"
  Global
  ─────────────────────────────────
  1/2/3, Tab   Switch view
  j/k, ↑/↓     Move
  Enter        Activate
  r            Refresh
  ?            Toggle help
  q, Ctrl+c    Quit

  Versions
  ─────────────────────────────────
  c            Commit selected version
  s            Sync selected version to main

  Commit dialog
  ─────────────────────────────────
  Tab          Toggle "sync to main"
  Enter / Esc  Submit / cancel

  Timeline
  ─────────────────────────────────
  t / T        Next / previous tool
  b            Back to owning span
  Esc          Clear selection
"#;

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(help, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fits() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(60, 20, area);
        assert_eq!(rect, Rect::new(20, 10, 60, 20));

        let small = centered_rect(60, 20, Rect::new(0, 0, 30, 10));
        assert!(small.width <= 28 && small.height <= 8);
    }

    #[test]
    fn test_keybinds_mention_view_keys() {
        assert!(keybinds(ViewKind::Versions).contains("c:commit"));
        assert!(keybinds(ViewKind::Timeline).contains("t/T"));
    }
}
