//! Traces view - table of recorded traces

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use crate::model::Trace;
use crate::tui::update::Model;

/// Metadata summary as `key: value` pairs joined for one table cell
pub fn metadata_cell(trace: &Trace) -> String {
    match trace.metadata_summary() {
        Some(pairs) if !pairs.is_empty() => pairs
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("  "),
        Some(_) => String::new(),
        None => "Invalid metadata".to_string(),
    }
}

/// Draw the trace table
pub fn draw(frame: &mut Frame, model: &Model, area: Rect) {
    let title = if model.traces_fallback {
        " Traces [demo data] "
    } else {
        " Traces "
    };
    let block = Block::default()
        .title(title)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    if model.traces.is_empty() {
        let text = if model.traces_loading {
            "Loading traces..."
        } else {
            "No traces recorded yet."
        };
        let empty = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    let visible = area.height.saturating_sub(3) as usize;
    let skip = model.trace_index.saturating_sub(visible.saturating_sub(1));

    let header = Row::new(["ID", "Name", "Session", "Latency", "Metadata"])
        .style(Style::default().fg(Color::Yellow).bold());
    let rows: Vec<Row> = model
        .traces
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible.max(1))
        .map(|(idx, trace)| {
            let style = if idx == model.trace_index {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(vec![
                Cell::from(trace.id.clone()),
                Cell::from(trace.name.clone()),
                Cell::from(trace.session_id.clone()),
                Cell::from(trace.latency_label()),
                Cell::from(metadata_cell(trace)),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Percentage(28),
            Constraint::Length(22),
            Constraint::Length(10),
            Constraint::Min(20),
        ],
    )
    .header(header)
    .block(block);
    frame.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback;

    #[test]
    fn test_metadata_cell() {
        let traces = fallback::demo_traces();
        let cell = metadata_cell(&traces[0]);
        assert!(cell.contains("status: completed"));
        assert!(cell.contains("user_id: usr_123456"));

        let mut broken = traces[0].clone();
        broken.metadata = "{not json".to_string();
        assert_eq!(metadata_cell(&broken), "Invalid metadata");
    }
}
