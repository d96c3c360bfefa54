//! Timeline view - Gantt chart of a trace's agent spans
//!
//! Layout is taken from [`TimelineModel`] as axis fractions and mapped onto
//! terminal columns with [`bar_columns`]; this module only decides glyphs and
//! colours.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::model::{value_text, TraceDetail};
use crate::selection::Selection;
use crate::timeline::{bar_columns, Lane, SpanBar, TimelineModel};
use crate::tui::update::Model;

/// Width of the span-name column left of the chart
pub const LABEL_WIDTH: u16 = 18;

const SPAN_GLYPH: char = '█';
const TOOL_GLYPH: char = '▓';

/// `#rrggbb` → RGB colour; anything else renders grey
pub fn hex_color(hex: &str) -> Color {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return Color::Gray;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

/// Tick labels spread across `cols`, dropping any that would overlap
pub fn tick_line(marks: &[String], cols: usize) -> String {
    let mut line = String::new();
    let n = marks.len();
    for (k, mark) in marks.iter().enumerate() {
        let width = mark.chars().count();
        let anchor = if n > 1 {
            k * cols.saturating_sub(1) / (n - 1)
        } else {
            0
        };
        let start = anchor.min(cols.saturating_sub(width));
        let used = line.chars().count();
        if used > 0 && start <= used {
            continue;
        }
        line.extend(std::iter::repeat(' ').take(start - used));
        line.push_str(mark);
    }
    line
}

/// One chart cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub glyph: char,
    pub color: Color,
    pub highlight: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            color: Color::Reset,
            highlight: false,
        }
    }
}

/// Cells for one span row; tools are painted over the span bar
pub fn bar_cells(bar: &SpanBar, cols: u16, selected_tool: Option<usize>) -> Vec<Cell> {
    let mut cells = vec![Cell::default(); cols as usize];
    let mut paint = |offset: f64, width: f64, cell: Cell| {
        let (start, len) = bar_columns(offset, width, cols);
        for c in cells.iter_mut().skip(start as usize).take(len as usize) {
            *c = cell;
        }
    };

    paint(
        bar.offset,
        bar.width,
        Cell {
            glyph: SPAN_GLYPH,
            color: hex_color(&bar.color),
            highlight: false,
        },
    );
    for tool in &bar.tools {
        paint(
            tool.offset,
            tool.width,
            Cell {
                glyph: TOOL_GLYPH,
                color: hex_color(&tool.color),
                highlight: selected_tool == Some(tool.index),
            },
        );
    }
    cells
}

fn cells_to_spans(cells: &[Cell]) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut run = String::new();
    let mut current: Option<Cell> = None;
    for cell in cells {
        let same = current.is_some_and(|c| c.color == cell.color && c.highlight == cell.highlight);
        if !same {
            if let Some(c) = current {
                spans.push(Span::styled(std::mem::take(&mut run), cell_style(c)));
            }
            current = Some(*cell);
        }
        run.push(cell.glyph);
    }
    if let Some(c) = current {
        spans.push(Span::styled(run, cell_style(c)));
    }
    spans
}

fn cell_style(cell: Cell) -> Style {
    let style = Style::default().fg(cell.color);
    if cell.highlight {
        style.add_modifier(Modifier::REVERSED)
    } else {
        style
    }
}

fn label(bar: &SpanBar, focused: bool, selected: bool) -> Span<'static> {
    let marker = if focused { '>' } else { ' ' };
    let width = LABEL_WIDTH as usize - 2;
    let mut name: String = bar.name.chars().take(width).collect();
    while name.chars().count() < width {
        name.push(' ');
    }
    let style = if selected {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else if focused {
        Style::default().fg(Color::Cyan).bold()
    } else {
        Style::default().fg(Color::White)
    };
    Span::styled(format!("{}{} ", marker, name), style)
}

/// Chart lines: tick header, then one lane heading and its rows per lane
pub fn chart_lines(model: &Model, timeline: &TimelineModel, cols: u16) -> Vec<Line<'static>> {
    let pad = " ".repeat(LABEL_WIDTH as usize);
    let mut lines = vec![Line::from(Span::styled(
        format!("{}{}", pad, tick_line(&timeline.time_marks, cols as usize)),
        Style::default().fg(Color::DarkGray),
    ))];

    let focused = model.cursor.focused();
    let selected_span = model.cursor.selected_span();
    let selected_tool = model.cursor.selected_tool();

    for (lane, heading) in [(Lane::User, "User"), (Lane::Agent, "Agents")] {
        let bars: Vec<&SpanBar> = timeline.bars.iter().filter(|b| b.lane == lane).collect();
        if bars.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(
            heading.to_string(),
            Style::default().fg(Color::Yellow).bold(),
        )));
        for bar in bars {
            let tool = selected_tool
                .filter(|(span, _)| *span == bar.index)
                .map(|(_, tool)| tool);
            let mut spans = vec![label(
                bar,
                focused == Some(bar.index),
                selected_span == Some(bar.index),
            )];
            spans.extend(cells_to_spans(&bar_cells(bar, cols, tool)));
            lines.push(Line::from(spans));
        }
    }
    lines
}

/// Detail pane text for the current selection
pub fn detail_lines(detail: &TraceDetail, selection: Selection) -> Vec<Line<'static>> {
    let heading = |text: String| Line::from(Span::styled(text, Style::default().bold()));
    let dim = |text: String| Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)));

    match selection {
        Selection::None => {
            let mut lines = vec![heading(detail.trace.name.clone())];
            if !detail.trace_input.is_empty() {
                lines.push(dim("Input".to_string()));
                lines.push(Line::from(detail.trace_input.clone()));
            }
            if !detail.trace_output.is_empty() {
                lines.push(dim("Output".to_string()));
                lines.push(Line::from(detail.trace_output.clone()));
            }
            lines
        }
        Selection::Span { span } => match detail.agents.get(span) {
            Some(s) => {
                let mut lines = vec![
                    heading(s.name.clone()),
                    dim(format!(
                        "span {} · {:.2}s · {} tool call(s)",
                        s.span_id,
                        s.duration,
                        s.tools_called.len()
                    )),
                ];
                if !s.final_completion.is_empty() {
                    lines.push(Line::from(s.final_completion.clone()));
                }
                lines
            }
            None => vec![dim("Span no longer available".to_string())],
        },
        Selection::Tool { span, tool } => {
            match detail.agents.get(span).and_then(|s| s.tools_called.get(tool)) {
                Some(t) => {
                    let mut lines = vec![
                        heading(format!("{} (tool)", t.name)),
                        dim(format!("{:.2}s · press b to go back", t.duration)),
                    ];
                    if !t.args.is_empty() {
                        lines.push(dim("Arguments".to_string()));
                        lines.extend(
                            t.args
                                .iter()
                                .map(|(k, v)| Line::from(format!("  {}: {}", k, value_text(v)))),
                        );
                    }
                    if !t.output.is_empty() {
                        lines.push(dim("Output".to_string()));
                        lines.push(Line::from(t.output.clone()));
                    }
                    lines
                }
                None => vec![dim("Tool call no longer available".to_string())],
            }
        }
    }
}

/// Draw chart and detail pane
pub fn draw(frame: &mut Frame, model: &Model, area: Rect) {
    let rows = Layout::vertical([Constraint::Min(6), Constraint::Length(10)]).split(area);

    let title = match &model.detail {
        Some(detail) => format!(
            " Timeline: {} ({}){} ",
            detail.trace.name,
            detail.trace.latency_label(),
            if model.detail_fallback { " [demo data]" } else { "" }
        ),
        None => " Timeline ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(rows[0]);
    frame.render_widget(block, rows[0]);

    match (&model.detail, &model.timeline) {
        (_, Some(timeline)) => {
            let cols = inner.width.saturating_sub(LABEL_WIDTH);
            let chart = Paragraph::new(chart_lines(model, timeline, cols));
            frame.render_widget(chart, inner);
        }
        (Some(_), None) => {
            let empty = Paragraph::new("This trace has no agent spans.")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
        }
        (None, None) => {
            let text = if model.detail_loading {
                "Loading trace..."
            } else {
                "Open a trace from the Traces view (press 2)."
            };
            let empty = Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(empty, inner);
        }
    }

    let lines = match &model.detail {
        Some(detail) => detail_lines(detail, model.cursor.selection()),
        None => Vec::new(),
    };
    let pane = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Details ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(pane, rows[1]);
}
