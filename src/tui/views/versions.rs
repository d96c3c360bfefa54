//! Versions view - configuration versions and the selected version's agents

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};

use crate::commit_dialog::CommitDialog;
use crate::model::{AgentData, ConfigVersion};
use crate::tui::ui::centered_rect;
use crate::tui::update::Model;
use crate::versions::Operation;

/// Draw the version list and the config panel side by side
pub fn draw(frame: &mut Frame, model: &Model, area: Rect) {
    let columns =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).split(area);
    draw_version_list(frame, model, columns[0]);
    draw_config(frame, model, columns[1]);
}

/// One line of the version list
pub fn version_label(version: &ConfigVersion, selected: bool) -> String {
    let marker = if selected { "▸" } else { " " };
    let current = if version.is_current { " (current)" } else { "" };
    let date = version.timestamp.get(..10).unwrap_or(&version.timestamp);
    format!(
        "{} v{}{}  {}  {}",
        marker, version.version, current, date, version.commit_message
    )
}

fn draw_version_list(frame: &mut Frame, model: &Model, area: Rect) {
    let state = &model.versions;
    let mut title = String::from(" Versions ");
    if state.is_fallback() {
        title.push_str("[fallback] ");
    }
    if state.is_busy(Operation::Syncing) {
        title.push_str("syncing… ");
    }

    let block = Block::default()
        .title(title)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.versions().is_empty() {
        let text = if state.is_busy(Operation::Loading) {
            "Loading versions..."
        } else {
            "No versions found.\n\nPress r to refresh."
        };
        let empty = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let visible = inner.height as usize;
    let skip = model.version_index.saturating_sub(visible.saturating_sub(1));
    let items: Vec<ListItem> = state
        .versions()
        .iter()
        .enumerate()
        .skip(skip)
        .take(visible)
        .map(|(idx, version)| {
            let is_selected = state.selected() == Some(version.version.as_str());
            let style = if idx == model.version_index {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else if is_selected {
                Style::default().fg(Color::Yellow)
            } else if version.is_current {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(version_label(version, is_selected)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items), inner);
}

fn agent_lines(agent: &AgentData) -> Vec<Line<'static>> {
    let params = &agent.model_params;
    let mut lines = vec![
        Line::from(Span::styled(
            agent.name.clone(),
            Style::default().fg(Color::Cyan).bold(),
        )),
        Line::from(Span::styled(
            format!(
                "  {} · temp {} · top_p {} · max {}",
                params.model, params.temperature, params.top_p, params.max_tokens
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let prompt: String = agent.prompt.chars().take(200).collect();
    if !prompt.is_empty() {
        lines.push(Line::from(format!("  {}", prompt.replace('\n', " "))));
    }
    if !agent.variables.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  vars: {}", agent.variables.join(", ")),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines.push(Line::from(""));
    lines
}

fn draw_config(frame: &mut Frame, model: &Model, area: Rect) {
    let state = &model.versions;
    let title = match state.config_version() {
        Some(v) => format!(" Configuration v{} ", v),
        None => " Configuration ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let lines: Vec<Line<'static>> = match state.config() {
        _ if state.is_busy(Operation::Loading) => vec![Line::from("Loading configuration...")],
        Some(doc) if !doc.agents.is_empty() => {
            let mut lines: Vec<Line<'static>> = doc.agents.iter().flat_map(agent_lines).collect();
            if !doc.connections.is_empty() {
                lines.push(Line::from(Span::styled(
                    "Connections",
                    Style::default().fg(Color::Cyan).bold(),
                )));
                lines.extend(
                    doc.connections
                        .iter()
                        .map(|c| Line::from(format!("  {}", c.label()))),
                );
            }
            lines
        }
        Some(_) => vec![Line::from("This version has no agents.")],
        None => vec![Line::from(Span::styled(
            state
                .last_error()
                .unwrap_or("Select a version to view its configuration.")
                .to_string(),
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Commit dialog overlay
pub fn draw_commit_dialog(frame: &mut Frame, model: &Model, area: Rect) {
    let dialog: &CommitDialog = &model.dialog;
    let popup = centered_rect(64, 11, area);
    frame.render_widget(Clear, popup);

    let source = model.versions.selected().unwrap_or("none");
    let checkbox = if dialog.sync_to_main() { "[x]" } else { "[ ]" };
    let cursor = if dialog.inputs_enabled() { "▏" } else { "" };

    let mut lines = vec![
        Line::from(format!("Create a new version from v{}", source)),
        Line::from(""),
        Line::from(vec![
            Span::styled("Message: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{}{}", dialog.message(), cursor)),
        ]),
        Line::from(format!("{} Sync to main configuration (Tab)", checkbox)),
        Line::from(""),
    ];
    if let Some(error) = dialog.error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        if dialog.is_submitting() {
            "Committing..."
        } else {
            "Enter: commit   Esc: cancel"
        },
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" Commit ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, popup);
}
