// src/ui/widgets/analysis_view.rs

use crate::app::{App, AppState, SPINNER_CHARS};
use crate::core::knowledge_base;
use crate::core::models::HeaderStatus;
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

fn status_style(status: &HeaderStatus) -> Style {
    match status {
        HeaderStatus::Pass | HeaderStatus::PassNotPresent => Style::default().fg(Color::Green),
        HeaderStatus::Upcoming => Style::default().fg(Color::Cyan),
        HeaderStatus::Warning(_) => Style::default().fg(Color::Yellow),
        HeaderStatus::Fail | HeaderStatus::FailPresent => Style::default().fg(Color::Red),
    }
}

pub fn render_analysis_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let main_block = Block::default()
        .borders(Borders::ALL)
        .title("Header Verdicts (Navigate with ↑ ↓)");

    if app.state != AppState::Finished || app.verdicts().is_empty() {
        let content = match app.state {
            AppState::Idle => Paragraph::new("Scan results will appear here...").alignment(Alignment::Center),
            AppState::Scanning => {
                let spinner_char = SPINNER_CHARS[app.spinner_frame % SPINNER_CHARS.len()];
                Paragraph::new(Line::from(vec![
                    Span::styled(format!("{} ", spinner_char), Style::default().fg(Color::Cyan)),
                    Span::raw("Scanning... Please wait."),
                ]))
                .alignment(Alignment::Center)
            }
            AppState::Finished => Paragraph::new(
                app.error.clone().unwrap_or_else(|| "No verdicts.".to_string()).red(),
            )
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center),
        };
        frame.render_widget(content.block(main_block), area);
        return;
    }

    let inner_area = main_block.inner(area);
    frame.render_widget(main_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Min(0)])
        .split(inner_area);

    let items: Vec<ListItem> = app
        .verdicts()
        .iter()
        .map(|v| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<22}", v.status.to_string()), status_style(&v.status)),
                Span::raw(v.header_name.clone()),
            ]))
        })
        .collect();

    let verdict_list = List::new(items)
        .block(Block::default())
        .highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(verdict_list, chunks[0], &mut app.verdict_list_state);

    let detail_block = Block::default().borders(Borders::TOP).title("Details");
    let Some(verdict) = app.selected_verdict() else {
        let p = Paragraph::new("Select a header above to see details.")
            .alignment(Alignment::Center)
            .block(detail_block);
        frame.render_widget(p, chunks[1]);
        return;
    };

    let mut text = vec![
        Line::from(""),
        Line::from("OBSERVED VALUE:".yellow().bold()),
        Line::from(verdict.observed_value.clone().unwrap_or_else(|| "(not sent)".to_string())),
    ];
    if let HeaderStatus::Warning(msg) = &verdict.status {
        text.push(Line::from(""));
        text.push(Line::from("WARNING:".yellow().bold()));
        text.push(Line::from(msg.clone()));
    }
    if let Some(detail) = knowledge_base::get_header_detail(&verdict.header_name) {
        text.push(Line::from(""));
        text.push(Line::from("WHAT IT IS:".yellow().bold()));
        text.push(Line::from(detail.description));
        if let Some(value) = detail.recommended_value {
            text.push(Line::from(""));
            text.push(Line::from("RECOMMENDED VALUE:".yellow().bold()));
            text.push(Line::from(value));
        }
        text.push(Line::from(""));
        text.push(Line::from("CAN IT BREAK THE APP?".yellow().bold()));
        text.push(Line::from(detail.can_break.unwrap_or("No")));
        text.push(Line::from(detail.safe_to_implement.dark_gray()));
    }

    let p = Paragraph::new(text).wrap(Wrap { trim: true }).block(detail_block);
    frame.render_widget(p, chunks[1]);
}
