// src/ui/widgets/summary.rs

use crate::app::{App, AppState};
use crate::core::knowledge_base::interpret_grade;
use crate::core::models::Grade;
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};

fn grade_color(grade: Grade) -> Color {
    match grade {
        Grade::APlus | Grade::A | Grade::AMinus => Color::Green,
        Grade::BPlus | Grade::B | Grade::BMinus => Color::Cyan,
        Grade::CPlus | Grade::C | Grade::CMinus => Color::Yellow,
        Grade::NotAvailable => Color::DarkGray,
        _ => Color::Red,
    }
}

/// Score, grade and counters of the last scan.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & grade
            Constraint::Length(1), // Gauge
            Constraint::Length(1),
            Constraint::Length(4), // Counters
            Constraint::Length(1),
            Constraint::Length(4), // Fetch details
            Constraint::Min(0),    // Interpretation
        ])
        .split(area);

    if app.state != AppState::Finished {
        return;
    }
    let summary = &app.summary;
    let style = Style::default().fg(grade_color(summary.grade));

    let score_text = Text::from(vec![
        Line::from("Score / Grade".bold()),
        Line::from(format!("{:.2}/100  {}", summary.score, summary.grade)).style(style),
    ]);
    frame.render_widget(Paragraph::new(score_text).alignment(Alignment::Center), summary_chunks[0]);

    let gauge = Gauge::default()
        .percent(u16::from(app.displayed_score.min(100)))
        .label(format!("{}%", app.displayed_score))
        .gauge_style(style);
    frame.render_widget(gauge, summary_chunks[1]);

    let counters = Text::from(vec![
        Line::from("RESULTS".bold()),
        Line::from(vec![Span::raw("Passed:   "), Span::styled(summary.passes.to_string(), Style::default().fg(Color::Green))]),
        Line::from(vec![Span::raw("Failed:   "), Span::styled(summary.fails.to_string(), Style::default().fg(Color::Red))]),
        Line::from(vec![Span::raw("Warnings: "), Span::styled(summary.warnings.to_string(), Style::default().fg(Color::Yellow))]),
    ]);
    frame.render_widget(Paragraph::new(counters), summary_chunks[3]);

    if let Some(outcome) = &app.outcome {
        let fetch = &outcome.fetch;
        let details = Text::from(vec![
            Line::from("RESPONSE".bold()),
            Line::from(format!("Status:   {}", fetch.status_code)),
            Line::from(format!(
                "Protocol: {}",
                fetch.protocol.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
            )),
            Line::from(format!("Final:    {}", fetch.final_url)),
        ]);
        frame.render_widget(Paragraph::new(details), summary_chunks[5]);
    }

    let interpretation = Paragraph::new(interpret_grade(summary.grade))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(interpretation, summary_chunks[6]);
}
