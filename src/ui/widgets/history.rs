// src/ui/widgets/history.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

/// Latest stored scan of each URL, newest first.
pub fn render_history(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().title("Recent Scans").borders(Borders::ALL);

    if app.history.is_empty() {
        let p = Paragraph::new("No scans stored yet.").alignment(Alignment::Center).block(block);
        frame.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|scan| {
            // Timestamps are stored as YYYY-MM-DDTHH:MM:SS.ffffff; the date is enough here.
            let date = scan.timestamp.get(..10).unwrap_or(&scan.timestamp);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", date), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:<3}", scan.grade.to_string()), Style::default().bold()),
                Span::raw(format!("{:>7.2} ", scan.score)),
                Span::raw(scan.url.clone()),
            ]))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}
