// src/app.rs

use crate::core::models::{Grade, HeaderVerdict, ScanSummary};
use crate::core::scanner::ScanOutcome;
use ratatui::widgets::ListState;

pub const SPINNER_CHARS: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Scanning,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub score: f64,
    pub grade: Grade,
    pub passes: usize,
    pub fails: usize,
    pub warnings: usize,
}

impl Default for DashboardSummary {
    fn default() -> Self {
        Self { score: 0.0, grade: Grade::NotAvailable, passes: 0, fails: 0, warnings: 0 }
    }
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub input: String,
    pub outcome: Option<ScanOutcome>,
    /// Set when the last scan could not be completed.
    pub error: Option<String>,
    pub summary: DashboardSummary,
    /// Animated towards `summary.score` on every tick.
    pub displayed_score: u8,
    pub spinner_frame: usize,
    pub verdict_list_state: ListState,
    pub history: Vec<ScanSummary>,
}

impl App {
    pub fn new(history: Vec<ScanSummary>) -> Self {
        Self {
            should_quit: false,
            state: AppState::Idle,
            input: String::new(),
            outcome: None,
            error: None,
            summary: DashboardSummary::default(),
            displayed_score: 0,
            spinner_frame: 0,
            verdict_list_state: ListState::default(),
            history,
        }
    }

    pub fn verdicts(&self) -> &[HeaderVerdict] {
        self.outcome
            .as_ref()
            .and_then(|o| o.evaluation.as_ref())
            .map(|e| e.verdicts.as_slice())
            .unwrap_or(&[])
    }

    pub fn selected_verdict(&self) -> Option<&HeaderVerdict> {
        self.verdict_list_state.selected().and_then(|i| self.verdicts().get(i))
    }

    pub fn scroll_up(&mut self) {
        if let Some(selected) = self.verdict_list_state.selected() {
            self.verdict_list_state.select(Some(selected.saturating_sub(1)));
        }
    }

    pub fn scroll_down(&mut self) {
        let count = self.verdicts().len();
        if count == 0 {
            return;
        }
        let next = self.verdict_list_state.selected().map_or(0, |i| (i + 1).min(count - 1));
        self.verdict_list_state.select(Some(next));
    }

    /// Moves to `Scanning` and returns the trimmed target, or `None` when
    /// there is nothing to scan.
    pub fn start_scan(&mut self) -> Option<String> {
        let target = self.input.trim().to_string();
        if target.is_empty() {
            return None;
        }
        self.state = AppState::Scanning;
        self.error = None;
        Some(target)
    }

    pub fn finish_scan(&mut self, result: Result<ScanOutcome, String>) {
        self.state = AppState::Finished;
        self.displayed_score = 0;
        match result {
            Ok(outcome) => {
                self.summary = outcome
                    .evaluation
                    .as_ref()
                    .map(|e| DashboardSummary {
                        score: e.score,
                        grade: e.grade,
                        passes: e.passes,
                        fails: e.fails,
                        warnings: e.warnings,
                    })
                    .unwrap_or_default();
                if outcome.evaluation.is_none() {
                    self.error = Some(format!("No response received from {}.", outcome.fetch.target));
                }
                self.outcome = Some(outcome);
                let first = if self.verdicts().is_empty() { None } else { Some(0) };
                self.verdict_list_state.select(first);
            }
            Err(e) => {
                self.error = Some(e);
                self.outcome = None;
                self.summary = DashboardSummary::default();
                self.verdict_list_state.select(None);
            }
        }
    }

    pub fn on_tick(&mut self) {
        match self.state {
            AppState::Scanning => self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len(),
            AppState::Finished => {
                let target = self.summary.score.round().clamp(0.0, 100.0) as u8;
                if self.displayed_score < target {
                    self.displayed_score = (self.displayed_score + 2).min(target);
                }
            }
            AppState::Idle => {}
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input = String::new();
        self.outcome = None;
        self.error = None;
        self.summary = DashboardSummary::default();
        self.displayed_score = 0;
        self.verdict_list_state = ListState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Evaluation, FetchResult, HeaderStatus};

    fn outcome() -> ScanOutcome {
        let verdict = |name: &str, status| HeaderVerdict {
            header_name: name.to_string(),
            status,
            observed_value: None,
        };
        ScanOutcome {
            fetch: FetchResult::failed("https://example.com"),
            evaluation: Some(Evaluation {
                score: 50.0,
                grade: Grade::D,
                verdicts: vec![
                    verdict("Strict-Transport-Security", HeaderStatus::Pass),
                    verdict("Server", HeaderStatus::FailPresent),
                ],
                passes: 1,
                fails: 1,
                warnings: 0,
            }),
            stored_rows: 2,
        }
    }

    #[test]
    fn test_start_scan_requires_input() {
        let mut app = App::new(Vec::new());
        assert!(app.start_scan().is_none());
        assert_eq!(app.state, AppState::Idle);
        app.input = "  example.com ".to_string();
        assert_eq!(app.start_scan().as_deref(), Some("example.com"));
        assert_eq!(app.state, AppState::Scanning);
    }

    #[test]
    fn test_finish_scan_selects_first_verdict() {
        let mut app = App::new(Vec::new());
        app.finish_scan(Ok(outcome()));
        assert_eq!(app.state, AppState::Finished);
        assert_eq!(app.summary.grade, Grade::D);
        assert_eq!(app.selected_verdict().unwrap().header_name, "Strict-Transport-Security");
    }

    #[test]
    fn test_scrolling_stays_in_bounds() {
        let mut app = App::new(Vec::new());
        app.finish_scan(Ok(outcome()));
        app.scroll_up();
        assert_eq!(app.verdict_list_state.selected(), Some(0));
        app.scroll_down();
        app.scroll_down();
        assert_eq!(app.verdict_list_state.selected(), Some(1));
    }

    #[test]
    fn test_failed_scan_shows_error() {
        let mut app = App::new(Vec::new());
        app.finish_scan(Err("database locked".to_string()));
        assert_eq!(app.error.as_deref(), Some("database locked"));
        assert!(app.selected_verdict().is_none());

        app.reset();
        assert_eq!(app.state, AppState::Idle);
        assert!(app.error.is_none());
    }

    #[test]
    fn test_score_animation_reaches_target() {
        let mut app = App::new(Vec::new());
        app.finish_scan(Ok(outcome()));
        for _ in 0..100 {
            app.on_tick();
        }
        assert_eq!(app.displayed_score, 50);
    }
}
