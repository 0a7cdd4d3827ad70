// src/report.rs

//! Plain-text rendering of scans and stored-result queries. Every function
//! returns a `String` so the CLI decides where it goes.

use crate::core::knowledge_base::{all_headers, configuration_proposal, interpret_grade, HeaderKind};
use crate::core::models::{
    AdoptionRate, BulkReport, GradeChange, HeaderCount, HeaderHealth, HeaderSet, HeaderStatus,
    HeaderVerdict, OverallSummary, ScanRecord, ScanSummary, SharedConfiguration, TrendPoint, UrlOutcome,
};
use crate::core::policy::Policy;
use crate::core::scanner::ScanOutcome;
use serde::Serialize;
use std::fmt::Write;

pub const MAX_HEADER_VALUE_LEN: usize = 100;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Shortens `value` to `max` characters followed by `...`.
pub fn truncate_value(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max).collect();
        format!("{}...", head)
    }
}

/// Left-aligned columns sized to their widest cell.
fn table(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let render_row = |cells: Vec<&str>| -> String {
        let line = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ");
        line.trim_end().to_string()
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}", render_row(columns.to_vec()));
    let _ = writeln!(
        out,
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  ")
    );
    for row in rows {
        let _ = writeln!(out, "{}", render_row(row.iter().map(String::as_str).collect()));
    }
    out
}

fn or_empty(rendered: String, rows: usize, empty: &str) -> String {
    if rows == 0 { format!("{}\n", empty) } else { rendered }
}

pub fn render_headers_list(headers: &HeaderSet, show_full: bool) -> String {
    let mut out = String::from("Response Headers:\n");
    if headers.is_empty() {
        out.push_str("  (none)\n");
    }
    for (name, value) in headers.iter() {
        let value = if show_full { value.to_string() } else { truncate_value(value, MAX_HEADER_VALUE_LEN) };
        let _ = writeln!(out, "  {}: {}", name, value);
    }
    out
}

fn verdict_section(out: &mut String, kind: HeaderKind, verdicts: &[HeaderVerdict]) {
    if verdicts.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{}:", kind);
    for verdict in verdicts {
        let _ = writeln!(out, "  {:<40} {}", verdict.header_name, verdict.status);
    }
}

/// A single scan: fetch details, response headers and grouped verdicts.
pub fn render_scan(outcome: &ScanOutcome, policy: &Policy, show_full: bool) -> String {
    let fetch = &outcome.fetch;
    let mut out = String::new();
    let _ = writeln!(out, "Target: {}", fetch.target);
    let _ = writeln!(out, "Final URL: {}", fetch.final_url);
    let _ = writeln!(out, "Status Code: {}", fetch.status_code);
    let _ = writeln!(
        out,
        "Protocol: {}\n",
        fetch.protocol.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
    );

    let Some(evaluation) = &outcome.evaluation else {
        let _ = writeln!(out, "No response received from {}; nothing was graded.", fetch.target);
        return out;
    };
    out.push_str(&render_headers_list(&fetch.headers, show_full));

    // Verdicts come out of grading in policy order: required, unwanted, upcoming.
    let required = policy.required().len().min(evaluation.verdicts.len());
    let unwanted = (required + policy.unwanted().len()).min(evaluation.verdicts.len());
    verdict_section(&mut out, HeaderKind::Security, &evaluation.verdicts[..required]);
    verdict_section(&mut out, HeaderKind::Unwanted, &evaluation.verdicts[required..unwanted]);
    verdict_section(&mut out, HeaderKind::Upcoming, &evaluation.verdicts[unwanted..]);

    let _ = writeln!(out, "\nScore: {:.2}  Grade: {}", evaluation.score, evaluation.grade);
    let _ = writeln!(
        out,
        "Passes: {}  Fails: {}  Warnings: {}",
        evaluation.passes, evaluation.fails, evaluation.warnings
    );
    out
}

pub fn render_bulk(report: &BulkReport) -> String {
    let m = &report.metrics;
    let mut out = String::new();
    let _ = writeln!(out, "Total URLs submitted:     {}", m.total_submitted);
    let _ = writeln!(out, "Successful fetches:       {}", m.successful_fetches);
    let _ = writeln!(out, "Unsuccessful fetches:     {}", m.unsuccessful_fetches);
    let _ = writeln!(out, "HTTPS URLs:               {}", m.https_urls);
    let _ = writeln!(out, "HTTP URLs:                {}", m.http_urls);
    let _ = writeln!(out, "Unreachable hosts:        {}\n", m.unreachable);

    let mut rows: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            UrlOutcome::Graded { url, score, grade, persisted } => vec![
                url.clone(),
                format!("{:.2}", score),
                grade.to_string(),
                if *persisted { "stored".to_string() } else { "not stored".to_string() },
            ],
            UrlOutcome::NoResult { url, reason } => {
                vec![url.clone(), "-".to_string(), "-".to_string(), reason.clone()]
            }
            UrlOutcome::Unreachable { host } => {
                vec![host.clone(), "-".to_string(), "-".to_string(), "unreachable".to_string()]
            }
        })
        .collect();
    rows.sort();
    out.push_str(&table(&["URL", "Score", "Grade", "Result"], &rows));
    out
}

/// Latest stored scan of one URL with an interpretation of its grade.
pub fn render_analysis(url: &str, records: &[ScanRecord]) -> String {
    let Some(first) = records.first() else {
        return format!("No data found for URL: {}\n", url);
    };
    let mut out = String::new();
    let _ = writeln!(out, "Most recent scan results (as of {}):\n", first.timestamp);
    let _ = writeln!(out, "URL: {}\nScore: {:.2}\nGrade: {}\n", first.url, first.score, first.grade);
    let _ = writeln!(out, "Interpretation:\n{}", interpret_grade(first.grade));
    let _ = writeln!(
        out,
        "The score of {:.2} indicates the overall security posture based on the implemented headers.\n",
        first.score
    );

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.header_name.clone(),
                r.status.to_string(),
                r.header_value
                    .as_deref()
                    .map(|v| truncate_value(v, MAX_HEADER_VALUE_LEN))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    out.push_str(&table(&["Header", "Status", "Value"], &rows));

    out.push_str("\nVulnerabilities (Missing or Failing Headers):\n");
    for record in records.iter().filter(|r| r.status == HeaderStatus::Fail) {
        let _ = writeln!(out, "- {}", record.header_name);
    }
    out
}

pub fn render_summary(summary: Option<&OverallSummary>) -> String {
    let Some(summary) = summary else {
        return "No scan results stored yet.\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "Total Unique URLs: {}", summary.total_urls);
    let _ = writeln!(out, "Average Score: {:.2}", summary.average_score);
    let _ = writeln!(out, "Average Grade: {}\n", summary.average_grade);
    let rows: Vec<Vec<String>> = summary
        .distribution
        .iter()
        .map(|s| vec![s.grade.to_string(), s.count.to_string(), format!("{:.2}%", s.percentage)])
        .collect();
    out.push_str(&table(&["Grade", "Count", "Percentage"], &rows));
    out
}

pub fn render_scan_summaries(scans: &[ScanSummary]) -> String {
    let rows: Vec<Vec<String>> = scans
        .iter()
        .map(|s| vec![s.url.clone(), format!("{:.2}", s.score), s.grade.to_string(), s.timestamp.clone()])
        .collect();
    or_empty(table(&["URL", "Score", "Grade", "Timestamp"], &rows), rows.len(), "No results.")
}

pub fn render_trend(points: &[TrendPoint]) -> String {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| vec![p.date.clone(), format!("{:.2}", p.average_score)])
        .collect();
    or_empty(table(&["Date", "Average Score"], &rows), rows.len(), "No scans in this period.")
}

pub fn render_header_counts(counts: &[HeaderCount]) -> String {
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|c| vec![c.header_name.clone(), c.count.to_string()])
        .collect();
    or_empty(table(&["Header", "Failures"], &rows), rows.len(), "No failing headers.")
}

pub fn render_adoption(rates: &[AdoptionRate]) -> String {
    let rows: Vec<Vec<String>> = rates
        .iter()
        .map(|r| vec![r.header_name.clone(), format!("{:.2}%", r.rate)])
        .collect();
    or_empty(table(&["Header", "Adoption Rate"], &rows), rows.len(), "No results.")
}

pub fn render_changes(changes: &[GradeChange]) -> String {
    let rows: Vec<Vec<String>> = changes
        .iter()
        .map(|c| {
            vec![
                c.url.clone(),
                format!("{} ({:.2})", c.old_grade, c.old_score),
                format!("{} ({:.2})", c.new_grade, c.new_score),
                format!("{:+.2}", c.delta()),
                c.new_timestamp.clone(),
            ]
        })
        .collect();
    or_empty(
        table(&["URL", "Previous", "Current", "Change", "Scanned"], &rows),
        rows.len(),
        "No grade changes in this period.",
    )
}

pub fn render_shared(groups: &[SharedConfiguration]) -> String {
    if groups.is_empty() {
        return "No URLs share an identical header configuration.\n".to_string();
    }
    let mut out = String::new();
    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(out, "Configuration {} (Grade: {}, {} URLs)", i + 1, group.grade, group.urls.len());
        for url in &group.urls {
            let _ = writeln!(out, "  - {}", url);
        }
    }
    out
}

pub fn render_health(health: &[HeaderHealth]) -> String {
    let rows: Vec<Vec<String>> = health
        .iter()
        .map(|h| {
            vec![
                h.header_name.clone(),
                h.passes.to_string(),
                h.failures.to_string(),
                format!("{:.1}%", h.pass_ratio * 100.0),
            ]
        })
        .collect();
    or_empty(table(&["Header", "Passes", "Failures", "Pass Ratio"], &rows), rows.len(), "No results.")
}

/// The proposed header configuration and notes on what each header can break.
pub fn render_proposal() -> String {
    let mut out = String::from("Configuration Proposal (some headers might break the app)\n\n");
    let proposal: Vec<Vec<String>> = configuration_proposal()
        .map(|(name, value)| vec![name.to_string(), value.to_string()])
        .collect();
    out.push_str(&table(&["Header name", "Proposed value"], &proposal));

    out.push_str("\nHeader Implementation Comments\n\n");
    let comments: Vec<Vec<String>> = all_headers()
        .iter()
        .filter(|h| h.kind == HeaderKind::Security)
        .map(|h| {
            vec![
                h.name.to_string(),
                h.can_break.unwrap_or("No").to_string(),
                h.safe_to_implement.to_string(),
            ]
        })
        .collect();
    out.push_str(&table(&["Header", "Can Break the App", "Safe to Implement"], &comments));
    out
}
