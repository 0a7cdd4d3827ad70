// src/core/grading.rs

use crate::core::models::{
    Condition, Evaluation, FetchResult, Grade, HeaderSet, HeaderStatus, HeaderVerdict, Warnings,
};
use crate::core::policy::Policy;
use tracing::{debug, info};

/// Upper bounds (inclusive) of each grade, worst first. Every lower bound is
/// exclusive except the first, which starts at 0.
const GRADE_TABLE: &[(f64, Grade)] = &[
    (20.0, Grade::F),
    (30.0, Grade::E),
    (40.0, Grade::DMinus),
    (50.0, Grade::D),
    (60.0, Grade::DPlus),
    (65.0, Grade::CMinus),
    (70.0, Grade::C),
    (75.0, Grade::CPlus),
    (80.0, Grade::BMinus),
    (85.0, Grade::B),
    (90.0, Grade::BPlus),
    (95.0, Grade::AMinus),
    (98.0, Grade::A),
    (100.0, Grade::APlus),
];

/// Maps a 0-100 score to its letter grade.
pub fn grade_for_score(score: f64) -> Grade {
    if !(0.0..=100.0).contains(&score) {
        return Grade::NotAvailable;
    }
    GRADE_TABLE
        .iter()
        .find(|(upper, _)| score <= *upper)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::NotAvailable)
}

fn warning_for<'a>(warnings: &'a Warnings, header: &str) -> Option<&'a str> {
    warnings
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(header))
        .map(|(_, msg)| msg.as_str())
}

fn observed(headers: &HeaderSet, name: &str) -> Option<String> {
    headers.get(name).map(str::to_string)
}

/// Grades a fetch against `policy`.
///
/// Returns `None` only for the failed-fetch sentinel. A response without
/// any headers is graded like any other.
pub fn evaluate(fetch: &FetchResult, policy: &Policy, warnings: &Warnings) -> Option<Evaluation> {
    if !fetch.responded() {
        debug!(target = %fetch.target, "No response obtained, skipping grading.");
        return None;
    }
    let headers = &fetch.headers;
    let mut verdicts = Vec::with_capacity(policy.required().len() + policy.unwanted().len() + policy.upcoming().len());
    let (mut passes, mut fails, mut warned) = (0usize, 0usize, 0usize);

    for rule in policy.required() {
        let present = headers.is_present(&rule.name);
        let status = if let Some(msg) = warning_for(warnings, &rule.name) {
            warned += 1;
            HeaderStatus::Warning(msg.to_string())
        } else if present == (rule.expected_condition == Condition::Present) {
            passes += 1;
            HeaderStatus::Pass
        } else {
            fails += 1;
            HeaderStatus::Fail
        };
        debug!(header = %rule.name, status = %status, "Required header evaluated.");
        verdicts.push(HeaderVerdict {
            header_name: rule.name.clone(),
            status,
            observed_value: observed(headers, &rule.name),
        });
    }

    for rule in policy.unwanted() {
        let status = if headers.is_present(&rule.name) {
            fails += 1;
            HeaderStatus::FailPresent
        } else {
            passes += 1;
            HeaderStatus::PassNotPresent
        };
        debug!(header = %rule.name, status = %status, "Unwanted header evaluated.");
        verdicts.push(HeaderVerdict {
            header_name: rule.name.clone(),
            status,
            observed_value: observed(headers, &rule.name),
        });
    }

    for rule in policy.upcoming() {
        verdicts.push(HeaderVerdict {
            header_name: rule.name.clone(),
            status: HeaderStatus::Upcoming,
            observed_value: observed(headers, &rule.name),
        });
    }

    let total = policy.scored_rule_count();
    let score = if total == 0 { 0.0 } else { 100.0 * passes as f64 / total as f64 };
    let grade = grade_for_score(score);
    info!(target = %fetch.target, score, grade = %grade, passes, fails, warnings = warned, "Grading finished.");

    Some(Evaluation { score, grade, verdicts, passes, fails, warnings: warned })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{HeaderRule, Protocol};
    use chrono::Utc;

    fn fetch_with(headers: &[(&str, &str)]) -> FetchResult {
        FetchResult {
            target: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            status_code: 200,
            protocol: Some(Protocol::Https),
            headers: headers.iter().copied().collect(),
            timestamp: Utc::now(),
        }
    }

    fn policy() -> Policy {
        Policy::new(
            vec![
                HeaderRule::new("Strict-Transport-Security", Condition::Present),
                HeaderRule::new("Content-Security-Policy", Condition::Present),
                HeaderRule::new("X-Frame-Options", Condition::Present),
                HeaderRule::new("X-XSS-Protection", Condition::NotPresent),
            ],
            vec![
                HeaderRule::new("Server", Condition::NotPresent),
                HeaderRule::new("X-Powered-By", Condition::NotPresent),
            ],
            vec![HeaderRule::new("Origin-Agent-Cluster", Condition::Present)],
        )
        .unwrap()
    }

    fn status_of<'a>(eval: &'a Evaluation, name: &str) -> &'a HeaderStatus {
        &eval.verdicts.iter().find(|v| v.header_name == name).unwrap().status
    }

    #[test]
    fn test_grade_table_boundaries() {
        assert_eq!(grade_for_score(0.0), Grade::F);
        assert_eq!(grade_for_score(20.0), Grade::F);
        assert_eq!(grade_for_score(20.01), Grade::E);
        assert_eq!(grade_for_score(60.0), Grade::DPlus);
        assert_eq!(grade_for_score(75.0), Grade::CPlus);
        assert_eq!(grade_for_score(95.0), Grade::AMinus);
        assert_eq!(grade_for_score(98.0), Grade::A);
        assert_eq!(grade_for_score(99.0), Grade::APlus);
        assert_eq!(grade_for_score(100.0), Grade::APlus);
        assert_eq!(grade_for_score(-0.5), Grade::NotAvailable);
        assert_eq!(grade_for_score(100.5), Grade::NotAvailable);
        assert_eq!(grade_for_score(f64::NAN), Grade::NotAvailable);
    }

    #[test]
    fn test_grade_table_is_total_and_ordered() {
        let mut previous = Grade::F;
        for step in 0..=10_000 {
            let score = step as f64 / 100.0;
            let grade = grade_for_score(score);
            assert_ne!(grade, Grade::NotAvailable, "score {} has no grade", score);
            // Higher scores never map to a worse grade.
            assert!(grade <= previous, "score {} regressed to {}", score, grade);
            previous = grade;
        }
        assert_eq!(GRADE_TABLE.len(), 14);
        assert!(GRADE_TABLE.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_missing_hsts_fails() {
        let fetch = fetch_with(&[
            ("Content-Security-Policy", "default-src 'self'"),
            ("X-Frame-Options", "DENY"),
        ]);
        let eval = evaluate(&fetch, &policy(), &Warnings::new()).unwrap();
        assert_eq!(status_of(&eval, "Strict-Transport-Security"), &HeaderStatus::Fail);
        // 2 required present + X-XSS-Protection absent + 2 unwanted absent.
        assert_eq!(eval.passes, 5);
        assert_eq!(eval.fails, 1);
        assert!((eval.score - 100.0 * 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_unwanted_server_header_fails_present() {
        let fetch = fetch_with(&[("Server", "nginx")]);
        let eval = evaluate(&fetch, &policy(), &Warnings::new()).unwrap();
        assert_eq!(status_of(&eval, "Server"), &HeaderStatus::FailPresent);
        assert_eq!(status_of(&eval, "X-Powered-By"), &HeaderStatus::PassNotPresent);
        let server = eval.verdicts.iter().find(|v| v.header_name == "Server").unwrap();
        assert_eq!(server.observed_value.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_warning_counts_as_failure() {
        let fetch = fetch_with(&[("Strict-Transport-Security", "max-age=10")]);
        let mut warnings = Warnings::new();
        warnings.insert("strict-transport-security".to_string(), "max-age too short".to_string());
        let eval = evaluate(&fetch, &policy(), &warnings).unwrap();
        assert_eq!(
            status_of(&eval, "Strict-Transport-Security"),
            &HeaderStatus::Warning("max-age too short".to_string())
        );
        assert_eq!(eval.warnings, 1);
        assert!(eval.verdicts.iter().filter(|v| v.status.is_failure()).count() >= 1);
    }

    #[test]
    fn test_upcoming_headers_are_not_scored() {
        let fetch = fetch_with(&[("Date", "today")]);
        let eval = evaluate(&fetch, &policy(), &Warnings::new()).unwrap();
        assert_eq!(status_of(&eval, "Origin-Agent-Cluster"), &HeaderStatus::Upcoming);
        assert_eq!(eval.verdicts.len(), 7);
        assert_eq!(eval.scored_total(), 6);
    }

    #[test]
    fn test_accounting_matches_scored_rules() {
        let p = policy();
        let header_sets: Vec<Vec<(&str, &str)>> = vec![
            vec![("Date", "x")],
            vec![("Server", "nginx"), ("X-Powered-By", "PHP")],
            vec![
                ("Strict-Transport-Security", "max-age=1"),
                ("Content-Security-Policy", "default-src 'none'"),
                ("X-Frame-Options", "DENY"),
                ("X-XSS-Protection", "1"),
            ],
        ];
        let mut warnings = Warnings::new();
        warnings.insert("X-Frame-Options".to_string(), "deprecated".to_string());
        for headers in header_sets {
            for w in [Warnings::new(), warnings.clone()] {
                let eval = evaluate(&fetch_with(&headers), &p, &w).unwrap();
                assert_eq!(eval.passes + eval.fails + eval.warnings, p.scored_rule_count());
            }
        }
    }

    #[test]
    fn test_score_is_monotonic_in_passes() {
        let p = policy();
        let mut headers: Vec<(&str, &str)> = vec![("Server", "nginx")];
        let mut last = evaluate(&fetch_with(&headers), &p, &Warnings::new()).unwrap().score;
        for added in [
            ("Strict-Transport-Security", "max-age=31536000"),
            ("Content-Security-Policy", "default-src 'self'"),
            ("X-Frame-Options", "DENY"),
        ] {
            headers.push(added);
            let score = evaluate(&fetch_with(&headers), &p, &Warnings::new()).unwrap().score;
            assert!(score > last);
            last = score;
        }
    }

    #[test]
    fn test_empty_header_value_is_not_present() {
        let fetch = fetch_with(&[("Strict-Transport-Security", ""), ("Date", "x")]);
        let eval = evaluate(&fetch, &policy(), &Warnings::new()).unwrap();
        assert_eq!(status_of(&eval, "Strict-Transport-Security"), &HeaderStatus::Fail);
    }

    #[test]
    fn test_response_without_headers_is_graded() {
        let eval = evaluate(&fetch_with(&[]), &policy(), &Warnings::new()).unwrap();
        assert_eq!(eval.passes, 3);
        assert_eq!(eval.fails, 3);
        assert_eq!(eval.score, 50.0);
        assert_eq!(eval.grade, Grade::D);
        assert_eq!(status_of(&eval, "Strict-Transport-Security"), &HeaderStatus::Fail);
        assert_eq!(status_of(&eval, "X-XSS-Protection"), &HeaderStatus::Pass);
        assert_eq!(status_of(&eval, "Server"), &HeaderStatus::PassNotPresent);
        assert_eq!(status_of(&eval, "X-Powered-By"), &HeaderStatus::PassNotPresent);
    }

    #[test]
    fn test_failed_fetch_is_not_graded() {
        let fetch = FetchResult::failed("example.com");
        assert!(evaluate(&fetch, &policy(), &Warnings::new()).is_none());
    }
}
