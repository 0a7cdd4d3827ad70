// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

// --- Policy Models ---

/// Whether a rule expects its header to be present or absent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    Present,
    NotPresent,
}

/// A single policy entry naming a header and its expected presence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderRule {
    pub name: String,
    #[serde(default, rename = "condition")]
    pub expected_condition: Condition,
}

impl HeaderRule {
    pub fn new(name: &str, expected_condition: Condition) -> Self {
        Self { name: name.to_string(), expected_condition }
    }
}

// --- Fetch Models ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Https,
    Http,
}

impl Protocol {
    pub fn of_url(url: &str) -> Option<Self> {
        if url.starts_with("https://") {
            Some(Protocol::Https)
        } else if url.starts_with("http://") {
            Some(Protocol::Http)
        } else {
            None
        }
    }
}

/// Response headers keyed by lower-cased name. Repeated headers are joined
/// with ", ".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeaderSet(BTreeMap<String, String>);

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// A header counts as present only when it carries a non-empty value.
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

/// Outcome of one fetch attempt against a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// URL that was requested, scheme included.
    pub target: String,
    pub final_url: String,
    /// `0` when no response was obtained.
    pub status_code: u16,
    pub protocol: Option<Protocol>,
    pub headers: HeaderSet,
    pub timestamp: DateTime<Utc>,
}

impl FetchResult {
    /// The sentinel returned when every attempt failed.
    pub fn failed(target: &str) -> Self {
        Self {
            target: target.to_string(),
            final_url: target.to_string(),
            status_code: 0,
            protocol: None,
            headers: HeaderSet::new(),
            timestamp: Utc::now(),
        }
    }

    /// True when some response arrived, even one that carries no headers.
    pub fn responded(&self) -> bool {
        self.status_code != 0
    }
}

/// Warning messages keyed by header name, as reported by an external grader.
pub type Warnings = BTreeMap<String, String>;

// --- Grading Models ---

/// The outcome of one rule evaluated against one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderStatus {
    Pass,
    Fail,
    Warning(String),
    FailPresent,
    PassNotPresent,
    Upcoming,
}

impl HeaderStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, HeaderStatus::Pass | HeaderStatus::PassNotPresent | HeaderStatus::Upcoming)
    }

    /// Warnings are scored as failures.
    pub fn is_failure(&self) -> bool {
        !self.is_pass()
    }
}

impl fmt::Display for HeaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderStatus::Pass => write!(f, "PASS"),
            HeaderStatus::Fail => write!(f, "FAIL"),
            HeaderStatus::Warning(msg) if msg.is_empty() => write!(f, "WARNING"),
            HeaderStatus::Warning(msg) => write!(f, "WARNING ({})", msg),
            HeaderStatus::FailPresent => write!(f, "FAIL (present)"),
            HeaderStatus::PassNotPresent => write!(f, "PASS (not present)"),
            HeaderStatus::Upcoming => write!(f, "PASS (Upcoming header)"),
        }
    }
}

impl FromStr for HeaderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(HeaderStatus::Pass),
            "FAIL" => Ok(HeaderStatus::Fail),
            "FAIL (present)" => Ok(HeaderStatus::FailPresent),
            "PASS (not present)" => Ok(HeaderStatus::PassNotPresent),
            "PASS (Upcoming header)" => Ok(HeaderStatus::Upcoming),
            "WARNING" => Ok(HeaderStatus::Warning(String::new())),
            other => other
                .strip_prefix("WARNING (")
                .and_then(|rest| rest.strip_suffix(')'))
                .map(|msg| HeaderStatus::Warning(msg.to_string()))
                .ok_or_else(|| other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderVerdict {
    pub header_name: String,
    pub status: HeaderStatus,
    pub observed_value: Option<String>,
}

/// Letter grades, best first. The declaration order is the grade rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
pub enum Grade {
    #[strum(serialize = "A+")]
    #[serde(rename = "A+")]
    APlus,
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    A,
    #[strum(serialize = "A-")]
    #[serde(rename = "A-")]
    AMinus,
    #[strum(serialize = "B+")]
    #[serde(rename = "B+")]
    BPlus,
    #[strum(serialize = "B")]
    #[serde(rename = "B")]
    B,
    #[strum(serialize = "B-")]
    #[serde(rename = "B-")]
    BMinus,
    #[strum(serialize = "C+")]
    #[serde(rename = "C+")]
    CPlus,
    #[strum(serialize = "C")]
    #[serde(rename = "C")]
    C,
    #[strum(serialize = "C-")]
    #[serde(rename = "C-")]
    CMinus,
    #[strum(serialize = "D+")]
    #[serde(rename = "D+")]
    DPlus,
    #[strum(serialize = "D")]
    #[serde(rename = "D")]
    D,
    #[strum(serialize = "D-")]
    #[serde(rename = "D-")]
    DMinus,
    #[strum(serialize = "E")]
    #[serde(rename = "E")]
    E,
    #[strum(serialize = "F")]
    #[serde(rename = "F")]
    F,
    #[strum(serialize = "Not available")]
    #[serde(rename = "Not available")]
    NotAvailable,
}

impl Grade {
    pub fn rank(self) -> usize {
        self as usize
    }

    /// C+ and everything below it, excluding `Not available`.
    pub fn needs_attention(self) -> bool {
        self >= Grade::CPlus && self != Grade::NotAvailable
    }

    /// Lenient parse for values read back from the store.
    pub fn parse_lenient(s: &str) -> Self {
        Grade::from_str(s.trim()).unwrap_or(Grade::NotAvailable)
    }

    pub fn letters() -> impl Iterator<Item = Grade> {
        Grade::iter().filter(|g| *g != Grade::NotAvailable)
    }
}

/// The result of grading one fetch. Counters are carried here rather than
/// accumulated anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub grade: Grade,
    pub verdicts: Vec<HeaderVerdict>,
    pub passes: usize,
    pub fails: usize,
    pub warnings: usize,
}

impl Evaluation {
    pub fn scored_total(&self) -> usize {
        self.passes + self.fails + self.warnings
    }
}

// --- Store Models ---

/// One persisted row of the `results` table.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub url: String,
    pub score: f64,
    pub grade: Grade,
    pub header_name: String,
    pub status: HeaderStatus,
    pub header_value: Option<String>,
    pub timestamp: String,
}

/// The latest scan of one URL, without per-header detail.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScanSummary {
    pub url: String,
    pub score: f64,
    pub grade: Grade,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub date: String,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeaderCount {
    pub header_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdoptionRate {
    pub header_name: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GradeChange {
    pub url: String,
    pub old_score: f64,
    pub old_grade: Grade,
    pub new_score: f64,
    pub new_grade: Grade,
    pub old_timestamp: String,
    pub new_timestamp: String,
}

impl GradeChange {
    pub fn delta(&self) -> f64 {
        self.new_score - self.old_score
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GradeShare {
    pub grade: Grade,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverallSummary {
    pub total_urls: u64,
    pub average_score: f64,
    pub average_grade: Grade,
    pub distribution: Vec<GradeShare>,
}

/// URLs whose latest scans returned exactly the same header values.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SharedConfiguration {
    pub grade: Grade,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeaderHealth {
    pub header_name: String,
    pub passes: u64,
    pub failures: u64,
    pub pass_ratio: f64,
}

// --- Bulk Models ---

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BulkMetrics {
    pub total_submitted: usize,
    pub successful_fetches: usize,
    pub unsuccessful_fetches: usize,
    pub https_urls: usize,
    pub http_urls: usize,
    pub unreachable: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UrlOutcome {
    Graded { url: String, score: f64, grade: Grade, persisted: bool },
    NoResult { url: String, reason: String },
    Unreachable { host: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub metrics: BulkMetrics,
    pub outcomes: Vec<UrlOutcome>,
}
