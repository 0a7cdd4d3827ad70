// src/core/store.rs

//! SQLite-backed history of scan results.
//!
//! One scan is stored as one row per evaluated rule, all rows sharing the
//! same `url`, `score`, `grade` and `timestamp`. Nothing is ever updated in
//! place; "latest" is always derived at query time. When several rows share
//! the newest timestamp the row with the highest `id` wins.

use crate::core::error::StorageError;
use crate::core::models::{
    AdoptionRate, Evaluation, Grade, GradeChange, GradeShare, HeaderCount, HeaderHealth,
    HeaderStatus, OverallSummary, ScanRecord, ScanSummary, SharedConfiguration, TrendPoint,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Params, Row, Statement};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_RETENTION_DAYS: i64 = 90;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const RECORD_COLUMNS: &str =
    "r.id, r.url, r.score, r.grade, r.header_name, r.status, r.header_value, r.timestamp";

/// Latest scan per URL, one row each.
const LATEST_SCANS_CTE: &str = "
    ranked AS (
        SELECT url, score, grade, timestamp,
               ROW_NUMBER() OVER (PARTITION BY url ORDER BY timestamp DESC, id DESC) AS rn
        FROM results
    ),
    latest AS (
        SELECT url, score, grade, timestamp FROM ranked WHERE rn = 1
    )";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// `CASE` expression mapping a grade column to its rank (best = 0).
fn grade_rank_sql(column: &str) -> String {
    let arms: String = Grade::letters()
        .map(|g| format!(" WHEN '{}' THEN {}", g, g.rank()))
        .collect();
    format!("CASE {}{} ELSE {} END", column, arms, Grade::NotAvailable.rank())
}

fn attention_grades_sql() -> String {
    Grade::letters()
        .filter(|g| g.needs_attention())
        .map(|g| format!("'{}'", g))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strips any scheme and trailing slash so that `https://a.com/` and `a.com`
/// select the same history.
pub fn normalize_url(url: &str) -> &str {
    let trimmed = url.trim();
    let bare = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    bare.trim_end_matches('/')
}

/// The instant `days` days before `from`. Negative or out-of-range windows
/// are rejected.
fn days_before(from: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, StorageError> {
    if days < 0 {
        return Err(StorageError::InvalidWindow(days));
    }
    Duration::try_days(days)
        .and_then(|window| from.checked_sub_signed(window))
        .ok_or(StorageError::InvalidWindow(days))
}

/// Escapes `LIKE` wildcards so `value` only matches itself. Pair with
/// `ESCAPE '\'`.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn summary_from_row(row: &Row) -> rusqlite::Result<ScanSummary> {
    Ok(ScanSummary {
        url: row.get(0)?,
        score: row.get(1)?,
        grade: Grade::parse_lenient(&row.get::<_, String>(2)?),
        timestamp: row.get(3)?,
    })
}

fn read_records<P: Params>(stmt: &mut Statement, params: P) -> Result<Vec<ScanRecord>, StorageError> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    rows.map(|row| -> Result<ScanRecord, StorageError> {
        let (id, url, score, grade, header_name, status, header_value, timestamp) = row?;
        let status = status.parse::<HeaderStatus>().map_err(StorageError::UnknownStatus)?;
        Ok(ScanRecord {
            id,
            url,
            score,
            grade: Grade::parse_lenient(&grade),
            header_name,
            status,
            header_value,
            timestamp,
        })
    })
    .collect()
}

/// Handle on the results database. Every operation opens its own
/// connection, so a store can be cloned freely across tasks.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
    retention_days: i64,
}

impl ResultStore {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { path, retention_days: DEFAULT_RETENTION_DAYS };
        store.initialize()?;
        Ok(store)
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn initialize(&self) -> Result<(), StorageError> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                score REAL,
                grade TEXT,
                header_name TEXT,
                status TEXT,
                header_value TEXT,
                timestamp TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_url ON results (url);",
        )?;
        debug!(path = %self.path.display(), "Results database initialized.");
        Ok(())
    }

    // --- Writes ---

    pub fn insert_scan(&self, url: &str, evaluation: &Evaluation) -> Result<usize, StorageError> {
        self.insert_scan_at(url, evaluation, Utc::now())
    }

    /// Stores one scan under a single shared timestamp. Rows of the same URL
    /// older than the retention window are removed in the same transaction.
    pub fn insert_scan_at(
        &self,
        url: &str,
        evaluation: &Evaluation,
        at: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let stamp = format_timestamp(at);
        let cutoff = format_timestamp(days_before(at, self.retention_days)?);

        let expired = tx.execute(
            "DELETE FROM results WHERE url = ?1 AND timestamp < ?2",
            params![url, cutoff],
        )?;
        if expired > 0 {
            debug!(url, expired, "Pruned expired rows before insert.");
        }

        let grade = evaluation.grade.to_string();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO results (url, score, grade, header_name, status, header_value, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for verdict in &evaluation.verdicts {
                stmt.execute(params![
                    url,
                    evaluation.score,
                    grade,
                    verdict.header_name,
                    verdict.status.to_string(),
                    verdict.observed_value,
                    stamp,
                ])?;
            }
        }
        tx.commit()?;
        info!(url, rows = evaluation.verdicts.len(), "Scan stored.");
        Ok(evaluation.verdicts.len())
    }

    /// Deletes rows strictly older than `older_than_days` days.
    pub fn prune(&self, older_than_days: i64) -> Result<usize, StorageError> {
        self.prune_before(days_before(Utc::now(), older_than_days)?)
    }

    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        let deleted = conn.execute(
            "DELETE FROM results WHERE timestamp < ?1",
            params![format_timestamp(cutoff)],
        )?;
        info!(deleted, "Pruned old results.");
        Ok(deleted)
    }

    /// Deletes every row for exactly `url`.
    pub fn delete(&self, url: &str) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM results WHERE url = ?1", params![url])?;
        info!(url, deleted, "Deleted results for URL.");
        Ok(deleted)
    }

    // --- Reads ---

    /// Rows of the most recent scan matching `url` with or without a scheme.
    pub fn latest(&self, url: &str) -> Result<Vec<ScanRecord>, StorageError> {
        let conn = self.connect()?;
        let host = normalize_url(url);
        let sql = format!(
            "WITH newest AS (
                SELECT url, timestamp FROM results
                WHERE url = ?1 OR url = ?2 OR url LIKE ?3 ESCAPE '\\' OR url LIKE ?4 ESCAPE '\\'
                ORDER BY timestamp DESC, id DESC
                LIMIT 1
            )
            SELECT {RECORD_COLUMNS}
            FROM results r JOIN newest n ON r.url = n.url AND r.timestamp = n.timestamp
            ORDER BY r.id"
        );
        let pattern = escape_like(host);
        let mut stmt = conn.prepare(&sql)?;
        read_records(
            &mut stmt,
            params![url.trim(), host, format!("http://{}%", pattern), format!("https://{}%", pattern)],
        )
    }

    /// The latest scan of each URL, newest first.
    pub fn recent_scans(&self, limit: usize) -> Result<Vec<ScanSummary>, StorageError> {
        let conn = self.connect()?;
        let sql = format!(
            "WITH {LATEST_SCANS_CTE}
            SELECT url, score, grade, timestamp FROM latest
            ORDER BY timestamp DESC, url
            LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], summary_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Average scan score per calendar day (UTC) over the last `days` days.
    pub fn trend(&self, days: i64) -> Result<Vec<TrendPoint>, StorageError> {
        let since = days_before(Utc::now(), days)?.format("%Y-%m-%d").to_string();
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT substr(timestamp, 1, 10) AS day, AVG(score)
             FROM (
                SELECT url, timestamp, MAX(score) AS score
                FROM results
                WHERE timestamp >= ?1
                GROUP BY url, timestamp
             )
             GROUP BY day
             ORDER BY day",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(TrendPoint { date: row.get(0)?, average_score: row.get(1)? })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Headers failing most often across each URL's latest scan.
    pub fn top_failing_headers(&self, n: usize) -> Result<Vec<HeaderCount>, StorageError> {
        let conn = self.connect()?;
        let sql = format!(
            "WITH {LATEST_SCANS_CTE}
            SELECT r.header_name, COUNT(*) AS failures
            FROM results r JOIN latest l ON r.url = l.url AND r.timestamp = l.timestamp
            WHERE r.status LIKE 'FAIL%'
            GROUP BY r.header_name
            ORDER BY failures DESC, r.header_name
            LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![n as i64], |row| {
            Ok(HeaderCount { header_name: row.get(0)?, count: row.get::<_, i64>(1)? as u64 })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Latest scans graded C+ or worse, worst grade first, then lowest score.
    pub fn urls_needing_attention(&self, n: usize) -> Result<Vec<ScanSummary>, StorageError> {
        let conn = self.connect()?;
        let sql = format!(
            "WITH {LATEST_SCANS_CTE}
            SELECT url, score, grade, timestamp FROM latest
            WHERE grade IN ({grades})
            ORDER BY {rank} DESC, score ASC, url
            LIMIT ?1",
            grades = attention_grades_sql(),
            rank = grade_rank_sql("grade"),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![n as i64], summary_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Share of all historical rows per header whose status is exactly `PASS`.
    pub fn adoption_rate(&self) -> Result<Vec<AdoptionRate>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT header_name,
                    SUM(CASE WHEN status = 'PASS' THEN 1 ELSE 0 END) * 100.0 / COUNT(*) AS rate
             FROM results
             GROUP BY header_name
             ORDER BY rate DESC, header_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AdoptionRate { header_name: row.get(0)?, rate: row.get(1)? })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// URLs whose two most recent scans within `days` carry different grades.
    pub fn recent_changes(&self, days: i64) -> Result<Vec<GradeChange>, StorageError> {
        let since = format_timestamp(days_before(Utc::now(), days)?);
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "WITH scans AS (
                SELECT url, timestamp, MAX(score) AS score, MAX(grade) AS grade, MAX(id) AS last_id
                FROM results
                WHERE timestamp >= ?1
                GROUP BY url, timestamp
            ),
            ranked AS (
                SELECT url, timestamp, score, grade,
                       ROW_NUMBER() OVER (PARTITION BY url ORDER BY timestamp DESC, last_id DESC) AS rn
                FROM scans
            )
            SELECT n.url, o.score, o.grade, n.score, n.grade, o.timestamp, n.timestamp
            FROM ranked n JOIN ranked o ON o.url = n.url AND o.rn = 2
            WHERE n.rn = 1 AND n.grade != o.grade
            ORDER BY (n.score - o.score) DESC, n.url",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(GradeChange {
                url: row.get(0)?,
                old_score: row.get(1)?,
                old_grade: Grade::parse_lenient(&row.get::<_, String>(2)?),
                new_score: row.get(3)?,
                new_grade: Grade::parse_lenient(&row.get::<_, String>(4)?),
                old_timestamp: row.get(5)?,
                new_timestamp: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Every distinct URL with its latest score and grade, best first.
    pub fn export(&self, grade: Option<Grade>) -> Result<Vec<ScanSummary>, StorageError> {
        let conn = self.connect()?;
        let sql = format!(
            "WITH {LATEST_SCANS_CTE}
            SELECT url, score, grade, timestamp FROM latest
            WHERE ?1 IS NULL OR grade = ?1
            ORDER BY {rank} ASC, score DESC, url",
            rank = grade_rank_sql("grade"),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![grade.map(|g| g.to_string())], summary_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Latest scans with exactly `grade`, highest score first.
    pub fn search_by_grade(&self, grade: Grade) -> Result<Vec<ScanSummary>, StorageError> {
        self.export(Some(grade))
    }

    /// Aggregate over each URL's latest scan. `None` when the store is empty.
    pub fn overall_summary(&self) -> Result<Option<OverallSummary>, StorageError> {
        let latest = self.export(None)?;
        if latest.is_empty() {
            return Ok(None);
        }
        let total = latest.len() as u64;
        let average_score = latest.iter().map(|s| s.score).sum::<f64>() / total as f64;

        let mut counts: BTreeMap<Grade, u64> = BTreeMap::new();
        for scan in &latest {
            *counts.entry(scan.grade).or_default() += 1;
        }
        let distribution = counts
            .into_iter()
            .map(|(grade, count)| GradeShare {
                grade,
                count,
                percentage: count as f64 * 100.0 / total as f64,
            })
            .collect();

        Ok(Some(OverallSummary {
            total_urls: total,
            average_score,
            average_grade: crate::core::grading::grade_for_score(average_score),
            distribution,
        }))
    }

    /// Groups URLs whose latest scans returned identical header values and
    /// grades. Only groups of two or more URLs are reported.
    pub fn shared_configurations(&self) -> Result<Vec<SharedConfiguration>, StorageError> {
        let conn = self.connect()?;
        let sql = format!(
            "WITH {LATEST_SCANS_CTE}
            SELECT r.url, l.grade, r.header_name, r.header_value
            FROM results r JOIN latest l ON r.url = l.url AND r.timestamp = l.timestamp
            ORDER BY r.url, r.header_name"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut per_url: BTreeMap<String, (Grade, Vec<(String, Option<String>)>)> = BTreeMap::new();
        for row in rows {
            let (url, grade, name, value) = row?;
            per_url
                .entry(url)
                .or_insert_with(|| (Grade::parse_lenient(&grade), Vec::new()))
                .1
                .push((name, value));
        }

        let mut groups: BTreeMap<(Grade, Vec<(String, Option<String>)>), Vec<String>> = BTreeMap::new();
        for (url, key) in per_url {
            groups.entry(key).or_default().push(url);
        }

        Ok(groups
            .into_iter()
            .filter(|(_, urls)| urls.len() > 1)
            .map(|((grade, _), urls)| SharedConfiguration { grade, urls })
            .collect())
    }

    /// Pass versus fail/warning counts per scored header across all history.
    pub fn header_health(&self) -> Result<Vec<HeaderHealth>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT header_name,
                    SUM(CASE WHEN status LIKE 'PASS%' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status LIKE 'FAIL%' OR status LIKE 'WARNING%' THEN 1 ELSE 0 END)
             FROM results
             WHERE status != 'PASS (Upcoming header)'
             GROUP BY header_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let mut health = rows
            .map(|row| {
                let (header_name, passes, failures) = row?;
                let total = passes + failures;
                let pass_ratio = if total > 0 { passes as f64 / total as f64 } else { 0.0 };
                Ok(HeaderHealth {
                    header_name,
                    passes: passes as u64,
                    failures: failures as u64,
                    pass_ratio,
                })
            })
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        health.sort_by(|a, b| {
            b.pass_ratio
                .total_cmp(&a.pass_ratio)
                .then_with(|| a.header_name.cmp(&b.header_name))
        });
        Ok(health)
    }
}
