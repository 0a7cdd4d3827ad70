// src/core/scanner/mod.rs

// Public interface of the `scanner` module: fetching, warning enrichment and
// the single and bulk scan pipelines built on top of them.
pub mod bulk;
pub mod headers_scanner;
pub mod warnings_scanner;

use crate::core::error::{FetchError, StorageError};
use crate::core::grading::evaluate;
use crate::core::models::{Evaluation, FetchResult};
use crate::core::policy::Policy;
use crate::core::store::{ResultStore, DEFAULT_RETENTION_DAYS};
use self::headers_scanner::{build_client, fetch_headers};
use self::warnings_scanner::{NoWarnings, SecurityHeadersWarnings, WarningSource};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// When false, invalid certificates do not fail a fetch.
    pub verify_tls: bool,
    pub timeout: Duration,
    pub retention_days: i64,
    /// Query securityheaders.com for warnings.
    pub fetch_warnings: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::from_secs(10),
            retention_days: DEFAULT_RETENTION_DAYS,
            fetch_warnings: true,
        }
    }
}

/// Everything a scan needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct ScanContext {
    pub client: Client,
    pub policy: Arc<Policy>,
    pub store: ResultStore,
    pub warnings: Arc<dyn WarningSource>,
}

impl ScanContext {
    pub fn new(options: &ScanOptions, policy: Policy, store: ResultStore) -> Result<Self, FetchError> {
        let client = build_client(options)?;
        let warnings: Arc<dyn WarningSource> = if options.fetch_warnings {
            Arc::new(SecurityHeadersWarnings::new(client.clone()))
        } else {
            Arc::new(NoWarnings)
        };
        Ok(Self {
            client,
            policy: Arc::new(policy),
            store: store.with_retention_days(options.retention_days),
            warnings,
        })
    }

    pub fn with_warning_source(mut self, source: Arc<dyn WarningSource>) -> Self {
        self.warnings = source;
        self
    }
}

/// Result of the single-target pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub fetch: FetchResult,
    /// `None` when no response was obtained.
    pub evaluation: Option<Evaluation>,
    pub stored_rows: usize,
}

/// Looks up warnings for the fetched URL and grades the fetch.
pub(crate) async fn grade_fetch(ctx: &ScanContext, fetch: &FetchResult) -> Option<Evaluation> {
    if !fetch.responded() {
        return None;
    }
    let warnings = ctx.warnings.fetch_warnings(&fetch.target).await;
    evaluate(fetch, &ctx.policy, &warnings)
}

/// Writes an evaluation on the blocking pool.
pub(crate) async fn persist(
    store: &ResultStore,
    url: &str,
    evaluation: &Evaluation,
) -> Result<usize, StorageError> {
    let store = store.clone();
    let url = url.to_string();
    let evaluation = evaluation.clone();
    tokio::task::spawn_blocking(move || store.insert_scan(&url, &evaluation))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

/// Fetch, grade and store one target. Nothing is stored when the fetch
/// failed.
pub async fn scan_target(ctx: &ScanContext, target: &str) -> Result<ScanOutcome, StorageError> {
    let fetch = fetch_headers(&ctx.client, target).await;
    let Some(evaluation) = grade_fetch(ctx, &fetch).await else {
        warn!(target, "No response obtained; nothing stored.");
        return Ok(ScanOutcome { fetch, evaluation: None, stored_rows: 0 });
    };

    let stored_rows = persist(&ctx.store, &fetch.target, &evaluation)
        .await
        .inspect_err(|e| error!(target, error = %e, "Could not store scan."))?;
    info!(target, score = evaluation.score, grade = %evaluation.grade, "Scan complete.");
    Ok(ScanOutcome { fetch, evaluation: Some(evaluation), stored_rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Condition, Grade, HeaderRule, HeaderStatus, Warnings};
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedWarnings(Warnings);

    #[async_trait]
    impl WarningSource for FixedWarnings {
        async fn fetch_warnings(&self, _url: &str) -> Warnings {
            self.0.clone()
        }
    }

    fn test_policy() -> Policy {
        Policy::new(
            vec![
                HeaderRule::new("Strict-Transport-Security", Condition::Present),
                HeaderRule::new("X-Frame-Options", Condition::Present),
            ],
            vec![HeaderRule::new("Server", Condition::NotPresent)],
            vec![HeaderRule::new("Origin-Agent-Cluster", Condition::Present)],
        )
        .unwrap()
    }

    fn context(dir: &TempDir) -> ScanContext {
        let options = ScanOptions { fetch_warnings: false, ..ScanOptions::default() };
        let store = ResultStore::open(dir.path().join("results.db")).unwrap();
        ScanContext::new(&options, test_policy(), store).unwrap()
    }

    #[tokio::test]
    async fn test_scan_target_grades_and_stores() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Strict-Transport-Security", "max-age=31536000")
                    .insert_header("X-Frame-Options", "DENY"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let outcome = scan_target(&ctx, &server.uri()).await.unwrap();
        let evaluation = outcome.evaluation.unwrap();
        assert_eq!(evaluation.grade, Grade::APlus);
        assert_eq!(outcome.stored_rows, 4);

        let latest = ctx.store.latest(&server.uri()).unwrap();
        assert_eq!(latest.len(), 4);
        assert!(latest.iter().all(|r| r.grade == Grade::APlus));
    }

    #[tokio::test]
    async fn test_scan_target_applies_warnings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).insert_header("X-Frame-Options", "ALLOW-FROM x"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mut warnings = Warnings::new();
        warnings.insert("X-Frame-Options".to_string(), "ALLOW-FROM is obsolete".to_string());
        let ctx = context(&dir).with_warning_source(Arc::new(FixedWarnings(warnings)));

        let evaluation = scan_target(&ctx, &server.uri()).await.unwrap().evaluation.unwrap();
        let xfo = evaluation.verdicts.iter().find(|v| v.header_name == "X-Frame-Options").unwrap();
        assert!(matches!(xfo.status, HeaderStatus::Warning(_)));
        assert_eq!(evaluation.warnings, 1);
    }

    /// Serves every connection a bare status line with no headers at all.
    async fn headerless_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_headerless_response_is_graded() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let url = headerless_server().await;

        let outcome = scan_target(&ctx, &url).await.unwrap();
        assert_eq!(outcome.fetch.status_code, 200);
        assert!(outcome.fetch.headers.is_empty());

        let evaluation = outcome.evaluation.unwrap();
        assert_eq!(evaluation.passes, 1);
        assert_eq!(evaluation.fails, 2);
        assert_eq!(evaluation.grade, Grade::DMinus);
        let status = |name: &str| evaluation.verdicts.iter().find(|v| v.header_name == name).unwrap().status.clone();
        assert_eq!(status("Strict-Transport-Security"), HeaderStatus::Fail);
        assert_eq!(status("X-Frame-Options"), HeaderStatus::Fail);
        assert_eq!(status("Server"), HeaderStatus::PassNotPresent);

        assert_eq!(outcome.stored_rows, 4);
        assert_eq!(ctx.store.latest(&url).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_target_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let outcome = scan_target(&ctx, "127.0.0.1:1").await.unwrap();
        assert!(outcome.evaluation.is_none());
        assert_eq!(outcome.stored_rows, 0);
        assert!(ctx.store.recent_scans(10).unwrap().is_empty());
    }
}
