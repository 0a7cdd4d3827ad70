// src/core/scanner/bulk.rs

use crate::core::models::{BulkMetrics, BulkReport, Protocol, UrlOutcome};
use crate::core::scanner::headers_scanner::{fetch_headers, probe_protocol};
use crate::core::scanner::{grade_fetch, persist, ScanContext};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Parses a host list: one entry per line, blank lines and `#` comments
/// skipped, duplicates dropped in first-seen order.
pub fn parse_host_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

async fn grade_url(ctx: ScanContext, url: String) -> UrlOutcome {
    let fetch = fetch_headers(&ctx.client, &url).await;
    let Some(evaluation) = grade_fetch(&ctx, &fetch).await else {
        return UrlOutcome::NoResult { url, reason: "no response".to_string() };
    };

    let persisted = match persist(&ctx.store, &url, &evaluation).await {
        Ok(rows) => {
            debug!(url = %url, rows, "Bulk result stored.");
            true
        }
        Err(e) => {
            error!(url = %url, error = %e, "Could not store bulk result.");
            false
        }
    };
    UrlOutcome::Graded { url, score: evaluation.score, grade: evaluation.grade, persisted }
}

/// Probes, fetches, grades and stores every host concurrently.
///
/// A failed or panicking task only affects its own URL's outcome.
pub async fn run_bulk(hosts: Vec<String>, ctx: &ScanContext) -> BulkReport {
    let mut metrics = BulkMetrics { total_submitted: hosts.len(), ..BulkMetrics::default() };
    let mut outcomes = Vec::with_capacity(hosts.len());
    info!(hosts = hosts.len(), "Starting bulk scan.");

    let probes = hosts.iter().map(|host| {
        let client = ctx.client.clone();
        let host = host.clone();
        tokio::spawn(async move { probe_protocol(&client, &host).await })
    });
    let probed = join_all(probes).await;

    let mut resolved = Vec::new();
    for (host, joined) in hosts.into_iter().zip(probed) {
        match joined {
            Ok(Some(url)) => {
                match Protocol::of_url(&url) {
                    Some(Protocol::Https) => metrics.https_urls += 1,
                    Some(Protocol::Http) => metrics.http_urls += 1,
                    None => {}
                }
                resolved.push(url);
            }
            Ok(None) => {
                metrics.unreachable += 1;
                outcomes.push(UrlOutcome::Unreachable { host });
            }
            Err(e) => {
                error!(host = %host, error = %e, "Probe task failed.");
                metrics.unreachable += 1;
                outcomes.push(UrlOutcome::Unreachable { host });
            }
        }
    }

    let tasks = resolved
        .iter()
        .map(|url| tokio::spawn(grade_url(ctx.clone(), url.clone())));
    let graded = join_all(tasks).await;

    for (url, joined) in resolved.into_iter().zip(graded) {
        let outcome = joined.unwrap_or_else(|e| {
            error!(url = %url, error = %e, "Scan task failed.");
            UrlOutcome::NoResult { url: url.clone(), reason: format!("task failed: {}", e) }
        });
        match &outcome {
            UrlOutcome::Graded { .. } => metrics.successful_fetches += 1,
            UrlOutcome::NoResult { url, reason } => {
                warn!(url = %url, reason = %reason, "No result for URL.");
                metrics.unsuccessful_fetches += 1;
            }
            UrlOutcome::Unreachable { .. } => {}
        }
        outcomes.push(outcome);
    }

    info!(
        total = metrics.total_submitted,
        successful = metrics.successful_fetches,
        unsuccessful = metrics.unsuccessful_fetches,
        https = metrics.https_urls,
        http = metrics.http_urls,
        unreachable = metrics.unreachable,
        "Bulk scan finished."
    );
    BulkReport { metrics, outcomes }
}
