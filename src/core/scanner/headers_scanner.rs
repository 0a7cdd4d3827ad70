// src/core/scanner/headers_scanner.rs

use crate::core::error::FetchError;
use crate::core::models::{FetchResult, HeaderSet, Protocol};
use crate::core::scanner::ScanOptions;
use chrono::Utc;
use reqwest::{redirect, Client};
use tracing::{debug, error, info, warn};

/// Desktop Chrome user agent. Some CDNs serve reduced header sets to
/// unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// Builds the shared HTTP client used by every fetch and probe.
pub fn build_client(options: &ScanOptions) -> Result<Client, FetchError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(options.timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(!options.verify_tls)
        .build()
        .map_err(FetchError::Client)
}

pub fn has_scheme(target: &str) -> bool {
    Protocol::of_url(target).is_some()
}

/// URLs to try for `target`, in order. Bare hosts try HTTPS first.
fn candidate_urls(target: &str) -> Vec<String> {
    let target = target.trim();
    if has_scheme(target) {
        vec![target.to_string()]
    } else {
        vec![format!("https://{}", target), format!("http://{}", target)]
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<FetchResult, FetchError> {
    // The body is never read; dropping the response closes the stream.
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_request(url, e))?;

    let status = response.status();
    let mut headers = HeaderSet::new();
    for (name, value) in response.headers() {
        match value.to_str() {
            Ok(v) => headers.insert(name.as_str(), v),
            Err(_) => {
                warn!(url, header_name = %name, "Header contained invalid UTF-8.");
                headers.insert(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
            }
        }
    }

    if !(status.is_success() || status.is_redirection()) {
        warn!(url, status = %status, "Server answered with an error status; grading its headers anyway.");
    }

    Ok(FetchResult {
        target: url.to_string(),
        final_url: response.url().to_string(),
        status_code: status.as_u16(),
        protocol: Protocol::of_url(url),
        headers,
        timestamp: Utc::now(),
    })
}

/// Fetches the response headers of `target`.
///
/// A bare host is tried over HTTPS and then HTTP; a full URL is requested as
/// given. Never fails: when no attempt gets a response the returned result
/// has `status_code == 0` and no headers.
pub async fn fetch_headers(client: &Client, target: &str) -> FetchResult {
    info!(target, "Fetching headers.");
    for url in candidate_urls(target) {
        match fetch_once(client, &url).await {
            Ok(result) => {
                debug!(
                    url = %url,
                    final_url = %result.final_url,
                    status = result.status_code,
                    headers = result.headers.len(),
                    "Headers received."
                );
                return result;
            }
            Err(e) => warn!(url = %url, error = %e, "Fetch attempt failed."),
        }
    }
    error!(target, "All fetch attempts failed.");
    FetchResult::failed(target.trim())
}

/// Finds the scheme a host answers on with a `HEAD` request, HTTPS first.
///
/// Returns the working base URL, or `None` if neither scheme responds. Any
/// HTTP response counts, including error statuses.
pub async fn probe_protocol(client: &Client, host: &str) -> Option<String> {
    for url in candidate_urls(host) {
        match client.head(&url).send().await {
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Probe succeeded.");
                return Some(url);
            }
            Err(e) => debug!(url = %url, error = %e, "Probe failed."),
        }
    }
    warn!(host, "Host unreachable over HTTPS and HTTP.");
    None
}
