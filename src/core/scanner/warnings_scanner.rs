// src/core/scanner/warnings_scanner.rs

//! Optional enrichment: header warnings reported by securityheaders.com.

use crate::core::models::Warnings;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

pub const SECURITYHEADERS_ENDPOINT: &str = "https://securityheaders.com/";

static SECTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.reportTitle, div.reportBody").unwrap());
static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.tableRow").unwrap());
static LABEL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th.tableLabel").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("td.tableCell").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Something that can report per-header warnings for a URL.
///
/// Implementations must not fail: any problem yields an empty map.
#[async_trait]
pub trait WarningSource: Send + Sync {
    async fn fetch_warnings(&self, url: &str) -> Warnings;
}

/// Used when warning lookups are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWarnings;

#[async_trait]
impl WarningSource for NoWarnings {
    async fn fetch_warnings(&self, _url: &str) -> Warnings {
        Warnings::new()
    }
}

#[derive(Debug, Clone)]
pub struct SecurityHeadersWarnings {
    client: Client,
    endpoint: String,
}

impl SecurityHeadersWarnings {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, SECURITYHEADERS_ENDPOINT)
    }

    pub fn with_endpoint(client: Client, endpoint: &str) -> Self {
        Self { client, endpoint: endpoint.to_string() }
    }
}

#[async_trait]
impl WarningSource for SecurityHeadersWarnings {
    async fn fetch_warnings(&self, url: &str) -> Warnings {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", url), ("hide", "on"), ("followRedirects", "on")])
            .send()
            .await;

        let body = match response {
            Ok(r) => r.text().await,
            Err(e) => Err(e),
        };
        match body {
            Ok(html) => {
                let warnings = extract_warnings(&html);
                info!(url, count = warnings.len(), "Fetched header warnings.");
                warnings
            }
            Err(e) => {
                warn!(url, error = %e, "Could not fetch header warnings; continuing without them.");
                Warnings::new()
            }
        }
    }
}

fn clean_text(element: ElementRef) -> String {
    let text: String = element.text().collect();
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Pulls `header -> message` pairs out of the "Warnings" section of a
/// securityheaders.com report page.
pub fn extract_warnings(html: &str) -> Warnings {
    let document = Html::parse_document(html);
    let mut warnings = Warnings::new();
    let mut in_warnings = false;

    for section in document.select(&SECTION_SELECTOR) {
        let is_title = section.value().classes().any(|c| c == "reportTitle");
        if is_title {
            in_warnings = clean_text(section) == "Warnings";
            continue;
        }
        if !in_warnings {
            continue;
        }
        for row in section.select(&ROW_SELECTOR) {
            let label = row.select(&LABEL_SELECTOR).next();
            let cell = row.select(&CELL_SELECTOR).next();
            if let (Some(label), Some(cell)) = (label, cell) {
                let name = clean_text(label);
                if !name.is_empty() {
                    debug!(header = %name, "Warning found.");
                    warnings.insert(name, clean_text(cell));
                }
            }
        }
        break;
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPORT: &str = r#"
        <html><body>
          <div class="reportSection">
            <div class="reportTitle">Missing Headers</div>
            <div class="reportBody">
              <table><tr class="tableRow">
                <th class="tableLabel">Permissions-Policy</th>
                <td class="tableCell">Not set.</td>
              </tr></table>
            </div>
          </div>
          <div class="reportSection">
            <div class="reportTitle">Warnings</div>
            <div class="reportBody">
              <table>
                <tr class="tableRow">
                  <th class="tableLabel">Strict-Transport-Security</th>
                  <td class="tableCell">The max-age is
                      too short.</td>
                </tr>
                <tr class="tableRow">
                  <th class="tableLabel">Site is using HTTP</th>
                  <td class="tableCell">This site was served over HTTP.</td>
                </tr>
                <tr class="tableRow"><th class="tableLabel">Incomplete</th></tr>
              </table>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_warnings_reads_only_warning_section() {
        let warnings = extract_warnings(REPORT);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings.get("Strict-Transport-Security").map(String::as_str),
            Some("The max-age is too short.")
        );
        assert!(warnings.contains_key("Site is using HTTP"));
        assert!(!warnings.contains_key("Permissions-Policy"));
    }

    #[test]
    fn test_extract_warnings_without_section() {
        assert!(extract_warnings("<html><body><p>rate limited</p></body></html>").is_empty());
        assert!(extract_warnings("").is_empty());
    }

    #[tokio::test]
    async fn test_security_headers_source_queries_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "https://example.com"))
            .and(query_param("hide", "on"))
            .respond_with(ResponseTemplate::new(200).set_body_string(REPORT))
            .mount(&server)
            .await;

        let source = SecurityHeadersWarnings::with_endpoint(Client::new(), &server.uri());
        let warnings = source.fetch_warnings("https://example.com").await;
        assert_eq!(warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_source_degrades_to_empty() {
        let source = SecurityHeadersWarnings::with_endpoint(Client::new(), "http://127.0.0.1:1/");
        assert!(source.fetch_warnings("https://example.com").await.is_empty());
        assert!(NoWarnings.fetch_warnings("https://example.com").await.is_empty());
    }
}
