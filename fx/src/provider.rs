//! Page source trait and implementations.

use std::time::Duration;

use async_trait::async_trait;
use fxscrape_common::{UnitFailure, UnitResult};
use tracing::debug;

/// Default user agent for upstream requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Trait for anything that can hand back a document for a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the document body at `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> UnitResult<String>;
}

/// Fetches pages over HTTP with a shared connection pool.
#[derive(Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    /// Create a new HTTP page source.
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> UnitResult<String> {
        let classify = |err: reqwest::Error| {
            if err.is_timeout() {
                UnitFailure::Timeout(timeout.as_millis() as u64)
            } else {
                UnitFailure::Fetch(err.to_string())
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UnitFailure::Fetch(format!("HTTP {status} from {url}")));
        }

        let body = response.text().await.map_err(classify)?;
        debug!(url = url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Canned page source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct StaticPageSource {
    pages: dashmap::DashMap<String, StaticPage>,
    fetches: std::sync::atomic::AtomicUsize,
    in_flight: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    peak_in_flight: std::sync::atomic::AtomicUsize,
}

/// What a [`StaticPageSource`] answers for one URL.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub enum StaticPage {
    /// Respond with the body.
    Body(String),
    /// Respond with the body after a delay.
    Delayed(Duration, String),
    /// Fail with the given reason.
    Fail(UnitFailure),
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticPageSource {
    /// Create an empty source; unknown URLs fail with a fetch error.
    pub fn new() -> Self {
        Self {
            pages: dashmap::DashMap::new(),
            fetches: std::sync::atomic::AtomicUsize::new(0),
            in_flight: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            peak_in_flight: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve `body` for `url`.
    pub fn set_page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.pages.insert(url.into(), StaticPage::Body(body.into()));
    }

    /// Serve `body` for `url` after `delay`.
    pub fn set_delayed_page(&self, url: impl Into<String>, delay: Duration, body: impl Into<String>) {
        self.pages
            .insert(url.into(), StaticPage::Delayed(delay, body.into()));
    }

    /// Fail every fetch of `url`.
    pub fn set_failure(&self, url: impl Into<String>, failure: UnitFailure) {
        self.pages.insert(url.into(), StaticPage::Fail(failure));
    }

    /// Total fetches attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for StaticPageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
struct InFlightGuard(std::sync::Arc<std::sync::atomic::AtomicUsize>);

#[cfg(any(test, feature = "test-utils"))]
impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PageSource for StaticPageSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> UnitResult<String> {
        use std::sync::atomic::Ordering;

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(std::sync::Arc::clone(&self.in_flight));
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        // Clone out so no map guard is held across the await below.
        let page = self.pages.get(url).map(|entry| entry.value().clone());
        match page {
            Some(StaticPage::Body(body)) => {
                // Yield so concurrently scheduled fetches overlap.
                tokio::task::yield_now().await;
                Ok(body)
            }
            Some(StaticPage::Delayed(delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            Some(StaticPage::Fail(failure)) => Err(failure),
            None => Err(UnitFailure::Fetch(format!("HTTP 404 Not Found from {url}"))),
        }
    }
}

/// HTML builders shaped like the upstream pages.
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    /// A currency table page with `(code, name, rate)` rows.
    pub fn currency_table_html(rows: &[(&str, &str, &str)]) -> String {
        let body: String = rows
            .iter()
            .map(|(code, name, rate)| {
                format!(
                    "<tr><th scope=\"row\">{code}</th><td>{name}</td><td>{rate}</td><td>1.0</td></tr>"
                )
            })
            .collect();
        format!(
            "<html><body><table class=\"currencytables__Table-sc-xlq26m-3\">\
             <thead><tr><th>Currency</th><th>Name</th><th>Units per</th><th>Per unit</th></tr></thead>\
             <tbody>{body}</tbody></table></body></html>"
        )
    }

    /// A converter page with the big rate and optional "updated" text.
    pub fn converter_html(big_rate: &str, updated: Option<&str>) -> String {
        let updated = updated
            .map(|text| format!("<div class=\"result__LiveSubText-sc-1bsijpp-2 jcIWiH\">{text}</div>"))
            .unwrap_or_default();
        format!(
            "<html><body><main>\
             <p class=\"result__BigRate-sc-1bsijpp-1 dPdXSB\">{big_rate}</p>{updated}\
             </main></body></html>"
        )
    }
}
