// src/checker/http.rs
// =============================================================================
// This module checks if resources are reachable over HTTP(S).
//
// Key functionality:
// - Makes HTTP HEAD requests (lightweight, no body download)
// - Falls back to GET if the server rejects HEAD
// - Retries transport failures with exponential backoff
// - Asks a TolerancePolicy which outcomes count as "accessible"
//
// The network sits behind the HttpTransport trait. Production code uses the
// reqwest-backed transport; tests plug in a scripted fake and can assert
// exactly how many requests were sent.
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::policy::{RetryPolicy, TolerancePolicy, ACCEPTED_STATUSES};
use super::reference::is_external_url;
use crate::error::{ConfigError, ResourceError};

/// Broad category of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    TooManyRedirects,
    Other,
}

impl TransportErrorKind {
    // Certificate and redirect-loop problems come back the same every time
    pub fn is_retryable(self) -> bool {
        !matches!(self, TransportErrorKind::Tls | TransportErrorKind::TooManyRedirects)
    }
}

/// A request that produced no HTTP status at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The two requests the prober needs. Only the status code matters.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn head(&self, url: &Url) -> Result<u16, TransportError>;
    async fn get(&self, url: &Url) -> Result<u16, TransportError>;
}

/// reqwest-backed transport with a per-request timeout.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        // One client for the whole run (connection pooling); redirects are
        // followed so the final status is what we judge
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("resource-guardian/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn head(&self, url: &Url) -> Result<u16, TransportError> {
        match self.client.head(url.clone()).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(categorize_error(e)),
        }
    }

    async fn get(&self, url: &Url) -> Result<u16, TransportError> {
        // Status arrives with the headers; the body is never read
        match self.client.get(url.clone()).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) => Err(categorize_error(e)),
        }
    }
}

// Sorts reqwest errors into the handful of categories we report
fn categorize_error(error: reqwest::Error) -> TransportError {
    let error_string = error.to_string();
    let lower = error_string.to_lowercase();

    if error.is_timeout() {
        TransportError::new(TransportErrorKind::Timeout, "request timed out")
    } else if error.is_redirect() {
        TransportError::new(TransportErrorKind::TooManyRedirects, "too many redirects")
    } else if error.is_connect() {
        if lower.contains("dns") {
            TransportError::new(TransportErrorKind::Dns, "could not resolve hostname")
        } else {
            TransportError::new(TransportErrorKind::Connect, "connection failed")
        }
    } else if lower.contains("certificate") || lower.contains("ssl") || lower.contains("tls") {
        TransportError::new(TransportErrorKind::Tls, "SSL certificate error")
    } else {
        TransportError::new(TransportErrorKind::Other, error_string)
    }
}

/// Outcome of probing one reference on the web.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// The absolute URL that was (or would have been) requested
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub accessible: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Set whenever the outcome was a failure, tolerated or not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResourceError>,
    /// Number of requests sent (HEAD and GET both count)
    pub requests: u32,
}

impl ProbeResult {
    fn unreachable(url: String, error: ResourceError) -> Self {
        ProbeResult {
            url,
            http_status: None,
            accessible: false,
            skipped: false,
            skip_reason: None,
            error: Some(error),
            requests: 0,
        }
    }
}

/// Probes references against the live site.
pub struct RemoteProber {
    transport: Arc<dyn HttpTransport>,
    tolerance: Arc<dyn TolerancePolicy>,
    retry: RetryPolicy,
}

impl RemoteProber {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tolerance: Arc<dyn TolerancePolicy>,
        retry: RetryPolicy,
    ) -> Self {
        RemoteProber {
            transport,
            tolerance,
            retry,
        }
    }

    // Probes `reference`, joining it onto `base_url` when it is relative
    pub async fn probe(&self, reference: &str, base_url: &Url) -> ProbeResult {
        let url = match absolute_url(reference, base_url) {
            Ok(url) => url,
            Err(reason) => {
                return ProbeResult::unreachable(
                    reference.to_string(),
                    ResourceError::ConnectionError { message: reason },
                )
            }
        };
        self.probe_url(url).await
    }

    pub async fn probe_url(&self, url: Url) -> ProbeResult {
        if let Some(reason) = self.tolerance.skip_reason(&url) {
            debug!(url = %url, %reason, "probe skipped");
            return ProbeResult {
                url: url.to_string(),
                http_status: None,
                accessible: true,
                skipped: true,
                skip_reason: Some(reason),
                error: None,
                requests: 0,
            };
        }

        let mut requests = 0;
        let mut attempt = 0;
        let outcome = loop {
            let (outcome, sent) = self.head_then_get(&url).await;
            requests += sent;

            match outcome {
                Err(ref e) if e.kind.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt, url.as_str());
                    debug!(url = %url, error = %e, ?delay, "retrying after transport error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => break other,
            }
        };

        match outcome {
            Ok(status) => {
                let accessible = self.tolerance.accepts_status(status);
                // A tolerated status still records its error for the log
                let error = if ACCEPTED_STATUSES.contains(&status) {
                    None
                } else {
                    Some(ResourceError::HttpError { status })
                };
                ProbeResult {
                    url: url.to_string(),
                    http_status: Some(status),
                    accessible,
                    skipped: false,
                    skip_reason: None,
                    error,
                    requests,
                }
            }
            Err(e) => ProbeResult {
                url: url.to_string(),
                http_status: None,
                accessible: self.tolerance.tolerates_transport_error(&e),
                skipped: false,
                skip_reason: None,
                error: Some(ResourceError::ConnectionError { message: e.message }),
                requests,
            },
        }
    }

    // One attempt: HEAD, and GET if the server refused HEAD.
    // Returns the outcome and how many requests went out.
    async fn head_then_get(&self, url: &Url) -> (Result<u16, TransportError>, u32) {
        match self.transport.head(url).await {
            Ok(status) if !HEAD_REJECTED.contains(&status) => (Ok(status), 1),
            Ok(status) => {
                debug!(url = %url, status, "HEAD rejected, falling back to GET");
                (self.transport.get(url).await, 2)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD failed, falling back to GET");
                (self.transport.get(url).await, 2)
            }
        }
    }
}

// "Method Not Allowed" / "Not Implemented" for HEAD means try GET
const HEAD_REJECTED: [u16; 2] = [405, 501];

// Turns a reference into an absolute URL.
//
// Root-relative references mean the site root, which is the base URL's path,
// not the host root: a site deployed under /repo/ keeps its prefix.
//
// Examples (base = "https://example.com/repo/"):
//   "https://other.com/x"  -> "https://other.com/x"
//   "//cdn.example.com/a"  -> "https://cdn.example.com/a"
//   "/docs/cv.pdf"         -> "https://example.com/repo/docs/cv.pdf"
//   "img/a.png"            -> "https://example.com/repo/img/a.png"
pub fn absolute_url(reference: &str, base_url: &Url) -> Result<Url, String> {
    if is_external_url(reference) && !reference.starts_with("//") {
        return Url::parse(reference).map_err(|e| format!("invalid URL: {}", e));
    }
    let relative = if reference.starts_with("//") {
        reference
    } else {
        reference.trim_start_matches('/')
    };
    base_url
        .join(relative)
        .map_err(|e| format!("invalid URL: {}", e))
}

// Makes sure a base URL ends with '/' so joins stay inside its path
pub fn directory_url(base_url: &Url, dir: &str) -> Result<Url, String> {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        return Ok(base_url.clone());
    }
    base_url
        .join(&format!("{}/", dir))
        .map_err(|e| format!("invalid URL: {}", e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::checker::policy::EnvironmentTolerance;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // Scripted transport: answers per URL, counts every request
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        pub head: Mutex<HashMap<String, Vec<Result<u16, TransportError>>>>,
        pub get: Mutex<HashMap<String, Vec<Result<u16, TransportError>>>>,
        pub head_calls: AtomicU32,
        pub get_calls: AtomicU32,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        // Every HEAD and GET to `url` answers `status`
        pub(crate) fn status(self, url: &str, status: u16) -> Self {
            self.head.lock().unwrap().insert(url.to_string(), vec![Ok(status)]);
            self.get.lock().unwrap().insert(url.to_string(), vec![Ok(status)]);
            self
        }

        pub(crate) fn head_script(self, url: &str, answers: Vec<Result<u16, TransportError>>) -> Self {
            self.head.lock().unwrap().insert(url.to_string(), answers);
            self
        }

        pub(crate) fn get_script(self, url: &str, answers: Vec<Result<u16, TransportError>>) -> Self {
            self.get.lock().unwrap().insert(url.to_string(), answers);
            self
        }

        pub(crate) fn total_calls(&self) -> u32 {
            self.head_calls.load(Ordering::SeqCst) + self.get_calls.load(Ordering::SeqCst)
        }

        // Pops the next scripted answer; the last one repeats. Unknown URLs 404.
        fn answer(
            table: &Mutex<HashMap<String, Vec<Result<u16, TransportError>>>>,
            url: &Url,
        ) -> Result<u16, TransportError> {
            let mut table = table.lock().unwrap();
            match table.get_mut(url.as_str()) {
                Some(answers) if answers.len() > 1 => answers.remove(0),
                Some(answers) if answers.len() == 1 => answers[0].clone(),
                _ => Ok(404),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn head(&self, url: &Url) -> Result<u16, TransportError> {
            self.head_calls.fetch_add(1, Ordering::SeqCst);
            Self::answer(&self.head, url)
        }

        async fn get(&self, url: &Url) -> Result<u16, TransportError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            Self::answer(&self.get, url)
        }
    }

    pub(crate) fn no_delay_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn prober(fake: Arc<FakeTransport>, ci: bool, retries: u32) -> RemoteProber {
        RemoteProber::new(
            fake,
            Arc::new(EnvironmentTolerance::with_default_domains(ci)),
            no_delay_retry(retries),
        )
    }

    fn base() -> Url {
        Url::parse("https://site.example/").unwrap()
    }

    fn connect_error() -> TransportError {
        TransportError::new(TransportErrorKind::Connect, "connection failed")
    }

    #[test]
    fn test_absolute_url_joins() {
        let b = base();
        assert_eq!(absolute_url("/docs/cv.pdf", &b).unwrap().as_str(), "https://site.example/docs/cv.pdf");
        assert_eq!(absolute_url("img/a.png", &b).unwrap().as_str(), "https://site.example/img/a.png");
        assert_eq!(absolute_url("https://other.org/x", &b).unwrap().as_str(), "https://other.org/x");
        assert_eq!(absolute_url("//cdn.org/x.js", &b).unwrap().as_str(), "https://cdn.org/x.js");
    }

    #[test]
    fn test_root_relative_keeps_base_path() {
        let b = Url::parse("https://user.github.io/repo/").unwrap();
        assert_eq!(absolute_url("/robots.txt", &b).unwrap().as_str(), "https://user.github.io/repo/robots.txt");
        assert_eq!(absolute_url("/img/a.png", &b).unwrap().as_str(), "https://user.github.io/repo/img/a.png");
        assert_eq!(absolute_url("img/a.png", &b).unwrap().as_str(), "https://user.github.io/repo/img/a.png");
        assert_eq!(absolute_url("//cdn.org/x.js", &b).unwrap().as_str(), "https://cdn.org/x.js");
        assert_eq!(absolute_url("/", &b).unwrap(), b);
    }

    #[test]
    fn test_directory_url() {
        let b = base();
        assert_eq!(directory_url(&b, "blog/post").unwrap().as_str(), "https://site.example/blog/post/");
        assert_eq!(directory_url(&b, "").unwrap(), b);
    }

    #[tokio::test]
    async fn test_ok_status_is_accessible() {
        let fake = Arc::new(FakeTransport::new().status("https://site.example/a.pdf", 200));
        let result = prober(fake.clone(), false, 1).probe("a.pdf", &base()).await;

        assert!(result.accessible);
        assert_eq!(result.http_status, Some(200));
        assert_eq!(result.error, None);
        assert_eq!(fake.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_404_is_http_error() {
        let fake = Arc::new(FakeTransport::new());
        let result = prober(fake, false, 1).probe("missing.pdf", &base()).await;

        assert!(!result.accessible);
        assert_eq!(result.error, Some(ResourceError::HttpError { status: 404 }));
    }

    #[tokio::test]
    async fn test_skip_listed_domain_in_ci_sends_nothing() {
        let fake = Arc::new(FakeTransport::new());
        let result = prober(fake.clone(), true, 1)
            .probe("https://doi.org/10.1/abc", &base())
            .await;

        assert!(result.accessible);
        assert!(result.skipped);
        assert!(result.skip_reason.is_some());
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_skip_listed_domain_outside_ci_sends_request() {
        let fake = Arc::new(FakeTransport::new().status("https://doi.org/10.1/abc", 200));
        let result = prober(fake.clone(), false, 1)
            .probe("https://doi.org/10.1/abc", &base())
            .await;

        assert!(!result.skipped);
        assert!(result.accessible);
        assert_eq!(fake.head_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_head_transport_error_falls_back_to_get() {
        let url = "https://site.example/page.html";
        let fake = Arc::new(
            FakeTransport::new()
                .head_script(url, vec![Err(connect_error())])
                .get_script(url, vec![Ok(200)]),
        );
        let result = prober(fake.clone(), false, 0).probe("page.html", &base()).await;

        assert!(result.accessible);
        assert_eq!(result.requests, 2);
        assert_eq!(fake.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_head_405_falls_back_to_get() {
        let url = "https://site.example/a.js";
        let fake = Arc::new(
            FakeTransport::new()
                .head_script(url, vec![Ok(405)])
                .get_script(url, vec![Ok(200)]),
        );
        let result = prober(fake, false, 0).probe("a.js", &base()).await;
        assert_eq!(result.http_status, Some(200));
    }

    #[tokio::test]
    async fn test_transport_errors_retry_then_report() {
        let url = "https://flaky.example/";
        let fake = Arc::new(
            FakeTransport::new()
                .head_script(url, vec![Err(connect_error())])
                .get_script(url, vec![Err(connect_error())]),
        );
        let result = prober(fake.clone(), false, 2).probe(url, &base()).await;

        assert!(!result.accessible);
        assert!(matches!(result.error, Some(ResourceError::ConnectionError { .. })));
        // three attempts, each HEAD + GET
        assert_eq!(fake.total_calls(), 6);
        assert_eq!(result.requests, 6);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let url = "https://flaky.example/";
        let fake = Arc::new(
            FakeTransport::new()
                .head_script(url, vec![Err(connect_error()), Ok(200)])
                .get_script(url, vec![Err(connect_error())]),
        );
        let result = prober(fake, false, 1).probe(url, &base()).await;
        assert!(result.accessible);
        assert_eq!(result.requests, 3);
    }

    #[tokio::test]
    async fn test_tls_errors_are_not_retried() {
        let url = "https://badcert.example/";
        let tls = TransportError::new(TransportErrorKind::Tls, "SSL certificate error");
        let fake = Arc::new(
            FakeTransport::new()
                .head_script(url, vec![Err(tls.clone())])
                .get_script(url, vec![Err(tls)]),
        );
        let result = prober(fake.clone(), false, 3).probe(url, &base()).await;

        assert!(!result.accessible);
        assert_eq!(fake.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_ci_tolerates_403_and_transport_errors() {
        let forbidden = "https://publisher.example/paper";
        let down = "https://down.example/";
        let fake = Arc::new(
            FakeTransport::new()
                .status(forbidden, 403)
                .head_script(down, vec![Err(connect_error())])
                .get_script(down, vec![Err(connect_error())]),
        );

        let ci = prober(fake.clone(), true, 0);
        let r403 = ci.probe(forbidden, &base()).await;
        assert!(r403.accessible);
        assert_eq!(r403.error, Some(ResourceError::HttpError { status: 403 }));
        assert!(ci.probe(down, &base()).await.accessible);

        let local = prober(fake, false, 0);
        assert!(!local.probe(forbidden, &base()).await.accessible);
        assert!(!local.probe(down, &base()).await.accessible);
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is HttpTransport a trait?
//    - Tests need to answer "HEAD https://x/y" without a network
//    - RemoteProber only holds an Arc<dyn HttpTransport>, so any type that
//      implements the trait can be plugged in
//
// 2. What is #[async_trait]?
//    - It lets a trait have async methods and still be used as `dyn Trait`
//    - Under the hood each method returns a boxed future
//
// 3. What does `loop { ... break value }` do?
//    - A loop can produce a value: `break other` ends the loop and hands
//      `other` to the `let outcome = loop { ... }` binding
//
// 4. Why `Err(ref e) if ...`?
//    - `ref` borrows the error instead of moving it out, so the match guard
//      can look at it and the other arm can still take the whole outcome
// -----------------------------------------------------------------------------
