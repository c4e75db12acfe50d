// src/config.rs
// =============================================================================
// Run configuration.
//
// Everything the validator needs to know is in ValidatorConfig, including the
// CI flag. The CLI fills it in once; after that nothing reads environment
// variables, so tests can build any configuration they like.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::checker::{FilenameFallback, RetryPolicy, DEFAULT_SKIP_DOMAINS};
use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://prajitdas.github.io";
pub const DEFAULT_KEY_FILES: [&str; 3] = ["index.html", "robots.txt", "sitemap.xml"];

/// Whether a reference that already passed locally is also probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePolicy {
    /// Local PASS is final; no request is sent for it
    SkipWhenLocalPasses,
    Always,
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Canonicalized site root
    pub site_root: PathBuf,
    /// Base URL with a trailing '/' on its path
    pub base_url: Url,
    pub ci: bool,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub deadline: Option<Duration>,
    pub skip_domains: Vec<String>,
    pub probe_policy: ProbePolicy,
    pub filename_fallback: FilenameFallback,
    pub sample_limit: usize,
    pub samples_per_type: usize,
    pub key_files: Vec<String>,
    pub strict_key_files: bool,
    pub log_dir: PathBuf,
}

impl ValidatorConfig {
    // Defaults for a site root and base URL; validates both
    pub fn new(site_root: impl Into<PathBuf>, base_url: &str, ci: bool) -> Result<Self, ConfigError> {
        Ok(ValidatorConfig {
            site_root: validate_site_root(site_root.into())?,
            base_url: parse_base_url(base_url)?,
            ci,
            concurrency: 8,
            request_timeout: default_timeout(ci),
            retry: RetryPolicy::default(),
            deadline: None,
            skip_domains: DEFAULT_SKIP_DOMAINS.iter().map(|d| d.to_string()).collect(),
            probe_policy: ProbePolicy::SkipWhenLocalPasses,
            filename_fallback: FilenameFallback::default(),
            sample_limit: 10,
            samples_per_type: 5,
            key_files: DEFAULT_KEY_FILES.iter().map(|f| f.to_string()).collect(),
            strict_key_files: false,
            log_dir: PathBuf::from("logs"),
        })
    }
}

// CI runners get a shorter timeout than interactive runs
pub fn default_timeout(ci: bool) -> Duration {
    if ci {
        Duration::from_secs(8)
    } else {
        Duration::from_secs(12)
    }
}

fn validate_site_root(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if !path.is_dir() {
        return Err(ConfigError::SiteRootMissing(path));
    }
    path.canonicalize()
        .map_err(|_| ConfigError::SiteRootMissing(path))
}

// Parses the base URL and gives its path a trailing '/', so joining
// "img/a.png" onto "https://host/site" yields "https://host/site/img/a.png"
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
