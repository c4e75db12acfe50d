// src/checker/policy.rs
// =============================================================================
// Tolerance and retry rules for remote probing.
//
// Whether a 403 is "broken" depends on who is asking. Academic publishers
// and DOI resolvers routinely answer automated clients with 403/418/429, so
// in CI those answers (and even transport errors) are accepted to keep the
// pipeline stable. On a developer's machine the same answers are failures
// that get logged for a human to look at.
//
// The rules are a trait so a caller can plug in its own predicate; the
// EnvironmentTolerance below is the stock implementation.
// =============================================================================

use std::time::Duration;
use url::Url;

use super::http::TransportError;

/// Domains known to block automated clients.
pub const DEFAULT_SKIP_DOMAINS: [&str; 11] = [
    "doi.org",
    "dx.doi.org",
    "arxiv.org",
    "ieee.org",
    "ieeexplore.ieee.org",
    "dl.acm.org",
    "acm.org",
    "search.proquest.com",
    "ceur-ws.org",
    "igi-global.com",
    "ebiquity.umbc.edu",
];

// Always acceptable: success plus every redirect code. Anything else records
// an error, even when a policy lets it pass.
pub(crate) const ACCEPTED_STATUSES: [u16; 6] = [200, 301, 302, 303, 307, 308];

// Additionally acceptable in CI: forbidden, teapot, too many requests
const CI_TOLERATED_STATUSES: [u16; 3] = [403, 418, 429];

/// Decides which remote outcomes count as "accessible".
pub trait TolerancePolicy: Send + Sync {
    /// Some(reason) means: do not send a request, treat as accessible.
    fn skip_reason(&self, url: &Url) -> Option<String>;

    fn accepts_status(&self, status: u16) -> bool;

    fn tolerates_transport_error(&self, error: &TransportError) -> bool;
}

/// Stock policy: strict outside CI, lenient inside it.
#[derive(Debug, Clone)]
pub struct EnvironmentTolerance {
    pub ci: bool,
    pub skip_domains: Vec<String>,
}

impl EnvironmentTolerance {
    pub fn new(ci: bool, skip_domains: Vec<String>) -> Self {
        let skip_domains = skip_domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        EnvironmentTolerance { ci, skip_domains }
    }

    #[cfg(test)]
    pub fn with_default_domains(ci: bool) -> Self {
        Self::new(
            ci,
            DEFAULT_SKIP_DOMAINS.iter().map(|d| d.to_string()).collect(),
        )
    }

    // Host equals the domain or is a subdomain of it
    fn matches_skip_list(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.skip_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl TolerancePolicy for EnvironmentTolerance {
    fn skip_reason(&self, url: &Url) -> Option<String> {
        if !self.ci {
            return None;
        }
        let host = url.host_str()?;
        if self.matches_skip_list(host) {
            Some(format!("skipped {} in CI (blocks automated clients)", host))
        } else {
            None
        }
    }

    fn accepts_status(&self, status: u16) -> bool {
        ACCEPTED_STATUSES.contains(&status)
            || (self.ci && CI_TOLERATED_STATUSES.contains(&status))
    }

    fn tolerates_transport_error(&self, _error: &TransportError) -> bool {
        self.ci
    }
}

/// Bounded retry with exponential backoff and jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    // Delay before retry number `attempt` (0-based) of `url`.
    //
    // base * 2^attempt, capped, plus up to 50% jitter. The jitter is derived
    // from the URL and attempt so concurrent retries to one host spread out
    // without needing a random number generator.
    pub fn backoff(&self, attempt: u32, url: &str) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let exp = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let half_ms = (exp.as_millis() / 2) as u64;
        if half_ms == 0 {
            return exp;
        }
        let seed = url
            .bytes()
            .chain(attempt.to_le_bytes())
            .fold(0_u64, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64));
        exp + Duration::from_millis(seed % half_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::http::TransportErrorKind;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_skip_only_in_ci() {
        let ci = EnvironmentTolerance::with_default_domains(true);
        let local = EnvironmentTolerance::with_default_domains(false);
        let target = url("https://doi.org/10.1000/xyz");

        assert!(ci.skip_reason(&target).is_some());
        assert!(local.skip_reason(&target).is_none());
    }

    #[test]
    fn test_skip_matches_subdomains_not_lookalikes() {
        let policy = EnvironmentTolerance::new(true, vec!["acm.org".into()]);
        assert!(policy.skip_reason(&url("https://dl.acm.org/doi/1")).is_some());
        assert!(policy.skip_reason(&url("https://ACM.org/")).is_some());
        assert!(policy.skip_reason(&url("https://notacm.org/")).is_none());
    }

    #[test]
    fn test_status_acceptance_depends_on_ci() {
        let ci = EnvironmentTolerance::new(true, vec![]);
        let local = EnvironmentTolerance::new(false, vec![]);

        for status in [200, 301, 302, 303, 307, 308] {
            assert!(ci.accepts_status(status));
            assert!(local.accepts_status(status));
        }
        for status in [403, 418, 429] {
            assert!(ci.accepts_status(status));
            assert!(!local.accepts_status(status));
        }
        assert!(!ci.accepts_status(404));
        assert!(!ci.accepts_status(500));
    }

    #[test]
    fn test_transport_errors_tolerated_only_in_ci() {
        let err = TransportError::new(TransportErrorKind::Timeout, "timed out");
        assert!(EnvironmentTolerance::new(true, vec![]).tolerates_transport_error(&err));
        assert!(!EnvironmentTolerance::new(false, vec![]).tolerates_transport_error(&err));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        let first = policy.backoff(0, "https://a.example/");
        let third = policy.backoff(2, "https://a.example/");
        let tenth = policy.backoff(9, "https://a.example/");

        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(600));
        assert!(tenth < Duration::from_millis(600));
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.backoff(3, "x"), Duration::ZERO);
    }
}
