// src/error.rs
// =============================================================================
// Error types for resource-guardian.
//
// Two families:
// - ResourceError: something is wrong with ONE reference. These never abort
//   the run; they end up inside a Verdict and in the failure log.
// - ConfigError: the run cannot start at all (bad site root, bad base URL).
//   These are the only fatal errors.
// =============================================================================

use std::path::PathBuf;

use serde::Serialize;

/// Why a single reference failed.
///
/// The Display text doubles as the human-readable reason in the report, so
/// "not found locally" and "web error (404)" read exactly as printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceError {
    /// No local file matched the reference.
    #[error("not found locally")]
    FileNotFound,

    /// The markup file exists but has no element with this id/name.
    #[error("anchor #{fragment} not found")]
    AnchorNotFound { fragment: String },

    /// The server answered with a status the tolerance policy rejects.
    #[error("web error ({status})")]
    HttpError { status: u16 },

    /// Transport failure: DNS, TLS, timeout, refused connection, bad URL.
    #[error("web error ({message})")]
    ConnectionError { message: String },

    /// Bare-filename search found several candidates and picked none.
    #[error("ambiguous filename match ({candidates} candidates)")]
    AmbiguousFallback { candidates: usize },
}

impl ResourceError {
    // Stable upper-case tag written to the failure log ("HTTP_404", ...)
    pub fn error_type(&self) -> String {
        match self {
            ResourceError::FileNotFound => "FILE_NOT_FOUND".to_string(),
            ResourceError::AnchorNotFound { .. } => "ANCHOR_NOT_FOUND".to_string(),
            ResourceError::HttpError { status } => format!("HTTP_{}", status),
            ResourceError::ConnectionError { .. } => "CONNECTION_ERROR".to_string(),
            ResourceError::AmbiguousFallback { .. } => "AMBIGUOUS_FALLBACK".to_string(),
        }
    }

    // Local-side errors are logged as FILE failures, the rest as URL failures
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ResourceError::FileNotFound
                | ResourceError::AnchorNotFound { .. }
                | ResourceError::AmbiguousFallback { .. }
        )
    }
}

/// Errors that stop the run before any reference is checked.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("site root does not exist or is not a directory: {}", .0.display())]
    SiteRootMissing(PathBuf),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("cannot create failure log in {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_read_like_the_report() {
        assert_eq!(ResourceError::FileNotFound.to_string(), "not found locally");
        assert_eq!(
            ResourceError::HttpError { status: 404 }.to_string(),
            "web error (404)"
        );
        assert_eq!(
            ResourceError::AnchorNotFound { fragment: "sec2".into() }.to_string(),
            "anchor #sec2 not found"
        );
    }

    #[test]
    fn error_type_tags() {
        assert_eq!(ResourceError::HttpError { status: 503 }.error_type(), "HTTP_503");
        assert_eq!(
            ResourceError::ConnectionError { message: "timed out".into() }.error_type(),
            "CONNECTION_ERROR"
        );
        assert!(ResourceError::FileNotFound.is_local());
        assert!(!ResourceError::HttpError { status: 500 }.is_local());
    }
}
