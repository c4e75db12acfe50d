// src/report/sink.rs
// =============================================================================
// Persistent failure log.
//
// On a developer machine every failure is written to a timestamped file under
// logs/ so it can be read after the run. In CI the NoopFailureSink is injected
// instead and nothing touches the disk.
//
// The sink is owned by the single loop that aggregates verdicts, so methods
// take &mut self and no locking is needed.
// =============================================================================

use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

use crate::error::{ConfigError, ResourceError};

/// Which side of the check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Url,
    File,
    Unexpected,
}

impl FailureCategory {
    fn label(self) -> &'static str {
        match self {
            FailureCategory::Url => "URL FAILURE",
            FailureCategory::File => "FILE FAILURE",
            FailureCategory::Unexpected => "UNEXPECTED FAILURE",
        }
    }
}

/// One line item in the failure log.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub timestamp: DateTime<Local>,
    pub category: FailureCategory,
    /// Reference as authored, or the document path for unexpected failures
    pub target: String,
    pub error_type: String,
    pub status_code: Option<u16>,
    pub domain: Option<String>,
    pub detail: String,
    pub document: PathBuf,
}

impl FailureRecord {
    pub fn from_error(target: &str, document: &Path, error: &ResourceError, probed_url: Option<&str>) -> Self {
        let status_code = match error {
            ResourceError::HttpError { status } => Some(*status),
            _ => None,
        };
        let category = if error.is_local() {
            FailureCategory::File
        } else {
            FailureCategory::Url
        };
        let domain = probed_url
            .and_then(|u| Url::parse(u).ok())
            .and_then(|u| u.host_str().map(str::to_string));

        FailureRecord {
            timestamp: Local::now(),
            category,
            target: probed_url.unwrap_or(target).to_string(),
            error_type: error.error_type(),
            status_code,
            domain,
            detail: error.to_string(),
            document: document.to_path_buf(),
        }
    }

    pub fn unexpected(document: &Path, detail: impl Into<String>) -> Self {
        FailureRecord {
            timestamp: Local::now(),
            category: FailureCategory::Unexpected,
            target: document.display().to_string(),
            error_type: "UNEXPECTED".to_string(),
            status_code: None,
            domain: None,
            detail: detail.into(),
            document: document.to_path_buf(),
        }
    }
}

/// Receives failure records as they are aggregated.
pub trait FailureSink: Send {
    fn record(&mut self, record: FailureRecord);

    /// Flushes and closes; returns the log path if something was persisted.
    fn finish(&mut self) -> Option<PathBuf>;
}

/// Discards everything. Used in CI.
#[derive(Debug, Default)]
pub struct NoopFailureSink;

impl FailureSink for NoopFailureSink {
    fn record(&mut self, _record: FailureRecord) {}

    fn finish(&mut self) -> Option<PathBuf> {
        None
    }
}

/// Writes `logs/resource_failures_<timestamp>.log`.
pub struct FileFailureSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    by_type: BTreeMap<String, usize>,
    by_domain: BTreeMap<String, usize>,
    url_failures: usize,
    file_failures: usize,
    unexpected: usize,
}

impl FileFailureSink {
    pub fn create(log_dir: &Path) -> Result<Self, ConfigError> {
        let started = Local::now();
        let path = log_dir.join(format!(
            "resource_failures_{}.log",
            started.format("%Y%m%d_%H%M%S")
        ));
        let log_error = |source| ConfigError::LogFile {
            path: log_dir.to_path_buf(),
            source,
        };

        fs::create_dir_all(log_dir).map_err(log_error)?;
        let file = File::create(&path).map_err(log_error)?;

        let mut sink = FileFailureSink {
            path,
            writer: Some(BufWriter::new(file)),
            by_type: BTreeMap::new(),
            by_domain: BTreeMap::new(),
            url_failures: 0,
            file_failures: 0,
            unexpected: 0,
        };
        sink.line("INFO", &"=".repeat(80));
        sink.line("INFO", &format!("RESOURCE CHECK SESSION STARTED: {}", started.to_rfc3339()));
        sink.line("INFO", &"=".repeat(80));
        Ok(sink)
    }

    // "2025-01-01 12:00:00 | ERROR    | message"
    fn line(&mut self, level: &str, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_raw(&format!("{} | {:<8} | {}", stamp, level, message));
    }

    fn write_raw(&mut self, text: &str) {
        let result = match self.writer.as_mut() {
            Some(writer) => writeln!(writer, "{}", text),
            None => return,
        };
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failure log write failed; disabling it");
            self.writer = None;
        }
    }

    fn write_summary(&mut self) {
        let total = self.url_failures + self.file_failures + self.unexpected;
        self.line("INFO", &"=".repeat(80));
        self.line("INFO", "SESSION SUMMARY");
        self.line("INFO", &"=".repeat(80));
        self.line("INFO", &format!("Total Failures: {}", total));

        if total > 0 {
            self.line("INFO", &format!("URL Failures: {}", self.url_failures));
            self.line("INFO", &format!("File Failures: {}", self.file_failures));
            self.line("INFO", &format!("Unexpected Failures: {}", self.unexpected));

            self.line("INFO", "Failure Types:");
            let types: Vec<_> = self.by_type.iter().map(|(k, v)| (k.clone(), *v)).collect();
            for (error_type, count) in types {
                self.line("INFO", &format!("   {}: {}", error_type, count));
            }

            // Highest count first; name breaks ties so the order is stable
            let mut domains: Vec<_> = self.by_domain.iter().map(|(k, v)| (k.clone(), *v)).collect();
            domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            if !domains.is_empty() {
                self.line("INFO", "Top Failing Domains:");
                for (domain, count) in domains.into_iter().take(10) {
                    self.line("INFO", &format!("   {}: {} failures", domain, count));
                }
            }
        }

        self.line("INFO", &"=".repeat(80));
        self.line("INFO", &format!("SESSION ENDED: {}", Local::now().to_rfc3339()));
        let path = self.path.display().to_string();
        self.line("INFO", &format!("Log saved to: {}", path));
    }
}

impl FailureSink for FileFailureSink {
    fn record(&mut self, record: FailureRecord) {
        match record.category {
            FailureCategory::Url => self.url_failures += 1,
            FailureCategory::File => self.file_failures += 1,
            FailureCategory::Unexpected => self.unexpected += 1,
        }
        *self.by_type.entry(record.error_type.clone()).or_default() += 1;
        if let Some(domain) = &record.domain {
            *self.by_domain.entry(domain.clone()).or_default() += 1;
        }

        let stamp = record.timestamp.to_rfc3339();
        self.line("ERROR", &format!("{}: {}", record.category.label(), record.target));
        self.line("ERROR", &format!("   Timestamp: {}", stamp));
        self.line("ERROR", &format!("   Error Type: {}", record.error_type));
        if let Some(status) = record.status_code {
            self.line("ERROR", &format!("   Status Code: {}", status));
        }
        if let Some(domain) = &record.domain {
            self.line("ERROR", &format!("   Domain: {}", domain));
        }
        self.line("ERROR", &format!("   Detail: {}", record.detail));
        self.line("ERROR", &format!("   Document: {}", record.document.display()));
    }

    fn finish(&mut self) -> Option<PathBuf> {
        self.write_summary();
        let mut writer = self.writer.take()?;
        if let Err(e) = writer.flush().and_then(|_| writer.get_ref().sync_all()) {
            warn!(path = %self.path.display(), error = %e, "could not flush failure log");
        }
        Some(self.path.clone())
    }
}
