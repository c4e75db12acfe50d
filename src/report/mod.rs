// src/report/mod.rs
// =============================================================================
// Aggregates verdicts into the run's report.
//
// The ReportBuilder is fed by exactly one owner (the orchestrator's collect
// loop), one verdict at a time, in whatever order the worker pool finishes.
// Nothing in the finished Report depends on that order: per-type counts are
// in a BTreeMap and failure samples are sorted before they are cut.
//
// Submodules:
// - render: text table / JSON output
// - sink: persistent failure log
// =============================================================================

mod render;
pub mod sink;

pub use render::print_report;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::checker::ResourceType;
use crate::crawl::Verdict;

/// Process exit status, three severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Nothing failed, or only soft failures (external references in CI)
    Clean,
    /// Only non-critical resource types failed
    NonCritical,
    /// Markup, stylesheet, script or document failed
    Critical,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::NonCritical => 1,
            ExitStatus::Critical => 2,
        }
    }
}

/// Pass/fail counts for one ResourceType.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    pub passed: usize,
    pub failed: usize,
}

impl TypeStats {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// A failed reference as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    pub resource_type: ResourceType,
    pub document: PathBuf,
    pub resource: String,
    pub reasons: Vec<String>,
}

impl FailureSample {
    pub fn reason_text(&self) -> String {
        self.reasons.join(", ")
    }
}

/// Local + web status of one key file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFileCheck {
    pub path: String,
    pub local: bool,
    /// None when the web was not probed
    pub web: Option<bool>,
}

impl KeyFileCheck {
    pub fn passes(&self) -> bool {
        self.local || self.web == Some(true)
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub documents: usize,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// References not checked because the run was cancelled
    pub cancelled: usize,
    pub interrupted: bool,
    pub by_type: BTreeMap<ResourceType, TypeStats>,
    /// Sorted by (type, document, resource), bounded
    pub samples: Vec<FailureSample>,
    pub key_files: Vec<KeyFileCheck>,
    /// Requests sent over the whole run
    pub requests: u32,
    pub exit_status: ExitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Report {
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.passed as f64 / self.total as f64 * 100.0)
        }
    }
}

/// Collects verdicts; single owner, not shared between tasks.
#[derive(Debug)]
pub struct ReportBuilder {
    sample_limit: usize,
    samples_per_type: usize,
    strict_key_files: bool,
    ci: bool,
    severity: ExitStatus,
    documents: usize,
    by_type: BTreeMap<ResourceType, TypeStats>,
    failures: Vec<FailureSample>,
    cancelled: usize,
    interrupted: bool,
    requests: u32,
}

impl ReportBuilder {
    pub fn new(sample_limit: usize, samples_per_type: usize, strict_key_files: bool) -> Self {
        ReportBuilder {
            sample_limit,
            samples_per_type,
            strict_key_files,
            ci: false,
            severity: ExitStatus::Clean,
            documents: 0,
            by_type: BTreeMap::new(),
            failures: Vec::new(),
            cancelled: 0,
            interrupted: false,
            requests: 0,
        }
    }

    // In CI a failing external reference is a soft failure: it is counted and
    // listed, but does not raise the exit status
    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    pub fn set_documents(&mut self, documents: usize) {
        self.documents = documents;
    }

    pub fn record(&mut self, verdict: &Verdict) {
        let stats = self.by_type.entry(verdict.resource_type()).or_default();
        if let Some(probe) = verdict.network.probe() {
            self.requests += probe.requests;
        }

        if verdict.is_pass() {
            stats.passed += 1;
            return;
        }

        stats.failed += 1;
        if !(self.ci && verdict.reference.reference.is_external()) {
            self.severity = self.severity.max(severity_of(verdict.resource_type()));
        }
        self.failures.push(FailureSample {
            resource_type: verdict.resource_type(),
            document: verdict.reference.reference.document.clone(),
            resource: verdict.reference.reference.resource_url.clone(),
            reasons: verdict.failures.iter().map(ToString::to_string).collect(),
        });
    }

    // A document that could not be read at all counts as an "other" failure
    pub fn record_unexpected(&mut self, document: &Path, detail: &str) {
        self.by_type.entry(ResourceType::Other).or_default().failed += 1;
        self.severity = self.severity.max(ExitStatus::NonCritical);
        self.failures.push(FailureSample {
            resource_type: ResourceType::Other,
            document: document.to_path_buf(),
            resource: document.display().to_string(),
            reasons: vec![format!("unreadable document ({})", detail)],
        });
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled += 1;
        self.interrupted = true;
    }

    pub fn mark_interrupted(&mut self) {
        self.interrupted = true;
    }

    pub fn add_requests(&mut self, requests: u32) {
        self.requests += requests;
    }

    pub fn finish(mut self, key_files: Vec<KeyFileCheck>, log_file: Option<PathBuf>) -> Report {
        let passed: usize = self.by_type.values().map(|s| s.passed).sum();
        let failed: usize = self.by_type.values().map(|s| s.failed).sum();

        let mut exit_status = self.severity;
        if self.strict_key_files && key_files.iter().any(|k| !k.passes()) {
            exit_status = ExitStatus::Critical;
        }

        self.failures.sort_by(|a, b| {
            (a.resource_type, &a.document, &a.resource).cmp(&(b.resource_type, &b.document, &b.resource))
        });
        let samples = bounded_samples(self.failures, self.sample_limit, self.samples_per_type);

        Report {
            documents: self.documents,
            total: passed + failed,
            passed,
            failed,
            cancelled: self.cancelled,
            interrupted: self.interrupted,
            by_type: self.by_type,
            samples,
            key_files,
            requests: self.requests,
            exit_status,
            log_file,
        }
    }
}

// What one hard failure of this type does to the exit status
fn severity_of(resource_type: ResourceType) -> ExitStatus {
    if resource_type.is_critical() {
        ExitStatus::Critical
    } else {
        ExitStatus::NonCritical
    }
}

// Keeps at most `per_type` samples of each type and `limit` overall.
// Input must already be sorted.
fn bounded_samples(sorted: Vec<FailureSample>, limit: usize, per_type: usize) -> Vec<FailureSample> {
    let mut taken: BTreeMap<ResourceType, usize> = BTreeMap::new();
    let mut samples = Vec::new();

    for sample in sorted {
        if samples.len() >= limit {
            break;
        }
        let count = taken.entry(sample.resource_type).or_default();
        if *count < per_type {
            *count += 1;
            samples.push(sample);
        }
    }
    samples
}
