// src/crawl/queue.rs
// =============================================================================
// The validation orchestrator.
//
// How a run works:
// 1. Discover every markup document under the site root (sorted)
// 2. Extract each document's references; one job per (document, reference)
// 3. Push the jobs through a bounded worker pool:
//      classify -> resolve locally -> probe the web if still needed -> Verdict
// 4. Feed every Verdict to the ReportBuilder and the failure sink from this
//    one loop, so the counters have a single owner
// 5. Smoke-test the key files and finish the report
//
// Jobs are deduplicated per (document, reference), not globally: "img/a.png"
// can be right in blog/post.html and wrong in index.html.
//
// Cancellation: a CancelSignal and an optional deadline stop the run. Jobs
// still queued or in flight are counted as cancelled; verdicts already
// recorded stay in the report.
// =============================================================================

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::documents::{discover_documents, load_document, Document};
use super::verdict::{NetworkCheck, Verdict};
use crate::checker::{
    directory_url, ClassifiedReference, EnvironmentTolerance, HttpTransport, LocalResolver,
    ProbeResult, Reference, RemoteProber, ResolutionResult, ResolvedVia, TolerancePolicy,
};
use crate::config::{ProbePolicy, ValidatorConfig};
use crate::error::ResourceError;
use crate::report::sink::{FailureRecord, FailureSink};
use crate::report::{KeyFileCheck, Report, ReportBuilder};

/// Sender half of the run-wide cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send only fails when every signal is gone, i.e. nobody is listening
        let _ = self.tx.send(true);
    }
}

/// Receiver half; cheap to clone, one per in-flight job.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires.
    #[cfg(test)]
    pub fn never() -> CancelSignal {
        let (_, signal) = Self::pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    // Resolves once cancel() is called; pends forever if it never will be
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// Resolves when the run must stop: cancel signal or deadline
async fn stopped(mut cancel: CancelSignal, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
        None => cancel.cancelled().await,
    }
}

enum JobOutcome {
    Checked(Box<Verdict>),
    Cancelled,
}

/// Drives a whole validation run.
pub struct Validator {
    config: Arc<ValidatorConfig>,
    resolver: Arc<LocalResolver>,
    prober: Arc<RemoteProber>,
}

impl Validator {
    // Stock tolerance: skip-list and status rules from the config's CI flag
    pub fn new(config: ValidatorConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let tolerance = Arc::new(EnvironmentTolerance::new(
            config.ci,
            config.skip_domains.clone(),
        ));
        Self::with_tolerance(config, transport, tolerance)
    }

    pub fn with_tolerance(
        config: ValidatorConfig,
        transport: Arc<dyn HttpTransport>,
        tolerance: Arc<dyn TolerancePolicy>,
    ) -> Self {
        let resolver = Arc::new(LocalResolver::new(
            config.site_root.clone(),
            config.filename_fallback,
        ));
        let prober = Arc::new(RemoteProber::new(transport, tolerance, config.retry));
        Validator {
            config: Arc::new(config),
            resolver,
            prober,
        }
    }

    pub async fn run(&self, sink: &mut dyn FailureSink, cancel: CancelSignal) -> Report {
        // A deadline too far out to represent is no deadline
        let deadline = self.config.deadline.and_then(|d| Instant::now().checked_add(d));
        let mut builder = ReportBuilder::new(
            self.config.sample_limit,
            self.config.samples_per_type,
            self.config.strict_key_files,
        )
        .with_ci(self.config.ci);

        info!(site_root = %self.config.site_root.display(), base_url = %self.config.base_url, ci = self.config.ci, "starting resource check");

        let (documents, unreadable) = self.load_documents().await;
        builder.set_documents(documents.len() + unreadable.len());

        for (path, detail) in &unreadable {
            error!(document = %path.display(), error = %detail, "cannot read document");
            builder.record_unexpected(path, detail);
            sink.record(FailureRecord::unexpected(path, detail.clone()));
        }

        let jobs: Vec<ClassifiedReference> = documents
            .iter()
            .flat_map(|doc| {
                info!(document = %doc.path.display(), resources = doc.references.len(), "extracted references");
                doc.references
                    .iter()
                    .map(move |url| Reference::new(url.as_str(), &doc.path).classify())
            })
            .collect();
        info!(references = jobs.len(), concurrency = self.config.concurrency, "checking references");

        let concurrency = self.config.concurrency.max(1);
        let mut outcomes = stream::iter(jobs)
            .map(|job| {
                let signal = cancel.clone();
                async move {
                    if cancel_requested(&signal, deadline) {
                        return JobOutcome::Cancelled;
                    }
                    let stop = stopped(signal, deadline);
                    tokio::select! {
                        biased;
                        _ = stop => JobOutcome::Cancelled,
                        verdict = self.check_reference(job) => JobOutcome::Checked(Box::new(verdict)),
                    }
                }
            })
            .buffer_unordered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                JobOutcome::Checked(verdict) => {
                    builder.record(&verdict);
                    log_failures(sink, &verdict);
                }
                JobOutcome::Cancelled => builder.record_cancelled(),
            }
        }
        drop(outcomes);

        let key_files = if cancel_requested(&cancel, deadline) {
            warn!("run interrupted; skipping key file checks");
            builder.mark_interrupted();
            Vec::new()
        } else {
            let (checks, requests) = self.check_key_files(sink).await;
            builder.add_requests(requests);
            checks
        };

        let log_file = sink.finish();
        builder.finish(key_files, log_file)
    }

    // Reads all documents on the blocking pool; unreadable ones are returned
    // separately with their error text
    async fn load_documents(&self) -> (Vec<Document>, Vec<(PathBuf, String)>) {
        let site_root = self.config.site_root.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            let mut documents = Vec::new();
            let mut unreadable = Vec::new();
            for path in discover_documents(&site_root) {
                match load_document(&site_root, &path) {
                    Ok(doc) => documents.push(doc),
                    Err(e) => unreadable.push((path, e.to_string())),
                }
            }
            (documents, unreadable)
        })
        .await;

        match loaded {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "document discovery task failed");
                (Vec::new(), vec![(PathBuf::from("."), e.to_string())])
            }
        }
    }

    // Classified reference in, verdict out. Never fails: every problem ends up
    // in the verdict.
    pub async fn check_reference(&self, reference: ClassifiedReference) -> Verdict {
        let resolution = self.resolve(&reference.reference).await;

        let anchor_broken = resolution.local_exists && resolution.anchor_valid == Some(false);
        let local_decides = resolution.passes() || anchor_broken;

        let network = if local_decides && self.config.probe_policy == ProbePolicy::SkipWhenLocalPasses {
            NetworkCheck::NotNeeded
        } else {
            NetworkCheck::Probed(self.probe_with_context(&reference.reference, &resolution).await)
        };

        let verdict = Verdict::decide(reference, resolution, network);
        debug!(
            reference = %verdict.reference.reference.resource_url,
            document = %verdict.reference.reference.document.display(),
            status = ?verdict.status,
            reasons = %verdict.reason_text(),
            "checked"
        );
        verdict
    }

    async fn resolve(&self, reference: &Reference) -> ResolutionResult {
        let resolver = Arc::clone(&self.resolver);
        let owned = reference.clone();
        match tokio::task::spawn_blocking(move || resolver.resolve(&owned)).await {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(reference = %reference.resource_url, error = %e, "local resolution task failed");
                ResolutionResult::unresolved()
            }
        }
    }

    // Probes against the site base URL, and for page-relative references also
    // against the referring page's directory. Whichever was resolved locally
    // goes first; the second is only tried if the first is not accessible.
    async fn probe_with_context(&self, reference: &Reference, resolution: &ResolutionResult) -> ProbeResult {
        let base = &self.config.base_url;
        let page_relative = !reference.is_external()
            && !reference.is_root_relative()
            && !reference.referer_dir.as_os_str().is_empty();

        if !page_relative {
            return self.prober.probe(&reference.resource_url, base).await;
        }

        let referer_dir = reference.referer_dir.to_string_lossy().replace('\\', "/");
        let page_base = match directory_url(base, &referer_dir) {
            Ok(url) => url,
            Err(_) => return self.prober.probe(&reference.resource_url, base).await,
        };

        let (first, second) = if resolution.via == Some(ResolvedVia::RefererDir) {
            (&page_base, base)
        } else {
            (base, &page_base)
        };

        let initial = self.prober.probe(&reference.resource_url, first).await;
        if initial.accessible {
            return initial;
        }
        let retry = self.prober.probe(&reference.resource_url, second).await;
        let requests = initial.requests + retry.requests;
        let mut chosen = if retry.accessible { retry } else { initial };
        chosen.requests = requests;
        chosen
    }

    // Local + web check of the key files, independent of the crawl. Both
    // sides are taken relative to the site root, i.e. the base URL's path.
    // Failures go to the sink. Returns the checks and the requests sent.
    async fn check_key_files(&self, sink: &mut dyn FailureSink) -> (Vec<KeyFileCheck>, u32) {
        let checks = self.config.key_files.iter().map(|path| async move {
            let relative = path.trim_start_matches('/');
            let rooted = format!("/{}", relative);
            let reference = Reference::new(rooted.as_str(), &PathBuf::from("index.html"));
            let local = self.resolve(&reference).await.passes();
            let probe = self.prober.probe(relative, &self.config.base_url).await;
            (path, local, probe)
        });
        let results = futures::future::join_all(checks).await;

        let mut requests = 0;
        let mut key_files = Vec::with_capacity(results.len());
        for (path, local, probe) in results {
            requests += probe.requests;
            if !local || !probe.accessible {
                warn!(key_file = %path, local, web = probe.accessible, url = %probe.url, "key file check failed");
                let document = PathBuf::from(path);
                if !local {
                    sink.record(FailureRecord::from_error(path, &document, &ResourceError::FileNotFound, None));
                }
                if let (false, Some(error)) = (probe.accessible, &probe.error) {
                    sink.record(FailureRecord::from_error(path, &document, error, Some(&probe.url)));
                }
            }
            key_files.push(KeyFileCheck {
                path: path.clone(),
                local,
                web: Some(probe.accessible),
            });
        }
        (key_files, requests)
    }
}

fn cancel_requested(cancel: &CancelSignal, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
}

// Writes one failure-log record per reason of a failed verdict
fn log_failures(sink: &mut dyn FailureSink, verdict: &Verdict) {
    if verdict.is_pass() {
        return;
    }
    let reference = &verdict.reference.reference;
    let probed_url = verdict.network.probe().map(|p| p.url.as_str());

    for failure in &verdict.failures {
        let url = if failure.is_local() { None } else { probed_url };
        sink.record(FailureRecord::from_error(
            &reference.resource_url,
            &reference.document,
            failure,
            url,
        ));
    }

    // Zero candidates is plain "not found"; only real ambiguity is logged
    if let Some(candidates) = verdict.resolution.ambiguous_candidates.filter(|n| *n > 1) {
        sink.record(FailureRecord::from_error(
            &reference.resource_url,
            &reference.document,
            &ResourceError::AmbiguousFallback { candidates },
            None,
        ));
    }
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does tokio::select! do?
//    - It waits on several futures at once and runs the branch of whichever
//      finishes first; the other futures are dropped
//    - Dropping a future that is waiting on the network cancels that request,
//      which is how the deadline stops requests already in flight
//    - `biased;` checks the branches top to bottom, so a stop wins a tie
//
// 2. What is a watch channel?
//    - One sender, many receivers, and receivers only see the latest value
//    - Perfect for a "stop now" flag that every job can check
//
// 3. Why spawn_blocking for local resolution?
//    - Reading files and walking directories blocks the thread
//    - spawn_blocking moves that work to a thread pool meant for it, so the
//      async workers keep serving network probes
// -----------------------------------------------------------------------------
