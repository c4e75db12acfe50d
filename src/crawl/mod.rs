// src/crawl/mod.rs
// =============================================================================
// This module walks the site and turns references into verdicts.
//
// Submodules:
// - documents: finds the markup documents under the site root and reads them
// - verdict: the PASS/FAIL decision for one (document, reference) pair
// - queue: the Validator, which runs every reference through a bounded
//   worker pool and aggregates the results
//
// Unlike a web crawler this never follows links over the network: the site
// tree on disk is the whole universe, and the web is only asked about
// references the disk could not answer.
// =============================================================================

mod documents;
mod queue;
mod verdict;

pub use queue::{CancelSignal, Validator};
pub use verdict::Verdict;
#[cfg(test)]
pub use verdict::{NetworkCheck, Status};
