// src/checker/mod.rs
// =============================================================================
// This module contains the per-reference checking logic.
//
// Submodules:
// - reference: the Reference data model
// - html: extracts references from HTML pages, looks up anchors
// - classify: maps a reference to a ResourceType by extension
// - local: resolves a reference against the site tree on disk
// - policy: CI tolerance rules and retry/backoff
// - http: probes a reference on the live web
//
// This file (mod.rs) is the module root; it re-exports the public API so the
// rest of the crate writes `checker::LocalResolver` rather than
// `checker::local::LocalResolver`.
// =============================================================================

mod classify;
mod html;
pub(crate) mod http;
mod local;
mod policy;
mod reference;

pub use classify::ResourceType;
pub use html::extract_resources;
pub use http::{directory_url, HttpTransport, ProbeResult, RemoteProber, ReqwestTransport};
pub use local::{FilenameFallback, LocalResolver, ResolutionResult, ResolvedVia};
pub use policy::{EnvironmentTolerance, RetryPolicy, TolerancePolicy, DEFAULT_SKIP_DOMAINS};
pub use reference::{ClassifiedReference, Reference};

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is `http` pub(crate) when the others are private?
//    - Its test module holds FakeTransport, which the crawl tests reuse
//    - pub(crate) opens it to this crate only, never to outside users
//
// 2. Why re-export types like ResolutionResult?
//    - The crawl and report modules build and read them
//    - They can write `crate::checker::ResolutionResult` without knowing
//      which file it lives in
// -----------------------------------------------------------------------------
