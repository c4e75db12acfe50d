// src/crawl/verdict.rs
// =============================================================================
// The per-reference decision.
//
// PASS when the file exists locally (and any requested anchor is in it), or
// when the web probe says the resource is accessible. One exception: if the
// local file exists but the anchor is missing, the reference is wrong no
// matter what the web says, because a HEAD request cannot see anchors.
//
// Whether the network was touched is recorded explicitly in NetworkCheck, so
// callers (and tests) never have to guess.
// =============================================================================

use serde::Serialize;

use crate::checker::{ClassifiedReference, ProbeResult, ResolutionResult, ResourceType};
use crate::error::ResourceError;

/// What happened on the network side for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "network", rename_all = "snake_case")]
pub enum NetworkCheck {
    Probed(ProbeResult),
    /// Local resolution already decided the verdict; no request was sent
    NotNeeded,
}

impl NetworkCheck {
    pub fn probe(&self) -> Option<&ProbeResult> {
        match self {
            NetworkCheck::Probed(p) => Some(p),
            NetworkCheck::NotNeeded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

/// Final decision for one (document, reference) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    #[serde(flatten)]
    pub reference: ClassifiedReference,
    pub resolution: ResolutionResult,
    pub network: NetworkCheck,
    pub status: Status,
    /// Why it failed; empty on PASS
    pub failures: Vec<ResourceError>,
}

impl Verdict {
    pub fn decide(
        reference: ClassifiedReference,
        resolution: ResolutionResult,
        network: NetworkCheck,
    ) -> Self {
        let anchor_broken = resolution.local_exists && resolution.anchor_valid == Some(false);
        let accessible = network.probe().is_some_and(|p| p.accessible);

        let status = if resolution.passes() || (accessible && !anchor_broken) {
            Status::Pass
        } else {
            Status::Fail
        };

        let failures = if status == Status::Pass {
            Vec::new()
        } else {
            failure_reasons(&reference, &resolution, &network)
        };

        Verdict {
            reference,
            resolution,
            network,
            status,
            failures,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }

    pub fn resource_type(&self) -> ResourceType {
        self.reference.resource_type
    }

    /// Reasons joined for display: "not found locally, web error (404)"
    pub fn reason_text(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn failure_reasons(
    reference: &ClassifiedReference,
    resolution: &ResolutionResult,
    network: &NetworkCheck,
) -> Vec<ResourceError> {
    let mut reasons = Vec::new();

    // External references have no local side to report on
    if !reference.reference.is_external() {
        if !resolution.local_exists {
            reasons.push(ResourceError::FileNotFound);
        } else if resolution.anchor_valid == Some(false) {
            let fragment = reference.reference.fragment.clone().unwrap_or_default();
            reasons.push(ResourceError::AnchorNotFound { fragment });
        }
    }

    if let Some(probe) = network.probe() {
        if !probe.accessible {
            if let Some(error) = &probe.error {
                reasons.push(error.clone());
            }
        }
    }

    reasons
}
