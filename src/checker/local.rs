// src/checker/local.rs
// =============================================================================
// Decides whether a reference points at a file that exists in the site tree.
//
// Resolution order:
// 1. External (http/https) references never resolve locally
// 2. Strip query + fragment, try the path against the site root
// 3. If that misses, try it against the referring document's directory
// 4. If that misses and the path is a bare filename, search the tree for that
//    name; exactly one hit counts, zero or several stay unresolved
// 5. If a fragment was given and the target is markup, the target must
//    contain an element with that id/name
//
// Static sites are full of links written relative to the page using them,
// so step 3 is what keeps the false-failure rate down.
// =============================================================================

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::classify::{classify, ResourceType};
use super::html::has_anchor;
use super::reference::Reference;

/// How the bare-filename search behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameFallback {
    Disabled,
    /// Accept a name that occurs exactly once within `max_depth` levels
    UniqueMatch { max_depth: usize },
}

impl Default for FilenameFallback {
    fn default() -> Self {
        FilenameFallback::UniqueMatch { max_depth: 8 }
    }
}

/// Which step produced the local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedVia {
    SiteRoot,
    RefererDir,
    FilenameSearch,
}

/// Result of local resolution for one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// The base file exists (anchor not considered)
    pub local_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Only set when a fragment was given and the target is markup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<ResolvedVia>,
    /// Candidate count of a filename search that did not settle on one file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguous_candidates: Option<usize>,
}

impl ResolutionResult {
    pub fn unresolved() -> Self {
        ResolutionResult {
            local_exists: false,
            local_path: None,
            anchor_valid: None,
            via: None,
            ambiguous_candidates: None,
        }
    }

    /// File exists and, if an anchor was asked for, the anchor exists too.
    pub fn passes(&self) -> bool {
        self.local_exists && self.anchor_valid != Some(false)
    }
}

/// Resolves references against a site root on disk.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    site_root: PathBuf,
    fallback: FilenameFallback,
}

impl LocalResolver {
    pub fn new(site_root: impl Into<PathBuf>, fallback: FilenameFallback) -> Self {
        LocalResolver {
            site_root: site_root.into(),
            fallback,
        }
    }

    pub fn resolve(&self, reference: &Reference) -> ResolutionResult {
        if reference.is_external() {
            return ResolutionResult::unresolved();
        }

        let path_part = reference.path_part();
        let wants_anchor = reference.fragment.is_some()
            && classify(path_part) == ResourceType::Markup;

        let mut result = self.locate(reference, path_part);

        if let Some(fragment) = &reference.fragment {
            result.anchor_valid = match &result.local_path {
                Some(path) if is_markup_file(path) => Some(anchor_in_file(path, fragment)),
                Some(_) => None,
                // Missing base file: the anchor cannot be there either
                None if wants_anchor => Some(false),
                None => None,
            };
        }

        result
    }

    // Steps 2-4: find the base file
    fn locate(&self, reference: &Reference, path_part: &str) -> ResolutionResult {
        if path_part.is_empty() {
            return ResolutionResult::unresolved();
        }

        let relative = Path::new(path_part.trim_start_matches('/'));
        if let Some(path) = self.existing_file(Path::new(""), relative) {
            return found(path, ResolvedVia::SiteRoot);
        }

        // Root-relative references mean the root; only page-relative ones
        // get a second chance against the referring directory
        if !reference.is_root_relative() && !reference.referer_dir.as_os_str().is_empty() {
            if let Some(path) = self.existing_file(&reference.referer_dir, relative) {
                debug!(reference = %reference.resource_url, document = %reference.document.display(), "resolved relative to referring page");
                return found(path, ResolvedVia::RefererDir);
            }
        }

        let mut result = ResolutionResult::unresolved();
        if let (FilenameFallback::UniqueMatch { max_depth }, Some(name)) =
            (self.fallback, bare_filename(path_part))
        {
            let matches = self.search_filename(name, max_depth);
            if matches.len() == 1 {
                debug!(reference = %reference.resource_url, "resolved by unique filename search");
                let path = matches.into_iter().next().unwrap_or_default();
                return found(path, ResolvedVia::FilenameSearch);
            }
            result.ambiguous_candidates = Some(matches.len());
        }
        result
    }

    // Joins base/relative under the site root and returns it if it is a file.
    // Directories resolve to their index.html. Paths escaping the root do not
    // resolve.
    fn existing_file(&self, base: &Path, relative: &Path) -> Option<PathBuf> {
        let joined = normalize_path(&base.join(relative))?;
        let candidate = self.site_root.join(joined);

        if candidate.is_file() {
            return Some(candidate);
        }
        if candidate.is_dir() {
            let index = candidate.join("index.html");
            if index.is_file() {
                return Some(index);
            }
        }
        None
    }

    // Collects files named `name` under the root, stopping at the second hit
    fn search_filename(&self, name: &str, max_depth: usize) -> Vec<PathBuf> {
        let mut matches = Vec::new();
        let walker = WalkDir::new(&self.site_root)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_file() && entry.file_name() == name {
                matches.push(entry.into_path());
                if matches.len() > 1 {
                    break;
                }
            }
        }
        matches
    }
}

fn found(path: PathBuf, via: ResolvedVia) -> ResolutionResult {
    ResolutionResult {
        local_exists: true,
        local_path: Some(path),
        anchor_valid: None,
        via: Some(via),
        ambiguous_candidates: None,
    }
}

// A path with no separators at all, like "cv.pdf"
fn bare_filename(path_part: &str) -> Option<&str> {
    if path_part.contains('/') || path_part.contains('\\') || path_part == "." || path_part == ".." {
        None
    } else {
        Some(path_part)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn is_markup_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

// Reads the target and looks for the anchor; unreadable counts as absent
fn anchor_in_file(path: &Path, fragment: &str) -> bool {
    match fs::read_to_string(path) {
        Ok(content) => has_anchor(&content, fragment),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read file for anchor check");
            false
        }
    }
}

// Collapses `.` and `..` without touching the filesystem.
// Returns None if the path climbs above its starting point.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    Some(parts.iter().collect())
}
