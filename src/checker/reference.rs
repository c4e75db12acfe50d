// src/checker/reference.rs
// =============================================================================
// The Reference data model: a resource string exactly as authored in markup,
// plus where it was found.
// =============================================================================

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::classify::{classify, ResourceType};

/// A resource locator as it appeared in an href/src attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    /// The attribute value, trimmed
    pub resource_url: String,
    /// Site-relative path of the document the reference was found in
    pub document: PathBuf,
    /// Directory of that document, relative to the site root ("" for root)
    pub referer_dir: PathBuf,
    /// Text after '#', if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl Reference {
    pub fn new(resource_url: impl Into<String>, document: &Path) -> Self {
        let resource_url = resource_url.into();
        let fragment = resource_url
            .split_once('#')
            .map(|(_, frag)| frag.to_string())
            .filter(|frag| !frag.is_empty());
        let referer_dir = document
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Reference {
            resource_url,
            document: document.to_path_buf(),
            referer_dir,
            fragment,
        }
    }

    /// True for http(s) and protocol-relative references.
    pub fn is_external(&self) -> bool {
        is_external_url(&self.resource_url)
    }

    /// The reference without its query string and fragment.
    pub fn path_part(&self) -> &str {
        let without_fragment = self.resource_url.split('#').next().unwrap_or("");
        without_fragment.split('?').next().unwrap_or("")
    }

    /// True when the path is resolved from the site root ("/img/a.png").
    pub fn is_root_relative(&self) -> bool {
        self.resource_url.starts_with('/') && !self.resource_url.starts_with("//")
    }

    pub fn classify(self) -> ClassifiedReference {
        let resource_type = classify(&self.resource_url);
        ClassifiedReference {
            reference: self,
            resource_type,
        }
    }
}

// Checks for an absolute web URL, case-insensitively on the scheme
pub fn is_external_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || url.starts_with("//")
}

/// A Reference tagged with its ResourceType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedReference {
    #[serde(flatten)]
    pub reference: Reference,
    pub resource_type: ResourceType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_and_referer_dir() {
        let r = Reference::new("../page.html#sec1", Path::new("blog/post/index.html"));
        assert_eq!(r.fragment.as_deref(), Some("sec1"));
        assert_eq!(r.referer_dir, PathBuf::from("blog/post"));
        assert_eq!(r.path_part(), "../page.html");
    }

    #[test]
    fn test_empty_fragment_is_none() {
        let r = Reference::new("page.html#", Path::new("index.html"));
        assert_eq!(r.fragment, None);
        assert_eq!(r.referer_dir, PathBuf::new());
    }

    #[test]
    fn test_query_stripped_from_path_part() {
        let r = Reference::new("css/site.css?v=12#x", Path::new("index.html"));
        assert_eq!(r.path_part(), "css/site.css");
    }

    #[test]
    fn test_external_detection() {
        assert!(is_external_url("https://example.com/a.pdf"));
        assert!(is_external_url("HTTP://EXAMPLE.COM"));
        assert!(is_external_url("//cdn.example.com/x.js"));
        assert!(!is_external_url("/assets/x.js"));
        assert!(!is_external_url("assets/x.js"));
    }

    #[test]
    fn test_classify_carries_type() {
        let c = Reference::new("docs/cv.pdf", Path::new("index.html")).classify();
        assert_eq!(c.resource_type, ResourceType::Document);
    }
}
