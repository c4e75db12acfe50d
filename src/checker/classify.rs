// src/checker/classify.rs
// =============================================================================
// Maps a reference to a ResourceType using nothing but its path extension.
//
// Pure function: no filesystem, no network. The query string and fragment are
// dropped first, and matching is case-insensitive, so "a/b.PDF?x=1#y" is a
// document.
// =============================================================================

use serde::Serialize;
use std::fmt;

/// Semantic type of a referenced resource.
///
/// Variant order is the report order (derive(Ord) follows declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Markup,
    Stylesheet,
    Script,
    Image,
    Document,
    Text,
    Other,
}

impl ResourceType {
    /// A failure of a critical type makes the run exit with status 2.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            ResourceType::Markup
                | ResourceType::Stylesheet
                | ResourceType::Script
                | ResourceType::Document
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceType::Markup => "HTML",
            ResourceType::Stylesheet => "CSS",
            ResourceType::Script => "JS",
            ResourceType::Image => "IMAGES",
            ResourceType::Document => "PDF",
            ResourceType::Text => "TEXT",
            ResourceType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Classifies a reference by the extension of its path component
pub fn classify(url: &str) -> ResourceType {
    let path = path_component(url).to_ascii_lowercase();

    // Only the last segment carries the extension; "dir.v2/file" has none
    let file_name = path.rsplit('/').next().unwrap_or("");
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => return ResourceType::Other,
    };

    match extension {
        "pdf" => ResourceType::Document,
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "ico" => ResourceType::Image,
        "css" => ResourceType::Stylesheet,
        "js" => ResourceType::Script,
        "html" | "htm" => ResourceType::Markup,
        "txt" | "xml" | "json" => ResourceType::Text,
        _ => ResourceType::Other,
    }
}

// Returns the path part of a reference: no scheme/host, no query, no fragment
pub fn path_component(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");

    // Drop "scheme://host" (or protocol-relative "//host") so a bare domain
    // like https://example.com never classifies as ".com"
    let after_scheme = match without_query.find("://") {
        Some(idx) => &without_query[idx + 3..],
        None if without_query.starts_with("//") => &without_query[2..],
        None => return without_query,
    };

    match after_scheme.find('/') {
        Some(idx) => &after_scheme[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_and_strips_query_fragment() {
        assert_eq!(classify("a/b.PDF?x=1#y"), ResourceType::Document);
        assert_eq!(classify("assets/img/Profile.JPG"), ResourceType::Image);
    }

    #[test]
    fn test_every_family() {
        assert_eq!(classify("style.css"), ResourceType::Stylesheet);
        assert_eq!(classify("/js/app.js?v=3"), ResourceType::Script);
        assert_eq!(classify("page.htm#top"), ResourceType::Markup);
        assert_eq!(classify("sitemap.xml"), ResourceType::Text);
        assert_eq!(classify("data/feed.json"), ResourceType::Text);
        assert_eq!(classify("favicon.ico"), ResourceType::Image);
        assert_eq!(classify("archive.zip"), ResourceType::Other);
        assert_eq!(classify("docs/"), ResourceType::Other);
    }

    #[test]
    fn test_absolute_urls_use_path_only() {
        assert_eq!(classify("https://example.com"), ResourceType::Other);
        assert_eq!(classify("https://example.com/paper.pdf"), ResourceType::Document);
        assert_eq!(classify("//cdn.example.com/lib.min.js"), ResourceType::Script);
    }

    #[test]
    fn test_dot_in_directory_is_not_an_extension() {
        assert_eq!(classify("v1.2/readme"), ResourceType::Other);
    }

    #[test]
    fn test_critical_types() {
        let all = [
            ResourceType::Markup,
            ResourceType::Stylesheet,
            ResourceType::Script,
            ResourceType::Image,
            ResourceType::Document,
            ResourceType::Text,
            ResourceType::Other,
        ];
        let critical: Vec<_> = all
            .iter()
            .filter(|t| t.is_critical())
            .copied()
            .collect();
        assert_eq!(
            critical,
            vec![
                ResourceType::Markup,
                ResourceType::Stylesheet,
                ResourceType::Script,
                ResourceType::Document
            ]
        );
    }
}
