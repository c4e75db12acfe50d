// src/checker/html.rs
// =============================================================================
// This module pulls resource references out of HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever, which recovers from malformed markup the way a
//   browser does, so a broken page still yields whatever links it has
//
// Two jobs live here:
// - extract_resources: every href/src a page points at
// - has_anchor: does a page contain an element with a given id or name
// =============================================================================

use scraper::{Html, Selector};
use std::collections::BTreeSet;

// (CSS selector, attribute to read) pairs for every tag we care about
const RESOURCE_SELECTORS: [(&str, &str); 4] = [
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("a[href]", "href"),
];

// Prefixes that never point at a resource
const IGNORED_PREFIXES: [&str; 5] = ["#", "javascript:", "mailto:", "tel:", "data:"];

// Extracts the set of unique resource strings referenced by a page
//
// Parameters:
//   html: the HTML content to parse
//
// Returns: BTreeSet so duplicates collapse and iteration order is stable
//
// Example:
//   html = "<img src='a.png'><a href='a.png'>x</a><a href='#top'>up</a>"
//   result = {"a.png"}
pub fn extract_resources(html: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let mut resources = BTreeSet::new();

    for (css, attr) in RESOURCE_SELECTORS {
        // Constant selectors; a parse failure here is a programming error
        let selector = Selector::parse(css).expect("valid resource selector");

        for element in document.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if is_resource(value) {
                    resources.insert(value.to_string());
                }
            }
        }
    }

    resources
}

// Checks whether a trimmed attribute value is worth resolving
fn is_resource(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    !IGNORED_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

// Checks whether the page has an element whose id or name equals `fragment`
pub fn has_anchor(html: &str, fragment: &str) -> bool {
    let document = Html::parse_document(html);
    let selector = Selector::parse("[id], [name]").expect("valid anchor selector");

    document.select(&selector).any(|element| {
        let el = element.value();
        el.id() == Some(fragment) || el.attr("name") == Some(fragment)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_tag_kinds() {
        let html = r#"
            <html><head>
              <link rel="stylesheet" href="css/site.css">
              <script src="js/app.js"></script>
            </head><body>
              <img src="img/pic.jpg">
              <a href="docs/cv.pdf">CV</a>
            </body></html>
        "#;
        let resources = extract_resources(html);
        let expected: BTreeSet<String> = ["css/site.css", "js/app.js", "img/pic.jpg", "docs/cv.pdf"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(resources, expected);
    }

    #[test]
    fn test_skips_non_resources() {
        let html = r##"
            <a href="#top">Top</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:me@example.com">Mail</a>
            <a href="tel:+15551234">Call</a>
            <img src="data:image/png;base64,AAAA">
            <a href="   ">blank</a>
        "##;
        assert!(extract_resources(html).is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let html = r#"<img src="a.png"><a href="a.png">x</a><a href=" a.png ">y</a>"#;
        assert_eq!(extract_resources(html).len(), 1);
    }

    #[test]
    fn test_malformed_markup_still_yields_links() {
        let html = r#"<div><p><a href="one.html">one<img src="two.png"</div></b><a href='three.pdf'>"#;
        let resources = extract_resources(html);
        assert!(resources.contains("one.html"));
        assert!(resources.contains("three.pdf"));
    }

    #[test]
    fn test_has_anchor_by_id_and_name() {
        let html = r#"<h2 id="sec1">One</h2><a name="legacy"></a>"#;
        assert!(has_anchor(html, "sec1"));
        assert!(has_anchor(html, "legacy"));
        assert!(!has_anchor(html, "sec2"));
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a BTreeSet instead of a Vec?
//    - The same image is often linked several times on one page
//    - A set keeps one copy; a BTreeSet also keeps them sorted, so two runs
//      over the same page produce the same order
//
// 2. What does `for (css, attr) in RESOURCE_SELECTORS` do?
//    - Arrays can be iterated by value; each item is a tuple that we
//      destructure into two variables right in the loop header
//
// 3. Why `expect` on Selector::parse?
//    - The selector strings are constants written in this file
//    - If one were invalid, every run would fail the same way, so a panic
//      with a clear message is the honest outcome
// -----------------------------------------------------------------------------
