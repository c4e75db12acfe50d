// src/crawl/documents.rs
// =============================================================================
// Finds the markup documents of a site and loads their references.
//
// Discovery walks the site root for .html/.htm files and skips anything whose
// site-relative path has a dot-prefixed component (.git, .github, .cache ...).
// The list is sorted so every run visits documents in the same order.
// =============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::checker::extract_resources;

/// One parsed HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the site root
    pub path: PathBuf,
    /// Unique resource strings found in the page
    pub references: BTreeSet<String>,
}

// Lists site-relative paths of every markup document under `site_root`
pub fn discover_documents(site_root: &Path) -> Vec<PathBuf> {
    let mut documents: Vec<PathBuf> = WalkDir::new(site_root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_markup(e.path()))
        .filter_map(|e| e.path().strip_prefix(site_root).ok().map(Path::to_path_buf))
        .collect();

    documents.sort();
    documents
}

// Reads a document and extracts its references
pub fn load_document(site_root: &Path, relative: &Path) -> io::Result<Document> {
    let content = fs::read_to_string(site_root.join(relative))?;
    Ok(Document {
        path: relative.to_path_buf(),
        references: extract_resources(&content),
    })
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

fn is_markup(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discovery_skips_dot_dirs_and_sorts() {
        let site = tempdir().unwrap();
        write(site.path(), "index.html", "");
        write(site.path(), "blog/post.htm", "");
        write(site.path(), "about.html", "");
        write(site.path(), ".github/template.html", "");
        write(site.path(), "assets/.hidden.html", "");
        write(site.path(), "notes.txt", "");

        let docs = discover_documents(site.path());
        assert_eq!(
            docs,
            vec![
                PathBuf::from("about.html"),
                PathBuf::from("blog/post.htm"),
                PathBuf::from("index.html"),
            ]
        );
    }

    #[test]
    fn test_load_document_extracts_references() {
        let site = tempdir().unwrap();
        write(site.path(), "index.html", r##"<img src="img/pic.jpg"><a href="#top">t</a>"##);
        let doc = load_document(site.path(), Path::new("index.html")).unwrap();
        assert_eq!(doc.references.len(), 1);
        assert!(doc.references.contains("img/pic.jpg"));
    }

    #[test]
    fn test_unreadable_document_is_an_error() {
        let site = tempdir().unwrap();
        fs::write(site.path().join("bad.html"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        assert!(load_document(site.path(), Path::new("bad.html")).is_err());
    }
}
