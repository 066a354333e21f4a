//! Identifier discovery from CSV problem listings.
//!
//! Every `*.csv` file in the input directory is scanned. The header row
//! locates the `URL` column (case-insensitive); each row's URL is reduced to
//! its problem slug. The result is the sorted, deduplicated union across all
//! files.
//!
//! Files without a `URL` column are skipped with a warning. Rows whose URL
//! does not name a problem are skipped silently.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Header name of the column holding problem URLs.
pub const URL_COLUMN: &str = "URL";

/// Slug following a `/problems/` path segment.
#[allow(clippy::expect_used)]
static PROBLEM_SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/problems/([A-Za-z0-9][A-Za-z0-9_-]*)").expect("slug regex is valid") // Static pattern, safe to panic
});

/// Errors that can occur while discovering identifiers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input directory or one of its files could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The input directory holds no CSV listings.
    #[error("no CSV files found in {path}")]
    NoListings {
        /// The searched directory.
        path: PathBuf,
    },
}

/// Collects the sorted, unique problem slugs from all CSV files in `dir`.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the directory or a listing cannot be read,
/// or [`SourceError::NoListings`] if the directory holds no CSV files.
#[instrument(fields(dir = %dir.display()))]
pub fn discover_identifiers(dir: &Path) -> Result<Vec<String>, SourceError> {
    let entries = fs::read_dir(dir).map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut listings: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            listings.push(path);
        }
    }

    if listings.is_empty() {
        return Err(SourceError::NoListings {
            path: dir.to_path_buf(),
        });
    }
    listings.sort();

    let mut slugs = BTreeSet::new();
    for path in &listings {
        let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let before = slugs.len();
        collect_slugs(path, &content, &mut slugs);
        debug!(file = %path.display(), added = slugs.len() - before, "listing scanned");
    }

    info!(files = listings.len(), identifiers = slugs.len(), "identifiers discovered");
    Ok(slugs.into_iter().collect())
}

fn collect_slugs(path: &Path, content: &str, slugs: &mut BTreeSet<String>) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.lines();

    let Some(header) = lines.next() else {
        return;
    };
    let Some(column) = split_fields(header)
        .iter()
        .position(|name| name.trim().eq_ignore_ascii_case(URL_COLUMN))
    else {
        warn!(file = %path.display(), "listing has no URL column, skipping");
        return;
    };

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(slug) = split_fields(line)
            .get(column)
            .and_then(|url| slug_from_url(url))
        {
            slugs.insert(slug);
        }
    }
}

/// Splits one CSV line into fields, honoring double quotes and `""` escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Extracts the problem slug from a listing URL.
///
/// Prefers the segment after `/problems/`; otherwise falls back to the last
/// path segment of an absolute URL with at least two segments.
#[must_use]
pub fn slug_from_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(captures) = PROBLEM_SLUG_PATTERN.captures(raw) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }

    let url = Url::parse(raw).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }
    segments.last().map(|s| (*s).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slug_from_problem_url() {
        assert_eq!(
            slug_from_url("https://leetcode.com/problems/two-sum"),
            Some("two-sum".to_string())
        );
        assert_eq!(
            slug_from_url("https://leetcode.com/problems/two-sum/description/"),
            Some("two-sum".to_string())
        );
        assert_eq!(
            slug_from_url("https://leetcode.com/problems/3sum/?envType=list"),
            Some("3sum".to_string())
        );
    }

    #[test]
    fn test_slug_fallback_last_segment() {
        assert_eq!(
            slug_from_url("https://example.com/tasks/reverse-list/"),
            Some("reverse-list".to_string())
        );
        assert_eq!(slug_from_url("https://example.com/only"), None);
        assert_eq!(slug_from_url("not a url"), None);
        assert_eq!(slug_from_url("   "), None);
    }

    #[test]
    fn test_split_fields_honors_quotes() {
        let fields = split_fields(r#"1,"Two Sum, easy",https://x/problems/two-sum,"say ""hi""""#);
        assert_eq!(
            fields,
            vec![
                "1",
                "Two Sum, easy",
                "https://x/problems/two-sum",
                r#"say "hi""#
            ]
        );
    }

    #[test]
    fn test_discover_unions_sorts_and_dedupes() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("google.csv"),
            "ID,Title,URL\n\
             1,Two Sum,https://leetcode.com/problems/two-sum\n\
             15,3Sum,https://leetcode.com/problems/3sum\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("meta.csv"),
            "Title,url,Frequency\n\
             \"Two Sum, again\",https://leetcode.com/problems/two-sum/,90\n\
             Add Binary,https://leetcode.com/problems/add-binary/,50\n\
             \n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "URL\nhttps://leetcode.com/problems/ignored").unwrap();

        let slugs = discover_identifiers(dir.path()).unwrap();
        assert_eq!(slugs, vec!["3sum", "add-binary", "two-sum"]);
    }

    #[test]
    fn test_listing_without_url_column_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), "ID,Title\n1,Two Sum\n").unwrap();
        fs::write(
            dir.path().join("b.csv"),
            "URL\nhttps://leetcode.com/problems/two-sum\n",
        )
        .unwrap();

        assert_eq!(discover_identifiers(dir.path()).unwrap(), vec!["two-sum"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_identifiers(dir.path()),
            Err(SourceError::NoListings { .. })
        ));
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            discover_identifiers(&dir.path().join("missing")),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_byte_order_mark_in_header() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bom.csv"),
            "\u{feff}URL,Title\nhttps://leetcode.com/problems/lru-cache,LRU\n",
        )
        .unwrap();
        assert_eq!(discover_identifiers(dir.path()).unwrap(), vec!["lru-cache"]);
    }
}
