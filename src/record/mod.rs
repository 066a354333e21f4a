//! Persisted problem records and the pure transforms that produce them.
//!
//! - [`Record`] - The unit written to the record store, one per identifier
//! - [`RecordBuilder`] - Normalizes a [`crate::fetch::RawPayload`] into a [`Record`]
//! - [`SectionSplitter`] - Partitions statement text into question/examples/constraints

mod builder;
mod splitter;

pub use builder::{DEFAULT_SITE_URL, RecordBuilder, html_to_markdown};
pub use splitter::{DEFAULT_MARKERS, Section, SectionMarker, SectionSplitter, SplitContent};

use serde::{Deserialize, Serialize};

/// A related question as stored in a [`Record`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarQuestion {
    pub title: String,
    pub slug: String,
    pub difficulty: String,
    pub url: String,
}

/// The persisted unit for one problem.
///
/// Field order is the serialization order, so identical inputs always
/// produce identical bytes on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// Public problem number.
    pub id: String,
    pub title: String,
    /// The identifier this record is stored under.
    pub slug: String,
    pub difficulty: String,
    pub category: String,
    pub content_html: String,
    pub content_markdown: String,
    pub question: String,
    pub examples: String,
    pub constraints: String,
    pub topics: Vec<String>,
    pub total_accepted: u64,
    pub total_submissions: u64,
    pub acceptance_rate: String,
    pub similar_questions: Vec<SimilarQuestion>,
    pub hints: Vec<String>,
}

impl Record {
    /// Returns true when the statement body was delivered.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.content_html.trim().is_empty()
    }

    /// Returns true when the statement embeds at least one image.
    #[must_use]
    pub fn has_images(&self) -> bool {
        self.content_html.contains("<img")
    }
}
