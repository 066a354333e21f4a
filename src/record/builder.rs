//! Normalization of raw question payloads into [`Record`]s.
//!
//! Embedded JSON blobs (`stats`, `similarQuestions`) are decoded
//! defensively: anything malformed or missing becomes zero or empty and is
//! only logged at debug level. The builder does no I/O.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{Record, SectionSplitter, SimilarQuestion};
use crate::fetch::RawPayload;

/// Site root used for related-question links.
pub const DEFAULT_SITE_URL: &str = "https://leetcode.com/";

#[derive(Debug, Default)]
struct Stats {
    total_accepted: u64,
    total_submissions: u64,
    acceptance_rate: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimilarEntry {
    title: Option<String>,
    title_slug: Option<String>,
    difficulty: Option<String>,
}

/// Builds records from payloads.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    splitter: SectionSplitter,
    site_url: String,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self {
            splitter: SectionSplitter::default(),
            site_url: DEFAULT_SITE_URL.to_string(),
        }
    }
}

impl RecordBuilder {
    /// Creates a builder with the default splitter and site root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the section splitter.
    #[must_use]
    pub fn with_splitter(mut self, splitter: SectionSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Replaces the site root used for related-question links.
    #[must_use]
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        let mut site_url = site_url.into();
        if !site_url.ends_with('/') {
            site_url.push('/');
        }
        self.site_url = site_url;
        self
    }

    /// Normalizes `raw` into the record stored under `identifier`.
    #[must_use]
    pub fn build(&self, identifier: &str, raw: &RawPayload) -> Record {
        let stats = parse_stats(identifier, &raw.stats);
        let similar_questions = self.parse_similar(identifier, &raw.similar_questions);

        let content_markdown = if raw.content.trim().is_empty() {
            String::new()
        } else {
            html_to_markdown(&raw.content)
        };
        let sections = self.splitter.split(&content_markdown);

        Record {
            id: raw.question_frontend_id.clone(),
            title: raw.title.clone(),
            slug: identifier.to_string(),
            difficulty: raw.difficulty.clone(),
            category: raw.category_title.clone(),
            content_html: raw.content.clone(),
            content_markdown,
            question: sections.question,
            examples: sections.examples,
            constraints: sections.constraints,
            topics: raw
                .topic_tags
                .iter()
                .map(|tag| tag.name.clone())
                .filter(|name| !name.is_empty())
                .collect(),
            total_accepted: stats.total_accepted,
            total_submissions: stats.total_submissions,
            acceptance_rate: stats.acceptance_rate,
            similar_questions,
            hints: raw.hints.clone(),
        }
    }

    fn parse_similar(&self, identifier: &str, blob: &str) -> Vec<SimilarQuestion> {
        if blob.trim().is_empty() {
            return Vec::new();
        }
        let entries: Vec<SimilarEntry> = match serde_json::from_str(blob) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(identifier, %error, "similar questions blob malformed, using empty list");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .map(|entry| {
                let slug = entry.title_slug.unwrap_or_default();
                SimilarQuestion {
                    title: entry.title.unwrap_or_default(),
                    url: self.problem_url(&slug),
                    difficulty: entry.difficulty.unwrap_or_default(),
                    slug,
                }
            })
            .collect()
    }

    fn problem_url(&self, slug: &str) -> String {
        format!("{}problems/{slug}/", self.site_url)
    }
}

/// Renders statement HTML as markdown.
///
/// Links become `[text](url)`, images `![alt](src)`, and source line
/// wrapping is collapsed. Conversion failure yields an empty string.
#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    match htmd::convert(html) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(error) => {
            warn!(%error, "HTML to markdown conversion failed");
            String::new()
        }
    }
}

fn parse_stats(identifier: &str, blob: &str) -> Stats {
    if blob.trim().is_empty() {
        return Stats::default();
    }
    let value: Value = match serde_json::from_str(blob) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            debug!(identifier, "stats blob malformed, using zero stats");
            return Stats::default();
        }
    };

    Stats {
        total_accepted: value_as_u64(value.get("totalAcceptedRaw")),
        total_submissions: value_as_u64(value.get("totalSubmissionRaw")),
        acceptance_rate: match value.get("acRate") {
            Some(Value::String(rate)) => rate.clone(),
            Some(Value::Number(rate)) => rate.to_string(),
            _ => String::new(),
        },
    }
}

fn value_as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
