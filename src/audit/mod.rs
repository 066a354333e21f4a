//! Completeness audit over the record store.
//!
//! Records fall into two tiers. A record without statement HTML is
//! *content unavailable* (typically paid-only) and is counted but not
//! checked further. Every other record is checked for empty
//! [`AuditField`]s, skipping the pairs listed in
//! [`exemptions::FIELD_EXEMPTIONS`]. A record with at least one empty
//! checked field is *flagged*.
//!
//! ```text
//! completeness = (available - flagged) / available * 100    (0.0 when available = 0)
//! ```
//!
//! The audit only reads. Persisting the [`Report`] is up to the caller
//! (see [`crate::store::RecordStore::save_report`]).

pub mod exemptions;

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::record::Record;
use crate::store::{RecordStore, StoreError};

const RULE: &str = "============================================================";

/// Fields checked for emptiness on content-available records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditField {
    Question,
    Examples,
    Constraints,
    Topics,
    AcceptanceRate,
}

impl AuditField {
    /// Every checked field, in report order.
    pub const ALL: [Self; 5] = [
        Self::Question,
        Self::Examples,
        Self::Constraints,
        Self::Topics,
        Self::AcceptanceRate,
    ];

    /// Returns the record field name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Examples => "examples",
            Self::Constraints => "constraints",
            Self::Topics => "topics",
            Self::AcceptanceRate => "acceptance_rate",
        }
    }

    fn is_empty_in(self, record: &Record) -> bool {
        match self {
            Self::Question => record.question.trim().is_empty(),
            Self::Examples => record.examples.trim().is_empty(),
            Self::Constraints => record.constraints.trim().is_empty(),
            Self::Topics => record.topics.is_empty(),
            Self::AcceptanceRate => record.acceptance_rate.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for AuditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the checked fields that are empty in `record`, honoring category
/// exemptions. Content-unavailable records have no field issues.
#[must_use]
pub fn record_issues(record: &Record) -> Vec<AuditField> {
    if !record.has_content() {
        return Vec::new();
    }
    AuditField::ALL
        .into_iter()
        .filter(|field| !exemptions::is_exempt(*field, &record.category))
        .filter(|field| field.is_empty_in(record))
        .collect()
}

/// Audit result. Identifier lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    /// Readable records in the store.
    pub total_records: usize,
    /// Records with statement content.
    pub content_available: usize,
    /// Identifiers in the failure set.
    pub failed_count: usize,
    /// Records whose statement embeds images.
    pub has_images: usize,
    /// Content-unavailable records.
    pub empty_content: Vec<String>,
    pub empty_question: Vec<String>,
    pub empty_examples: Vec<String>,
    pub empty_constraints: Vec<String>,
    pub empty_topics: Vec<String>,
    pub empty_acceptance: Vec<String>,
    /// Informational only.
    pub empty_similar_questions: usize,
    /// Informational only.
    pub empty_hints: usize,
    /// Content-available records with at least one issue.
    pub flagged: Vec<String>,
    /// Record files that could not be decoded.
    pub unreadable: Vec<String>,
    /// Completeness percentage, one decimal.
    pub completeness_pct: f64,
}

impl Report {
    /// Returns the identifier list for `field`.
    #[must_use]
    pub fn empty_for(&self, field: AuditField) -> &[String] {
        match field {
            AuditField::Question => &self.empty_question,
            AuditField::Examples => &self.empty_examples,
            AuditField::Constraints => &self.empty_constraints,
            AuditField::Topics => &self.empty_topics,
            AuditField::AcceptanceRate => &self.empty_acceptance,
        }
    }

    fn empty_for_mut(&mut self, field: AuditField) -> &mut Vec<String> {
        match field {
            AuditField::Question => &mut self.empty_question,
            AuditField::Examples => &mut self.empty_examples,
            AuditField::Constraints => &mut self.empty_constraints,
            AuditField::Topics => &mut self.empty_topics,
            AuditField::AcceptanceRate => &mut self.empty_acceptance,
        }
    }

    fn add(&mut self, identifier: &str, record: &Record) {
        self.total_records += 1;
        if record.has_images() {
            self.has_images += 1;
        }
        if record.similar_questions.is_empty() {
            self.empty_similar_questions += 1;
        }
        if record.hints.is_empty() {
            self.empty_hints += 1;
        }

        if !record.has_content() {
            self.empty_content.push(identifier.to_string());
            return;
        }

        self.content_available += 1;
        let issues = record_issues(record);
        for field in &issues {
            self.empty_for_mut(*field).push(identifier.to_string());
        }
        if !issues.is_empty() {
            self.flagged.push(identifier.to_string());
        }
    }
}

/// Completeness over content-available records, rounded to one decimal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completeness(available: usize, flagged: usize) -> f64 {
    if available == 0 {
        return 0.0;
    }
    let complete = available.saturating_sub(flagged);
    let pct = complete as f64 / available as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Audits every record in `store`. Never modifies the store.
///
/// # Errors
///
/// Returns [`StoreError`] if the store directory or the failure set cannot
/// be read. Undecodable records are listed in [`Report::unreadable`].
#[instrument(skip(store), fields(root = %store.root().display()))]
pub fn audit(store: &RecordStore) -> Result<Report, StoreError> {
    let mut report = Report::default();

    for identifier in store.identifiers()? {
        match store.load(&identifier) {
            Ok(Some(record)) => report.add(&identifier, &record),
            Ok(None) => debug!(identifier, "record vanished during audit"),
            Err(error) => {
                warn!(identifier, %error, "record unreadable");
                report.unreadable.push(identifier);
            }
        }
    }

    report.failed_count = store.load_failures()?.map_or(0, |failed| failed.len());
    report.completeness_pct = completeness(report.content_available, report.flagged.len());

    debug!(
        total = report.total_records,
        flagged = report.flagged.len(),
        completeness = report.completeness_pct,
        "audit complete"
    );
    Ok(report)
}

/// Renders the console summary. Sections always appear in the same order.
#[must_use]
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let complete = report
        .content_available
        .saturating_sub(report.flagged.len());

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "QUALITY REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Records in store:         {}", report.total_records);
    let _ = writeln!(out, "Content unavailable:      {}", report.empty_content.len());
    let _ = writeln!(out, "Failed (not fetched):     {}", report.failed_count);
    let _ = writeln!(out, "Unreadable records:       {}", report.unreadable.len());
    let _ = writeln!(out, "Problems with images:     {}", report.has_images);
    let _ = writeln!(out);

    let _ = writeln!(out, "--- Empty field counts (content available) ---");
    for field in AuditField::ALL {
        let label = format!("Empty {}:", field.name());
        let _ = writeln!(out, "{label:<26}{}", report.empty_for(field).len());
    }
    let _ = writeln!(
        out,
        "{:<26}{} (may be legitimately empty)",
        "Empty similar_questions:", report.empty_similar_questions
    );
    let _ = writeln!(
        out,
        "{:<26}{} (may be legitimately empty)",
        "Empty hints:", report.empty_hints
    );
    let _ = writeln!(out);

    if report.flagged.is_empty() {
        let _ = writeln!(out, "No flagged fields found!");
    } else {
        let _ = writeln!(
            out,
            "--- {} problems with empty fields ---",
            report.flagged.len()
        );
        for identifier in &report.flagged {
            let missing: Vec<&str> = AuditField::ALL
                .into_iter()
                .filter(|field| report.empty_for(*field).contains(identifier))
                .map(AuditField::name)
                .collect();
            let _ = writeln!(out, "  {identifier}: missing {}", missing.join(", "));
        }
    }
    if !report.unreadable.is_empty() {
        let _ = writeln!(out, "--- {} unreadable records ---", report.unreadable.len());
        for identifier in &report.unreadable {
            let _ = writeln!(out, "  {identifier}");
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Data completeness: {:.1}% ({complete}/{})",
        report.completeness_pct, report.content_available
    );
    let _ = write!(out, "{RULE}");
    out
}
