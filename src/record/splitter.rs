//! Line-scanning partition of a problem statement into labeled sections.
//!
//! The scan keeps a current [`Section`], starting at [`Section::Question`].
//! Each line is tested against an ordered marker list; a matching marker
//! switches the section *before* the line is stored, so a header such as
//! `**Example 1:**` lands in the section it introduces. Lines labeled
//! [`Section::FollowUp`] are dropped from the output.
//!
//! Markers are plain data so new header spellings can be added without
//! touching the scan.

/// Section a statement line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Question,
    Examples,
    Constraints,
    /// Trailing follow-up prompt; discarded.
    FollowUp,
}

/// A case-insensitive line prefix that starts a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarker {
    prefix: String,
    section: Section,
}

impl SectionMarker {
    /// Creates a marker. The prefix is matched against the trimmed,
    /// lower-cased line.
    #[must_use]
    pub fn new(prefix: &str, section: Section) -> Self {
        Self {
            prefix: prefix.to_lowercase(),
            section,
        }
    }

    /// Returns the lower-cased prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the section this marker introduces.
    #[must_use]
    pub fn section(&self) -> Section {
        self.section
    }

    fn matches(&self, normalized_line: &str) -> bool {
        normalized_line.starts_with(&self.prefix)
    }
}

/// Default header spellings, tried in order.
pub const DEFAULT_MARKERS: &[(&str, Section)] = &[
    ("**example", Section::Examples),
    ("example ", Section::Examples),
    ("**constraints", Section::Constraints),
    ("constraints", Section::Constraints),
    ("**follow up", Section::FollowUp),
    ("**follow-up", Section::FollowUp),
    ("follow up:", Section::FollowUp),
    ("follow-up:", Section::FollowUp),
];

/// The three kept sections, each newline-joined and trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitContent {
    pub question: String,
    pub examples: String,
    pub constraints: String,
}

/// Splits statement text using an ordered marker list.
#[derive(Debug, Clone)]
pub struct SectionSplitter {
    markers: Vec<SectionMarker>,
}

impl Default for SectionSplitter {
    fn default() -> Self {
        Self::new(
            DEFAULT_MARKERS
                .iter()
                .map(|(prefix, section)| SectionMarker::new(prefix, *section))
                .collect(),
        )
    }
}

impl SectionSplitter {
    /// Creates a splitter with exactly `markers`, first match wins.
    #[must_use]
    pub fn new(markers: Vec<SectionMarker>) -> Self {
        Self { markers }
    }

    /// Appends a marker after the existing ones.
    #[must_use]
    pub fn with_marker(mut self, marker: SectionMarker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Returns the configured markers in match order.
    #[must_use]
    pub fn markers(&self) -> &[SectionMarker] {
        &self.markers
    }

    /// Labels every line of `text`, in order.
    #[must_use]
    pub fn classify<'a>(&self, text: &'a str) -> Vec<(Section, &'a str)> {
        let mut current = Section::Question;
        text.split('\n')
            .map(|line| {
                let normalized = line.trim().to_lowercase();
                if let Some(marker) = self.markers.iter().find(|m| m.matches(&normalized)) {
                    current = marker.section;
                }
                (current, line)
            })
            .collect()
    }

    /// Splits `text` into question, examples and constraints.
    #[must_use]
    pub fn split(&self, text: &str) -> SplitContent {
        let mut question = Vec::new();
        let mut examples = Vec::new();
        let mut constraints = Vec::new();

        for (section, line) in self.classify(text) {
            match section {
                Section::Question => question.push(line),
                Section::Examples => examples.push(line),
                Section::Constraints => constraints.push(line),
                Section::FollowUp => {}
            }
        }

        SplitContent {
            question: question.join("\n").trim().to_string(),
            examples: examples.join("\n").trim().to_string(),
            constraints: constraints.join("\n").trim().to_string(),
        }
    }
}
