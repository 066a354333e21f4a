//! Categories that legitimately lack a field.
//!
//! Database and shell problems have no constraints section, and some
//! language categories carry no topic tags. The auditor skips the check for
//! these pairs.

use super::AuditField;

/// Per-field categories exempt from the emptiness check.
pub const FIELD_EXEMPTIONS: &[(AuditField, &[&str])] = &[
    (AuditField::Constraints, &["Database", "Shell", "pandas"]),
    (AuditField::Topics, &["JavaScript", "Shell"]),
];

/// Returns true when records in `category` are not expected to have `field`.
///
/// Categories compare ASCII case-insensitively.
#[must_use]
pub fn is_exempt(field: AuditField, category: &str) -> bool {
    let category = category.trim();
    FIELD_EXEMPTIONS
        .iter()
        .filter(|(exempt_field, _)| *exempt_field == field)
        .flat_map(|(_, categories)| categories.iter())
        .any(|exempt| exempt.eq_ignore_ascii_case(category))
}
