//! URL fragment parsing and validation
//!
//! Fragments are the only persisted navigation state. Anything that is not a
//! registered section resolves to the first section so a bad deep link never
//! leaves the page without a current section.

use tracing::warn;

use crate::section::SectionId;

/// Leading marker of a URL fragment
pub const FRAGMENT_MARKER: char = '#';

/// Strip the fragment marker and whitespace, returning the candidate token
///
/// Returns `None` for an empty fragment. The token is not validated.
pub fn parse_hash(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let cleaned = trimmed.strip_prefix(FRAGMENT_MARKER).unwrap_or(trimmed).trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Check a candidate against the known sections
///
/// Missing or unknown candidates fall back to the first known section, or
/// `None` if no sections are known.
pub fn validate_hash(candidate: Option<&str>, known: &[SectionId]) -> Option<SectionId> {
    let Some(candidate) = candidate else {
        return known.first().cloned();
    };

    if let Some(section) = known.iter().find(|id| id.as_str() == candidate) {
        return Some(section.clone());
    }

    warn!(
        hash = candidate,
        fallback = ?known.first().map(SectionId::as_str),
        "Unknown section in URL fragment, defaulting to first section"
    );
    known.first().cloned()
}

/// Parse and validate in one step
pub fn resolve_hash(raw: &str, known: &[SectionId]) -> Option<SectionId> {
    validate_hash(parse_hash(raw), known)
}

/// Fragment-only URL for a section, e.g. `#music`
pub fn fragment_for(id: &SectionId) -> String {
    format!("{FRAGMENT_MARKER}{id}")
}
