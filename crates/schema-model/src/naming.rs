//! Naming rules for properties and definitions

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};

/// Base for generated field names (`name0`, `name1`, ...)
pub const DEFAULT_FIELD_NAME: &str = "name";

/// Letters first, then letters, digits, `_`, `.`, `-`, space and the
/// Norwegian vowels the data models use.
static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.\-æÆøØåÅ ]*$").expect("name pattern is a valid regex")
});

/// True if `name` is usable as a property or definition name
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Reject names outside the naming rules
///
/// # Errors
/// Returns [`SchemaError::InvalidName`].
pub fn validate_name(name: &str) -> SchemaResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}

/// `base` followed by the smallest non-negative integer not in `existing`
///
/// The bare `base` is never returned, so three calls with creation in
/// between yield `base0`, `base1`, `base2`.
#[must_use]
pub fn unique_name<'a>(base: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = existing.into_iter().collect();
    (0u64..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
