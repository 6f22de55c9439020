//! Pre-save document checks
//!
//! Restriction edits store values as given, so a separate pass reports the
//! problems a save would carry into the published schema.

use regex::Regex;
use schema_pointer::SchemaPointer;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use crate::canonical;
use crate::config::ModelConfig;
use crate::error::SchemaResult;
use crate::node::SchemaNode;
use crate::resolver::ReferenceResolver;
use crate::table::NodeTable;

/// Keywords holding a non-negative integer count
const COUNT_LIMITS: &[&str] = &[
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "minProperties",
    "maxProperties",
];

/// `(lower, upper)` keyword pairs
const RANGES: &[(&str, &str)] = &[
    ("minLength", "maxLength"),
    ("minItems", "maxItems"),
    ("minProperties", "maxProperties"),
    ("minimum", "maximum"),
    ("exclusiveMinimum", "exclusiveMaximum"),
];

/// Category of a [`ValidationIssue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// `$ref` target is missing
    DanglingReference,
    /// Reference chain loops
    CyclicReference,
    /// Restriction does not apply to the node kind
    InapplicableRestriction,
    /// Count limit is not a non-negative integer, or `multipleOf` is not
    /// positive
    InvalidLimit,
    /// Lower bound exceeds upper bound
    InvertedRange,
    /// `pattern` does not compile
    InvalidPattern,
    /// `enum` is not a non-empty array of distinct values
    InvalidEnum,
    /// Canonical document was rejected by the JSON Schema compiler
    MetaSchema,
}

impl Display for IssueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DanglingReference => "dangling reference",
            Self::CyclicReference => "cyclic reference",
            Self::InapplicableRestriction => "inapplicable restriction",
            Self::InvalidLimit => "invalid limit",
            Self::InvertedRange => "inverted range",
            Self::InvalidPattern => "invalid pattern",
            Self::InvalidEnum => "invalid enum",
            Self::MetaSchema => "meta-schema",
        };
        f.write_str(name)
    }
}

/// One problem found by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Offending node
    pub pointer: SchemaPointer,
    /// Category
    pub kind: IssueKind,
    /// Human-readable detail
    pub message: String,
}

impl ValidationIssue {
    fn new(pointer: &SchemaPointer, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            pointer: pointer.clone(),
            kind,
            message: message.into(),
        }
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.pointer, self.message, self.kind)
    }
}

/// Check every node of `table`
///
/// # Errors
/// Only if the table cannot be written out for meta validation, which
/// means it is missing its root or definitions container.
pub fn validate(table: &NodeTable, config: &ModelConfig) -> SchemaResult<Vec<ValidationIssue>> {
    let resolver = ReferenceResolver::new(table).with_max_depth(config.max_reference_depth);
    let mut issues = Vec::new();

    for node in table.iter() {
        check_reference(&resolver, node, &mut issues);
        check_restrictions(node, &mut issues);
    }

    if config.meta_validation {
        let document = canonical::to_canonical_schema(table)?;
        if let Err(error) = jsonschema::JSONSchema::compile(&document) {
            issues.push(ValidationIssue::new(
                &SchemaPointer::root(),
                IssueKind::MetaSchema,
                error.to_string(),
            ));
        }
    }

    tracing::debug!(issues = issues.len(), "validated document");
    Ok(issues)
}

fn check_reference(resolver: &ReferenceResolver<'_>, node: &SchemaNode, issues: &mut Vec<ValidationIssue>) {
    let Some(target) = node.reference_target() else {
        return;
    };
    if resolver.resolve(node).is_err() {
        issues.push(ValidationIssue::new(
            node.pointer(),
            IssueKind::DanglingReference,
            format!("target {target} does not exist"),
        ));
    } else if resolver.detect_cycle(node.pointer()) {
        issues.push(ValidationIssue::new(
            node.pointer(),
            IssueKind::CyclicReference,
            format!("following {target} leads back here"),
        ));
    }
}

fn check_restrictions(node: &SchemaNode, issues: &mut Vec<ValidationIssue>) {
    let pointer = node.pointer();
    let restrictions = node.restrictions();

    for key in restrictions.keys() {
        if !node.kind().accepts_restriction(key) {
            issues.push(ValidationIssue::new(
                pointer,
                IssueKind::InapplicableRestriction,
                format!("'{key}' does not apply to {} nodes", node.kind()),
            ));
        }
    }

    for key in COUNT_LIMITS {
        if let Some(value) = restrictions.get(*key) {
            if value.as_u64().is_none() {
                issues.push(ValidationIssue::new(
                    pointer,
                    IssueKind::InvalidLimit,
                    format!("'{key}' must be a non-negative integer, found {value}"),
                ));
            }
        }
    }

    if let Some(value) = restrictions.get("multipleOf") {
        if !value.as_f64().is_some_and(|n| n > 0.0) {
            issues.push(ValidationIssue::new(
                pointer,
                IssueKind::InvalidLimit,
                format!("'multipleOf' must be a positive number, found {value}"),
            ));
        }
    }

    for (lower, upper) in RANGES {
        let bounds = restrictions
            .get(*lower)
            .and_then(Value::as_f64)
            .zip(restrictions.get(*upper).and_then(Value::as_f64));
        if let Some((min, max)) = bounds {
            if min > max {
                issues.push(ValidationIssue::new(
                    pointer,
                    IssueKind::InvertedRange,
                    format!("'{lower}' ({min}) is greater than '{upper}' ({max})"),
                ));
            }
        }
    }

    if let Some(pattern) = restrictions.get("pattern") {
        let compiled = pattern.as_str().map(Regex::new);
        match compiled {
            Some(Ok(_)) => {}
            Some(Err(e)) => issues.push(ValidationIssue::new(pointer, IssueKind::InvalidPattern, e.to_string())),
            None => issues.push(ValidationIssue::new(
                pointer,
                IssueKind::InvalidPattern,
                "'pattern' must be a string",
            )),
        }
    }

    if let Some(values) = restrictions.get("enum") {
        if let Some(message) = enum_problem(values) {
            issues.push(ValidationIssue::new(pointer, IssueKind::InvalidEnum, message));
        }
    }
}

fn enum_problem(values: &Value) -> Option<String> {
    let Some(values) = values.as_array() else {
        return Some("'enum' must be an array".into());
    };
    if values.is_empty() {
        return Some("'enum' must not be empty".into());
    }
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .find(|v| !seen.insert(v.to_string()))
        .map(|duplicate| format!("'enum' lists {duplicate} more than once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;

    fn ptr(s: &str) -> SchemaPointer {
        s.parse().unwrap()
    }

    fn table_with(node: SchemaNode) -> NodeTable {
        let mut table = NodeTable::new();
        table
            .insert(SchemaNode::new(SchemaPointer::root(), None, NodeKind::Object))
            .unwrap();
        table
            .insert(SchemaNode::new(ptr("#/$defs"), None, NodeKind::DefinitionRoot))
            .unwrap();
        table.insert(node).unwrap();
        table
    }

    fn kinds(table: &NodeTable) -> Vec<IssueKind> {
        let config = ModelConfig::default().with_meta_validation(false);
        validate(table, &config).unwrap().into_iter().map(|i| i.kind).collect()
    }

    fn string_field() -> SchemaNode {
        SchemaNode::new(ptr("#/properties/s"), Some(SchemaPointer::root()), NodeKind::String)
    }

    #[test]
    fn clean_document_has_no_issues() {
        let table = table_with(
            string_field()
                .with_restriction("minLength", json!(1))
                .with_restriction("maxLength", json!(5))
                .with_restriction("pattern", json!("^[a-z]+$")),
        );
        assert!(kinds(&table).is_empty());
        assert!(validate(&table, &ModelConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn limits_and_ranges() {
        let table = table_with(
            string_field()
                .with_restriction("minLength", json!(-1))
                .with_restriction("maxLength", json!(2.5)),
        );
        assert_eq!(kinds(&table), vec![IssueKind::InvalidLimit, IssueKind::InvalidLimit]);

        let table = table_with(
            string_field()
                .with_restriction("minLength", json!(9))
                .with_restriction("maxLength", json!(3)),
        );
        assert_eq!(kinds(&table), vec![IssueKind::InvertedRange]);
    }

    #[test]
    fn inapplicable_restriction() {
        let table = table_with(string_field().with_restriction("minimum", json!(0)));
        assert_eq!(kinds(&table), vec![IssueKind::InapplicableRestriction]);
    }

    #[test]
    fn bad_pattern() {
        let table = table_with(string_field().with_restriction("pattern", json!("([a-z")));
        assert_eq!(kinds(&table), vec![IssueKind::InvalidPattern]);
    }

    #[test]
    fn bad_enums() {
        for values in [json!("a"), json!([]), json!(["a", "b", "a"])] {
            let table = table_with(string_field().with_restriction("enum", values));
            assert_eq!(kinds(&table), vec![IssueKind::InvalidEnum]);
        }
    }

    #[test]
    fn dangling_reference() {
        let table = table_with(SchemaNode::reference(
            ptr("#/properties/r"),
            Some(SchemaPointer::root()),
            ptr("#/$defs/gone"),
        ));
        assert_eq!(kinds(&table), vec![IssueKind::DanglingReference]);
    }

    #[test]
    fn reference_cycle() {
        let mut table = table_with(SchemaNode::reference(
            ptr("#/$defs/a"),
            Some(ptr("#/$defs")),
            ptr("#/$defs/b"),
        ));
        table
            .insert(SchemaNode::reference(ptr("#/$defs/b"), Some(ptr("#/$defs")), ptr("#/$defs/a")))
            .unwrap();
        assert_eq!(kinds(&table), vec![IssueKind::CyclicReference, IssueKind::CyclicReference]);
    }

    #[test]
    fn meta_validation_catches_bad_values() {
        let table = table_with(string_field().with_restriction("minLength", json!("three")));
        let issues = validate(&table, &ModelConfig::default()).unwrap();
        assert!(issues.iter().any(|i| i.kind == IssueKind::MetaSchema));
    }
}
