//! Loading and saving canonical documents.
//!
//! Guarantees exercised here:
//! - fixture documents save back to the same content
//! - keys are saved in a fixed order
//! - models built through public operations survive save then load
//! - legacy `definitions` documents keep their keyword
//! - unrepresentable input never leaves a half-loaded model

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use schema_model::prelude::*;
use schema_model::{DefinitionsKeyword, IssueKind};
use schema_test_utils::{
    combination_schema, cyclic_references_schema, legacy_definitions_schema, load, person_schema, ptr,
};
use serde_json::json;

/// Every fixture saves back unchanged.
#[test]
fn fixtures_round_trip() {
    for document in [person_schema(), legacy_definitions_schema(), combination_schema()] {
        let model = load(&document);
        assert_eq!(model.to_canonical_schema().unwrap(), document);
    }
}

/// Saved key order follows the input for untouched nodes.
#[test]
fn key_order_is_preserved() {
    let saved = load(&person_schema()).to_canonical_schema().unwrap();
    let keys: Vec<&str> = saved.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["$schema", "$id", "title", "type", "properties", "required", "$defs"]
    );
}

/// Definitions written before the properties come back after them, with
/// nothing else changed.
#[test]
fn definitions_are_saved_last() {
    let document = json!({
        "$defs": { "Id": { "type": "string" } },
        "type": "object",
        "properties": { "id": { "$ref": "#/$defs/Id" } }
    });
    let saved = load(&document).to_canonical_schema().unwrap();

    assert_eq!(saved, document);
    let keys: Vec<&str> = saved.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["type", "properties", "$defs"]);
}

/// A legacy document keeps `definitions` for new types too.
#[test]
fn legacy_definitions_keyword_is_kept() {
    let mut model = load(&legacy_definitions_schema());
    let created = model.add_field_type("Pet").unwrap();
    assert_eq!(created.pointer(), &ptr("#/definitions/Pet0"));

    let saved = model.to_canonical_schema().unwrap();
    assert!(saved.get("$defs").is_none());
    assert_eq!(saved["definitions"]["Pet0"], json!({ "type": "object" }));
    assert!(model
        .node(&ptr("#/definitions/Owner/properties/name"))
        .unwrap()
        .is_nullable());
}

/// The configured keyword applies to documents without definitions.
#[test]
fn configured_keyword_for_fresh_documents() {
    let config = ModelConfig::default().with_definitions_keyword(DefinitionsKeyword::Definitions);
    let mut model = SchemaModel::from_value(&json!({ "type": "object" }), config).unwrap();
    model.add_field_type("T").unwrap();
    assert!(model.to_canonical_schema().unwrap().get("definitions").is_some());
}

/// Parse failures report where they happened and leave nothing loaded.
#[test]
fn parse_errors_carry_location() {
    let err = SchemaModel::from_value(
        &json!({ "properties": { "a": { "items": false, "type": "array" } } }),
        ModelConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        SchemaError::SchemaParseError {
            pointer: "#/properties/a/items".into(),
            message: "boolean subschemas are not supported".into(),
        }
    );

    let err = SchemaModel::from_json_str("{ not json", ModelConfig::default()).unwrap_err();
    assert_eq!(err.code(), "schema_parse_error");
}

/// Cyclic documents load, and validation reports every reference on the loop.
#[test]
fn cyclic_documents_load_and_fail_validation() {
    let config = ModelConfig::default().with_meta_validation(false);
    let model = SchemaModel::from_value(&cyclic_references_schema(), config).unwrap();
    let issues = model.validate().unwrap();
    assert_eq!(issues.len(), 3);
    assert!(issues.iter().all(|i| i.kind == IssueKind::CyclicReference));
}

/// Loaded documents without problems validate cleanly.
#[test]
fn fixtures_validate_cleanly() {
    let config = ModelConfig::default().with_meta_validation(false);
    for document in [person_schema(), legacy_definitions_schema(), combination_schema()] {
        let model = SchemaModel::from_value(&document, config.clone()).unwrap();
        assert_eq!(model.validate().unwrap(), Vec::new());
    }
}

/// One editor step in a generated scenario
///
/// `pick`/`to` select nodes by position in pointer order, so every step
/// applies to whatever the model holds at that point. Steps the model
/// refuses are skipped; a refused step must leave the model as it was.
#[derive(Debug, Clone)]
enum Step {
    AddField { kind: u8, nest: bool },
    AddType,
    Require { pick: usize },
    Restrict { pick: usize },
    Rename { pick: usize, suffix: u8 },
    Move { pick: usize, to: usize, index: usize },
    Delete { pick: usize },
    AddReference { to: usize, target: usize },
    Retype { pick: usize, kind: u8 },
    Convert { pick: usize },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0u8..9, any::<bool>()).prop_map(|(kind, nest)| Step::AddField { kind, nest }),
        1 => Just(Step::AddType),
        1 => (0usize..16).prop_map(|pick| Step::Require { pick }),
        1 => (0usize..16).prop_map(|pick| Step::Restrict { pick }),
        1 => (0usize..64, 0u8..4).prop_map(|(pick, suffix)| Step::Rename { pick, suffix }),
        2 => (0usize..64, 0usize..64, 0usize..4).prop_map(|(pick, to, index)| Step::Move { pick, to, index }),
        1 => (0usize..64).prop_map(|pick| Step::Delete { pick }),
        1 => (0usize..64, 0usize..16).prop_map(|(to, target)| Step::AddReference { to, target }),
        1 => (0usize..64, 0u8..9).prop_map(|(pick, kind)| Step::Retype { pick, kind }),
        1 => (0usize..64).prop_map(|pick| Step::Convert { pick }),
    ]
}

fn kind_for(selector: u8) -> NodeKind {
    match selector {
        0 => NodeKind::Object,
        1 => NodeKind::Array,
        2 => NodeKind::String,
        3 => NodeKind::Number,
        4 => NodeKind::Integer,
        5 => NodeKind::Boolean,
        6 => NodeKind::Combination(CombinationKind::AllOf),
        7 => NodeKind::Combination(CombinationKind::AnyOf),
        _ => NodeKind::Combination(CombinationKind::OneOf),
    }
}

/// Every node pointer; `editable` leaves out the root and definitions
/// container
fn pointers(model: &SchemaModel, editable: bool) -> Vec<SchemaPointer> {
    model
        .table()
        .unwrap()
        .iter()
        .filter(|node| !editable || node.parent().is_some())
        .map(|node| node.pointer().clone())
        .collect()
}

fn nth<T: Clone>(items: &[T], n: usize) -> Option<T> {
    (!items.is_empty()).then(|| items[n % items.len()].clone())
}

fn apply(model: &mut SchemaModel, step: &Step) {
    let root = SchemaPointer::root();
    let properties: Vec<SchemaNode> = model.root_properties().unwrap().into_iter().cloned().collect();
    let editable = pointers(model, true);
    let all = pointers(model, false);
    let before = model.to_canonical_schema().unwrap();

    let applied = match step {
        Step::AddField { kind, nest } => {
            let parent = properties
                .iter()
                .rev()
                .find(|p| *nest && p.kind().is_container())
                .map_or(root, |p| p.pointer().clone());
            model.add_field(&parent, kind_for(*kind)).is_ok()
        }
        Step::AddType => model.add_field_type("Type").is_ok(),
        Step::Require { pick } => {
            nth(&properties, *pick).is_some_and(|node| model.set_required(node.pointer(), true).is_ok())
        }
        Step::Restrict { pick } => nth(&properties, *pick)
            .filter(|node| node.kind().accepts_restriction("enum"))
            .is_some_and(|node| model.set_restriction(node.pointer(), "enum", json!(["x"])).is_ok()),
        Step::Rename { pick, suffix } => nth(&editable, *pick)
            .is_some_and(|pointer| model.rename_node(&pointer, &format!("renamed{suffix}")).is_ok()),
        Step::Move { pick, to, index } => match (nth(&editable, *pick), nth(&all, *to)) {
            (Some(pointer), Some(parent)) => model.move_node(&pointer, &parent, *index).is_ok(),
            _ => false,
        },
        Step::Delete { pick } => nth(&editable, *pick)
            .is_some_and(|pointer| model.delete_node_with(&pointer, DeletePolicy::Cascade).is_ok()),
        Step::AddReference { to, target } => {
            let definitions: Vec<SchemaPointer> = model
                .definitions()
                .unwrap()
                .into_iter()
                .map(|node| node.pointer().clone())
                .collect();
            match (nth(&all, *to), nth(&definitions, *target)) {
                (Some(parent), Some(target)) => model.add_reference(&parent, &target).is_ok(),
                _ => false,
            }
        }
        Step::Retype { pick, kind } => {
            nth(&editable, *pick).is_some_and(|pointer| model.retype_node(&pointer, kind_for(*kind)).is_ok())
        }
        Step::Convert { pick } => {
            nth(&editable, *pick).is_some_and(|pointer| model.convert_to_definition(&pointer).is_ok())
        }
    };

    if !applied {
        assert_eq!(model.to_canonical_schema().unwrap(), before, "refused {step:?} changed the model");
    }
}

proptest! {
    /// Save then load reproduces the document built by public operations.
    #[test]
    fn built_models_round_trip(steps in prop::collection::vec(step(), 0..32)) {
        let mut model = SchemaModel::empty(ModelConfig::default());
        for step in &steps {
            apply(&mut model, step);
        }

        let saved = model.to_canonical_schema().unwrap();
        let reloaded = SchemaModel::from_value(&saved, ModelConfig::default()).unwrap();

        prop_assert_eq!(reloaded.to_canonical_schema().unwrap(), saved);
        prop_assert_eq!(reloaded.node_count().unwrap(), model.node_count().unwrap());
        for node in model.table().unwrap().iter() {
            let twin = reloaded.node(node.pointer()).unwrap();
            prop_assert_eq!(twin.kind(), node.kind());
            prop_assert_eq!(twin.children(), node.children());
            prop_assert_eq!(twin.is_required(), node.is_required());
            prop_assert_eq!(twin.reference_target(), node.reference_target());
        }
    }
}
