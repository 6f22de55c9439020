//! Conversion between nested JSON Schema documents and [`NodeTable`]
//!
//! Loading walks the document depth-first and inserts one node per
//! subschema; saving walks the table from `#` and rebuilds the nesting.
//! Keywords the model does not interpret are kept as annotations, so an
//! unedited document saves back with the same content.
//!
//! Keys of each schema object are written in a fixed order: annotations in
//! their loaded order, then `type`/`$ref`/combination, `properties`,
//! `required`, `items`, restrictions, and at the root the definitions last.

use schema_pointer::SchemaPointer;
use serde_json::{Map, Value};

use crate::config::DefinitionsKeyword;
use crate::error::{SchemaError, SchemaResult};
use crate::node::{is_restriction_keyword, CombinationKind, NodeKind, SchemaNode, ITEMS, PROPERTIES};
use crate::table::NodeTable;

const TYPE: &str = "type";
const REF: &str = "$ref";
const REQUIRED: &str = "required";
const NULL: &str = "null";

/// Flatten `document` into a fresh table
///
/// The definitions keyword already used by the document wins; `fallback` is
/// only used when it has neither `$defs` nor `definitions`.
///
/// # Errors
/// Returns [`SchemaError::SchemaParseError`] for input the model cannot
/// represent: non-object schemas, boolean subschemas in structural
/// positions, external `$ref`s, unknown `type` values, several combination
/// keywords on one node, or both definitions keywords at the root.
pub fn from_canonical_schema(document: &Value, fallback: DefinitionsKeyword) -> SchemaResult<NodeTable> {
    let root = SchemaPointer::root();
    let map = as_schema_object(document, &root)?;

    let keyword = match (
        map.contains_key(DefinitionsKeyword::Defs.keyword()),
        map.contains_key(DefinitionsKeyword::Definitions.keyword()),
    ) {
        (true, true) => {
            return Err(SchemaError::parse(
                &root,
                "document uses both `$defs` and `definitions`",
            ))
        }
        (true, false) => DefinitionsKeyword::Defs,
        (false, true) => DefinitionsKeyword::Definitions,
        (false, false) => fallback,
    };

    let definitions = root.join(keyword.keyword());
    let mut table = NodeTable::with_definitions_pointer(definitions.clone());
    let mut loader = Loader {
        table: &mut table,
        definitions_keyword: keyword.keyword(),
    };

    loader.load_node(root.clone(), None, document, false)?;
    loader
        .table
        .insert(SchemaNode::new(definitions.clone(), None, NodeKind::DefinitionRoot))?;

    if let Some(defs) = map.get(keyword.keyword()) {
        let defs = defs
            .as_object()
            .ok_or_else(|| SchemaError::parse(&definitions, "definitions must be an object"))?;
        for (name, schema) in defs {
            loader.load_node(definitions.join(name.as_str()), Some(definitions.clone()), schema, false)?;
        }
    }

    Ok(table)
}

/// Rebuild the nested document from `table`
///
/// The definitions container is written last at the root, and only when it
/// has members.
///
/// # Errors
/// Returns [`SchemaError::NodeNotFound`] if the table is missing its root or
/// holds a child pointer without a node.
pub fn to_canonical_schema(table: &NodeTable) -> SchemaResult<Value> {
    let mut root = emit_node(table, &SchemaPointer::root())?;

    let definitions = table.get(table.definitions_pointer())?;
    if !definitions.children().is_empty() {
        let mut defs = Map::new();
        for child in definitions.children() {
            defs.insert(child_name(child), Value::Object(emit_node(table, child)?));
        }
        let keyword = definitions.name().to_string();
        root.insert(keyword, Value::Object(defs));
    }

    Ok(Value::Object(root))
}

struct Loader<'t> {
    table: &'t mut NodeTable,
    definitions_keyword: &'static str,
}

/// Children found while reading one schema object, loaded after the node
/// itself is in the table
enum Pending<'v> {
    Properties(&'v Map<String, Value>, Vec<&'v str>),
    Item(&'v Value),
    Members(&'v [Value]),
}

impl Loader<'_> {
    fn load_node(
        &mut self,
        pointer: SchemaPointer,
        parent: Option<SchemaPointer>,
        value: &Value,
        required: bool,
    ) -> SchemaResult<()> {
        let map = as_schema_object(value, &pointer)?;
        let (kind, nullable, target) = classify(map, &pointer)?;

        let mut node = match target {
            Some(target) => SchemaNode::reference(pointer.clone(), parent, target),
            None => SchemaNode::new(pointer.clone(), parent, kind),
        }
        .with_required(required);
        node.set_nullable(nullable);

        let mut pending = Vec::new();
        let mut required_names: Vec<&str> = Vec::new();
        for (key, v) in map {
            match key.as_str() {
                REF if kind == NodeKind::Reference => {}
                TYPE if kind.type_name().is_some() => {}
                PROPERTIES if kind == NodeKind::Object => {
                    let properties = v
                        .as_object()
                        .ok_or_else(|| SchemaError::parse(pointer.join(PROPERTIES), "must be an object"))?;
                    pending.push(Pending::Properties(properties, Vec::new()));
                }
                REQUIRED if kind == NodeKind::Object => {
                    required_names = string_array(v)
                        .ok_or_else(|| SchemaError::parse(pointer.join(REQUIRED), "must be an array of strings"))?;
                }
                ITEMS if kind == NodeKind::Array && v.is_boolean() => {
                    return Err(SchemaError::parse(
                        pointer.join(ITEMS),
                        "boolean subschemas are not supported",
                    ));
                }
                ITEMS if kind == NodeKind::Array && v.is_object() => pending.push(Pending::Item(v)),
                k if is_combination_of(kind, k) => {
                    let members = v
                        .as_array()
                        .ok_or_else(|| SchemaError::parse(pointer.join(k), "must be an array"))?;
                    pending.push(Pending::Members(members));
                }
                k if pointer.is_root() && k == self.definitions_keyword => {}
                k if is_restriction_keyword(k) => {
                    node.restrictions_mut().insert(key.clone(), v.clone());
                }
                _ => {
                    node.annotations_mut().insert(key.clone(), v.clone());
                }
            }
        }

        for item in &mut pending {
            if let Pending::Properties(properties, names) = item {
                *names = std::mem::take(&mut required_names);
                for name in names.iter() {
                    if !properties.contains_key(*name) {
                        tracing::warn!(%pointer, name, "required name has no property, dropping it");
                    }
                }
            }
        }
        if !required_names.is_empty() {
            tracing::warn!(%pointer, "`required` without `properties`, dropping it");
        }

        self.table.insert(node)?;

        for item in pending {
            match item {
                Pending::Properties(properties, names) => {
                    for (name, schema) in properties {
                        let child = pointer.join(PROPERTIES).join(name.as_str());
                        let is_required = names.contains(&name.as_str());
                        self.load_node(child, Some(pointer.clone()), schema, is_required)?;
                    }
                }
                Pending::Item(schema) => {
                    self.load_node(pointer.join(ITEMS), Some(pointer.clone()), schema, false)?;
                }
                Pending::Members(members) => {
                    let keyword = combination_keyword(kind);
                    for (index, schema) in members.iter().enumerate() {
                        let child = pointer.join(keyword).join(index.to_string());
                        self.load_node(child, Some(pointer.clone()), schema, false)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn as_schema_object<'v>(value: &'v Value, pointer: &SchemaPointer) -> SchemaResult<&'v Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Bool(_) => Err(SchemaError::parse(pointer, "boolean subschemas are not supported")),
        other => Err(SchemaError::parse(
            pointer,
            format!("expected a schema object, found {}", json_type(other)),
        )),
    }
}

/// Kind, nullability and `$ref` target of one schema object
fn classify(
    map: &Map<String, Value>,
    pointer: &SchemaPointer,
) -> SchemaResult<(NodeKind, bool, Option<SchemaPointer>)> {
    if let Some(reference) = map.get(REF) {
        let text = reference
            .as_str()
            .ok_or_else(|| SchemaError::parse(pointer.join(REF), "must be a string"))?;
        let target = SchemaPointer::parse(text).map_err(|e| {
            SchemaError::parse(pointer.join(REF), format!("only local references are supported: {e}"))
        })?;
        return Ok((NodeKind::Reference, false, Some(target)));
    }

    let mut combinations = CombinationKind::ALL
        .into_iter()
        .filter(|c| map.contains_key(c.keyword()));
    if let Some(combination) = combinations.next() {
        if combinations.next().is_some() {
            return Err(SchemaError::parse(pointer, "several combination keywords on one node"));
        }
        return Ok((NodeKind::Combination(combination), false, None));
    }

    match map.get(TYPE) {
        None if map.contains_key(ITEMS) => Ok((NodeKind::Array, false, None)),
        None => Ok((NodeKind::Object, false, None)),
        Some(Value::String(name)) => Ok((type_from_name(name, pointer)?, false, None)),
        Some(Value::Array(names)) => {
            let names = names
                .iter()
                .map(|n| n.as_str().ok_or_else(|| SchemaError::parse(pointer.join(TYPE), "must hold strings")))
                .collect::<SchemaResult<Vec<_>>>()?;
            let nullable = names.contains(&NULL);
            let typed: Vec<&str> = names.into_iter().filter(|n| *n != NULL).collect();
            match typed.as_slice() {
                [single] => Ok((type_from_name(single, pointer)?, nullable, None)),
                _ => Err(SchemaError::parse(
                    pointer.join(TYPE),
                    "only a single type, optionally with \"null\", is supported",
                )),
            }
        }
        Some(other) => Err(SchemaError::parse(
            pointer.join(TYPE),
            format!("expected a string or array, found {}", json_type(other)),
        )),
    }
}

fn type_from_name(name: &str, pointer: &SchemaPointer) -> SchemaResult<NodeKind> {
    NodeKind::from_type_name(name)
        .ok_or_else(|| SchemaError::parse(pointer.join(TYPE), format!("unsupported type '{name}'")))
}

fn is_combination_of(kind: NodeKind, keyword: &str) -> bool {
    matches!(kind, NodeKind::Combination(c) if c.keyword() == keyword)
}

fn combination_keyword(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Combination(c) => c.keyword(),
        _ => "",
    }
}

fn string_array(value: &Value) -> Option<Vec<&str>> {
    value.as_array()?.iter().map(Value::as_str).collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child_name(pointer: &SchemaPointer) -> String {
    pointer.last().unwrap_or_default().to_string()
}

fn emit_node(table: &NodeTable, pointer: &SchemaPointer) -> SchemaResult<Map<String, Value>> {
    let node = table.get(pointer)?;
    let mut out = node.annotations().clone().into_iter().collect::<Map<String, Value>>();

    match node.kind() {
        NodeKind::Reference => {
            if let Some(target) = node.reference_target() {
                out.insert(REF.into(), Value::String(target.to_string()));
            }
        }
        NodeKind::Combination(c) => {
            let members = node
                .children()
                .iter()
                .map(|child| emit_node(table, child).map(Value::Object))
                .collect::<SchemaResult<Vec<_>>>()?;
            out.insert(c.keyword().into(), Value::Array(members));
        }
        NodeKind::DefinitionRoot => {}
        typed => {
            if let Some(name) = typed.type_name() {
                let type_value = if node.is_nullable() {
                    Value::Array(vec![name.into(), NULL.into()])
                } else {
                    Value::String(name.into())
                };
                out.insert(TYPE.into(), type_value);
            }
        }
    }

    match node.kind() {
        NodeKind::Object if !node.children().is_empty() => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for child in node.children() {
                let child_node = table.get(child)?;
                if child_node.is_required() {
                    required.push(Value::String(child_name(child)));
                }
                properties.insert(child_name(child), Value::Object(emit_node(table, child)?));
            }
            out.insert(PROPERTIES.into(), Value::Object(properties));
            if !required.is_empty() {
                out.insert(REQUIRED.into(), Value::Array(required));
            }
        }
        NodeKind::Array => {
            if let Some(item) = node.children().first() {
                out.insert(ITEMS.into(), Value::Object(emit_node(table, item)?));
            }
        }
        _ => {}
    }

    for (key, value) in node.restrictions() {
        out.insert(key.clone(), value.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ptr(s: &str) -> SchemaPointer {
        s.parse().unwrap()
    }

    fn load(document: &Value) -> SchemaResult<NodeTable> {
        from_canonical_schema(document, DefinitionsKeyword::Defs)
    }

    #[test]
    fn flattens_nested_document() {
        let table = load(&json!({
            "type": "object",
            "properties": {
                "person": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "maxLength": 40 }
                    },
                    "required": ["name"]
                },
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }))
        .unwrap();

        let name = table.get(&ptr("#/properties/person/properties/name")).unwrap();
        assert_eq!(name.kind(), NodeKind::String);
        assert!(name.is_required());
        assert_eq!(name.restrictions()["maxLength"], json!(40));
        assert_eq!(
            table.get(&ptr("#/properties/tags/items")).unwrap().kind(),
            NodeKind::String
        );
        assert!(table.contains(&ptr("#/$defs")));
    }

    #[test]
    fn nullable_type_array() {
        let table = load(&json!({ "properties": { "n": { "type": ["integer", "null"] } } })).unwrap();
        let n = table.get(&ptr("#/properties/n")).unwrap();
        assert_eq!(n.kind(), NodeKind::Integer);
        assert!(n.is_nullable());
    }

    #[test]
    fn references_and_legacy_definitions() {
        let document = json!({
            "type": "object",
            "properties": { "home": { "$ref": "#/definitions/Address" } },
            "definitions": { "Address": { "type": "object" } }
        });
        let table = load(&document).unwrap();
        assert_eq!(table.definitions_pointer(), &ptr("#/definitions"));
        assert_eq!(
            table.get(&ptr("#/properties/home")).unwrap().reference_target(),
            Some(&ptr("#/definitions/Address"))
        );
        assert_eq!(to_canonical_schema(&table).unwrap(), document);
    }

    #[test]
    fn combination_members_are_indexed() {
        let table = load(&json!({
            "anyOf": [ { "type": "string" }, { "type": "number" } ]
        }))
        .unwrap();
        assert_eq!(
            table.get(&SchemaPointer::root()).unwrap().kind(),
            NodeKind::Combination(CombinationKind::AnyOf)
        );
        assert_eq!(table.get(&ptr("#/anyOf/1")).unwrap().kind(), NodeKind::Number);
    }

    #[test]
    fn annotations_survive_round_trip() {
        let document = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$id": "https://example.com/model.json",
            "title": "Model",
            "type": "object",
            "properties": {
                "code": {
                    "description": "Postal code",
                    "type": "string",
                    "pattern": "^[0-9]{4}$"
                }
            },
            "required": ["code"],
            "additionalProperties": false,
            "$defs": { "Code": { "type": "string", "enum": ["a", "b"] } }
        });
        let table = load(&document).unwrap();
        let emitted = to_canonical_schema(&table).unwrap();
        let reloaded = load(&emitted).unwrap();
        assert_eq!(to_canonical_schema(&reloaded).unwrap(), emitted);
        assert_eq!(emitted["additionalProperties"], json!(false));
        assert_eq!(emitted["required"], json!(["code"]));
        assert_eq!(emitted["$defs"]["Code"]["enum"], json!(["a", "b"]));
    }

    #[test]
    fn rejects_unrepresentable_input() {
        for document in [
            json!([]),
            json!({ "properties": { "a": true } }),
            json!({ "$ref": "other.json#/x" }),
            json!({ "type": "date" }),
            json!({ "anyOf": [], "oneOf": [] }),
            json!({ "$defs": {}, "definitions": {} }),
            json!({ "type": ["string", "number"] }),
        ] {
            let result = load(&document);
            assert!(
                matches!(result, Err(SchemaError::SchemaParseError { .. })),
                "{document} -> {result:?}"
            );
        }
    }

    #[test]
    fn empty_definitions_are_omitted() {
        let table = load(&json!({ "type": "object" })).unwrap();
        assert_eq!(to_canonical_schema(&table).unwrap(), json!({ "type": "object" }));
    }
}
