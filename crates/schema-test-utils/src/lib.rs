//! Testing utilities for the schema model workspace
//!
//! Shared fixture documents and an in-memory store.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use schema_model::{ModelConfig, SchemaModel, SchemaPointer, SchemaStore, StoreError};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Person with an address definition referenced twice
pub fn person_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://example.com/person.schema.json",
        "title": "Person",
        "type": "object",
        "properties": {
            "firstName": { "type": "string", "maxLength": 50 },
            "lastName": { "type": "string" },
            "age": { "type": "integer", "minimum": 0 },
            "home": { "$ref": "#/$defs/Address" },
            "work": { "$ref": "#/$defs/Address" }
        },
        "required": ["firstName", "lastName"],
        "$defs": {
            "Address": {
                "type": "object",
                "properties": {
                    "street": { "type": "string" },
                    "postalCode": { "type": "string", "pattern": "^[0-9]{4}$" }
                },
                "required": ["street"]
            }
        }
    })
}

/// Draft-07 style document using `definitions`
pub fn legacy_definitions_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "owner": { "$ref": "#/definitions/Owner" },
            "tags": { "type": "array", "items": { "type": "string" }, "uniqueItems": true }
        },
        "definitions": {
            "Owner": {
                "type": "object",
                "properties": { "name": { "type": ["string", "null"] } }
            }
        }
    })
}

/// Root `anyOf` with three members
pub fn combination_schema() -> Value {
    json!({
        "anyOf": [
            { "type": "string" },
            { "type": "object", "properties": { "x": { "type": "boolean" } } },
            { "$ref": "#/$defs/Code" }
        ],
        "$defs": {
            "Code": { "type": "string", "enum": ["A", "B"] }
        }
    })
}

/// Definitions `A` and `B` referencing each other
pub fn cyclic_references_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "entry": { "$ref": "#/$defs/A" } },
        "$defs": {
            "A": { "$ref": "#/$defs/B" },
            "B": { "$ref": "#/$defs/A" }
        }
    })
}

pub fn load(document: &Value) -> SchemaModel {
    SchemaModel::from_value(document, ModelConfig::default()).unwrap()
}

pub fn person_model() -> SchemaModel {
    load(&person_schema())
}

pub fn ptr(pointer: &str) -> SchemaPointer {
    pointer.parse().unwrap()
}

/// Child names of `pointer`, in order
pub fn child_names(model: &SchemaModel, pointer: &str) -> Vec<String> {
    model
        .children(&ptr(pointer))
        .unwrap()
        .into_iter()
        .map(|node| node.name().to_string())
        .collect()
}

/// [`SchemaStore`] over a map, counting writes
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    documents: Mutex<HashMap<String, Value>>,
    saves: Mutex<usize>,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, model_path: &str, document: Value) -> Self {
        self.documents.lock().insert(model_path.to_string(), document);
        self
    }

    pub fn document(&self, model_path: &str) -> Option<Value> {
        self.documents.lock().get(model_path).cloned()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn load(&self, model_path: &str) -> Result<Value, StoreError> {
        self.document(model_path)
            .ok_or_else(|| StoreError::NotFound(model_path.to_string()))
    }

    async fn save(&self, model_path: &str, document: &Value) -> Result<(), StoreError> {
        self.documents.lock().insert(model_path.to_string(), document.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
