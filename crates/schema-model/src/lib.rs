//! Schema Model
//!
//! Flat, pointer-addressed representation of a JSON Schema document for the
//! data-model editor.
//!
//! # Overview
//!
//! - **NodeTable**: every subschema as one row keyed by its [`SchemaPointer`]
//! - **ReferenceResolver**: `$ref` lookup, cycle detection, definition naming
//! - **SchemaModel**: the editor operations over one open document
//! - **canonical**: nested JSON Schema in, nested JSON Schema out
//! - **EditorSession**: a model bound to a [`SchemaStore`] with save tracking
//!
//! # Example
//!
//! ```rust
//! use schema_model::prelude::*;
//! use serde_json::json;
//!
//! let document = json!({
//!     "type": "object",
//!     "properties": { "home": { "$ref": "#/$defs/Address" } },
//!     "$defs": { "Address": { "type": "object" } }
//! });
//! let mut model = SchemaModel::from_value(&document, ModelConfig::default()).unwrap();
//!
//! // References follow renames
//! let address: SchemaPointer = "#/$defs/Address".parse().unwrap();
//! model.rename_node(&address, "PostalAddress").unwrap();
//!
//! let saved = model.to_canonical_schema().unwrap();
//! assert_eq!(saved["properties"]["home"]["$ref"], "#/$defs/PostalAddress");
//! ```

#![warn(missing_docs)]

pub mod canonical;
pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod node;
pub mod resolver;
pub mod session;
pub mod store;
pub mod table;
pub mod validation;

// Re-exports
pub use canonical::{from_canonical_schema, to_canonical_schema};
pub use config::{ConfigError, DefinitionsKeyword, DeletePolicy, ModelConfig};
pub use error::{SchemaError, SchemaResult};
pub use model::SchemaModel;
pub use node::{CombinationKind, NodeKind, SchemaNode};
pub use resolver::ReferenceResolver;
pub use schema_pointer::{PointerError, SchemaPointer};
pub use session::{EditorSession, SessionError};
pub use store::{FileSchemaStore, SchemaStore, StoreError};
pub use table::NodeTable;
pub use validation::{IssueKind, ValidationIssue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for editing schema models
    pub use crate::{
        CombinationKind, DeletePolicy, EditorSession, ModelConfig, NodeKind, SchemaError, SchemaModel,
        SchemaNode, SchemaPointer, SchemaResult, SchemaStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
