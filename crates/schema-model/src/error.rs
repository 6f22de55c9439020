//! Error types for the schema model
//!
//! Every variant is a local, recoverable validation failure. UI code maps
//! them to inline messages through [`SchemaError::code`]; none of them
//! leaves the model in a partially mutated state.

use schema_pointer::{PointerError, SchemaPointer};

/// Errors returned by table, resolver and model operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Pointer string is not a `#`-rooted fragment
    #[error("invalid pointer: {0}")]
    InvalidPointerKind(#[from] PointerError),

    /// No node at pointer
    #[error("node not found: {0}")]
    NodeNotFound(SchemaPointer),

    /// A node already occupies the pointer
    #[error("duplicate pointer: {0}")]
    DuplicatePointer(SchemaPointer),

    /// Rename or move target is taken
    #[error("name '{name}' is already in use at {pointer}")]
    NameCollision {
        /// Pointer that would have been produced
        pointer: SchemaPointer,
        /// Conflicting name
        name: String,
    },

    /// Move target lies inside the moved subtree
    #[error("cannot move {pointer} into its own subtree ({target})")]
    CyclicMove {
        /// Node being moved
        pointer: SchemaPointer,
        /// Requested new parent
        target: SchemaPointer,
    },

    /// Reference target does not exist
    #[error("reference at {pointer} points to missing node {target}")]
    DanglingReference {
        /// Reference node
        pointer: SchemaPointer,
        /// Missing target
        target: SchemaPointer,
    },

    /// Reference chain loops back on itself
    #[error("reference chain starting at {0} is cyclic")]
    CyclicReference(SchemaPointer),

    /// Node is still targeted by references outside the deleted subtree
    #[error("{pointer} is referenced by {} node(s)", .referrers.len())]
    ReferencedNodeInUse {
        /// Node that was to be removed
        pointer: SchemaPointer,
        /// Reference nodes still pointing into it
        referrers: Vec<SchemaPointer>,
    },

    /// Operation requires a loaded document
    #[error("no schema document is loaded")]
    ModelNotLoaded,

    /// Input document could not be flattened
    #[error("schema parse error at {pointer}: {message}")]
    SchemaParseError {
        /// Location in the input document
        pointer: String,
        /// What was wrong
        message: String,
    },

    /// Parent cannot hold the requested child
    #[error("{pointer} ({kind}) cannot hold child nodes")]
    InvalidParent {
        /// Requested parent
        pointer: SchemaPointer,
        /// Parent kind keyword
        kind: String,
    },

    /// Root and definitions container cannot be removed or moved
    #[error("{0} is a protected node")]
    ProtectedNode(SchemaPointer),

    /// Operation does not apply to this node
    #[error("unsupported operation on {pointer}: {reason}")]
    UnsupportedOperation {
        /// Target node
        pointer: SchemaPointer,
        /// Why it was refused
        reason: String,
    },

    /// Name does not satisfy the naming rules
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// Keyword is not a known restriction
    #[error("unknown restriction keyword '{0}'")]
    UnknownRestriction(String),
}

impl SchemaError {
    /// Create parse error at an input location
    pub fn parse(pointer: impl ToString, message: impl Into<String>) -> Self {
        Self::SchemaParseError {
            pointer: pointer.to_string(),
            message: message.into(),
        }
    }

    /// Create unsupported-operation error
    pub fn unsupported(pointer: &SchemaPointer, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            pointer: pointer.clone(),
            reason: reason.into(),
        }
    }

    /// Stable identifier for translation lookups
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPointerKind(_) => "invalid_pointer_kind",
            Self::NodeNotFound(_) => "node_not_found",
            Self::DuplicatePointer(_) => "duplicate_pointer",
            Self::NameCollision { .. } => "name_collision",
            Self::CyclicMove { .. } => "cyclic_move",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::CyclicReference(_) => "cyclic_reference",
            Self::ReferencedNodeInUse { .. } => "referenced_node_in_use",
            Self::ModelNotLoaded => "model_not_loaded",
            Self::SchemaParseError { .. } => "schema_parse_error",
            Self::InvalidParent { .. } => "invalid_parent",
            Self::ProtectedNode(_) => "protected_node",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::InvalidName(_) => "invalid_name",
            Self::UnknownRestriction(_) => "unknown_restriction",
        }
    }

    /// True for errors shown next to a single input field
    #[inline]
    #[must_use]
    pub fn is_field_error(&self) -> bool {
        matches!(
            self,
            Self::NameCollision { .. }
                | Self::InvalidName(_)
                | Self::UnknownRestriction(_)
                | Self::CyclicReference(_)
                | Self::DanglingReference { .. }
        )
    }
}

/// Result type alias for schema model operations
pub type SchemaResult<T> = Result<T, SchemaError>;
