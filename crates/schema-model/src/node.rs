//! Schema nodes
//!
//! A [`SchemaNode`] is one JSON Schema subtree flattened into a table row:
//! its children are pointers, not nested values.

use indexmap::IndexMap;
use schema_pointer::SchemaPointer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

use crate::error::{SchemaError, SchemaResult};

/// Keyword under which object children live
pub const PROPERTIES: &str = "properties";

/// Keyword under which the array item lives
pub const ITEMS: &str = "items";

/// Restriction keywords per kind, as offered by the inspector panels
const STRING_RESTRICTIONS: &[&str] = &[
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "formatMinimum",
    "formatMaximum",
    "formatExclusiveMinimum",
    "formatExclusiveMaximum",
];
const NUMBER_RESTRICTIONS: &[&str] = &[
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];
const ARRAY_RESTRICTIONS: &[&str] = &["minItems", "maxItems", "uniqueItems"];
const OBJECT_RESTRICTIONS: &[&str] = &["minProperties", "maxProperties"];
const VALUE_RESTRICTIONS: &[&str] = &["enum", "const", "default"];

/// `allOf` / `anyOf` / `oneOf`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinationKind {
    /// Must match every member
    AllOf,
    /// Must match at least one member
    AnyOf,
    /// Must match exactly one member
    OneOf,
}

impl CombinationKind {
    /// All combination kinds, in keyword lookup order
    pub const ALL: [Self; 3] = [Self::AllOf, Self::AnyOf, Self::OneOf];

    /// JSON Schema keyword
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
        }
    }

    /// Parse keyword
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// `"type": "object"`
    Object,
    /// `"type": "array"`
    Array,
    /// `"type": "string"`
    String,
    /// `"type": "number"`
    Number,
    /// `"type": "integer"`
    Integer,
    /// `"type": "boolean"`
    Boolean,
    /// `allOf` / `anyOf` / `oneOf`
    Combination(CombinationKind),
    /// `$ref`
    Reference,
    /// The `$defs` / `definitions` container
    DefinitionRoot,
}

impl NodeKind {
    /// `type` keyword value for typed kinds
    #[must_use]
    pub fn type_name(self) -> Option<&'static str> {
        match self {
            Self::Object => Some("object"),
            Self::Array => Some("array"),
            Self::String => Some("string"),
            Self::Number => Some("number"),
            Self::Integer => Some("integer"),
            Self::Boolean => Some("boolean"),
            Self::Combination(_) | Self::Reference | Self::DefinitionRoot => None,
        }
    }

    /// Parse a `type` keyword value
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Kinds that own child nodes
    #[inline]
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Object | Self::Array | Self::Combination(_) | Self::DefinitionRoot
        )
    }

    /// Kinds whose children are addressed by name
    #[inline]
    #[must_use]
    pub fn has_named_children(self) -> bool {
        matches!(self, Self::Object | Self::DefinitionRoot)
    }

    /// Restriction keywords valid for this kind
    #[must_use]
    pub fn restriction_keywords(self) -> Vec<&'static str> {
        let specific: &[&str] = match self {
            Self::String => STRING_RESTRICTIONS,
            Self::Number | Self::Integer => NUMBER_RESTRICTIONS,
            Self::Array => ARRAY_RESTRICTIONS,
            Self::Object => OBJECT_RESTRICTIONS,
            Self::Boolean => &[],
            Self::Combination(_) | Self::Reference | Self::DefinitionRoot => return Vec::new(),
        };
        specific.iter().chain(VALUE_RESTRICTIONS).copied().collect()
    }

    /// True if `keyword` is a restriction for this kind
    #[must_use]
    pub fn accepts_restriction(self, keyword: &str) -> bool {
        self.restriction_keywords().contains(&keyword)
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Combination(kind) => f.write_str(kind.keyword()),
            Self::Reference => f.write_str("$ref"),
            Self::DefinitionRoot => f.write_str("definitions"),
            typed => f.write_str(typed.type_name().unwrap_or("unknown")),
        }
    }
}

/// True if `keyword` is a restriction for any kind
#[must_use]
pub fn is_restriction_keyword(keyword: &str) -> bool {
    STRING_RESTRICTIONS
        .iter()
        .chain(NUMBER_RESTRICTIONS)
        .chain(ARRAY_RESTRICTIONS)
        .chain(OBJECT_RESTRICTIONS)
        .chain(VALUE_RESTRICTIONS)
        .any(|k| *k == keyword)
}

/// One flattened JSON Schema subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    pointer: SchemaPointer,
    parent: Option<SchemaPointer>,
    kind: NodeKind,
    children: Vec<SchemaPointer>,
    restrictions: IndexMap<String, Value>,
    annotations: IndexMap<String, Value>,
    is_required: bool,
    is_nullable: bool,
    reference: Option<SchemaPointer>,
}

impl SchemaNode {
    /// Create a node with no children
    ///
    /// For [`NodeKind::Reference`] use [`SchemaNode::reference`] instead.
    #[must_use]
    pub fn new(pointer: SchemaPointer, parent: Option<SchemaPointer>, kind: NodeKind) -> Self {
        Self {
            pointer,
            parent,
            kind,
            children: Vec::new(),
            restrictions: IndexMap::new(),
            annotations: IndexMap::new(),
            is_required: false,
            is_nullable: false,
            reference: None,
        }
    }

    /// Create a `$ref` node
    #[must_use]
    pub fn reference(
        pointer: SchemaPointer,
        parent: Option<SchemaPointer>,
        target: SchemaPointer,
    ) -> Self {
        let mut node = Self::new(pointer, parent, NodeKind::Reference);
        node.reference = Some(target);
        node
    }

    /// Node pointer
    #[inline]
    #[must_use]
    pub fn pointer(&self) -> &SchemaPointer {
        &self.pointer
    }

    /// Owning node, `None` for the root
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&SchemaPointer> {
        self.parent.as_ref()
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Ordered child pointers
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[SchemaPointer] {
        &self.children
    }

    /// Restriction keywords and values
    #[inline]
    #[must_use]
    pub fn restrictions(&self) -> &IndexMap<String, Value> {
        &self.restrictions
    }

    /// Non-structural keywords kept verbatim (`title`, `description`, ...)
    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &IndexMap<String, Value> {
        &self.annotations
    }

    /// Listed in the parent's `required`
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.is_required
    }

    /// Accepts `null` in addition to its type
    #[inline]
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Target pointer of a `$ref` node
    #[inline]
    #[must_use]
    pub fn reference_target(&self) -> Option<&SchemaPointer> {
        self.reference.as_ref()
    }

    /// True for `$ref` nodes
    #[inline]
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind == NodeKind::Reference
    }

    /// Last pointer segment: property or definition name, `items`, or a
    /// combination index
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.pointer.last().unwrap_or("#")
    }

    /// Builder: required flag
    #[inline]
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.is_required = required;
        self
    }

    /// Builder: restriction entry
    #[inline]
    #[must_use]
    pub fn with_restriction(mut self, key: impl Into<String>, value: Value) -> Self {
        self.restrictions.insert(key.into(), value);
        self
    }

    /// Builder: annotation entry
    #[inline]
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }

    /// Pointer a new child named `name` would get
    ///
    /// `name` is ignored for arrays (always `items`); for combinations it is
    /// the member index.
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidParent`] for kinds without children.
    pub fn child_pointer(&self, name: &str) -> SchemaResult<SchemaPointer> {
        Self::child_pointer_at(&self.pointer, self.kind, name)
    }

    /// [`child_pointer`](Self::child_pointer) for a parent that may be
    /// relocated
    pub(crate) fn child_pointer_at(
        parent: &SchemaPointer,
        kind: NodeKind,
        name: &str,
    ) -> SchemaResult<SchemaPointer> {
        match kind {
            NodeKind::Object => Ok(parent.join(PROPERTIES).join(name)),
            NodeKind::DefinitionRoot => Ok(parent.join(name)),
            NodeKind::Array => Ok(parent.join(ITEMS)),
            NodeKind::Combination(c) => Ok(parent.join(c.keyword()).join(name)),
            other => Err(SchemaError::InvalidParent {
                pointer: parent.clone(),
                kind: other.to_string(),
            }),
        }
    }

    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
        if kind != NodeKind::Reference {
            self.reference = None;
        }
    }

    pub(crate) fn set_reference_target(&mut self, target: SchemaPointer) {
        self.kind = NodeKind::Reference;
        self.reference = Some(target);
    }

    pub(crate) fn set_required(&mut self, required: bool) {
        self.is_required = required;
    }

    pub(crate) fn set_nullable(&mut self, nullable: bool) {
        self.is_nullable = nullable;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<SchemaPointer>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<SchemaPointer> {
        &mut self.children
    }

    pub(crate) fn restrictions_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.restrictions
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.annotations
    }

    /// Rewrite every pointer held by this node through `remap`
    pub(crate) fn remap_pointers(&mut self, remap: impl Fn(&SchemaPointer) -> Option<SchemaPointer>) {
        if let Some(p) = remap(&self.pointer) {
            self.pointer = p;
        }
        if let Some(p) = self.parent.as_ref().and_then(&remap) {
            self.parent = Some(p);
        }
        for child in &mut self.children {
            if let Some(p) = remap(child) {
                *child = p;
            }
        }
        if let Some(p) = self.reference.as_ref().and_then(&remap) {
            self.reference = Some(p);
        }
    }
}
