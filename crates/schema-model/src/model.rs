//! Schema model façade
//!
//! [`SchemaModel`] owns the table of one open document and exposes the
//! editor's operations. Every operation is all-or-nothing: checks run
//! before the table changes, and multi-step edits run against a draft copy
//! that only replaces the live table on success.
//!
//! # Example
//!
//! ```rust
//! use schema_model::prelude::*;
//!
//! let mut model = SchemaModel::empty(ModelConfig::default());
//! let root = SchemaPointer::root();
//!
//! let field = model.add_field(&root, NodeKind::String).unwrap();
//! assert_eq!(field.pointer().to_string(), "#/properties/name0");
//!
//! let renamed = model.rename_node(field.pointer(), "email").unwrap();
//! model.set_restriction(&renamed, "format", "email".into()).unwrap();
//! ```

use schema_pointer::SchemaPointer;
use serde_json::{json, Value};

use crate::canonical;
use crate::config::{DeletePolicy, ModelConfig};
use crate::error::{SchemaError, SchemaResult};
use crate::naming;
use crate::node::{is_restriction_keyword, NodeKind, SchemaNode, ITEMS};
use crate::resolver::ReferenceResolver;
use crate::table::NodeTable;
use crate::validation::{self, ValidationIssue};

const ENUM: &str = "enum";

/// Editable JSON Schema document
///
/// Starts **Unloaded** ([`SchemaModel::new`]) or **Loaded**
/// ([`SchemaModel::empty`], [`SchemaModel::from_value`]). Every operation
/// other than loading fails with [`SchemaError::ModelNotLoaded`] while
/// unloaded.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    table: Option<NodeTable>,
    config: ModelConfig,
    /// Highest revision reached by any table this model dropped
    retired_revision: u64,
}

impl SchemaModel {
    /// Create an unloaded model
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self {
            table: None,
            config,
            retired_revision: 0,
        }
    }

    /// Create a model holding a fresh document: an empty root object and an
    /// empty definitions container
    #[must_use]
    pub fn empty(config: ModelConfig) -> Self {
        let root = SchemaPointer::root();
        let definitions = root.join(config.definitions_keyword.keyword());
        let mut table = NodeTable::with_definitions_pointer(definitions.clone());

        let mut root_node = SchemaNode::new(root, None, NodeKind::Object);
        if let Some(dialect) = &config.schema_dialect {
            root_node = root_node.with_annotation("$schema", Value::String(dialect.clone()));
        }
        let created = table
            .insert(root_node)
            .and_then(|()| table.insert(SchemaNode::new(definitions, None, NodeKind::DefinitionRoot)));
        debug_assert!(created.is_ok(), "fresh table accepts root and definitions");

        Self {
            table: Some(table),
            config,
            retired_revision: 0,
        }
    }

    /// Load a canonical document
    ///
    /// # Errors
    /// Returns [`SchemaError::SchemaParseError`] if the document cannot be
    /// represented.
    pub fn from_value(document: &Value, config: ModelConfig) -> SchemaResult<Self> {
        let mut model = Self::new(config);
        model.load_canonical_schema(document)?;
        Ok(model)
    }

    /// Parse and load JSON text
    ///
    /// # Errors
    /// Returns [`SchemaError::SchemaParseError`] for malformed JSON or an
    /// unrepresentable document.
    pub fn from_json_str(text: &str, config: ModelConfig) -> SchemaResult<Self> {
        let document: Value = serde_json::from_str(text)
            .map_err(|e| SchemaError::parse(SchemaPointer::root(), e.to_string()))?;
        Self::from_value(&document, config)
    }

    /// Replace the open document
    ///
    /// On failure the model is left unloaded, never half loaded. The
    /// revision keeps counting up from the replaced document, so a revision
    /// never repeats within one model.
    ///
    /// # Errors
    /// Returns [`SchemaError::SchemaParseError`] if the document cannot be
    /// represented.
    pub fn load_canonical_schema(&mut self, document: &Value) -> SchemaResult<()> {
        self.unload();
        let mut table = canonical::from_canonical_schema(document, self.config.definitions_keyword)?;
        table.succeed(self.retired_revision);
        tracing::info!(
            nodes = table.len(),
            definitions = %table.definitions_pointer(),
            "loaded schema document"
        );
        self.table = Some(table);
        Ok(())
    }

    /// Nested JSON Schema document for the current state
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn to_canonical_schema(&self) -> SchemaResult<Value> {
        canonical::to_canonical_schema(self.table()?)
    }

    /// Close the open document
    pub fn unload(&mut self) {
        if let Some(table) = self.table.take() {
            self.retired_revision = self.retired_revision.max(table.revision());
        }
    }

    /// True while a document is open
    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.table.is_some()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Underlying node table
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn table(&self) -> SchemaResult<&NodeTable> {
        self.table.as_ref().ok_or(SchemaError::ModelNotLoaded)
    }

    fn table_mut(&mut self) -> SchemaResult<&mut NodeTable> {
        self.table.as_mut().ok_or(SchemaError::ModelNotLoaded)
    }

    /// Run a multi-step edit on a draft and keep it only if every step
    /// succeeds
    fn transact<T>(
        &mut self,
        edit: impl FnOnce(&mut NodeTable) -> SchemaResult<T>,
    ) -> SchemaResult<T> {
        let mut draft = self.table()?.clone();
        let out = edit(&mut draft)?;
        self.table = Some(draft);
        Ok(out)
    }

    /// Resolver over the open document using the configured depth bound
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn resolver(&self) -> SchemaResult<ReferenceResolver<'_>> {
        Ok(ReferenceResolver::new(self.table()?).with_max_depth(self.config.max_reference_depth))
    }

    // ----- read accessors -----

    /// Node at `pointer`
    ///
    /// # Errors
    /// [`SchemaError::ModelNotLoaded`] or [`SchemaError::NodeNotFound`].
    pub fn node(&self, pointer: &SchemaPointer) -> SchemaResult<&SchemaNode> {
        self.table()?.get(pointer)
    }

    /// Children of `pointer`, in order
    ///
    /// # Errors
    /// [`SchemaError::ModelNotLoaded`] or [`SchemaError::NodeNotFound`].
    pub fn children(&self, pointer: &SchemaPointer) -> SchemaResult<Vec<&SchemaNode>> {
        let table = self.table()?;
        table
            .get(pointer)?
            .children()
            .iter()
            .map(|child| table.get(child))
            .collect()
    }

    /// Definitions, in document order
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn definitions(&self) -> SchemaResult<Vec<&SchemaNode>> {
        let table = self.table()?;
        self.children(table.definitions_pointer())
    }

    /// Top-level children of `#`
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn root_properties(&self) -> SchemaResult<Vec<&SchemaNode>> {
        self.children(&SchemaPointer::root())
    }

    /// Reference nodes targeting `pointer` or its descendants
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn referrers(&self, pointer: &SchemaPointer) -> SchemaResult<Vec<&SchemaNode>> {
        Ok(self.resolver()?.referrers(pointer))
    }

    /// Document revision
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn revision(&self) -> SchemaResult<u64> {
        Ok(self.table()?.revision())
    }

    /// Number of nodes, including root and definitions container
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn node_count(&self) -> SchemaResult<usize> {
        Ok(self.table()?.len())
    }

    /// Check the document for problems `set_restriction` lets through
    ///
    /// # Errors
    /// Returns [`SchemaError::ModelNotLoaded`] while unloaded.
    pub fn validate(&self) -> SchemaResult<Vec<ValidationIssue>> {
        validation::validate(self.table()?, &self.config)
    }

    // ----- structural edits -----

    /// Add a child of `kind` under `parent`
    ///
    /// Named parents get `name<N>`; array parents get their `items` slot,
    /// or the field is added to an existing object item; combinations get
    /// the next member index. New arrays come with an object item.
    ///
    /// # Errors
    /// - [`SchemaError::InvalidParent`] for scalar and reference parents
    /// - [`SchemaError::UnsupportedOperation`] for reference or
    ///   definitions-container kinds, or an array whose item is not an object
    pub fn add_field(&mut self, parent: &SchemaPointer, kind: NodeKind) -> SchemaResult<SchemaNode> {
        if matches!(kind, NodeKind::Reference | NodeKind::DefinitionRoot) {
            return Err(SchemaError::unsupported(
                parent,
                format!("fields of kind {kind} cannot be added directly"),
            ));
        }
        let (pointer, parent) = self.free_child_slot(parent)?;

        let created = self.transact(|table| {
            table.insert(SchemaNode::new(pointer.clone(), Some(parent), kind))?;
            if kind == NodeKind::Array {
                insert_default_item(table, &pointer)?;
            }
            table.get(&pointer).cloned()
        })?;

        tracing::debug!(pointer = %created.pointer(), %kind, "added field");
        Ok(created)
    }

    /// Create a definition named `base_name<N>`
    ///
    /// # Errors
    /// Returns [`SchemaError::InvalidName`] if `base_name` breaks the naming
    /// rules.
    pub fn add_field_type(&mut self, base_name: &str) -> SchemaResult<SchemaNode> {
        naming::validate_name(base_name)?;
        let name = self.resolver()?.generate_unique_definition_name(base_name);

        let table = self.table_mut()?;
        let definitions = table.definitions_pointer().clone();
        let pointer = definitions.join(name);
        table.insert(SchemaNode::new(pointer.clone(), Some(definitions), NodeKind::Object))?;

        tracing::debug!(%pointer, "added definition");
        table.get(&pointer).cloned()
    }

    /// Add a reference to `target` under `parent`
    ///
    /// # Errors
    /// - [`SchemaError::NodeNotFound`] if `target` is missing
    /// - [`SchemaError::UnsupportedOperation`] if `target` is the
    ///   definitions container
    /// - [`SchemaError::CyclicReference`] if `target` already leads back to
    ///   the new reference's slot
    /// - as [`add_field`](Self::add_field) for the parent
    pub fn add_reference(&mut self, parent: &SchemaPointer, target: &SchemaPointer) -> SchemaResult<SchemaNode> {
        let table = self.table()?;
        if table.get(target)?.kind() == NodeKind::DefinitionRoot {
            return Err(SchemaError::unsupported(target, "the definitions container cannot be referenced"));
        }
        let (pointer, parent) = self.free_child_slot(parent)?;
        if self.resolver()?.would_cycle(&pointer, target) {
            return Err(SchemaError::CyclicReference(pointer));
        }

        let table = self.table_mut()?;
        table.insert(SchemaNode::reference(pointer.clone(), Some(parent), target.clone()))?;

        tracing::debug!(%pointer, %target, "added reference");
        table.get(&pointer).cloned()
    }

    /// Pointer and parent for a new child of `parent`
    fn free_child_slot(&self, parent: &SchemaPointer) -> SchemaResult<(SchemaPointer, SchemaPointer)> {
        let table = self.table()?;
        let node = table.get(parent)?;
        match node.kind() {
            NodeKind::Object | NodeKind::DefinitionRoot => {
                let name = naming::unique_name(
                    &self.config.default_field_name,
                    node.children().iter().filter_map(SchemaPointer::last),
                );
                Ok((node.child_pointer(&name)?, parent.clone()))
            }
            NodeKind::Array => match node.children().first() {
                None => Ok((node.child_pointer(ITEMS)?, parent.clone())),
                Some(item) if table.get(item)?.kind() == NodeKind::Object => self.free_child_slot(item),
                Some(_) => Err(SchemaError::unsupported(parent, "array item is not an object")),
            },
            NodeKind::Combination(_) => Ok((node.child_pointer(&node.children().len().to_string())?, parent.clone())),
            other => Err(SchemaError::InvalidParent {
                pointer: parent.clone(),
                kind: other.to_string(),
            }),
        }
    }

    /// Delete `pointer` and its subtree using the configured policy
    ///
    /// # Errors
    /// See [`delete_node_with`](Self::delete_node_with).
    pub fn delete_node(&mut self, pointer: &SchemaPointer) -> SchemaResult<Vec<SchemaNode>> {
        self.delete_node_with(pointer, self.config.delete_policy)
    }

    /// Delete `pointer` and its subtree
    ///
    /// With [`DeletePolicy::Cascade`] reference nodes outside the subtree
    /// that target it are deleted too, transitively.
    ///
    /// # Errors
    /// - [`SchemaError::ReferencedNodeInUse`] under [`DeletePolicy::Block`]
    ///   while outside references remain
    /// - [`SchemaError::ProtectedNode`] for the root or definitions container
    /// - [`SchemaError::NodeNotFound`] if `pointer` is missing
    pub fn delete_node_with(
        &mut self,
        pointer: &SchemaPointer,
        policy: DeletePolicy,
    ) -> SchemaResult<Vec<SchemaNode>> {
        self.table()?.get(pointer)?;
        let resolver = self.resolver()?;

        let doomed = match policy {
            DeletePolicy::Block => {
                let outside = outside_referrers(&resolver, std::slice::from_ref(pointer));
                if !outside.is_empty() {
                    return Err(SchemaError::ReferencedNodeInUse {
                        pointer: pointer.clone(),
                        referrers: outside,
                    });
                }
                vec![pointer.clone()]
            }
            DeletePolicy::Cascade => {
                let mut doomed = vec![pointer.clone()];
                loop {
                    let outside = outside_referrers(&resolver, &doomed);
                    if outside.is_empty() {
                        break;
                    }
                    doomed.extend(outside);
                }
                doomed
            }
        };

        let removed = self.table_mut()?.remove_many(&doomed)?;
        tracing::debug!(%pointer, ?policy, removed = removed.len(), "deleted node");
        Ok(removed)
    }

    /// Rename a property or definition
    ///
    /// # Errors
    /// - [`SchemaError::InvalidName`] if `new_name` breaks the naming rules
    /// - [`SchemaError::NameCollision`] if a sibling has the name
    /// - [`SchemaError::UnsupportedOperation`] for items and combination
    ///   members
    pub fn rename_node(&mut self, pointer: &SchemaPointer, new_name: &str) -> SchemaResult<SchemaPointer> {
        naming::validate_name(new_name)?;
        self.table_mut()?.rename(pointer, new_name)
    }

    /// Move `pointer` under `new_parent` at `index`
    ///
    /// Items and combination members landing in an object get the first
    /// free default field name.
    ///
    /// # Errors
    /// - [`SchemaError::CyclicMove`] if `new_parent` is inside `pointer`
    /// - [`SchemaError::NameCollision`] if the target name is taken
    /// - [`SchemaError::InvalidParent`] if `new_parent` cannot hold children
    pub fn move_node(
        &mut self,
        pointer: &SchemaPointer,
        new_parent: &SchemaPointer,
        index: usize,
    ) -> SchemaResult<SchemaPointer> {
        let table = self.table()?;
        let node = table.get(pointer)?;
        let target = table.get(new_parent)?;
        let from_named = node
            .parent()
            .and_then(|p| table.get(p).ok())
            .is_some_and(|p| p.kind().has_named_children());

        let name = (target.kind().has_named_children() && !from_named).then(|| {
            naming::unique_name(
                &self.config.default_field_name,
                target.children().iter().filter_map(SchemaPointer::last),
            )
        });

        self.table_mut()?.move_node_as(pointer, new_parent, index, name.as_deref())
    }

    /// Change the kind of a node
    ///
    /// Children and restrictions that do not apply to `kind` are dropped;
    /// new arrays get an object item.
    ///
    /// # Errors
    /// - [`SchemaError::ReferencedNodeInUse`] if references outside the node
    ///   target one of the dropped children
    /// - [`SchemaError::UnsupportedOperation`] for reference and
    ///   definitions-container kinds (use
    ///   [`set_reference_target`](Self::set_reference_target))
    /// - [`SchemaError::ProtectedNode`] for the definitions container
    pub fn retype_node(&mut self, pointer: &SchemaPointer, kind: NodeKind) -> SchemaResult<()> {
        if matches!(kind, NodeKind::Reference | NodeKind::DefinitionRoot) {
            return Err(SchemaError::unsupported(pointer, format!("cannot retype to {kind}")));
        }
        let resolver = self.resolver()?;
        let node = self.table()?.get(pointer)?;
        if node.kind() == NodeKind::DefinitionRoot {
            return Err(SchemaError::ProtectedNode(pointer.clone()));
        }
        if node.kind() == kind {
            return Ok(());
        }

        let dropped = node.children().to_vec();
        let in_use: Vec<SchemaPointer> = outside_referrers(&resolver, &dropped)
            .into_iter()
            .filter(|r| !pointer.is_ancestor(r))
            .collect();
        if !in_use.is_empty() {
            return Err(SchemaError::ReferencedNodeInUse {
                pointer: pointer.clone(),
                referrers: in_use,
            });
        }

        self.transact(|table| {
            if !dropped.is_empty() {
                table.remove_many(&dropped)?;
            }
            let node = table.get_mut(pointer)?;
            node.set_kind(kind);
            node.restrictions_mut().retain(|key, _| kind.accepts_restriction(key));
            if kind.type_name().is_none() {
                node.set_nullable(false);
            }
            table.touch();
            if kind == NodeKind::Array {
                insert_default_item(table, pointer)?;
            }
            Ok(())
        })?;

        tracing::debug!(%pointer, %kind, "retyped node");
        Ok(())
    }

    /// Set the required flag of a property
    ///
    /// # Errors
    /// Returns [`SchemaError::UnsupportedOperation`] unless the parent is an
    /// object.
    pub fn set_required(&mut self, pointer: &SchemaPointer, required: bool) -> SchemaResult<()> {
        let table = self.table_mut()?;
        let parent_kind = match table.get(pointer)?.parent() {
            Some(parent) => Some(table.get(parent)?.kind()),
            None => None,
        };
        if parent_kind != Some(NodeKind::Object) {
            return Err(SchemaError::unsupported(pointer, "only object properties can be required"));
        }
        table.get_mut(pointer)?.set_required(required);
        table.touch();
        tracing::debug!(%pointer, required, "set required");
        Ok(())
    }

    /// Allow or forbid `null` next to the node's type
    ///
    /// # Errors
    /// Returns [`SchemaError::UnsupportedOperation`] for untyped kinds.
    pub fn set_nullable(&mut self, pointer: &SchemaPointer, nullable: bool) -> SchemaResult<()> {
        let table = self.table_mut()?;
        let node = table.get_mut(pointer)?;
        if node.kind().type_name().is_none() {
            return Err(SchemaError::unsupported(
                pointer,
                format!("{} nodes have no type to make nullable", node.kind()),
            ));
        }
        node.set_nullable(nullable);
        table.touch();
        tracing::debug!(%pointer, nullable, "set nullable");
        Ok(())
    }

    /// Point a reference node at `target`
    ///
    /// # Errors
    /// - [`SchemaError::CyclicReference`] if the reference chain would loop
    /// - [`SchemaError::NodeNotFound`] if `target` is missing
    /// - [`SchemaError::UnsupportedOperation`] if `pointer` is not a reference
    pub fn set_reference_target(&mut self, pointer: &SchemaPointer, target: &SchemaPointer) -> SchemaResult<()> {
        let table = self.table()?;
        if !table.get(pointer)?.is_reference() {
            return Err(SchemaError::unsupported(pointer, "not a reference"));
        }
        table.get(target)?;
        let resolver = self.resolver()?;
        if resolver.would_cycle(pointer, target) {
            return Err(SchemaError::CyclicReference(pointer.clone()));
        }

        let table = self.table_mut()?;
        table.get_mut(pointer)?.set_reference_target(target.clone());
        table.touch();
        tracing::debug!(%pointer, %target, "set reference target");
        Ok(())
    }

    /// Convert a subtree into a definition and leave a reference in its place
    ///
    /// The definition keeps the node's name when it is a free property name;
    /// otherwise it gets a generated one. References into the subtree follow
    /// it to its new location. Returns the definition pointer.
    ///
    /// # Errors
    /// - [`SchemaError::UnsupportedOperation`] for references and existing
    ///   definitions
    /// - [`SchemaError::ProtectedNode`] for the root or definitions container
    pub fn convert_to_definition(&mut self, pointer: &SchemaPointer) -> SchemaResult<SchemaPointer> {
        let resolver = self.resolver()?;
        let table = self.table()?;
        let node = table.get(pointer)?;
        let Some(parent) = node.parent().cloned() else {
            return Err(SchemaError::ProtectedNode(pointer.clone()));
        };
        if node.is_reference() {
            return Err(SchemaError::unsupported(pointer, "already a reference"));
        }
        if parent == *table.definitions_pointer() {
            return Err(SchemaError::unsupported(pointer, "already a definition"));
        }

        let parent_kind = table.get(&parent)?.kind();
        let name = if parent_kind.has_named_children() && naming::is_valid_name(node.name()) {
            if resolver.definition_names().any(|n| n == node.name()) {
                resolver.generate_unique_definition_name(node.name())
            } else {
                node.name().to_string()
            }
        } else {
            resolver.generate_unique_definition_name(&self.config.default_definition_name)
        };
        let index = table
            .get(&parent)?
            .children()
            .iter()
            .position(|c| c == pointer)
            .unwrap_or(usize::MAX);
        let required = node.is_required();

        let definition = self.transact(|table| {
            let definitions = table.definitions_pointer().clone();
            let definition = table.move_node_as(pointer, &definitions, usize::MAX, Some(&name))?;

            let slot = match parent_kind {
                NodeKind::Combination(_) => {
                    let members = table.get(&parent)?.children().len();
                    table.get(&parent)?.child_pointer(&members.to_string())?
                }
                _ => pointer.clone(),
            };
            let reference = SchemaNode::reference(slot.clone(), Some(parent.clone()), definition.clone())
                .with_required(required);
            if matches!(parent_kind, NodeKind::Combination(_)) {
                table.insert(reference)?;
                table.move_node(&slot, &parent, index)?;
            } else {
                table.insert_at(reference, index)?;
            }
            Ok(definition)
        })?;

        tracing::debug!(%pointer, %definition, "converted to definition");
        Ok(definition)
    }

    // ----- restrictions -----

    /// Set restriction `key` to `value`
    ///
    /// Values are not checked here; see [`validate`](Self::validate).
    ///
    /// # Errors
    /// - [`SchemaError::UnknownRestriction`] if `key` is not a restriction
    ///   keyword
    /// - [`SchemaError::UnsupportedOperation`] if the node kind does not
    ///   take `key`
    pub fn set_restriction(&mut self, pointer: &SchemaPointer, key: &str, value: Value) -> SchemaResult<()> {
        if !is_restriction_keyword(key) {
            return Err(SchemaError::UnknownRestriction(key.to_string()));
        }
        let table = self.table_mut()?;
        let node = table.get_mut(pointer)?;
        if !node.kind().accepts_restriction(key) {
            return Err(SchemaError::unsupported(
                pointer,
                format!("{} nodes do not take '{key}'", node.kind()),
            ));
        }
        node.restrictions_mut().insert(key.to_string(), value);
        table.touch();
        tracing::debug!(%pointer, key, "set restriction");
        Ok(())
    }

    /// Remove restriction `key`, returning its old value
    ///
    /// # Errors
    /// [`SchemaError::ModelNotLoaded`] or [`SchemaError::NodeNotFound`].
    pub fn remove_restriction(&mut self, pointer: &SchemaPointer, key: &str) -> SchemaResult<Option<Value>> {
        let table = self.table_mut()?;
        let removed = table.get_mut(pointer)?.restrictions_mut().shift_remove(key);
        if removed.is_some() {
            table.touch();
            tracing::debug!(%pointer, key, "removed restriction");
        }
        Ok(removed)
    }

    /// Append `value` to the node's `enum`
    ///
    /// # Errors
    /// - [`SchemaError::UnsupportedOperation`] if the node kind takes no
    ///   `enum`, or the current `enum` is not an array
    pub fn add_enum_value(&mut self, pointer: &SchemaPointer, value: Value) -> SchemaResult<()> {
        let table = self.table_mut()?;
        let node = table.get_mut(pointer)?;
        if !node.kind().accepts_restriction(ENUM) {
            return Err(SchemaError::unsupported(pointer, format!("{} nodes take no enum", node.kind())));
        }
        let values = node
            .restrictions_mut()
            .entry(ENUM.to_string())
            .or_insert_with(|| json!([]));
        let Some(values) = values.as_array_mut() else {
            return Err(SchemaError::unsupported(pointer, "enum is not an array"));
        };
        values.push(value);
        table.touch();
        tracing::debug!(%pointer, "added enum value");
        Ok(())
    }

    /// Remove the first occurrence of `value` from the node's `enum`
    ///
    /// An `enum` left empty is removed. Returns whether a value was removed.
    ///
    /// # Errors
    /// [`SchemaError::ModelNotLoaded`] or [`SchemaError::NodeNotFound`].
    pub fn remove_enum_value(&mut self, pointer: &SchemaPointer, value: &Value) -> SchemaResult<bool> {
        let table = self.table_mut()?;
        let restrictions = table.get_mut(pointer)?.restrictions_mut();
        let Some(values) = restrictions.get_mut(ENUM).and_then(Value::as_array_mut) else {
            return Ok(false);
        };
        let Some(at) = values.iter().position(|v| v == value) else {
            return Ok(false);
        };
        values.remove(at);
        if values.is_empty() {
            restrictions.shift_remove(ENUM);
        }
        table.touch();
        tracing::debug!(%pointer, "removed enum value");
        Ok(true)
    }
}

/// Object item for a freshly created array
fn insert_default_item(table: &mut NodeTable, array: &SchemaPointer) -> SchemaResult<()> {
    table.insert(SchemaNode::new(array.join(ITEMS), Some(array.clone()), NodeKind::Object))
}

/// Reference nodes outside every subtree in `roots` that target one of them
fn outside_referrers(resolver: &ReferenceResolver<'_>, roots: &[SchemaPointer]) -> Vec<SchemaPointer> {
    let mut found: Vec<SchemaPointer> = roots
        .iter()
        .flat_map(|root| resolver.referrers(root))
        .map(|node| node.pointer().clone())
        .filter(|p| !roots.iter().any(|root| root.is_ancestor(p)))
        .collect();
    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ptr(s: &str) -> SchemaPointer {
        s.parse().unwrap()
    }

    fn model() -> SchemaModel {
        SchemaModel::empty(ModelConfig::default())
    }

    #[test]
    fn unloaded_model_rejects_operations() {
        let mut model = SchemaModel::new(ModelConfig::default());
        assert!(!model.is_loaded());
        assert_eq!(
            model.add_field(&SchemaPointer::root(), NodeKind::String),
            Err(SchemaError::ModelNotLoaded)
        );
        assert_eq!(model.to_canonical_schema(), Err(SchemaError::ModelNotLoaded));
        assert_eq!(model.revision(), Err(SchemaError::ModelNotLoaded));
    }

    #[test]
    fn add_field_names_in_sequence() {
        let mut model = model();
        let root = SchemaPointer::root();
        let names: Vec<String> = (0..3)
            .map(|_| model.add_field(&root, NodeKind::String).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["name0", "name1", "name2"]);
    }

    #[test]
    fn add_field_under_array_targets_item() {
        let mut model = model();
        let list = model.add_field(&SchemaPointer::root(), NodeKind::Array).unwrap();
        assert_eq!(list.children(), &[ptr("#/properties/name0/items")]);

        let field = model.add_field(list.pointer(), NodeKind::Boolean).unwrap();
        assert_eq!(field.pointer(), &ptr("#/properties/name0/items/properties/name0"));
    }

    #[test]
    fn add_field_under_scalar_fails() {
        let mut model = model();
        let leaf = model.add_field(&SchemaPointer::root(), NodeKind::String).unwrap();
        assert!(matches!(
            model.add_field(leaf.pointer(), NodeKind::String),
            Err(SchemaError::InvalidParent { .. })
        ));
    }

    #[test]
    fn add_field_to_combination_uses_next_index() {
        let mut model = model();
        let choice = model
            .add_field(&SchemaPointer::root(), NodeKind::Combination(crate::node::CombinationKind::OneOf))
            .unwrap();
        let first = model.add_field(choice.pointer(), NodeKind::String).unwrap();
        let second = model.add_field(choice.pointer(), NodeKind::Number).unwrap();
        assert_eq!(first.pointer(), &ptr("#/properties/name0/oneOf/0"));
        assert_eq!(second.pointer(), &ptr("#/properties/name0/oneOf/1"));
    }

    #[test]
    fn invalid_rename_is_rejected_before_table() {
        let mut model = model();
        let field = model.add_field(&SchemaPointer::root(), NodeKind::String).unwrap();
        let revision = model.revision().unwrap();
        let err = model.rename_node(field.pointer(), "9lives").unwrap_err();
        assert_eq!(err.code(), "invalid_name");
        assert_eq!(model.revision().unwrap(), revision);
    }

    #[test]
    fn restriction_keywords_are_checked() {
        let mut model = model();
        let field = model.add_field(&SchemaPointer::root(), NodeKind::String).unwrap();
        assert_eq!(
            model.set_restriction(field.pointer(), "colour", json!("red")),
            Err(SchemaError::UnknownRestriction("colour".into()))
        );
        assert!(matches!(
            model.set_restriction(field.pointer(), "minimum", json!(1)),
            Err(SchemaError::UnsupportedOperation { .. })
        ));
        model.set_restriction(field.pointer(), "maxLength", json!(10)).unwrap();
        model.set_restriction(field.pointer(), "maxLength", json!(12)).unwrap();
        assert_eq!(
            model.node(field.pointer()).unwrap().restrictions()["maxLength"],
            json!(12)
        );
        assert_eq!(
            model.remove_restriction(field.pointer(), "maxLength").unwrap(),
            Some(json!(12))
        );
    }

    #[test]
    fn enum_values() {
        let mut model = model();
        let field = model.add_field(&SchemaPointer::root(), NodeKind::String).unwrap();
        model.add_enum_value(field.pointer(), json!("a")).unwrap();
        model.add_enum_value(field.pointer(), json!("b")).unwrap();
        assert!(model.remove_enum_value(field.pointer(), &json!("a")).unwrap());
        assert!(!model.remove_enum_value(field.pointer(), &json!("zz")).unwrap());
        assert_eq!(model.node(field.pointer()).unwrap().restrictions()["enum"], json!(["b"]));
        assert!(model.remove_enum_value(field.pointer(), &json!("b")).unwrap());
        assert!(model.node(field.pointer()).unwrap().restrictions().is_empty());
    }

    #[test]
    fn retype_drops_children_and_restrictions() {
        let mut model = model();
        let object = model.add_field(&SchemaPointer::root(), NodeKind::Object).unwrap();
        model.add_field(object.pointer(), NodeKind::String).unwrap();
        model.set_restriction(object.pointer(), "enum", json!([{}])).unwrap();
        model.set_restriction(object.pointer(), "maxProperties", json!(3)).unwrap();

        model.retype_node(object.pointer(), NodeKind::String).unwrap();
        let node = model.node(object.pointer()).unwrap();
        assert_eq!(node.kind(), NodeKind::String);
        assert!(node.children().is_empty());
        assert_eq!(node.restrictions().keys().collect::<Vec<_>>(), vec!["enum"]);
        assert!(!model.table().unwrap().contains(&ptr("#/properties/name0/properties/name0")));
    }

    #[test]
    fn required_needs_object_parent() {
        let mut model = model();
        let list = model.add_field(&SchemaPointer::root(), NodeKind::Array).unwrap();
        model.set_required(list.pointer(), true).unwrap();
        assert!(model.node(list.pointer()).unwrap().is_required());
        assert!(matches!(
            model.set_required(&ptr("#/properties/name0/items"), true),
            Err(SchemaError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn nullable_needs_a_type() {
        let mut model = model();
        let field = model.add_field(&SchemaPointer::root(), NodeKind::Integer).unwrap();
        model.set_nullable(field.pointer(), true).unwrap();
        assert_eq!(
            model.to_canonical_schema().unwrap()["properties"]["name0"]["type"],
            json!(["integer", "null"])
        );
        let definitions = model.table().unwrap().definitions_pointer().clone();
        assert!(model.set_nullable(&definitions, true).is_err());
    }

    #[test]
    fn failed_load_leaves_model_unloaded() {
        let mut model = model();
        assert!(model.load_canonical_schema(&json!({ "type": "date" })).is_err());
        assert!(!model.is_loaded());
    }

    #[test]
    fn revision_keeps_rising_across_loads() {
        let mut model = SchemaModel::from_value(&json!({ "type": "object" }), ModelConfig::default()).unwrap();
        model.add_field(&SchemaPointer::root(), NodeKind::String).unwrap();
        let edited = model.revision().unwrap();

        model.load_canonical_schema(&json!({ "type": "object" })).unwrap();
        let reloaded = model.revision().unwrap();
        assert!(reloaded > edited);

        assert!(model.load_canonical_schema(&json!(true)).is_err());
        model.load_canonical_schema(&json!({ "type": "object" })).unwrap();
        assert!(model.revision().unwrap() > reloaded);
    }

    #[test]
    fn empty_document_carries_dialect() {
        let config = ModelConfig::default().with_schema_dialect("https://json-schema.org/draft/2020-12/schema");
        let model = SchemaModel::empty(config);
        assert_eq!(
            model.to_canonical_schema().unwrap(),
            json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object"
            })
        );
    }
}
