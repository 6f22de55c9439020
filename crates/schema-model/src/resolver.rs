//! `$ref` resolution over a [`NodeTable`]

use schema_pointer::SchemaPointer;
use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::naming;
use crate::node::SchemaNode;
use crate::table::NodeTable;

/// Default bound on reference chain length in [`ReferenceResolver::resolve_final`]
pub const DEFAULT_MAX_REFERENCE_DEPTH: usize = 64;

/// Read-only view resolving reference nodes against a table
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    table: &'a NodeTable,
    max_depth: usize,
}

impl<'a> ReferenceResolver<'a> {
    /// Create resolver over `table`
    #[inline]
    #[must_use]
    pub fn new(table: &'a NodeTable) -> Self {
        Self {
            table,
            max_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }

    /// Override chain length bound
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Target of one reference hop
    ///
    /// Non-reference nodes resolve to themselves.
    ///
    /// # Errors
    /// Returns [`SchemaError::DanglingReference`] if the target is missing.
    pub fn resolve(&self, node: &'a SchemaNode) -> SchemaResult<&'a SchemaNode> {
        let Some(target) = node.reference_target() else {
            return Ok(node);
        };
        self.table
            .get(target)
            .map_err(|_| SchemaError::DanglingReference {
                pointer: node.pointer().clone(),
                target: target.clone(),
            })
    }

    /// Follow references from `pointer` to the first concrete node
    ///
    /// # Errors
    /// - [`SchemaError::NodeNotFound`] if `pointer` is missing
    /// - [`SchemaError::DanglingReference`] on a missing hop
    /// - [`SchemaError::CyclicReference`] if the chain loops or exceeds the
    ///   depth bound
    pub fn resolve_final(&self, pointer: &SchemaPointer) -> SchemaResult<&'a SchemaNode> {
        let mut node = self.table.get(pointer)?;
        if self.detect_cycle(pointer) {
            return Err(SchemaError::CyclicReference(pointer.clone()));
        }
        let mut hops = 0usize;
        while node.is_reference() {
            if hops >= self.max_depth {
                return Err(SchemaError::CyclicReference(pointer.clone()));
            }
            node = self.resolve(node)?;
            hops += 1;
        }
        Ok(node)
    }

    /// True if following references from `start` revisits a pointer before
    /// reaching a non-reference node
    ///
    /// Missing pointers end the walk without a cycle.
    #[must_use]
    pub fn detect_cycle(&self, start: &SchemaPointer) -> bool {
        let mut seen = HashSet::new();
        let mut current = start;
        loop {
            let Ok(node) = self.table.get(current) else {
                return false;
            };
            let Some(next) = node.reference_target() else {
                return false;
            };
            if !seen.insert(current) {
                return true;
            }
            current = next;
        }
    }

    /// True if pointing `reference` at `target` would close a cycle
    #[must_use]
    pub fn would_cycle(&self, reference: &SchemaPointer, target: &SchemaPointer) -> bool {
        let mut seen = HashSet::from([reference]);
        let mut current = target;
        loop {
            if !seen.insert(current) {
                return true;
            }
            let Some(next) = self
                .table
                .get(current)
                .ok()
                .and_then(SchemaNode::reference_target)
            else {
                return false;
            };
            current = next;
        }
    }

    /// Reference nodes whose target is `pointer` or lies inside it
    #[must_use]
    pub fn referrers(&self, pointer: &SchemaPointer) -> Vec<&'a SchemaNode> {
        self.table
            .references()
            .filter(|node| {
                node.reference_target()
                    .is_some_and(|target| pointer.is_ancestor(target))
            })
            .collect()
    }

    /// Names currently used by definitions
    pub fn definition_names(&self) -> impl Iterator<Item = &'a str> {
        self.table
            .get(self.table.definitions_pointer())
            .map(SchemaNode::children)
            .unwrap_or_default()
            .iter()
            .filter_map(SchemaPointer::last)
    }

    /// `base_name` plus the smallest free numeric suffix among definitions
    #[must_use]
    pub fn generate_unique_definition_name(&self, base_name: &str) -> String {
        naming::unique_name(base_name, self.definition_names())
    }
}
