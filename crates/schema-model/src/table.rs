//! Flat node table keyed by pointer
//!
//! Provides [`NodeTable`]: every node of an open document in one ordered
//! map, so lookups are a single probe and a subtree is one key range.
//!
//! Structural edits (rename, move, re-indexing combination members after a
//! removal) all go through one relocation step:
//! 1. plan the old → new prefix for each node that changes position,
//! 2. check the result for collisions,
//! 3. pull the affected subtrees out, rewrite every pointer that mentions
//!    them (children lists, parent links, `$ref` targets) and put them back.
//!
//! Steps 1 and 2 only read, so a failed operation leaves the table untouched.

use schema_pointer::SchemaPointer;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{SchemaError, SchemaResult};
use crate::naming;
use crate::node::{NodeKind, SchemaNode};

/// Default pointer of the definitions container
pub const DEFAULT_DEFINITIONS_POINTER: &str = "#/$defs";

/// Prefix rewrites applied by one relocation
type Relocation = Vec<(SchemaPointer, SchemaPointer)>;

/// Desired child order of one parent, in current pointers
#[derive(Debug, Clone)]
struct ChildrenPlan {
    parent: SchemaPointer,
    children: Vec<SchemaPointer>,
}

/// Pointer-keyed node storage with a document revision counter
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTable {
    nodes: BTreeMap<SchemaPointer, SchemaNode>,
    definitions: SchemaPointer,
    revision: u64,
}

impl NodeTable {
    /// Empty table using `#/$defs` for definitions
    #[must_use]
    pub fn new() -> Self {
        Self::with_definitions_pointer(SchemaPointer::root().join("$defs"))
    }

    /// Empty table with a custom definitions container pointer
    #[must_use]
    pub fn with_definitions_pointer(definitions: SchemaPointer) -> Self {
        Self {
            nodes: BTreeMap::new(),
            definitions,
            revision: 0,
        }
    }

    /// Pointer of the definitions container
    #[inline]
    #[must_use]
    pub fn definitions_pointer(&self) -> &SchemaPointer {
        &self.definitions
    }

    /// Document revision, bumped by every mutation
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    /// Shift the revision past `previous`, a revision of the document this
    /// table replaces
    pub(crate) fn succeed(&mut self, previous: u64) {
        self.revision += previous + 1;
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the table holds no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if a node lives at `pointer`
    #[inline]
    #[must_use]
    pub fn contains(&self, pointer: &SchemaPointer) -> bool {
        self.nodes.contains_key(pointer)
    }

    /// Lookup node
    ///
    /// # Errors
    /// Returns [`SchemaError::NodeNotFound`] if nothing lives at `pointer`.
    pub fn get(&self, pointer: &SchemaPointer) -> SchemaResult<&SchemaNode> {
        self.nodes
            .get(pointer)
            .ok_or_else(|| SchemaError::NodeNotFound(pointer.clone()))
    }

    pub(crate) fn get_mut(&mut self, pointer: &SchemaPointer) -> SchemaResult<&mut SchemaNode> {
        self.nodes
            .get_mut(pointer)
            .ok_or_else(|| SchemaError::NodeNotFound(pointer.clone()))
    }

    /// All nodes in pointer order
    pub fn iter(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    /// `pointer` and its descendants, in pointer order
    pub fn subtree<'a>(
        &'a self,
        pointer: &'a SchemaPointer,
    ) -> impl Iterator<Item = &'a SchemaNode> + 'a {
        self.nodes
            .range(pointer.clone()..)
            .take_while(move |(key, _)| pointer.is_ancestor(key))
            .map(|(_, node)| node)
    }

    /// All `$ref` nodes
    pub fn references(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values().filter(|node| node.is_reference())
    }

    fn is_protected(&self, pointer: &SchemaPointer) -> bool {
        pointer.is_root() || *pointer == self.definitions
    }

    /// Insert node as the last child of its parent
    ///
    /// # Errors
    /// - [`SchemaError::DuplicatePointer`] if the pointer is taken
    /// - [`SchemaError::NodeNotFound`] if the parent is missing
    /// - [`SchemaError::InvalidParent`] if the parent cannot hold children
    pub fn insert(&mut self, node: SchemaNode) -> SchemaResult<()> {
        self.insert_at(node, usize::MAX)
    }

    /// Insert node at `index` in its parent's children (clamped)
    ///
    /// Only the root and the definitions container may be parentless.
    ///
    /// # Errors
    /// See [`insert`](Self::insert).
    pub fn insert_at(&mut self, node: SchemaNode, index: usize) -> SchemaResult<()> {
        let pointer = node.pointer().clone();
        if self.nodes.contains_key(&pointer) {
            return Err(SchemaError::DuplicatePointer(pointer));
        }

        match node.parent().cloned() {
            Some(parent) => {
                let parent_node = self.get_mut(&parent)?;
                if !parent_node.kind().is_container() {
                    return Err(SchemaError::InvalidParent {
                        pointer: parent,
                        kind: parent_node.kind().to_string(),
                    });
                }
                let children = parent_node.children_mut();
                if !children.contains(&pointer) {
                    let at = index.min(children.len());
                    children.insert(at, pointer.clone());
                }
            }
            None if self.is_protected(&pointer) => {}
            None => {
                return Err(SchemaError::unsupported(
                    &pointer,
                    "only the root and the definitions container can be parentless",
                ))
            }
        }

        self.nodes.insert(pointer, node);
        self.touch();
        Ok(())
    }

    /// Remove node and its whole subtree
    ///
    /// Returns the removed nodes. Remaining members of a combination are
    /// re-indexed so the member list stays dense.
    ///
    /// # Errors
    /// - [`SchemaError::NodeNotFound`] if `pointer` is missing
    /// - [`SchemaError::ProtectedNode`] for the root or definitions container
    pub fn remove(&mut self, pointer: &SchemaPointer) -> SchemaResult<Vec<SchemaNode>> {
        self.remove_many(std::slice::from_ref(pointer))
    }

    /// Remove several subtrees in one transaction
    ///
    /// # Errors
    /// See [`remove`](Self::remove).
    pub fn remove_many(&mut self, pointers: &[SchemaPointer]) -> SchemaResult<Vec<SchemaNode>> {
        for pointer in pointers {
            if self.is_protected(pointer) {
                return Err(SchemaError::ProtectedNode(pointer.clone()));
            }
            self.get(pointer)?;
        }

        let doomed: BTreeSet<SchemaPointer> = pointers
            .iter()
            .flat_map(|p| self.subtree(p).map(|n| n.pointer().clone()))
            .collect();

        // Surviving parents and their children once the doomed ones are gone
        let mut touched: BTreeMap<SchemaPointer, Vec<SchemaPointer>> = BTreeMap::new();
        for pointer in &doomed {
            let Some(parent) = self.nodes[pointer].parent() else {
                continue;
            };
            if doomed.contains(parent) {
                continue;
            }
            touched
                .entry(parent.clone())
                .or_insert_with(|| self.nodes[parent].children().to_vec())
                .retain(|c| c != pointer);
        }

        let plans: Vec<ChildrenPlan> = touched
            .iter()
            .filter(|(parent, _)| matches!(self.nodes[*parent].kind(), NodeKind::Combination(_)))
            .map(|(parent, children)| ChildrenPlan {
                parent: parent.clone(),
                children: children.clone(),
            })
            .collect();
        let mapping = self.plan_relocation(plans, &HashMap::new())?;
        let moving = self.check_relocation(&mapping, &doomed)?;

        let removed: Vec<SchemaNode> = doomed.iter().filter_map(|p| self.nodes.remove(p)).collect();
        for (parent, children) in touched {
            if let Some(node) = self.nodes.get_mut(&parent) {
                *node.children_mut() = children;
            }
        }
        self.apply_relocation(&mapping, &moving);
        self.touch();

        tracing::debug!(removed = removed.len(), "removed subtrees");
        Ok(removed)
    }

    /// Rename a property or definition
    ///
    /// The node and every descendant get the new prefix; sibling order and
    /// references into the subtree are preserved.
    ///
    /// # Errors
    /// - [`SchemaError::NameCollision`] if the new pointer is taken
    /// - [`SchemaError::UnsupportedOperation`] for unnamed nodes (array items,
    ///   combination members)
    pub fn rename(&mut self, pointer: &SchemaPointer, new_name: &str) -> SchemaResult<SchemaPointer> {
        if self.is_protected(pointer) {
            return Err(SchemaError::ProtectedNode(pointer.clone()));
        }
        let parent_pointer = self
            .get(pointer)?
            .parent()
            .cloned()
            .ok_or_else(|| SchemaError::ProtectedNode(pointer.clone()))?;
        let parent = self.get(&parent_pointer)?;
        if !parent.kind().has_named_children() {
            return Err(SchemaError::unsupported(
                pointer,
                format!("children of {} nodes have no name", parent.kind()),
            ));
        }

        let renamed = parent.child_pointer(new_name)?;
        if renamed == *pointer {
            return Ok(renamed);
        }
        if self.contains(&renamed) {
            return Err(SchemaError::NameCollision {
                pointer: renamed,
                name: new_name.to_string(),
            });
        }

        let mapping = vec![(pointer.clone(), renamed.clone())];
        let moving = self.check_relocation(&mapping, &BTreeSet::new())?;
        self.apply_relocation(&mapping, &moving);
        self.touch();

        tracing::debug!(from = %pointer, to = %renamed, "renamed node");
        Ok(renamed)
    }

    /// Move node under `new_parent` at `index` (clamped)
    ///
    /// A node without a usable name (array item, combination member) that
    /// lands in an object gets the first free `name<N>`.
    ///
    /// # Errors
    /// See [`move_node_as`](Self::move_node_as).
    pub fn move_node(
        &mut self,
        pointer: &SchemaPointer,
        new_parent: &SchemaPointer,
        index: usize,
    ) -> SchemaResult<SchemaPointer> {
        self.move_node_as(pointer, new_parent, index, None)
    }

    /// Move node, naming it `name` if it lands in an object or the
    /// definitions container
    ///
    /// Only object properties keep their required flag.
    ///
    /// # Errors
    /// - [`SchemaError::CyclicMove`] if `new_parent` is `pointer` or inside it
    /// - [`SchemaError::NameCollision`] if the target name is taken
    /// - [`SchemaError::InvalidParent`] if `new_parent` cannot hold children
    /// - [`SchemaError::ProtectedNode`] for the root or definitions container
    pub fn move_node_as(
        &mut self,
        pointer: &SchemaPointer,
        new_parent: &SchemaPointer,
        index: usize,
        name: Option<&str>,
    ) -> SchemaResult<SchemaPointer> {
        if self.is_protected(pointer) {
            return Err(SchemaError::ProtectedNode(pointer.clone()));
        }
        if pointer.is_ancestor(new_parent) {
            return Err(SchemaError::CyclicMove {
                pointer: pointer.clone(),
                target: new_parent.clone(),
            });
        }

        let node = self.get(pointer)?;
        let old_parent = node
            .parent()
            .cloned()
            .ok_or_else(|| SchemaError::ProtectedNode(pointer.clone()))?;
        let target = self.get(new_parent)?;
        if !target.kind().is_container() {
            return Err(SchemaError::InvalidParent {
                pointer: new_parent.clone(),
                kind: target.kind().to_string(),
            });
        }
        if target.kind() == NodeKind::Array && old_parent != *new_parent && !target.children().is_empty() {
            return Err(SchemaError::unsupported(new_parent, "array already has an item"));
        }

        let lands_in_object = target.kind() == NodeKind::Object;
        let old_parent_named = self.get(&old_parent)?.kind().has_named_children();
        let mut names = HashMap::new();
        if target.kind().has_named_children() {
            let chosen = match name {
                Some(n) => n.to_string(),
                None if old_parent_named => node.name().to_string(),
                None => naming::unique_name(
                    naming::DEFAULT_FIELD_NAME,
                    target.children().iter().filter_map(SchemaPointer::last),
                ),
            };
            names.insert(pointer.clone(), chosen);
        }

        let mut old_children = self.get(&old_parent)?.children().to_vec();
        old_children.retain(|c| c != pointer);
        let plans = if old_parent == *new_parent {
            let at = index.min(old_children.len());
            old_children.insert(at, pointer.clone());
            vec![ChildrenPlan {
                parent: old_parent.clone(),
                children: old_children,
            }]
        } else {
            let mut new_children = target.children().to_vec();
            let at = index.min(new_children.len());
            new_children.insert(at, pointer.clone());
            vec![
                ChildrenPlan {
                    parent: old_parent.clone(),
                    children: old_children,
                },
                ChildrenPlan {
                    parent: new_parent.clone(),
                    children: new_children,
                },
            ]
        };

        let mapping = self.plan_relocation(plans.clone(), &names)?;
        let moving = self.check_relocation(&mapping, &BTreeSet::new())?;

        for plan in plans {
            *self.get_mut(&plan.parent)?.children_mut() = plan.children;
        }
        let moved_node = self.get_mut(pointer)?;
        moved_node.set_parent(Some(new_parent.clone()));
        if !lands_in_object {
            moved_node.set_required(false);
        }
        self.apply_relocation(&mapping, &moving);
        self.touch();

        let moved = remap_with(&mapping, pointer).unwrap_or_else(|| pointer.clone());
        tracing::debug!(from = %pointer, to = %moved, index, "moved node");
        Ok(moved)
    }

    /// Compute prefix rewrites that realise `plans`
    ///
    /// Parents are handled shallowest first so a child's target is computed
    /// under its parent's final pointer.
    fn plan_relocation(
        &self,
        mut plans: Vec<ChildrenPlan>,
        names: &HashMap<SchemaPointer, String>,
    ) -> SchemaResult<Relocation> {
        plans.sort_by_key(|plan| plan.parent.len());

        let mut mapping = Relocation::new();
        for plan in &plans {
            let kind = self.get(&plan.parent)?.kind();
            let final_parent = remap_with(&mapping, &plan.parent).unwrap_or_else(|| plan.parent.clone());

            for (index, child) in plan.children.iter().enumerate() {
                let name = match kind {
                    NodeKind::Combination(_) => index.to_string(),
                    _ => names
                        .get(child)
                        .cloned()
                        .unwrap_or_else(|| child.last().unwrap_or_default().to_string()),
                };
                let target = SchemaNode::child_pointer_at(&final_parent, kind, &name)?;
                let current = remap_with(&mapping, child).unwrap_or_else(|| child.clone());
                if target != current {
                    mapping.retain(|(old, _)| old != child);
                    mapping.push((child.clone(), target));
                }
            }
        }
        Ok(mapping)
    }

    /// Collect relocated nodes and reject colliding targets
    ///
    /// `vacated` pointers are about to be removed and do not count as taken.
    fn check_relocation(
        &self,
        mapping: &Relocation,
        vacated: &BTreeSet<SchemaPointer>,
    ) -> SchemaResult<BTreeSet<SchemaPointer>> {
        let moving: BTreeSet<SchemaPointer> = mapping
            .iter()
            .flat_map(|(old, _)| self.subtree(old).map(|n| n.pointer().clone()))
            .collect();

        let mut targets = HashSet::with_capacity(moving.len());
        for pointer in &moving {
            let Some(target) = remap_with(mapping, pointer) else {
                continue;
            };
            let occupied = self.nodes.contains_key(&target)
                && !moving.contains(&target)
                && !vacated.contains(&target);
            if occupied || !targets.insert(target.clone()) {
                return Err(SchemaError::NameCollision {
                    name: target.last().unwrap_or_default().to_string(),
                    pointer: target,
                });
            }
        }
        Ok(moving)
    }

    /// Rewrite pointers; must follow a successful [`check_relocation`]
    fn apply_relocation(&mut self, mapping: &Relocation, moving: &BTreeSet<SchemaPointer>) {
        if mapping.is_empty() {
            return;
        }
        let remap = |p: &SchemaPointer| remap_with(mapping, p);

        let extracted: Vec<SchemaNode> = moving.iter().filter_map(|p| self.nodes.remove(p)).collect();
        for node in self.nodes.values_mut() {
            node.remap_pointers(remap);
        }
        for mut node in extracted {
            node.remap_pointers(remap);
            self.nodes.insert(node.pointer().clone(), node);
        }
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite `pointer` through the most specific matching prefix
fn remap_with(mapping: &[(SchemaPointer, SchemaPointer)], pointer: &SchemaPointer) -> Option<SchemaPointer> {
    mapping
        .iter()
        .filter(|(old, _)| old.is_ancestor(pointer))
        .max_by_key(|(old, _)| old.len())
        .and_then(|(old, new)| pointer.rebase(old, new))
}
