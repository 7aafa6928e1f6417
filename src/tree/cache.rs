//! Node Cache
//!
//! Reference-counted registry of the live nodes of one folder branch. The
//! cache owns node lifetimes: a node exists exactly as long as its entry's
//! count is positive, regardless of how many parent back-references point
//! at it. Paths are rebuilt on demand from the nodes' parent links, so
//! renames and unlinks are reflected without touching descendants.

use crate::error::CacheError;
use crate::tree::node::Node;
use crate::tree::path::{Path, PathNode};
use crate::types::{BlockPointer, BranchName, TlfId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

struct NodeCacheEntry {
    node: Node,
    /// Incremented under the shared lock by the lookup fast path, so it
    /// must be atomic. Decrements happen only under the exclusive lock.
    ref_count: AtomicUsize,
}

/// Node cache for a single folder branch
pub struct NodeCache {
    tlf: TlfId,
    branch: BranchName,
    nodes: RwLock<HashMap<BlockPointer, NodeCacheEntry>>,
}

impl NodeCache {
    /// Create an empty cache whose paths are stamped with `tlf` and `branch`
    pub fn new(tlf: TlfId, branch: BranchName) -> Self {
        Self {
            tlf,
            branch,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    pub fn tlf(&self) -> TlfId {
        self.tlf
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Current reference count for `pointer`, if it has an entry
    pub fn ref_count(&self, pointer: &BlockPointer) -> Option<usize> {
        self.nodes
            .read()
            .get(pointer)
            .map(|entry| entry.ref_count.load(Ordering::Acquire))
    }

    // lock must be held for writing by the caller
    fn forget_locked(nodes: &mut HashMap<BlockPointer, NodeCacheEntry>, node: &Node) {
        let pointer = node.pointer();
        let Some(entry) = nodes.get_mut(&pointer) else {
            return;
        };
        if !entry.node.ptr_eq(node) {
            return;
        }

        let count = entry.ref_count.get_mut();
        *count = count.saturating_sub(1);
        if *count == 0 {
            nodes.remove(&pointer);
        }
    }

    // lock must be held for writing by the caller
    fn new_child_for_parent_locked(
        nodes: &mut HashMap<BlockPointer, NodeCacheEntry>,
        parent: &Node,
    ) -> Result<(), CacheError> {
        let pointer = parent.pointer();
        let entry = nodes
            .get_mut(&pointer)
            .ok_or(CacheError::ParentNotFound(pointer))?;
        if !entry.node.ptr_eq(parent) {
            return Err(CacheError::ParentNotFound(pointer));
        }
        *entry.ref_count.get_mut() += 1;
        Ok(())
    }

    /// Take a reference to the node for `pointer`, creating it if needed
    ///
    /// When an entry already exists, `name` and `parent` are ignored. A new
    /// node takes a reference on `parent`, which fails with
    /// [`CacheError::ParentNotFound`] if that handle is stale.
    pub fn get_or_create(
        &self,
        pointer: BlockPointer,
        name: &str,
        parent: Option<&Node>,
    ) -> Result<Node, CacheError> {
        {
            let nodes = self.nodes.read();
            if let Some(entry) = nodes.get(&pointer) {
                entry.ref_count.fetch_add(1, Ordering::AcqRel);
                return Ok(entry.node.clone());
            }
        }

        let mut nodes = self.nodes.write();
        // Another writer may have inserted it since we dropped the read lock
        if let Some(entry) = nodes.get_mut(&pointer) {
            *entry.ref_count.get_mut() += 1;
            return Ok(entry.node.clone());
        }

        if let Some(parent) = parent {
            Self::new_child_for_parent_locked(&mut nodes, parent)?;
        }

        let node = Node::new(pointer, name.to_string(), parent);
        nodes.insert(
            pointer,
            NodeCacheEntry {
                node: node.clone(),
                ref_count: AtomicUsize::new(1),
            },
        );
        Ok(node)
    }

    /// Look up the node for `pointer` without taking a reference
    pub fn get_without_reference(&self, pointer: &BlockPointer) -> Option<Node> {
        self.nodes.read().get(pointer).map(|entry| entry.node.clone())
    }

    /// Drop one reference to `node`
    ///
    /// Stale handles and unknown nodes are ignored. The node's hold on its
    /// parent is not released; callers forget the tree layer by layer.
    pub fn forget(&self, node: &Node) {
        let mut nodes = self.nodes.write();
        Self::forget_locked(&mut nodes, node);
    }

    /// Re-key the entry for `old` under `new`, keeping its node and count
    pub fn update_pointer(&self, old: BlockPointer, new: BlockPointer) {
        let mut nodes = self.nodes.write();
        let Some(entry) = nodes.remove(&old) else {
            return;
        };

        entry.node.inner.state.lock().path_node.pointer = new;
        if let Some(replaced) = nodes.insert(new, entry) {
            warn!(
                old = %old,
                new = %new,
                dropped_refs = replaced.ref_count.load(Ordering::Acquire),
                "Pointer update replaced an existing cache entry"
            );
        }
        debug!(old = %old, new = %new, "Updated node pointer");
    }

    /// Reparent the node for `pointer` under `new_parent` as `new_name`
    ///
    /// Either the whole move happens or, if `new_parent` is stale or lies
    /// below the node itself, nothing changes. Unknown pointers are ignored.
    pub fn move_node(
        &self,
        pointer: BlockPointer,
        new_parent: &Node,
        new_name: &str,
    ) -> Result<(), CacheError> {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get(&pointer).map(|entry| entry.node.clone()) else {
            return Ok(());
        };

        // new_parent must not be the node itself or lie below it
        let mut ancestor = Some(new_parent.clone());
        while let Some(curr) = ancestor {
            if curr.ptr_eq(&node) {
                return Err(CacheError::MoveIntoDescendant {
                    pointer,
                    parent: new_parent.pointer(),
                });
            }
            ancestor = curr.parent();
        }

        Self::new_child_for_parent_locked(&mut nodes, new_parent)?;
        if let Some(old_parent) = node.parent() {
            Self::forget_locked(&mut nodes, &old_parent);
        }

        let mut state = node.inner.state.lock();
        state.parent = Some(Arc::downgrade(&new_parent.inner));
        state.path_node.name = new_name.to_string();
        state.cached_path = Path::default();
        debug!(pointer = %pointer, name = new_name, "Moved node");
        Ok(())
    }

    /// Detach the node for `pointer` from the tree
    ///
    /// `old_path` is frozen into the node so that handles still holding a
    /// reference keep resolving to where the node used to live.
    pub fn unlink(&self, pointer: BlockPointer, old_path: Path) {
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get(&pointer).map(|entry| entry.node.clone()) else {
            return;
        };

        if let Some(old_parent) = node.parent() {
            Self::forget_locked(&mut nodes, &old_parent);
        }

        let mut state = node.inner.state.lock();
        state.cached_path = old_path;
        state.parent = None;
        state.path_node.name.clear();
        debug!(pointer = %pointer, "Unlinked node");
    }

    /// Build the root-to-leaf path of `node`
    pub fn path_from_node(&self, node: &Node) -> Path {
        let _nodes = self.nodes.read();

        let mut steps: Vec<PathNode> = Vec::new();
        let mut current = Some(node.clone());
        while let Some(curr) = current {
            let state = curr.inner.state.lock();

            if state.parent.is_none() && state.cached_path.is_valid() {
                // Unlinked but still referenced. The frozen path is already
                // root-to-leaf, so append it backwards; if this is the node
                // we started at, it is the answer as-is.
                if steps.is_empty() {
                    return state.cached_path.clone();
                }
                steps.extend(state.cached_path.nodes.iter().rev().cloned());
                break;
            }

            steps.push(state.path_node.clone());
            current = match &state.parent {
                Some(weak) => {
                    let parent = Weak::upgrade(weak).map(Node::from_inner);
                    if parent.is_none() {
                        debug!(
                            pointer = %state.path_node.pointer,
                            "Parent released while child still attached; truncating path"
                        );
                    }
                    parent
                }
                None => None,
            };
        }

        steps.reverse();
        Path::new(self.tlf, self.branch.clone(), steps)
    }
}
