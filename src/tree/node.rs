//! Live filesystem node handles

use crate::tree::path::{Path, PathNode};
use crate::types::BlockPointer;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Mutable node state. Written only by the owning [`NodeCache`] while it
/// holds its exclusive lock.
///
/// [`NodeCache`]: crate::tree::cache::NodeCache
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) path_node: PathNode,
    /// Non-owning: the parent's lifetime is governed by its cache entry
    pub(crate) parent: Option<Weak<NodeInner>>,
    /// Frozen at unlink time; empty while the node is attached
    pub(crate) cached_path: Path,
}

#[derive(Debug)]
pub(crate) struct NodeInner {
    pub(crate) state: Mutex<NodeState>,
}

/// Handle to a node tracked by a [`NodeCache`]
///
/// Handles compare by identity, not by contents: two handles are equal only
/// if they refer to the same cache entry incarnation. A handle obtained
/// before its entry was dropped and re-created is stale.
///
/// [`NodeCache`]: crate::tree::cache::NodeCache
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Arc<NodeInner>,
}

impl Node {
    pub(crate) fn new(pointer: BlockPointer, name: String, parent: Option<&Node>) -> Self {
        let state = NodeState {
            path_node: PathNode { pointer, name },
            parent: parent.map(|p| Arc::downgrade(&p.inner)),
            cached_path: Path::default(),
        };
        Node {
            inner: Arc::new(NodeInner {
                state: Mutex::new(state),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
        Node { inner }
    }

    /// Current block pointer of the node
    pub fn pointer(&self) -> BlockPointer {
        self.inner.state.lock().path_node.pointer
    }

    /// Name within the parent directory; empty once unlinked
    pub fn name(&self) -> String {
        self.inner.state.lock().path_node.name.clone()
    }

    /// Parent handle, if the node is attached and its parent is still alive
    pub fn parent(&self) -> Option<Node> {
        self.inner
            .state
            .lock()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Node::from_inner)
    }

    /// Whether the node has been detached from the live tree by an unlink
    pub fn is_unlinked(&self) -> bool {
        let state = self.inner.state.lock();
        state.parent.is_none() && state.cached_path.is_valid()
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Node")
            .field("pointer", &state.path_node.pointer)
            .field("name", &state.path_node.name)
            .field("attached", &state.parent.is_some())
            .finish()
    }
}
