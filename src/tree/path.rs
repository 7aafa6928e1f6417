//! Paths through a cached node tree

use crate::types::{BlockPointer, BranchName, TlfId};
use std::fmt;

/// One step of a path: the node's pointer and its name in the parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub pointer: BlockPointer,
    pub name: String,
}

impl PathNode {
    pub fn new(pointer: BlockPointer, name: impl Into<String>) -> Self {
        Self {
            pointer,
            name: name.into(),
        }
    }
}

/// Root-to-leaf sequence of path nodes within one folder branch
///
/// The first node is the folder root; its name is the folder's name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    pub tlf: TlfId,
    pub branch: BranchName,
    pub nodes: Vec<PathNode>,
}

impl Path {
    pub fn new(tlf: TlfId, branch: BranchName, nodes: Vec<PathNode>) -> Self {
        Self { tlf, branch, nodes }
    }

    /// A path is valid once it contains at least the root
    pub fn is_valid(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path has a parent, i.e. its tail is not the root
    pub fn has_valid_parent(&self) -> bool {
        self.nodes.len() >= 2
    }

    pub fn tail(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    pub fn tail_pointer(&self) -> Option<BlockPointer> {
        self.nodes.last().map(|n| n.pointer)
    }

    pub fn tail_name(&self) -> Option<&str> {
        self.nodes.last().map(|n| n.name.as_str())
    }

    /// Path to the tail's parent, or `None` for the root
    pub fn parent_path(&self) -> Option<Path> {
        if !self.has_valid_parent() {
            return None;
        }
        Some(Path {
            tlf: self.tlf,
            branch: self.branch.clone(),
            nodes: self.nodes[..self.nodes.len() - 1].to_vec(),
        })
    }

    /// Path to a child named `name` under the tail
    pub fn child_path(&self, pointer: BlockPointer, name: impl Into<String>) -> Path {
        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        nodes.extend(self.nodes.iter().cloned());
        nodes.push(PathNode::new(pointer, name));
        Path {
            tlf: self.tlf,
            branch: self.branch.clone(),
            nodes,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "/{}", node.name)?;
        }
        Ok(())
    }
}
