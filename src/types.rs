//! Core identifier types shared by the node cache and the retrieval queue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// BlockId: blake3 hash of a block's contents
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub [u8; 32]);

impl BlockId {
    /// Compute the content address of `data`
    pub fn from_content(data: &[u8]) -> Self {
        BlockId(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(&self.0[..8]))
    }
}

/// BlockPointer: identifies one reference to a block
///
/// Two pointers to the same content differ by `ref_nonce`, so a block that
/// appears twice in the tree yields two distinct cache entries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPointer {
    pub id: BlockId,
    pub ref_nonce: u64,
}

impl BlockPointer {
    pub fn new(id: BlockId) -> Self {
        Self { id, ref_nonce: 0 }
    }

    pub fn with_nonce(id: BlockId, ref_nonce: u64) -> Self {
        Self { id, ref_nonce }
    }

    /// Pointer to the block holding `data`
    pub fn from_content(data: &[u8]) -> Self {
        Self::new(BlockId::from_content(data))
    }
}

impl fmt::Display for BlockPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ref_nonce == 0 {
            write!(f, "{}", hex::encode(&self.id.0[..8]))
        } else {
            write!(f, "{}+{:x}", hex::encode(&self.id.0[..8]), self.ref_nonce)
        }
    }
}

impl fmt::Debug for BlockPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockPointer({})", self)
    }
}

/// TlfId: identity of the top-level folder a node tree belongs to
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TlfId(pub [u8; 16]);

impl TlfId {
    /// Derive a folder identity from its canonical name
    pub fn from_name(name: &str) -> Self {
        let hash = blake3::hash(name.as_bytes());
        let mut id = [0u8; 16];
        id.copy_from_slice(&hash.as_bytes()[..16]);
        TlfId(id)
    }
}

impl fmt::Display for TlfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TlfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TlfId({})", self)
    }
}

/// Branch of a top-level folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    pub const MASTER: &'static str = "master";

    pub fn new(name: impl Into<String>) -> Self {
        BranchName(name.into())
    }

    pub fn master() -> Self {
        BranchName(Self::MASTER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_master(&self) -> bool {
        self.0 == Self::MASTER
    }
}

impl Default for BranchName {
    fn default() -> Self {
        Self::master()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority of a block retrieval; higher values are dispatched first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// Background prefetching of blocks nobody is waiting on yet
    pub const PREFETCH: Priority = Priority(1);
    /// A user-facing operation is blocked on the block
    pub const ON_DEMAND: Priority = Priority(100);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::ON_DEMAND
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
