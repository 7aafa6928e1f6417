//! Block Retrieval
//!
//! Coalescing, prioritized scheduling of block fetches. Requests for the same
//! block pointer share one fetch; pending fetches are handed to a fixed pool
//! of workers in priority order, FIFO among equal priorities.

pub mod context;
pub mod heap;
pub mod queue;
pub mod worker;

use crate::error::RetrievalError;
use crate::types::BlockPointer;
use async_trait::async_trait;
use std::sync::Arc;

pub use context::RequestContext;
pub use heap::{HeapEntry, RetrievalHeap};
pub use queue::{AssignedRetrieval, BlockRetrievalQueue, QueueStats, RetrievalRequest};
pub use worker::WorkerPool;

/// Contents of a fetched block
///
/// Cheap to clone; every requester of a coalesced fetch gets its own copy
/// of the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub pointer: BlockPointer,
    pub data: Arc<[u8]>,
}

impl Block {
    pub fn new(pointer: BlockPointer, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            pointer,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome delivered to each requester
pub type RetrievalResult = Result<Block, RetrievalError>;

/// Fetches block contents from wherever blocks live
#[async_trait]
pub trait BlockGetter: Send + Sync {
    async fn get_block(
        &self,
        ctx: &RequestContext,
        pointer: &BlockPointer,
    ) -> Result<Block, RetrievalError>;
}
