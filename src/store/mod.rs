//! In-memory block store
//!
//! Content-addressed map of blocks, serving as the fetch side of the
//! retrieval queue in tests, benches and embedders without a real backend.

use crate::error::RetrievalError;
use crate::retrieval::{Block, BlockGetter, RequestContext};
use crate::types::BlockPointer;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<BlockPointer, Arc<[u8]>>>,
    /// Simulated fetch latency
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose fetches each take `latency`
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Store `data` and return the pointer addressing it
    pub fn put(&self, data: impl AsRef<[u8]>) -> BlockPointer {
        let data = data.as_ref();
        let pointer = BlockPointer::from_content(data);
        self.blocks.write().insert(pointer, Arc::from(data));
        pointer
    }

    /// Store `data` under an explicit pointer
    pub fn put_at(&self, pointer: BlockPointer, data: impl AsRef<[u8]>) {
        self.blocks.write().insert(pointer, Arc::from(data.as_ref()));
    }

    pub fn remove(&self, pointer: &BlockPointer) -> bool {
        self.blocks.write().remove(pointer).is_some()
    }

    pub fn contains(&self, pointer: &BlockPointer) -> bool {
        self.blocks.read().contains_key(pointer)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Number of `get_block` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockGetter for MemoryBlockStore {
    async fn get_block(
        &self,
        ctx: &RequestContext,
        pointer: &BlockPointer,
    ) -> Result<Block, RetrievalError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {}
                _ = ctx.cancelled() => return Err(RetrievalError::Cancelled),
            }
        }
        if ctx.is_cancelled() {
            return Err(RetrievalError::Cancelled);
        }

        let data = self
            .blocks
            .read()
            .get(pointer)
            .cloned()
            .ok_or(RetrievalError::NotFound(*pointer))?;
        Ok(Block {
            pointer: *pointer,
            data,
        })
    }
}
