//! Block Retrieval Queue
//!
//! Pending retrievals live in a map keyed by block pointer and in an indexed
//! heap, both guarded by one lock. Idle workers publish single-use slots on
//! a bounded channel; every new retrieval spawns a short-lived dispatch task
//! that waits for such a slot and fills it with the best pending retrieval.
//! Neither side holds the lock while waiting on the other.

use super::heap::{HeapEntry, RetrievalHeap};
use super::{RequestContext, RetrievalResult};
use crate::config::RetrievalConfig;
use crate::error::RetrievalError;
use crate::types::{BlockPointer, Priority};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// One caller waiting on a retrieval
#[derive(Debug)]
pub struct RetrievalRequest {
    pub ctx: RequestContext,
    reply: oneshot::Sender<RetrievalResult>,
}

impl RetrievalRequest {
    /// Hand the result to the waiting caller
    ///
    /// Returns false if the caller has stopped listening.
    pub fn deliver(self, result: RetrievalResult) -> bool {
        self.reply.send(result).is_ok()
    }
}

/// A retrieval handed to a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedRetrieval {
    pub pointer: BlockPointer,
    pub priority: Priority,
    pub insertion_order: u64,
}

impl From<HeapEntry> for AssignedRetrieval {
    fn from(entry: HeapEntry) -> Self {
        Self {
            pointer: entry.pointer,
            priority: entry.priority,
            insertion_order: entry.insertion_order,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Retrievals waiting for a worker
    pub queued: usize,
    /// Retrievals not yet finalized, queued or assigned
    pub pending: usize,
    /// Callers waiting across all pending retrievals
    pub requesters: usize,
}

struct Retrieval {
    priority: Priority,
    requests: Vec<RetrievalRequest>,
}

#[derive(Default)]
struct QueueState {
    // queued or assigned-but-not-finalized retrievals
    ptrs: HashMap<BlockPointer, Retrieval>,
    heap: RetrievalHeap,
    // never wraps in practice: ~584 years at 1 billion inserts/sec
    insertion_count: u64,
    shut_down: bool,
}

type WorkerSlot = oneshot::Sender<AssignedRetrieval>;

enum Dispatch {
    Assigned(AssignedRetrieval),
    /// The heap was empty; the idle slot is handed back
    Empty(WorkerSlot),
    WorkerGone,
}

struct Shared {
    state: Mutex<QueueState>,
    worker_tx: mpsc::Sender<WorkerSlot>,
    worker_rx: tokio::sync::Mutex<mpsc::Receiver<WorkerSlot>>,
    shutdown: CancellationToken,
}

impl Shared {
    /// Wait for one idle worker and give it the best pending retrieval
    async fn dispatch(self: Arc<Self>) {
        loop {
            let slot = {
                let mut workers = self.worker_rx.lock().await;
                tokio::select! {
                    slot = workers.recv() => slot,
                    _ = self.shutdown.cancelled() => None,
                }
            };
            let Some(slot) = slot else {
                return;
            };

            match self.assign(slot) {
                Dispatch::Assigned(assignment) => {
                    trace!(
                        pointer = %assignment.pointer,
                        priority = %assignment.priority,
                        "Assigned retrieval to worker"
                    );
                    return;
                }
                Dispatch::Empty(slot) => {
                    if self.worker_tx.try_send(slot).is_err() {
                        debug!("Worker queue full; idle worker slot dropped");
                    }
                    return;
                }
                // The worker stopped waiting; this notification still owes
                // the heap one assignment.
                Dispatch::WorkerGone => continue,
            }
        }
    }

    fn assign(&self, slot: WorkerSlot) -> Dispatch {
        if slot.is_closed() {
            return Dispatch::WorkerGone;
        }
        let mut state = self.state.lock();
        let Some(entry) = state.heap.pop() else {
            return Dispatch::Empty(slot);
        };
        let assignment = AssignedRetrieval::from(entry);
        match slot.send(assignment) {
            Ok(()) => Dispatch::Assigned(assignment),
            Err(_) => {
                state.heap.push(entry);
                Dispatch::WorkerGone
            }
        }
    }
}

/// Coalescing priority queue of block retrievals
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct BlockRetrievalQueue {
    shared: Arc<Shared>,
}

impl BlockRetrievalQueue {
    /// Create a queue that buffers up to `num_workers` idle workers
    pub fn new(num_workers: usize) -> Self {
        let (worker_tx, worker_rx) = mpsc::channel(num_workers.max(1));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                worker_tx,
                worker_rx: tokio::sync::Mutex::new(worker_rx),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.workers)
    }

    /// Request the block at `pointer`
    ///
    /// Returns immediately with a receiver for the result. Concurrent
    /// requests for a pointer that is still pending share one retrieval,
    /// which takes the highest priority any of them asked for. Must be
    /// called from within a Tokio runtime.
    pub fn request(
        &self,
        ctx: RequestContext,
        priority: Priority,
        pointer: BlockPointer,
    ) -> oneshot::Receiver<RetrievalResult> {
        let (reply, rx) = oneshot::channel();

        let mut guard = self.shared.state.lock();
        if guard.shut_down {
            drop(guard);
            let _ = reply.send(Err(RetrievalError::Shutdown));
            return rx;
        }

        let state = &mut *guard;
        let mut created = false;
        let retrieval = state.ptrs.entry(pointer).or_insert_with(|| {
            created = true;
            let insertion_order = state.insertion_count;
            state.insertion_count += 1;
            state.heap.push(HeapEntry {
                pointer,
                priority,
                insertion_order,
            });
            Retrieval {
                priority,
                requests: Vec::new(),
            }
        });

        retrieval.requests.push(RetrievalRequest { ctx, reply });
        let requesters = retrieval.requests.len();
        if priority > retrieval.priority {
            retrieval.priority = priority;
            // Already-assigned retrievals are no longer in the heap
            state.heap.raise_priority(&pointer, priority);
        }
        drop(guard);

        if created {
            self.notify_worker();
        }
        debug!(
            pointer = %pointer,
            priority = %priority,
            requesters,
            coalesced = !created,
            "Queued block retrieval request"
        );
        rx
    }

    /// Request the block at `pointer` and wait for the result
    pub async fn get(
        &self,
        ctx: RequestContext,
        priority: Priority,
        pointer: BlockPointer,
    ) -> RetrievalResult {
        self.request(ctx, priority, pointer)
            .await
            .unwrap_or(Err(RetrievalError::Dropped))
    }

    fn notify_worker(&self) {
        tokio::spawn(Arc::clone(&self.shared).dispatch());
    }

    /// Register as an idle worker
    ///
    /// The returned receiver yields the next retrieval this worker must
    /// handle. Waits only while the idle-worker queue is full.
    pub async fn work_on_request(&self) -> oneshot::Receiver<AssignedRetrieval> {
        let (slot, rx) = oneshot::channel();
        // The receiving half lives as long as the queue, so this only fails
        // if the queue itself is gone; the worker then sees a closed slot.
        let _ = self.shared.worker_tx.send(slot).await;
        rx
    }

    /// Stop accepting requesters for `pointer` and take the ones waiting
    ///
    /// Must be called by the worker that was assigned the retrieval before
    /// it delivers results. Requests arriving afterwards start a new
    /// retrieval.
    pub fn finalize_request(&self, pointer: BlockPointer) -> Vec<RetrievalRequest> {
        let mut state = self.shared.state.lock();
        state.heap.remove(&pointer);
        state
            .ptrs
            .remove(&pointer)
            .map(|retrieval| retrieval.requests)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock();
        QueueStats {
            queued: state.heap.len(),
            pending: state.ptrs.len(),
            requesters: state.ptrs.values().map(|r| r.requests.len()).sum(),
        }
    }

    /// Fail every pending request and stop dispatching
    ///
    /// Requests made after shutdown fail immediately.
    pub fn shutdown(&self) {
        let pending: Vec<Retrieval> = {
            let mut state = self.shared.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.heap = RetrievalHeap::new();
            state.ptrs.drain().map(|(_, retrieval)| retrieval).collect()
        };
        self.shared.shutdown.cancel();

        let mut failed = 0usize;
        for retrieval in pending {
            for request in retrieval.requests {
                request.deliver(Err(RetrievalError::Shutdown));
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, "Block retrieval queue shut down with pending requests");
        }
        info!("Block retrieval queue shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Token cancelled when the queue shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }
}
