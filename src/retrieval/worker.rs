//! Retrieval workers
//!
//! Each worker loops over the hand-off protocol: register as idle, wait for
//! an assignment, finalize it, fetch the block once and fan the result out
//! to every requester of the retrieval.

use super::context::CoalescedContext;
use super::queue::{AssignedRetrieval, BlockRetrievalQueue};
use super::{BlockGetter, RequestContext, RetrievalResult};
use crate::error::RetrievalError;
use crate::types::BlockPointer;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Fixed set of workers serving one queue
pub struct WorkerPool {
    queue: BlockRetrievalQueue,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` workers fetching through `getter`
    pub fn start(
        queue: BlockRetrievalQueue,
        getter: Arc<dyn BlockGetter>,
        workers: usize,
    ) -> Self {
        let handles = (0..workers)
            .map(|worker_id| {
                let queue = queue.clone();
                let getter = Arc::clone(&getter);
                tokio::spawn(async move {
                    worker_loop(worker_id, queue, getter).await;
                })
            })
            .collect::<Vec<_>>();

        info!(worker_count = handles.len(), "Started block retrieval workers");
        Self { queue, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn queue(&self) -> &BlockRetrievalQueue {
        &self.queue
    }

    /// Shut the queue down and wait for every worker to exit
    ///
    /// Workers finish the fetch they are running before exiting.
    pub async fn shutdown(self) {
        self.queue.shutdown();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Block retrieval worker panicked");
            }
        }
        info!("Stopped block retrieval workers");
    }
}

async fn worker_loop(worker_id: usize, queue: BlockRetrievalQueue, getter: Arc<dyn BlockGetter>) {
    debug!(worker_id, "Worker started");
    let shutdown = queue.shutdown_token();

    loop {
        let slot = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            slot = queue.work_on_request() => slot,
        };

        let assignment = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            assignment = slot => match assignment {
                Ok(assignment) => assignment,
                // Dispatcher handed the slot back and it was dropped
                Err(_) => continue,
            },
        };

        process_retrieval(worker_id, &queue, getter.as_ref(), assignment).await;
    }

    debug!(worker_id, "Worker stopped");
}

/// Run one assigned retrieval to completion
pub(crate) async fn process_retrieval(
    worker_id: usize,
    queue: &BlockRetrievalQueue,
    getter: &dyn BlockGetter,
    assignment: AssignedRetrieval,
) {
    let pointer = assignment.pointer;
    let requests = queue.finalize_request(pointer);
    if requests.is_empty() {
        debug!(worker_id, pointer = %pointer, "Retrieval already finalized; skipping");
        return;
    }

    let start = Instant::now();
    let result = {
        let coalesced = CoalescedContext::new(requests.iter().map(|r| &r.ctx));
        fetch(getter, coalesced.context(), &pointer).await
    };

    match &result {
        Ok(block) => debug!(
            worker_id,
            pointer = %pointer,
            bytes = block.len(),
            requesters = requests.len(),
            duration_ms = start.elapsed().as_millis(),
            "Block retrieval completed"
        ),
        Err(e) => warn!(
            worker_id,
            pointer = %pointer,
            error = %e,
            requesters = requests.len(),
            "Block retrieval failed"
        ),
    }

    for request in requests {
        if !request.deliver(result.clone()) {
            trace!(worker_id, pointer = %pointer, "Requester went away before delivery");
        }
    }
}

async fn fetch(
    getter: &dyn BlockGetter,
    ctx: &RequestContext,
    pointer: &BlockPointer,
) -> RetrievalResult {
    let deadline = async {
        match ctx.deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = getter.get_block(ctx, pointer) => result,
        _ = ctx.cancelled() => Err(RetrievalError::Cancelled),
        _ = deadline => Err(RetrievalError::DeadlineExceeded),
    }
}
