use blockfs::retrieval::{BlockRetrievalQueue, RequestContext, WorkerPool};
use blockfs::store::MemoryBlockStore;
use blockfs::{BlockPointer, Priority, RetrievalError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn coalesced_requests_share_one_fetch() {
    let store = Arc::new(MemoryBlockStore::with_latency(Duration::from_millis(20)));
    let pointer = store.put(b"shared block");
    let queue = BlockRetrievalQueue::new(4);

    // Issued before the runtime gets a chance to dispatch, so all coalesce
    let receivers: Vec<_> = (0..10)
        .map(|i| queue.request(RequestContext::new(), Priority(i), pointer))
        .collect();
    assert_eq!(queue.stats().pending, 1);
    assert_eq!(queue.stats().requesters, 10);

    let pool = WorkerPool::start(queue.clone(), store.clone(), 4);
    for rx in receivers {
        let block = timeout(WAIT, rx).await.unwrap().unwrap().unwrap();
        assert_eq!(&*block.data, b"shared block");
    }
    assert_eq!(store.fetch_count(), 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn low_and_high_priority_requests_both_complete() {
    let store = Arc::new(MemoryBlockStore::new());
    let pointer = store.put(b"contents");
    let queue = BlockRetrievalQueue::new(1);

    let low = queue.request(RequestContext::new(), Priority(1), pointer);
    let high = queue.request(RequestContext::new(), Priority(5), pointer);
    assert_eq!(queue.stats().pending, 1);

    let pool = WorkerPool::start(queue.clone(), store.clone(), 1);
    assert!(timeout(WAIT, low).await.unwrap().unwrap().is_ok());
    assert!(timeout(WAIT, high).await.unwrap().unwrap().is_ok());
    assert_eq!(store.fetch_count(), 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn fetch_errors_reach_every_requester() {
    let store = Arc::new(MemoryBlockStore::new());
    let missing = BlockPointer::from_content(b"never stored");
    let queue = BlockRetrievalQueue::new(2);

    let first = queue.request(RequestContext::new(), Priority::ON_DEMAND, missing);
    let second = queue.request(RequestContext::new(), Priority::PREFETCH, missing);
    let pool = WorkerPool::start(queue.clone(), store, 2);

    for rx in [first, second] {
        let result = timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(result, Err(RetrievalError::NotFound(missing)));
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn dropped_requester_does_not_block_others() {
    let store = Arc::new(MemoryBlockStore::new());
    let pointer = store.put(b"data");
    let queue = BlockRetrievalQueue::new(1);

    let abandoned = queue.request(RequestContext::new(), Priority(1), pointer);
    let kept = queue.request(RequestContext::new(), Priority(1), pointer);
    drop(abandoned);

    let pool = WorkerPool::start(queue.clone(), store, 1);
    assert!(timeout(WAIT, kept).await.unwrap().unwrap().is_ok());
    pool.shutdown().await;
}

#[tokio::test]
async fn cancelled_requester_alone_cancels_fetch() {
    let store = Arc::new(MemoryBlockStore::with_latency(Duration::from_secs(60)));
    let pointer = store.put(b"slow");
    let queue = BlockRetrievalQueue::new(1);
    let pool = WorkerPool::start(queue.clone(), store, 1);

    let ctx = RequestContext::new();
    let rx = queue.request(ctx.clone(), Priority(1), pointer);
    ctx.cancel();

    let result = timeout(WAIT, rx).await.unwrap().unwrap();
    assert_eq!(result, Err(RetrievalError::Cancelled));
    pool.shutdown().await;
}

#[tokio::test]
async fn many_distinct_blocks_all_delivered() {
    let store = Arc::new(MemoryBlockStore::with_latency(Duration::from_millis(1)));
    let pointers: Vec<BlockPointer> = (0..50u32).map(|i| store.put(i.to_le_bytes())).collect();
    let queue = BlockRetrievalQueue::new(8);
    let pool = WorkerPool::start(queue.clone(), store.clone(), 8);

    let receivers: Vec<_> = pointers
        .iter()
        .enumerate()
        .map(|(i, p)| queue.request(RequestContext::new(), Priority((i % 3) as i32), *p))
        .collect();

    for (rx, pointer) in receivers.into_iter().zip(&pointers) {
        let block = timeout(WAIT, rx).await.unwrap().unwrap().unwrap();
        assert_eq!(block.pointer, *pointer);
    }
    assert_eq!(store.fetch_count(), 50);
    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_fails_queued_requests() {
    let store = Arc::new(MemoryBlockStore::new());
    let pointer = store.put(b"data");
    let queue = BlockRetrievalQueue::new(1);

    let rx = queue.request(RequestContext::new(), Priority(1), pointer);
    queue.shutdown();
    assert_eq!(rx.await.unwrap(), Err(RetrievalError::Shutdown));

    let pool = WorkerPool::start(queue.clone(), store.clone(), 1);
    pool.shutdown().await;
    assert_eq!(store.fetch_count(), 0);
}
