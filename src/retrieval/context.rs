//! Per-request cancellation context

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline carried by one retrieval request
///
/// The queue never inspects it; it is handed to the [`BlockGetter`] doing
/// the fetch.
///
/// [`BlockGetter`]: crate::retrieval::BlockGetter
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Context for a fetch shared by several requesters
///
/// Cancelled only once every requester's context is cancelled. The deadline
/// is the latest of the requesters' deadlines, or none if any requester has
/// no deadline. Dropping it stops the background watcher.
pub(crate) struct CoalescedContext {
    context: RequestContext,
    watcher: Option<JoinHandle<()>>,
}

impl CoalescedContext {
    pub(crate) fn new<'a>(contexts: impl IntoIterator<Item = &'a RequestContext>) -> Self {
        let contexts: Vec<&RequestContext> = contexts.into_iter().collect();

        let deadline = contexts
            .iter()
            .map(|ctx| ctx.deadline)
            .try_fold(None::<Instant>, |latest, deadline| {
                deadline.map(|d| Some(latest.map_or(d, |l| l.max(d))))
            })
            .flatten();

        let token = CancellationToken::new();
        let watcher = if contexts.is_empty() {
            None
        } else if contexts.iter().all(|ctx| ctx.is_cancelled()) {
            token.cancel();
            None
        } else {
            let tokens: Vec<CancellationToken> =
                contexts.iter().map(|ctx| ctx.token.clone()).collect();
            let merged = token.clone();
            Some(tokio::spawn(async move {
                join_all(tokens.iter().map(|t| t.cancelled())).await;
                merged.cancel();
            }))
        };

        Self {
            context: RequestContext { token, deadline },
            watcher,
        }
    }

    pub(crate) fn context(&self) -> &RequestContext {
        &self.context
    }
}

impl Drop for CoalescedContext {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}
