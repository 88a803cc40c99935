//! Consuming a 2i query while its later pages are still being fetched.
//!
//! A producer task, spawned on the client's tokio runtime, pulls pages from the transport and
//! pushes them into a bounded relay. The caller's thread pulls entries back out of that relay
//! through a plain blocking [`Iterator`].
//!
//! ```text
//! Idle -> Fetching(i) -> Delivering(i) -> Fetching(i + 1) | Exhausted | Failed
//!   \______________________ any of these ________________________/ -> Cancelled
//! ```
//!
//! The blocking calls ([`Entries::next`], [`StreamingCompletion::wait`]) must not be made from
//! inside an async task running on the same runtime.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use tracing::Instrument as _;

use crate::{Continuation, Entry, InvalidQuery, QueryDescriptor, StreamError, Transport};

mod producer;
mod relay;

use producer::{StopGuard, produce};
use relay::Relay;

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum BridgeState {
    #[display("idle")]
    Idle,
    #[display("fetching page {page}")]
    Fetching { page: usize },
    #[display("delivering page {page}")]
    Delivering { page: usize },
    #[display("exhausted")]
    Exhausted,
    #[display("failed")]
    Failed,
    #[display("cancelled")]
    Cancelled,
}

impl BridgeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BridgeState::Exhausted | BridgeState::Failed | BridgeState::Cancelled
        )
    }
}

/// Submit `query` and start relaying its pages, buffering at most `prefetch` of them ahead of
/// the consumer.
pub(crate) fn start<T: Transport>(
    runtime: &tokio::runtime::Handle,
    transport: T,
    query: &QueryDescriptor,
    prefetch: usize,
) -> Result<(StreamingResponse<T::Error>, StreamingCompletion<T::Error>), InvalidQuery> {
    if prefetch == 0 {
        return Err(InvalidQuery::ZeroPrefetch);
    }
    let (abort, registration) = AbortHandle::new_pair();
    let relay = Arc::new(Relay::new(prefetch, abort));
    let span = tracing::debug_span!(
        "2i_stream",
        namespace = %query.namespace(),
        index = %query.index(),
        prefetch,
    );
    let guard = StopGuard(relay.clone());
    let producer = Abortable::new(produce(transport, query.clone(), relay.clone()), registration);
    runtime.spawn(
        async move {
            let _guard = guard;
            if producer.await.is_err() {
                tracing::debug!("2i stream producer aborted");
            }
        }
        .instrument(span),
    );
    Ok((
        StreamingResponse {
            relay: relay.clone(),
        },
        StreamingCompletion { relay },
    ))
}

/// The entries of a streaming query, available as soon as their page arrives.
///
/// Can be iterated only once. Dropping it cancels the query if it is still running.
pub struct StreamingResponse<E> {
    relay: Arc<Relay<E>>,
}

impl<E> StreamingResponse<E> {
    /// Start consuming the entries. Fails with [`StreamError::AlreadyConsumed`] on second call.
    pub fn iter(&self) -> Result<Entries<'_, E>, StreamError<E>> {
        if !self.relay.begin_iteration() {
            return Err(StreamError::AlreadyConsumed);
        }
        Ok(Entries {
            relay: &self.relay,
            done: false,
        })
    }

    /// Handle that makes a consumer blocked in [`Entries::next`] give up, from any thread.
    pub fn interrupter(&self) -> Interrupter<E> {
        Interrupter {
            relay: self.relay.clone(),
        }
    }

    /// The continuation of the last page, once the query has ended naturally and either the
    /// iteration reached its end or the completion was awaited.
    pub fn continuation(&self) -> Result<Option<Continuation>, StreamError<E>> {
        self.relay.continuation()
    }

    pub fn state(&self) -> BridgeState {
        self.relay.state()
    }
}

impl<E> Drop for StreamingResponse<E> {
    fn drop(&mut self) {
        self.relay.discard();
    }
}

/// Blocking iterator over the entries of a [`StreamingResponse`].
///
/// Yields entries in page arrival order. A transport failure or a cancellation is yielded once
/// as an error, then the iterator ends. An interruption is yielded on every later call.
pub struct Entries<'r, E> {
    relay: &'r Relay<E>,
    done: bool,
}

impl<E> Iterator for Entries<'_, E> {
    type Item = Result<Entry, StreamError<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.relay.next_entry();
        if next.is_none() {
            self.done = true;
        }
        next
    }
}

impl<E> Drop for Entries<'_, E> {
    fn drop(&mut self) {
        if !self.done {
            // Abandoned before the end
            self.relay.discard();
        }
    }
}

pub struct Interrupter<E> {
    relay: Arc<Relay<E>>,
}

impl<E> Clone for Interrupter<E> {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
        }
    }
}

impl<E> Interrupter<E> {
    /// Makes the current and every later [`Entries::next`] call fail with
    /// [`StreamError::Interrupted`], and cancels the query.
    pub fn interrupt(&self) {
        self.relay.interrupt();
    }
}

/// Tracks the background fetching of a streaming query, independently from its consumption.
pub struct StreamingCompletion<E> {
    relay: Arc<Relay<E>>,
}

impl<E> StreamingCompletion<E> {
    /// Blocks until no more page will be fetched, and returns the final continuation.
    ///
    /// Entries that have not been consumed yet stay available to [`StreamingResponse::iter`];
    /// backpressure is lifted while waiting.
    pub fn wait(&self) -> Result<Option<Continuation>, StreamError<E>> {
        self.relay.wait()
    }

    /// Stop fetching and drop everything buffered. Returns `false`, leaving the buffered entries
    /// in place, if the query had already terminated.
    pub fn abort(&self) -> bool {
        self.relay.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.relay.is_finished()
    }

    pub fn state(&self) -> BridgeState {
        self.relay.state()
    }
}
