use std::{collections::VecDeque, sync::Arc, vec};

use futures_util::future::AbortHandle;
use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::{Continuation, Entry, ResponseBatch, StreamError, streaming::BridgeState};

/// Bounded hand-off between the producer task and the consuming thread.
///
/// All shared state lives behind `state`. The consumer and completion waiters block on
/// `readable`; the producer waits for room on `writable`. No lock is ever held across an await
/// point.
pub(crate) struct Relay<E> {
    state: Mutex<RelayState<E>>,
    readable: Condvar,
    writable: Notify,
    abort: AbortHandle,
}

struct RelayState<E> {
    bridge: BridgeState,
    capacity: usize,
    batches: VecDeque<Vec<Entry>>,
    current: vec::IntoIter<Entry>,
    continuation: Option<Continuation>,
    error: Option<Arc<E>>,
    // Consumer-side bookkeeping
    iterating: bool,
    interrupted: bool,
    terminal_reported: bool,
    drained: bool,
    // Completion-side bookkeeping
    draining: bool,
    awaited: bool,
    producer_stopped: bool,
    released: bool,
}

impl<E> RelayState<E> {
    fn has_room(&self) -> bool {
        self.draining || self.batches.len() < self.capacity
    }

    /// Drop every buffered entry, once.
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.batches = VecDeque::new();
            self.current = Vec::new().into_iter();
            tracing::debug!(state = %self.bridge, "released relay buffer");
        }
    }
}

impl<E> Relay<E> {
    pub(crate) fn new(capacity: usize, abort: AbortHandle) -> Self {
        debug_assert!(capacity > 0);
        Self {
            state: Mutex::new(RelayState {
                bridge: BridgeState::Idle,
                capacity,
                batches: VecDeque::with_capacity(capacity),
                current: Vec::new().into_iter(),
                continuation: None,
                error: None,
                iterating: false,
                interrupted: false,
                terminal_reported: false,
                drained: false,
                draining: false,
                awaited: false,
                producer_stopped: false,
                released: false,
            }),
            readable: Condvar::new(),
            writable: Notify::new(),
            abort,
        }
    }

    pub(crate) fn state(&self) -> BridgeState {
        self.state.lock().bridge
    }

    // Producer side

    /// Resolves once another batch may be requested. Returns `false` if the bridge has already
    /// terminated.
    pub(crate) async fn wait_for_room(&self) -> bool {
        loop {
            let notified = self.writable.notified();
            {
                let s = self.state.lock();
                if s.bridge.is_terminal() {
                    return false;
                }
                if s.has_room() {
                    return true;
                }
            }
            notified.await;
        }
    }

    pub(crate) fn fetching(&self, page: usize) -> bool {
        let mut s = self.state.lock();
        if s.bridge.is_terminal() {
            return false;
        }
        s.bridge = BridgeState::Fetching { page };
        true
    }

    pub(crate) fn deliver(&self, page: usize, batch: ResponseBatch) -> bool {
        let mut s = self.state.lock();
        if s.bridge.is_terminal() {
            return false;
        }
        s.bridge = BridgeState::Delivering { page };
        s.continuation = batch.continuation;
        if !batch.entries.is_empty() {
            s.batches.push_back(batch.entries);
        }
        drop(s);
        self.readable.notify_all();
        true
    }

    pub(crate) fn exhaust(&self) {
        let mut s = self.state.lock();
        if s.bridge.is_terminal() {
            return;
        }
        s.bridge = BridgeState::Exhausted;
        drop(s);
        self.readable.notify_all();
    }

    pub(crate) fn fail(&self, error: E) {
        let mut s = self.state.lock();
        if s.bridge.is_terminal() {
            return;
        }
        s.bridge = BridgeState::Failed;
        s.error = Some(Arc::new(error));
        drop(s);
        self.readable.notify_all();
    }

    /// Called exactly once, when the producer task is gone for whatever reason.
    pub(crate) fn producer_stopped(&self) {
        let mut s = self.state.lock();
        s.producer_stopped = true;
        if !s.bridge.is_terminal() {
            // Aborted, or dropped along with its runtime
            s.bridge = BridgeState::Cancelled;
            s.release();
        }
        drop(s);
        self.readable.notify_all();
    }

    // Consumer side

    /// Flip the one-shot consumption flag. Returns `false` if it was already flipped.
    pub(crate) fn begin_iteration(&self) -> bool {
        !std::mem::replace(&mut self.state.lock().iterating, true)
    }

    /// Blocks until an entry is available or the stream has ended.
    pub(crate) fn next_entry(&self) -> Option<Result<Entry, StreamError<E>>> {
        let mut s = self.state.lock();
        loop {
            if s.interrupted {
                return Some(Err(StreamError::Interrupted));
            }
            if let Some(entry) = s.current.next() {
                return Some(Ok(entry));
            }
            if let Some(batch) = s.batches.pop_front() {
                s.current = batch.into_iter();
                self.writable.notify_one();
                continue;
            }
            let bridge = s.bridge;
            match bridge {
                BridgeState::Exhausted => {
                    s.drained = true;
                    s.release();
                    return None;
                }
                BridgeState::Failed | BridgeState::Cancelled if s.terminal_reported => {
                    return None;
                }
                BridgeState::Failed => {
                    s.terminal_reported = true;
                    s.release();
                    let error = s.error.clone()?;
                    return Some(Err(StreamError::Transport(error)));
                }
                BridgeState::Cancelled => {
                    s.terminal_reported = true;
                    return Some(Err(StreamError::Cancelled));
                }
                BridgeState::Idle
                | BridgeState::Fetching { .. }
                | BridgeState::Delivering { .. } => self.readable.wait(&mut s),
            }
        }
    }

    pub(crate) fn continuation(&self) -> Result<Option<Continuation>, StreamError<E>> {
        let s = self.state.lock();
        match s.bridge {
            BridgeState::Exhausted if s.drained || s.awaited => Ok(s.continuation.clone()),
            state => Err(StreamError::PrematureContinuationAccess { state }),
        }
    }

    // Cancellation

    /// Stop the query. Returns `false` if it had already terminated, in which case whatever is
    /// still buffered stays available to the consumer.
    pub(crate) fn cancel(&self) -> bool {
        let mut s = self.state.lock();
        if s.bridge.is_terminal() {
            return false;
        }
        s.bridge = BridgeState::Cancelled;
        s.release();
        drop(s);
        self.abort.abort();
        self.writable.notify_one();
        self.readable.notify_all();
        tracing::debug!("cancelled 2i stream");
        true
    }

    /// Cancel, and drop the buffer even if the query had ended. For when nothing can read it
    /// anymore.
    pub(crate) fn discard(&self) {
        if !self.cancel() {
            self.state.lock().release();
        }
    }

    pub(crate) fn interrupt(&self) {
        let mut s = self.state.lock();
        if s.interrupted {
            return;
        }
        s.interrupted = true;
        drop(s);
        tracing::debug!("interrupted 2i stream consumer");
        self.discard();
    }

    // Completion side

    /// Blocks until the producer task is gone. Lifts backpressure meanwhile so that a caller that
    /// never iterates cannot deadlock.
    pub(crate) fn wait(&self) -> Result<Option<Continuation>, StreamError<E>> {
        let mut s = self.state.lock();
        if !s.draining {
            s.draining = true;
            self.writable.notify_one();
        }
        while !s.producer_stopped {
            self.readable.wait(&mut s);
        }
        let bridge = s.bridge;
        match bridge {
            BridgeState::Exhausted => {
                s.awaited = true;
                Ok(s.continuation.clone())
            }
            BridgeState::Failed => match s.error.clone() {
                Some(e) => Err(StreamError::Transport(e)),
                None => Err(StreamError::Cancelled),
            },
            _ => Err(StreamError::Cancelled),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state.lock().producer_stopped
    }
}
