use std::sync::Arc;

use futures_util::StreamExt as _;

use crate::{QueryDescriptor, Transport, streaming::relay::Relay};

/// Pumps the pages of `query` into `relay`, never holding more than the relay allows.
pub(crate) async fn produce<T: Transport>(
    transport: T,
    query: QueryDescriptor,
    relay: Arc<Relay<T::Error>>,
) {
    let mut pages = transport.submit(&query);
    let mut page = 0;
    loop {
        if !relay.wait_for_room().await || !relay.fetching(page) {
            return;
        }
        match pages.next().await {
            None => {
                tracing::debug!(pages = page, "2i stream exhausted");
                relay.exhaust();
                return;
            }
            Some(Err(error)) => {
                tracing::warn!(page, %error, "2i stream failed");
                relay.fail(error);
                return;
            }
            Some(Ok(batch)) => {
                tracing::debug!(
                    page,
                    entries = batch.len(),
                    more = batch.has_more(),
                    "received 2i page",
                );
                if !relay.deliver(page, batch) {
                    return;
                }
            }
        }
        page += 1;
    }
}

/// Reports the producer as stopped when dropped, whether it finished, was aborted, or was torn
/// down with its runtime.
pub(crate) struct StopGuard<E>(pub(crate) Arc<Relay<E>>);

impl<E> Drop for StopGuard<E> {
    fn drop(&mut self) {
        self.0.producer_stopped();
    }
}
