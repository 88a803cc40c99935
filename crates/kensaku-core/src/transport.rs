use std::num::NonZeroU32;

use crate::{QueryDescriptor, ResponseBatch};

/// The connection to the store, as far as 2i queries are concerned.
///
/// Implementations handle wire encoding, node selection, pooling and retries. Transports are
/// expected to be cheap handles: every in-flight query holds its own clone.
pub trait Transport: 'static + Clone + Send + Sync {
    type Error: 'static + Send + Sync + std::error::Error;

    /// Fetch the single page `query` designates, starting at its continuation if any.
    fn fetch_page(
        &self,
        query: &QueryDescriptor,
    ) -> waaa::BoxFuture<'static, Result<ResponseBatch, Self::Error>>;

    /// Submit `query` and receive all its pages, in fetch order.
    ///
    /// The stream ends after the last page, or right after yielding an error. Dropping it cancels
    /// the query. The default implementation chains [`Transport::fetch_page`] calls.
    fn submit(
        &self,
        query: &QueryDescriptor,
    ) -> waaa::BoxStream<'static, Result<ResponseBatch, Self::Error>> {
        paginate(self.clone(), query.clone())
    }
}

/// Chains page requests, feeding each page's continuation into the next request.
///
/// The next request is only sent when the stream is polled again. With `max_results`, every
/// request only asks for what is still missing and the chain stops once that reaches zero.
pub fn paginate<T: Transport>(
    transport: T,
    query: QueryDescriptor,
) -> waaa::BoxStream<'static, Result<ResponseBatch, T::Error>> {
    Box::pin(async_stream::stream! {
        let mut remaining = query.max_results().map(NonZeroU32::get);
        let mut page = query;
        loop {
            let batch = match transport.fetch_page(&page).await {
                Ok(batch) => batch,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };
            if let Some(r) = remaining.as_mut() {
                *r = r.saturating_sub(u32::try_from(batch.len()).unwrap_or(u32::MAX));
            }
            let next = match (&batch.continuation, remaining) {
                (_, Some(0)) | (None, _) => None,
                (Some(c), _) => {
                    let max_results = remaining.and_then(NonZeroU32::new);
                    Some(page.next_page(c.clone(), max_results))
                }
            };
            yield Ok(batch);
            match next {
                Some(next) => page = next,
                None => break,
            }
        }
    })
}
