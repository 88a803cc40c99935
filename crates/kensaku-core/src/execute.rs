use futures_util::StreamExt as _;

use crate::{QueryDescriptor, QueryExecutionError, Response, Transport, response::merge_sorted};

/// Run `query` to completion and collect all of its entries.
///
/// Pages are concatenated in arrival order, or merged by term then key when pagination sort was
/// requested. The returned continuation is only set when `max_results` stopped the fetch early.
pub async fn execute<T: Transport>(
    transport: &T,
    query: &QueryDescriptor,
) -> Result<Response, QueryExecutionError<T::Error>> {
    let sorted = query.pagination_sort() == Some(true);
    let mut pages = transport.submit(query);
    let mut entries = Vec::new();
    let mut continuation = None;
    let mut page = 0;
    while let Some(batch) = pages.next().await {
        let batch = match batch {
            Ok(batch) => batch,
            Err(source) => {
                tracing::warn!(
                    page,
                    received = entries.len(),
                    error = %source,
                    "2i query failed",
                );
                return Err(QueryExecutionError {
                    partial: Response::new(entries, continuation),
                    source,
                });
            }
        };
        tracing::debug!(page, entries = batch.len(), more = batch.has_more(), "received 2i page");
        continuation = batch.continuation;
        entries = if sorted {
            merge_sorted(entries, batch.entries)
        } else {
            let mut entries = entries;
            entries.extend(batch.entries);
            entries
        };
        page += 1;
    }
    Ok(Response::new(entries, continuation))
}
