mod client;
pub use client::{Client, ClientBuilder, DEFAULT_PREFETCH_BATCHES};

mod encoding;
pub use encoding::EncodedQuery;

mod errors;
pub use errors::{ClientError, InvalidQuery, QueryExecutionError, StreamError};

mod execute;
pub use execute::execute;

mod index;
pub use index::{BUCKET_INDEX, IndexId, IndexKind, IndexValue, KEY_INDEX};

mod namespace;
pub use namespace::{DEFAULT_BUCKET_TYPE, Location, Namespace};

mod query;
pub use query::{Match, QueryBuilder, QueryDescriptor, QueryShape};

mod response;
pub use response::{Continuation, Entry, Response, ResponseBatch};

pub mod streaming;
pub use streaming::{BridgeState, Entries, Interrupter, StreamingCompletion, StreamingResponse};

pub mod transport;
pub use transport::Transport;

#[cfg(test)]
mod tests;
