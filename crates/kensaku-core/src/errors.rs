use std::sync::Arc;

use crate::{IndexKind, Response, streaming::BridgeState};

/// A query that can never be sent, detected while building it.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvalidQuery {
    #[error("bucket name must not be empty")]
    EmptyBucket,

    #[error("bucket type must not be empty")]
    EmptyBucketType,

    #[error("index name must not be empty")]
    EmptyIndexName,

    #[error("range minimum is greater than its maximum")]
    InvertedRange,

    #[error("{index} holds {expected} terms but the query matches {got} terms")]
    ValueKindMismatch {
        index: String,
        expected: IndexKind,
        got: IndexKind,
    },

    #[error("the $bucket index only matches the name of the queried bucket")]
    ForeignBucketValue,

    #[error("term filters only apply to range queries over binary indexes")]
    TermFilterNotAllowed,

    #[error("max results must be positive")]
    ZeroMaxResults,

    #[error("a query without match value needs a coverage context")]
    MissingMatch,

    #[error("streaming needs room for at least one batch")]
    ZeroPrefetch,
}

/// A materialized query failed on the transport side.
///
/// `partial` holds everything that had been received before the failure, for diagnostics only.
#[derive(Debug, thiserror::Error)]
#[error("2i query failed after {} entries", .partial.entries().len())]
pub struct QueryExecutionError<E> {
    pub partial: Response,

    #[source]
    pub source: E,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError<E> {
    #[error("streaming query was interrupted while waiting for results")]
    Interrupted,

    #[error("streaming response can only be iterated once")]
    AlreadyConsumed,

    #[error("continuation is only known once the stream has ended, currently {state}")]
    PrematureContinuationAccess { state: BridgeState },

    #[error("streaming query was cancelled")]
    Cancelled,

    #[error("2i query failed while streaming")]
    Transport(#[source] Arc<E>),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no tokio runtime was configured nor is one running")]
    NoRuntime,

    #[error("default prefetch must hold at least one batch")]
    ZeroPrefetch,
}
