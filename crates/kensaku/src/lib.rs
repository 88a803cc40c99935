//! Secondary-index (2i) queries against a distributed key-value store.
//!
//! Build a [`QueryDescriptor`], then run it through a [`Client`] wrapping your [`Transport`]:
//! either materialized with [`Client::execute`], or streamed with [`Client::execute_streaming`]
//! and consumed from a blocking iterator.

pub use kensaku_core::*;

#[cfg(feature = "memdb")]
pub use kensaku_memdb as memdb;
