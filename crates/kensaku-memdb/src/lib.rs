use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_lock::RwLock;
use kensaku_core::{
    Continuation, Entry, IndexId, IndexValue, Location, Namespace, QueryDescriptor, ResponseBatch,
};

#[derive(Debug, thiserror::Error)]
pub enum MemError {
    #[error("Continuation was issued for a query of another shape")]
    ForeignContinuation,

    #[error("Continuation is not a memory database token")]
    MalformedContinuation,

    #[error("Injected failure on fetch {page}")]
    Injected { page: usize },
}

pub const DEFAULT_PAGE_SIZE: usize = 1000;

type Objects = BTreeMap<Vec<u8>, Vec<(IndexId, IndexValue)>>;

/// In-memory store answering 2i queries page by page.
///
/// Pages are cut server-side at `page_size` entries, and continuation tokens only resume queries
/// of the shape that issued them.
#[derive(Clone)]
pub struct MemTransport {
    inner: Arc<Inner>,
}

struct Inner {
    db: RwLock<BTreeMap<Namespace, Objects>>,
    page_size: usize,
    failing_at: Option<usize>,
    stalling_at: Option<usize>,
    fetches: AtomicUsize,
}

impl Default for MemTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemTransport {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemTransportBuilder {
        MemTransportBuilder {
            page_size: DEFAULT_PAGE_SIZE,
            failing_at: None,
            stalling_at: None,
        }
    }

    /// Store the object `key`, replacing its previous index entries.
    pub async fn put(
        &self,
        namespace: &Namespace,
        key: impl Into<Vec<u8>>,
        indexes: impl IntoIterator<Item = (IndexId, IndexValue)>,
    ) {
        let mut db = self.inner.db.write().await;
        db.entry(namespace.clone())
            .or_default()
            .insert(key.into(), indexes.into_iter().collect());
    }

    /// Returns whether the object existed.
    pub async fn delete(&self, namespace: &Namespace, key: &[u8]) -> bool {
        let mut db = self.inner.db.write().await;
        db.get_mut(namespace)
            .is_some_and(|objects| objects.remove(key).is_some())
    }

    /// Number of pages requested so far, failed and stalled ones included.
    pub fn fetches(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }
}

pub struct MemTransportBuilder {
    page_size: usize,
    failing_at: Option<usize>,
    stalling_at: Option<usize>,
}

impl MemTransportBuilder {
    /// Largest page the store answers with. Zero is treated as one.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make the `page`-th fetch, counted from zero across all queries, fail.
    pub fn failing_at(mut self, page: usize) -> Self {
        self.failing_at = Some(page);
        self
    }

    /// Make the `page`-th fetch never answer.
    pub fn stalling_at(mut self, page: usize) -> Self {
        self.stalling_at = Some(page);
        self
    }

    pub fn build(self) -> MemTransport {
        MemTransport {
            inner: Arc::new(Inner {
                db: RwLock::new(BTreeMap::new()),
                page_size: self.page_size,
                failing_at: self.failing_at,
                stalling_at: self.stalling_at,
                fetches: AtomicUsize::new(0),
            }),
        }
    }
}

impl kensaku_core::Transport for MemTransport {
    type Error = MemError;

    fn fetch_page(
        &self,
        query: &QueryDescriptor,
    ) -> waaa::BoxFuture<'static, Result<ResponseBatch, MemError>> {
        let page = self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        let query = query.clone();
        Box::pin(async move {
            if inner.failing_at == Some(page) {
                tracing::debug!(page, "injecting fetch failure");
                return Err(MemError::Injected { page });
            }
            if inner.stalling_at == Some(page) {
                tracing::debug!(page, "stalling fetch");
                return futures_util::future::pending().await;
            }
            let offset = match query.continuation() {
                None => 0,
                Some(c) => resume_offset(&query, c)?,
            };
            let db = inner.db.read().await;
            let matches = db
                .get(query.namespace())
                .map(|objects| matching(&query, objects))
                .unwrap_or_default();
            drop(db);

            let mut limit = inner.page_size;
            if let Some(max) = query.max_results() {
                limit = limit.min(usize::try_from(max.get()).unwrap_or(usize::MAX));
            }
            let end = offset.saturating_add(limit).min(matches.len());
            let start = offset.min(end);
            let continuation = (end < matches.len()).then(|| token(&query, end));
            let terms = query.includes_terms();
            let entries = matches[start..end]
                .iter()
                .map(|(term, key)| {
                    Entry::new(
                        Location::new(query.namespace().clone(), key.clone()),
                        terms.then(|| term.clone()),
                    )
                })
                .collect::<Vec<_>>();
            tracing::debug!(
                index = %query.index(),
                offset = start,
                entries = entries.len(),
                total = matches.len(),
                "answered 2i page",
            );
            Ok(ResponseBatch::new(entries, continuation))
        })
    }
}

/// Every `(term, key)` pair the query selects, sorted by term then key.
fn matching(query: &QueryDescriptor, objects: &Objects) -> Vec<(IndexValue, Vec<u8>)> {
    let index = query.index();
    let mut res = Vec::new();
    for (key, indexes) in objects {
        if index.is_bucket() {
            // Coverage contexts are not modelled, any of them covers the whole bucket.
            let term = IndexValue::Binary(query.namespace().bucket().as_bytes().to_vec());
            res.push((term, key.clone()));
        } else if index.is_key() {
            res.push((IndexValue::Binary(key.clone()), key.clone()));
        } else {
            res.extend(
                indexes
                    .iter()
                    .filter(|(id, _)| id == index)
                    .map(|(_, term)| (term.clone(), key.clone())),
            );
        }
    }
    res.retain(|(term, _)| {
        query.matching().is_none_or(|m| m.contains(term))
            && query
                .term_filter()
                .is_none_or(|filter| term_contains(term, filter.as_bytes()))
    });
    res.sort();
    res.dedup();
    res
}

// Substring match, the store does not evaluate regular expressions.
fn term_contains(term: &IndexValue, needle: &[u8]) -> bool {
    match term.as_binary() {
        None => false,
        Some(_) if needle.is_empty() => true,
        Some(bytes) => bytes.windows(needle.len()).any(|w| w == needle),
    }
}

/// Token layout: encoded query shape, then the next offset as a big-endian `u64`.
fn token(query: &QueryDescriptor, offset: usize) -> Continuation {
    let mut bytes = query.shape().encode().into_bytes();
    bytes.extend_from_slice(&(offset as u64).to_be_bytes());
    Continuation::from_bytes(bytes)
}

fn resume_offset(query: &QueryDescriptor, continuation: &Continuation) -> Result<usize, MemError> {
    let bytes = continuation.as_bytes();
    let split = bytes
        .len()
        .checked_sub(8)
        .ok_or(MemError::MalformedContinuation)?;
    let (shape, offset) = bytes.split_at(split);
    if shape != query.shape().encode().as_bytes() {
        return Err(MemError::ForeignContinuation);
    }
    let offset = u64::from_be_bytes(
        offset
            .try_into()
            .map_err(|_| MemError::MalformedContinuation)?,
    );
    usize::try_from(offset).map_err(|_| MemError::MalformedContinuation)
}

#[cfg(test)]
mod tests;
