use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::*;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("injected failure on page {page}")]
    Injected { page: usize },

    #[error("no page scripted at index {page}")]
    NoMorePages { page: usize },
}

/// Transport replaying a fixed list of pages, one per request, whatever the request.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

struct Inner {
    pages: Vec<ResponseBatch>,
    failing_at: Option<usize>,
    stalling_at: Option<usize>,
    requests: Mutex<Vec<QueryDescriptor>>,
    cancelled_fetches: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(pages: impl IntoIterator<Item = ResponseBatch>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pages: pages.into_iter().collect(),
                failing_at: None,
                stalling_at: None,
                requests: Mutex::new(Vec::new()),
                cancelled_fetches: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the `page`-th request fail.
    pub fn failing_at(self, page: usize) -> Self {
        self.reconfigure(|i| i.failing_at = Some(page))
    }

    /// Make the `page`-th request never answer.
    pub fn stalling_at(self, page: usize) -> Self {
        self.reconfigure(|i| i.stalling_at = Some(page))
    }

    fn reconfigure(self, f: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = Arc::try_unwrap(self.inner)
            .unwrap_or_else(|_| panic!("reconfiguring a shared scripted transport"));
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn requests(&self) -> Vec<QueryDescriptor> {
        self.inner.requests.lock().clone()
    }

    /// Number of stalled requests whose future got dropped.
    pub fn cancelled_fetches(&self) -> usize {
        self.inner.cancelled_fetches.load(Ordering::SeqCst)
    }
}

struct CancelCounter(Arc<Inner>);

impl Drop for CancelCounter {
    fn drop(&mut self) {
        self.0.cancelled_fetches.fetch_add(1, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    type Error = ScriptError;

    fn fetch_page(
        &self,
        query: &QueryDescriptor,
    ) -> waaa::BoxFuture<'static, Result<ResponseBatch, ScriptError>> {
        let page = {
            let mut requests = self.inner.requests.lock();
            requests.push(query.clone());
            requests.len() - 1
        };
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.failing_at == Some(page) {
                return Err(ScriptError::Injected { page });
            }
            if inner.stalling_at == Some(page) {
                let _counter = CancelCounter(inner.clone());
                return futures_util::future::pending().await;
            }
            inner
                .pages
                .get(page)
                .cloned()
                .ok_or(ScriptError::NoMorePages { page })
        })
    }
}

/// `len` entries without terms, keyed `<continuation>-<i>`.
pub fn batch(len: usize, continuation: Option<&str>) -> ResponseBatch {
    let tag = continuation.unwrap_or("end");
    ResponseBatch::new(
        (0..len)
            .map(|i| {
                Entry::new(
                    Location::new(Namespace::new("B"), format!("{tag}-{i}")),
                    None,
                )
            })
            .collect(),
        continuation.map(|c| Continuation::from_bytes(c.as_bytes())),
    )
}

/// Entries with integer terms, in the given order.
pub fn sorted_batch(entries: &[(i64, &str)], continuation: Option<&str>) -> ResponseBatch {
    ResponseBatch::new(
        entries
            .iter()
            .map(|(term, key)| {
                Entry::new(
                    Location::new(Namespace::new("B"), *key),
                    Some(IndexValue::Integer(*term)),
                )
            })
            .collect(),
        continuation.map(|c| Continuation::from_bytes(c.as_bytes())),
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
