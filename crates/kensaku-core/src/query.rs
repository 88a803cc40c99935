use std::{num::NonZeroU32, time::Duration};

use crate::{Continuation, IndexId, IndexKind, IndexValue, InvalidQuery, Namespace};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Match {
    Exact(IndexValue),
    /// Both ends included.
    Range { min: IndexValue, max: IndexValue },
}

impl Match {
    pub fn exact(value: impl Into<IndexValue>) -> Self {
        Match::Exact(value.into())
    }

    pub fn range(min: impl Into<IndexValue>, max: impl Into<IndexValue>) -> Self {
        Match::Range {
            min: min.into(),
            max: max.into(),
        }
    }

    pub fn contains(&self, term: &IndexValue) -> bool {
        match self {
            Match::Exact(v) => v == term,
            Match::Range { min, max } => min <= term && term <= max,
        }
    }

    fn check_kind(&self, index: &IndexId) -> Result<(), InvalidQuery> {
        let kinds = match self {
            Match::Exact(v) => [v.kind(), v.kind()],
            Match::Range { min, max } => [min.kind(), max.kind()],
        };
        match kinds.into_iter().find(|k| *k != index.kind()) {
            None => Ok(()),
            Some(got) => Err(InvalidQuery::ValueKindMismatch {
                index: index.to_string(),
                expected: index.kind(),
                got,
            }),
        }
    }
}

/// The part of a query a continuation is bound to.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct QueryShape {
    pub namespace: Namespace,
    pub index: IndexId,
    pub matching: Option<Match>,
}

/// An immutable, validated 2i query.
///
/// Build one with the factory functions, e.g. [`QueryDescriptor::bucket`] or
/// [`QueryDescriptor::int_range`], then [`QueryBuilder::build`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryDescriptor {
    pub(crate) shape: QueryShape,
    pub(crate) max_results: Option<NonZeroU32>,
    pub(crate) continuation: Option<Continuation>,
    pub(crate) return_terms: bool,
    pub(crate) term_filter: Option<String>,
    pub(crate) pagination_sort: Option<bool>,
    pub(crate) coverage_context: Option<Vec<u8>>,
    pub(crate) timeout: Option<Duration>,
}

impl QueryDescriptor {
    pub fn builder(namespace: Namespace, index: IndexId, matching: Match) -> QueryBuilder {
        QueryBuilder::new(namespace, index, Some(matching))
    }

    pub fn bin_exact(
        namespace: Namespace,
        index: &str,
        value: impl Into<Vec<u8>>,
    ) -> QueryBuilder {
        Self::builder(
            namespace,
            IndexId::binary(index.to_string()),
            Match::Exact(IndexValue::Binary(value.into())),
        )
    }

    pub fn bin_range(
        namespace: Namespace,
        index: &str,
        min: impl Into<Vec<u8>>,
        max: impl Into<Vec<u8>>,
    ) -> QueryBuilder {
        Self::builder(
            namespace,
            IndexId::binary(index.to_string()),
            Match::Range {
                min: IndexValue::Binary(min.into()),
                max: IndexValue::Binary(max.into()),
            },
        )
    }

    pub fn int_exact(namespace: Namespace, index: &str, value: i64) -> QueryBuilder {
        Self::builder(
            namespace,
            IndexId::integer(index.to_string()),
            Match::Exact(IndexValue::Integer(value)),
        )
    }

    pub fn int_range(namespace: Namespace, index: &str, min: i64, max: i64) -> QueryBuilder {
        Self::builder(
            namespace,
            IndexId::integer(index.to_string()),
            Match::Range {
                min: IndexValue::Integer(min),
                max: IndexValue::Integer(max),
            },
        )
    }

    /// Every key of the bucket, through the `$bucket` pseudo-index.
    pub fn bucket(namespace: Namespace) -> QueryBuilder {
        let value = IndexValue::Binary(namespace.bucket().as_bytes().to_vec());
        Self::builder(namespace, IndexId::bucket(), Match::Exact(value))
    }

    /// Every key of the bucket that lives in the partitions described by `coverage_context`.
    ///
    /// The context is handed to the transport untouched.
    pub fn bucket_with_coverage(namespace: Namespace, coverage_context: Vec<u8>) -> QueryBuilder {
        QueryBuilder::new(namespace, IndexId::bucket(), None).coverage_context(coverage_context)
    }

    /// Keys between `min` and `max`, through the `$key` pseudo-index.
    pub fn key_range(
        namespace: Namespace,
        min: impl Into<Vec<u8>>,
        max: impl Into<Vec<u8>>,
    ) -> QueryBuilder {
        Self::builder(
            namespace,
            IndexId::key(),
            Match::Range {
                min: IndexValue::Binary(min.into()),
                max: IndexValue::Binary(max.into()),
            },
        )
    }

    pub fn shape(&self) -> &QueryShape {
        &self.shape
    }

    pub fn namespace(&self) -> &Namespace {
        &self.shape.namespace
    }

    pub fn index(&self) -> &IndexId {
        &self.shape.index
    }

    /// `None` only for coverage-driven `$bucket` queries.
    pub fn matching(&self) -> Option<&Match> {
        self.shape.matching.as_ref()
    }

    pub fn max_results(&self) -> Option<NonZeroU32> {
        self.max_results
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    pub fn return_terms(&self) -> bool {
        self.return_terms
    }

    /// Whether matched entries carry their term: requested, or implied by `$bucket`.
    pub fn includes_terms(&self) -> bool {
        self.return_terms || self.shape.index.is_bucket()
    }

    pub fn term_filter(&self) -> Option<&str> {
        self.term_filter.as_deref()
    }

    pub fn pagination_sort(&self) -> Option<bool> {
        self.pagination_sort
    }

    pub fn coverage_context(&self) -> Option<&[u8]> {
        self.coverage_context.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The same query, resuming after `continuation` and asking for at most `max_results`.
    pub(crate) fn next_page(
        &self,
        continuation: Continuation,
        max_results: Option<NonZeroU32>,
    ) -> Self {
        Self {
            continuation: Some(continuation),
            max_results,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug)]
#[must_use]
pub struct QueryBuilder {
    namespace: Namespace,
    index: IndexId,
    matching: Option<Match>,
    max_results: Option<u32>,
    continuation: Option<Continuation>,
    return_terms: bool,
    term_filter: Option<String>,
    pagination_sort: Option<bool>,
    coverage_context: Option<Vec<u8>>,
    timeout: Option<Duration>,
}

impl QueryBuilder {
    fn new(namespace: Namespace, index: IndexId, matching: Option<Match>) -> Self {
        Self {
            namespace,
            index,
            matching,
            max_results: None,
            continuation: None,
            return_terms: false,
            term_filter: None,
            pagination_sort: None,
            coverage_context: None,
            timeout: None,
        }
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Resume a previous query. The token must come from a query of the same shape.
    pub fn continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = Some(continuation);
        self
    }

    pub fn return_terms(mut self, return_terms: bool) -> Self {
        self.return_terms = return_terms;
        self
    }

    /// Regular expression the store matches terms against. Binary range queries only.
    pub fn term_filter(mut self, pattern: impl Into<String>) -> Self {
        self.term_filter = Some(pattern.into());
        self
    }

    pub fn pagination_sort(mut self, pagination_sort: bool) -> Self {
        self.pagination_sort = Some(pagination_sort);
        self
    }

    pub fn coverage_context(mut self, coverage_context: Vec<u8>) -> Self {
        self.coverage_context = Some(coverage_context);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<QueryDescriptor, InvalidQuery> {
        if self.namespace.bucket().is_empty() {
            return Err(InvalidQuery::EmptyBucket);
        }
        if self.namespace.bucket_type().is_empty() {
            return Err(InvalidQuery::EmptyBucketType);
        }
        if self.index.name().is_empty() {
            return Err(InvalidQuery::EmptyIndexName);
        }
        match &self.matching {
            None if self.coverage_context.is_none() => return Err(InvalidQuery::MissingMatch),
            None => (),
            Some(matching) => {
                matching.check_kind(&self.index)?;
                if let Match::Range { min, max } = matching {
                    if min > max {
                        return Err(InvalidQuery::InvertedRange);
                    }
                }
                if self.index.is_bucket()
                    && *matching != Match::exact(self.namespace.bucket())
                {
                    return Err(InvalidQuery::ForeignBucketValue);
                }
            }
        }
        if self.term_filter.is_some()
            && (self.index.kind() == IndexKind::Integer
                || !matches!(self.matching, Some(Match::Range { .. })))
        {
            return Err(InvalidQuery::TermFilterNotAllowed);
        }
        let max_results = match self.max_results {
            None => None,
            Some(n) => Some(NonZeroU32::new(n).ok_or(InvalidQuery::ZeroMaxResults)?),
        };
        Ok(QueryDescriptor {
            shape: QueryShape {
                namespace: self.namespace,
                index: self.index,
                matching: self.matching,
            },
            max_results,
            continuation: self.continuation,
            return_terms: self.return_terms,
            term_filter: self.term_filter,
            pagination_sort: self.pagination_sort,
            coverage_context: self.coverage_context,
            timeout: self.timeout,
        })
    }
}
