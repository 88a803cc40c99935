use std::{cmp::Ordering, fmt};

use crate::{IndexValue, Location};

/// Opaque cursor returned with a page of results, resuming the query right after that page.
///
/// Only meaningful for the query shape that produced it.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Continuation(Vec<u8>);

impl Continuation {
    pub fn from_bytes(token: impl Into<Vec<u8>>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Continuation({} bytes)", self.0.len())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    location: Location,
    term: Option<IndexValue>,
}

impl Entry {
    pub fn new(location: Location, term: Option<IndexValue>) -> Self {
        Self { location, term }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn key(&self) -> &[u8] {
        self.location.key()
    }

    /// Only present when the query asked for terms, or for `$bucket` queries.
    pub fn term(&self) -> Option<&IndexValue> {
        self.term.as_ref()
    }

    pub fn into_parts(self) -> (Location, Option<IndexValue>) {
        (self.location, self.term)
    }

    /// Pagination-sort order: by term, then by key.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.term
            .cmp(&other.term)
            .then_with(|| self.location.key().cmp(other.location.key()))
    }
}

/// One page of results, as decoded by the transport.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResponseBatch {
    pub entries: Vec<Entry>,
    pub continuation: Option<Continuation>,
}

impl ResponseBatch {
    pub fn new(entries: Vec<Entry>, continuation: Option<Continuation>) -> Self {
        Self {
            entries,
            continuation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }
}

/// All the entries of a query, fully collected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Response {
    entries: Vec<Entry>,
    continuation: Option<Continuation>,
}

impl Response {
    pub(crate) fn new(entries: Vec<Entry>, continuation: Option<Continuation>) -> Self {
        Self {
            entries,
            continuation,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Set when the fetch stopped at `max_results` while the store still had more entries.
    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn into_parts(self) -> (Vec<Entry>, Option<Continuation>) {
        (self.entries, self.continuation)
    }
}

impl IntoIterator for Response {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Merges two runs that are each already in pagination-sort order. Ties keep `left` first.
pub(crate) fn merge_sorted(left: Vec<Entry>, right: Vec<Entry>) -> Vec<Entry> {
    if left.last().is_none_or(|l| right.first().is_none_or(|r| l.sort_cmp(r).is_le())) {
        let mut left = left;
        left.extend(right);
        return left;
    }
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.sort_cmp(r).is_le(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }
    merged
}
