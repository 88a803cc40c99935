//! Canonical byte encoding of queries.
//!
//! Each field is written as a one-byte tag followed by a big-endian `u64` length and the field
//! bytes. Absent optional fields are omitted and fields always come in tag order, so equal
//! descriptors always encode to equal bytes.

use crate::{IndexValue, Match, QueryDescriptor, QueryShape};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
enum Tag {
    BucketType = 1,
    Bucket = 2,
    Index = 3,
    ExactValue = 4,
    RangeMin = 5,
    RangeMax = 6,
    MaxResults = 7,
    Continuation = 8,
    ReturnTerms = 9,
    TermFilter = 10,
    PaginationSort = 11,
    CoverageContext = 12,
    TimeoutMillis = 13,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EncodedQuery(Vec<u8>);

impl EncodedQuery {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for EncodedQuery {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn field(&mut self, tag: Tag, value: &[u8]) {
        let len = value.len() as u64;
        self.0.push(tag as u8);
        self.0.extend(len.to_be_bytes());
        self.0.extend(value);
    }

    fn value(&mut self, tag: Tag, value: &IndexValue) {
        match value {
            IndexValue::Binary(b) => self.field(tag, b),
            IndexValue::Integer(i) => self.field(tag, &i.to_be_bytes()),
        }
    }

    fn flag(&mut self, tag: Tag, value: bool) {
        self.field(tag, &[u8::from(value)]);
    }

    fn shape(&mut self, shape: &QueryShape) {
        self.field(Tag::BucketType, shape.namespace.bucket_type().as_bytes());
        self.field(Tag::Bucket, shape.namespace.bucket().as_bytes());
        self.field(Tag::Index, shape.index.wire_name().as_bytes());
        match &shape.matching {
            None => (),
            Some(Match::Exact(v)) => self.value(Tag::ExactValue, v),
            Some(Match::Range { min, max }) => {
                self.value(Tag::RangeMin, min);
                self.value(Tag::RangeMax, max);
            }
        }
    }
}

impl QueryShape {
    pub fn encode(&self) -> EncodedQuery {
        let mut w = Writer(Vec::new());
        w.shape(self);
        EncodedQuery(w.0)
    }
}

impl QueryDescriptor {
    pub fn encode(&self) -> EncodedQuery {
        let mut w = Writer(Vec::new());
        w.shape(&self.shape);
        if let Some(max) = self.max_results {
            w.field(Tag::MaxResults, &max.get().to_be_bytes());
        }
        if let Some(c) = &self.continuation {
            w.field(Tag::Continuation, c.as_bytes());
        }
        w.flag(Tag::ReturnTerms, self.return_terms);
        if let Some(f) = &self.term_filter {
            w.field(Tag::TermFilter, f.as_bytes());
        }
        if let Some(s) = self.pagination_sort {
            w.flag(Tag::PaginationSort, s);
        }
        if let Some(c) = &self.coverage_context {
            w.field(Tag::CoverageContext, c);
        }
        if let Some(t) = self.timeout {
            let millis = u64::try_from(t.as_millis()).unwrap_or(u64::MAX);
            w.field(Tag::TimeoutMillis, &millis.to_be_bytes());
        }
        EncodedQuery(w.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Continuation, Namespace, QueryDescriptor};

    #[test]
    fn encoding_is_deterministic() {
        let build = || {
            QueryDescriptor::int_range(Namespace::new("b"), "age", 1, 9)
                .max_results(5)
                .return_terms(true)
                .build()
                .unwrap()
        };
        assert_eq!(build().encode(), build().encode());
    }

    #[test]
    fn bucket_query_layout() {
        let q = QueryDescriptor::bucket(Namespace::new("B")).build().unwrap();
        let mut expected = Vec::new();
        let fields: [(u8, &[u8]); 5] = [
            (1, b"default"),
            (2, b"B"),
            (3, b"$bucket"),
            (4, b"B"),
            (9, &[0]),
        ];
        for (tag, value) in fields {
            expected.push(tag);
            expected.extend((value.len() as u64).to_be_bytes());
            expected.extend(value);
        }
        assert_eq!(q.encode().as_bytes(), expected);
    }

    #[test]
    fn long_fields_keep_their_full_length() {
        let context = vec![7; 70_000];
        let q = QueryDescriptor::bucket_with_coverage(Namespace::new("B"), context.clone())
            .build()
            .unwrap();
        let bytes = q.encode().into_bytes();
        let (head, value) = bytes.split_at(bytes.len() - context.len());
        let len = &head[head.len() - 8..];
        assert_eq!(head[head.len() - 9], 12);
        assert_eq!(len, (context.len() as u64).to_be_bytes());
        assert_eq!(value, context);
    }

    #[test]
    fn shape_ignores_paging() {
        let q = QueryDescriptor::bin_exact(Namespace::new("b"), "email", "a@b")
            .build()
            .unwrap();
        let resumed = q.next_page(Continuation::from_bytes(*b"tok"), None);
        assert_eq!(q.shape().encode(), resumed.shape().encode());
        assert_ne!(q.encode(), resumed.encode());
    }

    #[test]
    fn shapes_differ_across_indexes() {
        let ns = Namespace::new("b");
        let bin = QueryDescriptor::bin_exact(ns.clone(), "x", "1").build().unwrap();
        let int = QueryDescriptor::int_exact(ns, "x", 1).build().unwrap();
        assert_ne!(bin.shape().encode(), int.shape().encode());
    }
}
