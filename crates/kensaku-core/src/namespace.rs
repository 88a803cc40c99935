use std::{fmt, sync::Arc};

pub const DEFAULT_BUCKET_TYPE: &str = "default";

/// A bucket, qualified by its bucket type.
///
/// Construction never fails: emptiness is checked when a query is built over the namespace.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Namespace {
    bucket_type: Arc<str>,
    bucket: Arc<str>,
}

impl Namespace {
    pub fn new(bucket: impl Into<Arc<str>>) -> Self {
        Self::with_type(DEFAULT_BUCKET_TYPE, bucket)
    }

    pub fn with_type(bucket_type: impl Into<Arc<str>>, bucket: impl Into<Arc<str>>) -> Self {
        Self {
            bucket_type: bucket_type.into(),
            bucket: bucket.into(),
        }
    }

    pub fn bucket_type(&self) -> &str {
        &self.bucket_type
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn has_default_type(&self) -> bool {
        &*self.bucket_type == DEFAULT_BUCKET_TYPE
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket_type, self.bucket)
    }
}

/// The object an index entry points at.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Location {
    namespace: Namespace,
    key: Vec<u8>,
}

impl Location {
    pub fn new(namespace: Namespace, key: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace,
            key: key.into(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn into_key(self) -> Vec<u8> {
        self.key
    }
}
