use std::{borrow::Cow, fmt};

/// Name of the pseudo-index whose only term is the bucket name.
pub const BUCKET_INDEX: &str = "$bucket";

/// Name of the pseudo-index whose terms are the object keys themselves.
pub const KEY_INDEX: &str = "$key";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, derive_more::Display)]
pub enum IndexKind {
    #[display("bin")]
    Binary,
    #[display("int")]
    Integer,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IndexId {
    name: Cow<'static, str>,
    kind: IndexKind,
}

impl IndexId {
    pub fn binary(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Binary,
        }
    }

    pub fn integer(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            kind: IndexKind::Integer,
        }
    }

    pub const fn bucket() -> Self {
        Self {
            name: Cow::Borrowed(BUCKET_INDEX),
            kind: IndexKind::Binary,
        }
    }

    pub const fn key() -> Self {
        Self {
            name: Cow::Borrowed(KEY_INDEX),
            kind: IndexKind::Binary,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn is_bucket(&self) -> bool {
        self.name == BUCKET_INDEX
    }

    pub fn is_key(&self) -> bool {
        self.name == KEY_INDEX
    }

    /// Whether this is one of the store's implicit indexes rather than a user-maintained one.
    pub fn is_special(&self) -> bool {
        self.is_bucket() || self.is_key()
    }

    /// The name the store knows the index by: `<name>_bin`, `<name>_int`, or the bare
    /// pseudo-index name.
    pub fn wire_name(&self) -> Cow<'_, str> {
        if self.is_special() {
            Cow::Borrowed(&self.name)
        } else {
            Cow::Owned(format!("{}_{}", self.name, self.kind))
        }
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// A term of a secondary index.
///
/// Values only compare meaningfully against values of the same kind.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum IndexValue {
    Binary(Vec<u8>),
    Integer(i64),
}

impl IndexValue {
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexValue::Binary(_) => IndexKind::Binary,
            IndexValue::Integer(_) => IndexKind::Integer,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            IndexValue::Binary(b) => Some(b),
            IndexValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            IndexValue::Binary(_) => None,
            IndexValue::Integer(i) => Some(*i),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Integer(value)
    }
}

impl From<Vec<u8>> for IndexValue {
    fn from(value: Vec<u8>) -> Self {
        IndexValue::Binary(value)
    }
}

impl From<&[u8]> for IndexValue {
    fn from(value: &[u8]) -> Self {
        IndexValue::Binary(value.to_vec())
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::Binary(value.as_bytes().to_vec())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::Binary(value.into_bytes())
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Binary(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            IndexValue::Integer(i) => write!(f, "{i}"),
        }
    }
}
