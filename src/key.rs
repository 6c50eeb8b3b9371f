use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// A hierarchical key: an ordered sequence of non-empty string segments.
///
/// Ordering is lexicographic over the segment sequence, so `["a"]` sorts
/// before `["a", "b"]`, which sorts before `["ab"]`. The empty path is the
/// root and is a prefix of every path.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// Builds a path from segments, rejecting empty segments.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(pos) = segments.iter().position(|s| s.is_empty()) {
            return Err(Error::InvalidKey(format!("segment {} is empty", pos)));
        }
        Ok(Self(segments))
    }

    /// The empty path, which contains every key.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(Error::InvalidKey(format!("segment {} is empty", self.0.len())));
        }
        let mut segments = self.0.clone();
        segments.push(segment);
        Ok(Self(segments))
    }

    /// True when `self`'s segments are a leading subsequence of `other`'s.
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Engine byte encoding. Byte order matches segment order and the
    /// encoding of a prefix is a byte prefix of the encoding of every key under it.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.iter().map(|s| s.len() + 2).sum());
        for segment in &self.0 {
            for &b in segment.as_bytes() {
                out.push(b);
                if b == ESCAPE {
                    out.push(ESCAPED_NUL);
                }
            }
            out.push(ESCAPE);
            out.push(TERMINATOR);
        }
        out
    }

    /// Inverse of [`KeyPath::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        let mut iter = bytes.iter();
        while let Some(&b) = iter.next() {
            if b != ESCAPE {
                current.push(b);
                continue;
            }
            match iter.next() {
                Some(&ESCAPED_NUL) => current.push(ESCAPE),
                Some(&TERMINATOR) => {
                    let segment = String::from_utf8(std::mem::take(&mut current))
                        .map_err(|e| Error::Storage(format!("key segment is not UTF-8: {}", e)))?;
                    segments.push(segment);
                }
                _ => return Err(Error::Storage("malformed key encoding".to_string())),
            }
        }
        if !current.is_empty() {
            return Err(Error::Storage("unterminated key segment".to_string()));
        }
        Self::new(segments).map_err(|e| Error::Storage(e.to_string()))
    }
}

impl TryFrom<Vec<String>> for KeyPath {
    type Error = Error;

    fn try_from(segments: Vec<String>) -> Result<Self> {
        Self::new(segments)
    }
}

impl From<KeyPath> for Vec<String> {
    fn from(key: KeyPath) -> Self {
        key.0
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", segment)?;
        }
        write!(f, "]")
    }
}
