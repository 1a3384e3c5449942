//! Hierarchical cache keys.
//!
//! A [`CacheKey`] is an ordered tuple of string segments such as
//! `["users", "detail", "u1"]`. Keys form an implicit tree: any key is also a
//! prefix selecting every key that starts with the same segments, which is
//! how a whole family of cached views is invalidated at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one cached value, or (used as a prefix) a family of values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    segments: Vec<String>,
}

impl CacheKey {
    /// Build a key from any sequence of segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// The empty key, a prefix of every key.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Return a new key with one more segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment, conventionally the entity kind's key root.
    pub fn root_segment(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// True if `prefix` matches the leading segments of this key.
    ///
    /// Every key starts with itself and with [`CacheKey::root`].
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(&prefix.segments)
                .all(|(segment, expected)| segment == expected)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for CacheKey {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Build a [`CacheKey`] from displayable segments.
///
/// ```
/// use refugio_core::cache_key;
///
/// let user = "u1";
/// let key = cache_key!["users", "detail", user];
/// assert_eq!(key.to_string(), "users/detail/u1");
/// ```
#[macro_export]
macro_rules! cache_key {
    () => {
        $crate::CacheKey::root()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::CacheKey::new([$(::std::string::ToString::to_string(&$segment)),+])
    };
}
