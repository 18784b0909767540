//! Dotted key paths.
//!
//! A [`KeyPath`] addresses a node inside a nested value tree. Segments are
//! separated by `.`; a segment made only of ASCII digits addresses a list
//! index, any other segment addresses a map entry. The empty path is the root.
//!
//! ```rust
//! use switchboard_core::{KeyPath, Segment};
//!
//! let key = KeyPath::new("items.2.name");
//! let (head, rest) = key.head().unwrap();
//! assert_eq!(head, Segment::Key("items"));
//! assert_eq!(rest.as_str(), "2.name");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between key path segments.
pub const SEPARATOR: char = '.';

/// One component of a [`KeyPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment<'a> {
    /// A list index.
    Index(usize),
    /// A map key.
    Key(&'a str),
}

impl<'a> Segment<'a> {
    /// Classifies a raw segment.
    ///
    /// Only plain digit runs count as indices, so `"+1"` or `"-1"` stay map
    /// keys and the textual form always round-trips.
    pub fn parse(raw: &'a str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse() {
                return Self::Index(index);
            }
        }
        Self::Key(raw)
    }

    /// Returns the index if this segment addresses a list element.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }
}

impl fmt::Display for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

/// An immutable dotted key path such as `"config.items.0"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(String);

impl KeyPath {
    /// Creates a key path from its dotted string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The empty key path, addressing the root of a tree.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns the dotted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the path segments in order. The root path has none.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.0
            .split(SEPARATOR)
            .filter(|_| !self.0.is_empty())
            .map(Segment::parse)
    }

    /// Number of segments in this path.
    pub fn len(&self) -> usize {
        self.segments().count()
    }

    /// Splits off the first segment, returning it with the remaining path.
    ///
    /// Returns `None` for the root path.
    pub fn head(&self) -> Option<(Segment<'_>, KeyPath)> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.split_once(SEPARATOR) {
            Some((first, rest)) => Some((Segment::parse(first), KeyPath::new(rest))),
            None => Some((Segment::parse(&self.0), KeyPath::root())),
        }
    }

    /// Appends `other` to this path, skipping empty sides.
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => KeyPath(format!("{}{SEPARATOR}{}", self.0, other.0)),
        }
    }

    /// Appends a raw string path to this path.
    pub fn child(&self, key: &str) -> KeyPath {
        self.join(&KeyPath::from(key))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyPath {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for KeyPath {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(key: &KeyPath) -> Self {
        key.clone()
    }
}

impl AsRef<str> for KeyPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
