//! Schema pointers
//!
//! Provides [`SchemaPointer`] for addressing nodes in a JSON Schema document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Marker that opens every schema pointer
pub const ROOT_MARKER: char = '#';

/// Location of a node inside a JSON Schema document
///
/// Stored as the list of unescaped segments; rendered as an RFC-6901
/// fragment (`#/properties/a~1b` addresses the property named `a/b`).
///
/// Ordering is lexicographic by segment, so every descendant of a pointer
/// sorts directly after it and before its next sibling. Ordered maps keyed
/// by `SchemaPointer` can therefore fetch a subtree as one range.
///
/// # Examples
/// - `#` → root
/// - `#/properties/name` → `["properties", "name"]`
/// - `#/$defs/address/properties/street`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SchemaPointer(Vec<String>);

impl SchemaPointer {
    /// Root pointer (`#`)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create pointer from unescaped segments
    #[inline]
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a `#`-prefixed pointer string
    ///
    /// # Errors
    /// - [`PointerError::InvalidPointerKind`] if the input does not start with `#`
    ///   or is a plain-name fragment such as `#anchor`
    /// - [`PointerError::InvalidEscape`] on a malformed `~` sequence
    pub fn parse(input: &str) -> Result<Self, PointerError> {
        segments(input).map(Self)
    }

    /// Unescaped segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for `#`
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Pointer with the last segment dropped
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Last segment (node name for properties and definitions)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append one segment
    #[inline]
    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(segment.into());
        next
    }

    /// Append several segments
    #[inline]
    #[must_use]
    pub fn extend(&self, segments: &[impl AsRef<str>]) -> Self {
        let mut next = self.clone();
        next.0
            .extend(segments.iter().map(|s| s.as_ref().to_string()));
        next
    }

    /// True if `other` starts with every segment of `self`
    ///
    /// Inclusive: a pointer is its own ancestor. Subtree operations
    /// (cascade delete, move-target checks) rely on this.
    #[inline]
    #[must_use]
    pub fn is_ancestor(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Same as [`is_ancestor`](Self::is_ancestor) but requires distinct pointers
    #[inline]
    #[must_use]
    pub fn is_strict_ancestor(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_ancestor(other)
    }

    /// Segments of `self` below `ancestor`
    ///
    /// # Errors
    /// Returns error if `ancestor` is not an ancestor of `self`
    pub fn relative_to(&self, ancestor: &Self) -> Result<&[String], PointerError> {
        if !ancestor.is_ancestor(self) {
            return Err(PointerError::NotDescendant {
                pointer: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(&self.0[ancestor.0.len()..])
    }

    /// Replace the `old_prefix` part of `self` with `new_prefix`
    ///
    /// Returns `None` when `old_prefix` is not an ancestor of `self`.
    #[must_use]
    pub fn rebase(&self, old_prefix: &Self, new_prefix: &Self) -> Option<Self> {
        if !old_prefix.is_ancestor(self) {
            return None;
        }
        Some(new_prefix.extend(&self.0[old_prefix.0.len()..]))
    }

    /// Iterator over unescaped segments
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Split a pointer string into unescaped segments
///
/// The leading `#` is not a segment: `#` yields `[]`, `#/a/b` yields
/// `["a", "b"]`.
///
/// # Errors
/// See [`SchemaPointer::parse`].
pub fn segments(pointer: &str) -> Result<Vec<String>, PointerError> {
    let Some(rest) = pointer.strip_prefix(ROOT_MARKER) else {
        return Err(PointerError::InvalidPointerKind(pointer.to_string()));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = rest.strip_prefix('/') else {
        return Err(PointerError::InvalidPointerKind(pointer.to_string()));
    };
    body.split('/').map(unescape_segment).collect()
}

/// Append `segment` to `parent`
#[inline]
#[must_use]
pub fn join(parent: &SchemaPointer, segment: &str) -> SchemaPointer {
    parent.join(segment)
}

/// Inclusive ancestor test, see [`SchemaPointer::is_ancestor`]
#[inline]
#[must_use]
pub fn is_ancestor(a: &SchemaPointer, b: &SchemaPointer) -> bool {
    a.is_ancestor(b)
}

/// Escape a raw segment (`~` → `~0`, `/` → `~1`)
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    if !segment.contains(['~', '/']) {
        return segment.to_string();
    }
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_segment`]
///
/// # Errors
/// Returns [`PointerError::InvalidEscape`] for `~` not followed by `0` or `1`.
pub fn unescape_segment(segment: &str) -> Result<String, PointerError> {
    if !segment.contains('~') {
        return Ok(segment.to_string());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return Err(PointerError::InvalidEscape(segment.to_string())),
        }
    }
    Ok(out)
}

impl Display for SchemaPointer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{ROOT_MARKER}")?;
        for segment in &self.0 {
            write!(f, "/{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

impl FromStr for SchemaPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for SchemaPointer {
    type Error = PointerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for SchemaPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Errors related to schema pointers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointerError {
    /// Input is not a `#`-rooted JSON pointer fragment
    #[error("invalid pointer kind: '{0}' (expected '#' or '#/...')")]
    InvalidPointerKind(String),

    /// Malformed `~` escape inside a segment
    #[error("invalid escape sequence in segment '{0}'")]
    InvalidEscape(String),

    /// Not a descendant pointer
    #[error("pointer '{pointer}' is not a descendant of '{ancestor}'")]
    NotDescendant {
        /// Pointer being relativised
        pointer: String,
        /// Expected ancestor
        ancestor: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ptr(s: &str) -> SchemaPointer {
        SchemaPointer::parse(s).unwrap()
    }

    #[test]
    fn root_has_no_segments() {
        let root = ptr("#");
        assert!(root.is_root());
        assert_eq!(root.len(), 0);
        assert_eq!(root.to_string(), "#");
    }

    #[test]
    fn segments_exclude_marker() {
        assert_eq!(
            segments("#/properties/name").unwrap(),
            vec!["properties".to_string(), "name".to_string()]
        );
    }

    #[test]
    fn segments_rejects_missing_marker() {
        assert!(matches!(
            segments("/properties/name"),
            Err(PointerError::InvalidPointerKind(_))
        ));
        assert!(matches!(
            segments("properties"),
            Err(PointerError::InvalidPointerKind(_))
        ));
    }

    #[test]
    fn segments_rejects_anchor_fragment() {
        assert!(matches!(
            segments("#anchor"),
            Err(PointerError::InvalidPointerKind(_))
        ));
    }

    #[test]
    fn segments_rejects_bad_escape() {
        assert!(matches!(
            segments("#/a~2b"),
            Err(PointerError::InvalidEscape(_))
        ));
        assert!(matches!(segments("#/a~"), Err(PointerError::InvalidEscape(_))));
    }

    #[test]
    fn join_escapes_on_render() {
        let p = join(&ptr("#/properties"), "a/b~c");
        assert_eq!(p.last(), Some("a/b~c"));
        assert_eq!(p.to_string(), "#/properties/a~1b~0c");
    }

    #[test]
    fn unescape_order_is_tilde_one_first() {
        // "~01" is "~" followed by "1", not "/"
        assert_eq!(unescape_segment("~01").unwrap(), "~1");
    }

    #[test]
    fn is_ancestor_is_inclusive() {
        let a = ptr("#/properties/a");
        let b = ptr("#/properties/a/properties/b");
        assert!(is_ancestor(&a, &b));
        assert!(is_ancestor(&a, &a));
        assert!(!is_ancestor(&b, &a));
        assert!(a.is_strict_ancestor(&b));
        assert!(!a.is_strict_ancestor(&a));
    }

    #[test]
    fn is_ancestor_compares_whole_segments() {
        let a = ptr("#/properties/a");
        let ab = ptr("#/properties/ab");
        assert!(!a.is_ancestor(&ab));
    }

    #[test]
    fn rebase_replaces_prefix() {
        let child = ptr("#/properties/a/properties/b");
        let moved = child
            .rebase(&ptr("#/properties/a"), &ptr("#/properties/z"))
            .unwrap();
        assert_eq!(moved.to_string(), "#/properties/z/properties/b");
        assert!(child.rebase(&ptr("#/properties/x"), &ptr("#")).is_none());
    }

    #[test]
    fn relative_to_fails_outside_subtree() {
        let p = ptr("#/$defs/a");
        assert!(matches!(
            p.relative_to(&ptr("#/properties")),
            Err(PointerError::NotDescendant { .. })
        ));
        assert_eq!(p.relative_to(&ptr("#/$defs")).unwrap(), &["a".to_string()]);
    }

    #[test]
    fn descendants_sort_contiguously() {
        let mut pointers = vec![
            ptr("#/properties/b"),
            ptr("#/properties/a/properties/x"),
            ptr("#/properties/a0"),
            ptr("#/properties/a"),
        ];
        pointers.sort();
        assert_eq!(
            pointers.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec![
                "#/properties/a",
                "#/properties/a/properties/x",
                "#/properties/a0",
                "#/properties/b",
            ]
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let p = ptr("#/$defs/a~1b");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"#/$defs/a~1b\"");
        let back: SchemaPointer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    proptest! {
        #[test]
        fn render_then_parse_preserves_segments(segs in proptest::collection::vec(".*", 0..6)) {
            let p = SchemaPointer::from_segments(segs.clone());
            let parsed = SchemaPointer::parse(&p.to_string()).unwrap();
            prop_assert_eq!(parsed.segments(), segs.as_slice());
        }

        #[test]
        fn joined_child_is_strict_descendant(seg in "[a-z~/]{0,8}") {
            let parent = ptr("#/properties/a");
            let child = join(&parent, &seg);
            prop_assert!(parent.is_strict_ancestor(&child));
            prop_assert_eq!(child.parent(), Some(parent));
        }
    }
}
