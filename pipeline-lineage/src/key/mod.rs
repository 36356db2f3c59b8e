// Key Algebra
// Composite keys that encode a path through successive pipeline stages

pub mod segment;

pub use segment::{make_segment, Segment};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, immutable sequence of segments labelling one computed value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey {
    segments: Vec<Segment>,
}

/// Outcome of joining two upstream keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyJoin {
    /// Every shared module set agreed on its alternative
    Aligned(CompositeKey),
    /// At least one module set appears with different alternatives on both sides
    Diverged(CompositeKey),
}

impl KeyJoin {
    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned(_))
    }

    pub fn key(&self) -> &CompositeKey {
        match self {
            Self::Aligned(key) | Self::Diverged(key) => key,
        }
    }

    pub fn into_key(self) -> CompositeKey {
        match self {
            Self::Aligned(key) | Self::Diverged(key) => key,
        }
    }
}

impl CompositeKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Single plain-segment key, as produced by initial input wrapping
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::plain(name)],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// New key with `new_segments` appended in call order
    pub fn extend<I>(&self, new_segments: I) -> CompositeKey
    where
        I: IntoIterator<Item = Segment>,
    {
        let mut segments = self.segments.clone();
        segments.extend(new_segments);
        Self { segments }
    }

    /// Key made of the first `len` segments
    pub fn prefix(&self, len: usize) -> CompositeKey {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    pub fn starts_with(&self, prefix: &CompositeKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn is_strict_prefix_of(&self, other: &CompositeKey) -> bool {
        self.len() < other.len() && other.starts_with(self)
    }

    pub fn common_prefix_length(&self, other: &CompositeKey) -> usize {
        common_prefix_length(self, other)
    }

    /// Smart subkeys carried by this key, in order
    pub fn smart_subkeys(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_smart())
    }

    /// Join `right` onto this key.
    ///
    /// Smart subkeys already present on the left are written once. When the
    /// right key carries a different alternative of a module set the left key
    /// already went through, the join diverges; the returned key then keeps
    /// both alternatives.
    pub fn join(&self, right: &CompositeKey) -> KeyJoin {
        let mut segments = self.segments.clone();
        let mut diverged = false;

        for segment in &right.segments {
            if segment.is_smart() {
                let mut shared = false;
                for existing in self.smart_subkeys() {
                    if existing == segment {
                        shared = true;
                    } else if existing.same_origin(segment) {
                        diverged = true;
                    }
                }
                if shared {
                    continue;
                }
            }
            segments.push(segment.clone());
        }

        let key = Self { segments };
        if diverged {
            KeyJoin::Diverged(key)
        } else {
            KeyJoin::Aligned(key)
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", segment)?;
        }
        write!(f, ")")
    }
}

impl FromIterator<Segment> for CompositeKey {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CompositeKey {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Length of the longest run of leading segments shared by both keys
pub fn common_prefix_length(key_a: &CompositeKey, key_b: &CompositeKey) -> usize {
    key_a
        .segments
        .iter()
        .zip(key_b.segments.iter())
        .take_while(|(a, b)| a == b)
        .count()
}
