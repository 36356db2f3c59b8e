// Key Segments
// One unit of a composite key: a plain identifier or a smart subkey

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single step of a pipeline path.
///
/// `Plain` segments name an initial input or an explicitly keyed module.
/// `Smart` segments name the i-th alternative drawn from a module set; they
/// print as the instance identifier only but compare and hash on both fields,
/// which is what lets the engine recognise two keys that went through the same
/// alternative of the same set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Plain(String),
    Smart { instance: String, set_name: String },
}

impl Segment {
    pub fn plain(identifier: impl Into<String>) -> Self {
        Self::Plain(identifier.into())
    }

    pub fn smart(instance: impl Into<String>, set_name: impl Into<String>) -> Self {
        Self::Smart {
            instance: instance.into(),
            set_name: set_name.into(),
        }
    }

    /// The printable identifier (instance identifier for smart subkeys)
    pub fn identifier(&self) -> &str {
        match self {
            Self::Plain(identifier) => identifier,
            Self::Smart { instance, .. } => instance,
        }
    }

    /// Name of the module set a smart subkey was drawn from
    pub fn set_name(&self) -> Option<&str> {
        match self {
            Self::Plain(_) => None,
            Self::Smart { set_name, .. } => Some(set_name),
        }
    }

    pub fn is_smart(&self) -> bool {
        matches!(self, Self::Smart { .. })
    }

    /// Whether two smart subkeys come from the same module set
    pub fn same_origin(&self, other: &Segment) -> bool {
        match (self.set_name(), other.set_name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// A segment is structurally valid when none of its fields are blank
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Plain(identifier) => !identifier.trim().is_empty(),
            Self::Smart { instance, set_name } => {
                !instance.trim().is_empty() && !set_name.trim().is_empty()
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl From<&str> for Segment {
    fn from(identifier: &str) -> Self {
        Self::plain(identifier)
    }
}

impl From<String> for Segment {
    fn from(identifier: String) -> Self {
        Self::Plain(identifier)
    }
}

/// Build a segment: plain when `set_name` is absent, smart otherwise
pub fn make_segment(identifier: impl Into<String>, set_name: Option<&str>) -> Segment {
    match set_name {
        Some(set_name) => Segment::smart(identifier, set_name),
        None => Segment::plain(identifier),
    }
}
