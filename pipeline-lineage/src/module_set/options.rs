// Module Set Options
// Combination mode and lineage policy for a module set

use serde::{Deserialize, Serialize};

/// How a module set treats upstream keys that went through different
/// alternatives of the same module set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineageMatching {
    /// Only combine entries whose shared module sets agree on the alternative
    #[default]
    Aligned,
    /// Combine regardless of shared ancestry
    Independent,
}

/// Options controlling how a module set combines its upstream stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleSetOptions {
    /// Pair upstream entries positionally instead of taking the cross product
    pub output_matching: bool,
    /// Lineage policy for keys sharing a module set
    pub lineage: LineageMatching,
}

impl ModuleSetOptions {
    pub fn matched() -> Self {
        Self {
            output_matching: true,
            ..Self::default()
        }
    }
}
