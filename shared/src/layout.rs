use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Column arrangement of a deployment's sheet export. Fixed per deployment,
/// never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Named team column plus nine named `TRUE`/`FALSE` mission columns.
    /// Rows whose width differs from the header are dropped.
    #[default]
    LabeledBoolean,
    /// Team name followed by up to nine positional (content, status) pairs.
    /// Short rows are padded, never rejected.
    InterleavedPairs,
    /// Named columns like `LabeledBoolean`, but rows may carry extra
    /// trailing fields beyond the header width.
    FlexibleLabeled,
}

impl LayoutMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            LayoutMode::LabeledBoolean => "labeled",
            LayoutMode::InterleavedPairs => "interleaved",
            LayoutMode::FlexibleLabeled => "flexible",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayout(pub String);

impl fmt::Display for UnknownLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown sheet layout {:?} (expected labeled, interleaved or flexible)",
            self.0
        )
    }
}

impl std::error::Error for UnknownLayout {}

impl FromStr for LayoutMode {
    type Err = UnknownLayout;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "labeled" | "labeled_boolean" | "boolean" => Ok(LayoutMode::LabeledBoolean),
            "interleaved" | "interleaved_pairs" | "pairs" => Ok(LayoutMode::InterleavedPairs),
            "flexible" | "flexible_labeled" => Ok(LayoutMode::FlexibleLabeled),
            _ => Err(UnknownLayout(value.to_string())),
        }
    }
}
