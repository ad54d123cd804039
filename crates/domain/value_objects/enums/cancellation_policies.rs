use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationPolicy {
    Flexible,
    Moderate,
    Strict,
    /// Any policy text the engine does not know; refunded at a flat rate.
    Unrecognized,
}

impl CancellationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationPolicy::Flexible => "FLEXIBLE",
            CancellationPolicy::Moderate => "MODERATE",
            CancellationPolicy::Strict => "STRICT",
            CancellationPolicy::Unrecognized => "UNRECOGNIZED",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "FLEXIBLE" => CancellationPolicy::Flexible,
            "MODERATE" => CancellationPolicy::Moderate,
            "STRICT" => CancellationPolicy::Strict,
            _ => CancellationPolicy::Unrecognized,
        }
    }
}

impl Display for CancellationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
