use serde::{Deserialize, Serialize};

/// Three-valued auto-accept setting stored as a nullable boolean column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoAcceptOverride {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl AutoAcceptOverride {
    pub fn resolve(self, fallback: bool) -> bool {
        match self {
            AutoAcceptOverride::Unset => fallback,
            AutoAcceptOverride::Enabled => true,
            AutoAcceptOverride::Disabled => false,
        }
    }
}

impl From<Option<bool>> for AutoAcceptOverride {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => AutoAcceptOverride::Unset,
            Some(true) => AutoAcceptOverride::Enabled,
            Some(false) => AutoAcceptOverride::Disabled,
        }
    }
}

impl From<AutoAcceptOverride> for Option<bool> {
    fn from(value: AutoAcceptOverride) -> Self {
        match value {
            AutoAcceptOverride::Unset => None,
            AutoAcceptOverride::Enabled => Some(true),
            AutoAcceptOverride::Disabled => Some(false),
        }
    }
}
