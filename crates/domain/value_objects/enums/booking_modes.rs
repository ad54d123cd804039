use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// `Direct` books a generated slot, `Request` proposes a time for the instructor to confirm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingMode {
    #[default]
    Direct,
    Request,
}

impl BookingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMode::Direct => "DIRECT",
            BookingMode::Request => "REQUEST",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "DIRECT" => Some(BookingMode::Direct),
            "REQUEST" => Some(BookingMode::Request),
            _ => None,
        }
    }
}

impl Display for BookingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
