use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    #[default]
    Enrolled,
    Joined,
    Left,
    Removed,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Enrolled => "ENROLLED",
            ParticipantStatus::Joined => "JOINED",
            ParticipantStatus::Left => "LEFT",
            ParticipantStatus::Removed => "REMOVED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "ENROLLED" => Some(ParticipantStatus::Enrolled),
            "JOINED" => Some(ParticipantStatus::Joined),
            "LEFT" => Some(ParticipantStatus::Left),
            "REMOVED" => Some(ParticipantStatus::Removed),
            _ => None,
        }
    }

    /// Removed participants no longer take a seat.
    pub fn occupies_seat(&self) -> bool {
        !matches!(self, ParticipantStatus::Removed)
    }
}

impl Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
