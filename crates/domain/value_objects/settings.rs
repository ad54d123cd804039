use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REQUEST_TTL_HOURS: i64 = 48;
pub const DEFAULT_PLATFORM_FEE_BPS: i64 = 1000;
pub const MAX_RESCHEDULES: i32 = 3;
pub const MAX_GENERATION_RANGE_DAYS: i64 = 90;

/// Tunables of the booking engine, loaded from the environment by the binaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingSettings {
    pub request_ttl_hours: i64,
    pub platform_fee_bps: i64,
    pub max_reschedules: i32,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            request_ttl_hours: DEFAULT_REQUEST_TTL_HOURS,
            platform_fee_bps: DEFAULT_PLATFORM_FEE_BPS,
            max_reschedules: MAX_RESCHEDULES,
        }
    }
}

impl BookingSettings {
    pub fn request_ttl(&self) -> Duration {
        Duration::hours(self.request_ttl_hours)
    }
}
