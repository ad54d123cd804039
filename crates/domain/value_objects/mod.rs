pub mod availability;
pub mod bookings;
pub mod enums;
pub mod notifications;
pub mod payments;
pub mod payouts;
pub mod sessions;
pub mod settings;

/// Default page size of list endpoints.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}
