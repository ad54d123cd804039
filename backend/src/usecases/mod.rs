pub mod availability;
pub mod bookings;
pub mod outbox;
pub mod payouts;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_support;
