pub mod auto_accept;
pub mod booking_modes;
pub mod booking_statuses;
pub mod cancellation_policies;
pub mod notification_types;
pub mod participant_statuses;
pub mod payment_statuses;
pub mod payout_statuses;
pub mod session_statuses;
pub mod sort_order;
