pub mod expiry_sweep;
pub mod payout_batches;
