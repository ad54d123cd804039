pub mod auto_approval;
pub mod capacity_ledger;
pub mod payout_aggregator;
pub mod pricing;
pub mod refund_calculator;
pub mod slot_generator;
