use backend::config::{
    config_model::{Notifications, Stripe, Video},
    stage::Stage,
};
use crates::domain::value_objects::settings::BookingSettings;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub stripe: Stripe,
    pub video: Video,
    pub notifications: Notifications,
    pub booking: BookingSettings,
    pub schedule: SweepSchedule,
    pub internal: InternalJobs,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub expiry_interval_secs: u64,
    pub expiry_batch_size: i64,
    pub payout_interval_secs: u64,
    /// Instructors aggregated per payout run.
    pub payout_batch_limit: i64,
}

#[derive(Debug, Clone)]
pub struct InternalJobs {
    /// Manual job triggers are disabled when unset.
    pub token: Option<String>,
}
