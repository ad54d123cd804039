use anyhow::{Context, Result};
use backend::config::{
    config_loader::{booking_settings, get_stage, optional_parsed},
    config_model::{Notifications, Stripe, Video},
};

use super::config_model::{Database, DotEnvyConfig, InternalJobs, SweepSchedule, WorkerServer};

pub const DEFAULT_EXPIRY_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_EXPIRY_BATCH_SIZE: i64 = 200;
pub const DEFAULT_PAYOUT_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_PAYOUT_BATCH_LIMIT: i64 = 500;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: required("SERVER_PORT_WORKER")?
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        body_limit: optional_parsed("SERVER_BODY_LIMIT", 1)?,
        timeout: optional_parsed("SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional_parsed("DATABASE_MAX_CONNECTIONS", 5)?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
    };

    let video = Video {
        api_url: required("VIDEO_API_URL")?,
        api_key: required("VIDEO_API_KEY")?,
    };

    let notifications = Notifications {
        webhook_url: non_empty("NOTIFICATION_WEBHOOK_URL"),
    };

    let schedule = SweepSchedule {
        expiry_interval_secs: optional_parsed(
            "EXPIRY_SWEEP_INTERVAL_SECS",
            DEFAULT_EXPIRY_INTERVAL_SECS,
        )?,
        expiry_batch_size: optional_parsed("EXPIRY_SWEEP_BATCH_SIZE", DEFAULT_EXPIRY_BATCH_SIZE)?,
        payout_interval_secs: optional_parsed(
            "PAYOUT_BATCH_INTERVAL_SECS",
            DEFAULT_PAYOUT_INTERVAL_SECS,
        )?,
        payout_batch_limit: optional_parsed("PAYOUT_BATCH_LIMIT", DEFAULT_PAYOUT_BATCH_LIMIT)?,
    };
    anyhow::ensure!(
        schedule.expiry_interval_secs > 0 && schedule.payout_interval_secs > 0,
        "sweep intervals must be positive"
    );
    anyhow::ensure!(
        schedule.expiry_batch_size > 0 && schedule.payout_batch_limit > 0,
        "sweep batch sizes must be positive"
    );

    Ok(DotEnvyConfig {
        worker_server,
        database,
        stripe,
        video,
        notifications,
        booking: booking_settings()?,
        schedule,
        internal: InternalJobs {
            token: non_empty("INTERNAL_JOBS_TOKEN"),
        },
        stage: get_stage(),
    })
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
