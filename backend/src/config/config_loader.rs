use anyhow::{Context, Result};
use crates::domain::value_objects::settings::{
    BookingSettings, DEFAULT_PLATFORM_FEE_BPS, DEFAULT_REQUEST_TTL_HOURS, MAX_RESCHEDULES,
};

use super::{
    config_model::{
        AuthSecret, BackendServer, Database, DotEnvyConfig, Notifications, Stripe, Video,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: optional_parsed("DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let auth = AuthSecret {
        jwt_secret: required("JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
    };

    let video = Video {
        api_url: required("VIDEO_API_URL")?,
        api_key: required("VIDEO_API_KEY")?,
    };

    let notifications = Notifications {
        webhook_url: std::env::var("NOTIFICATION_WEBHOOK_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        stripe,
        video,
        notifications,
        booking: booking_settings()?,
        stage: get_stage(),
    })
}

/// Booking tunables, shared with the worker.
pub fn booking_settings() -> Result<BookingSettings> {
    let settings = BookingSettings {
        request_ttl_hours: optional_parsed("BOOKING_REQUEST_TTL_HOURS", DEFAULT_REQUEST_TTL_HOURS)?,
        platform_fee_bps: optional_parsed("PLATFORM_FEE_BPS", DEFAULT_PLATFORM_FEE_BPS)?,
        max_reschedules: MAX_RESCHEDULES,
    };
    anyhow::ensure!(
        settings.request_ttl_hours > 0,
        "BOOKING_REQUEST_TTL_HOURS must be positive"
    );
    anyhow::ensure!(
        (0..=10_000).contains(&settings.platform_fee_bps),
        "PLATFORM_FEE_BPS must be within 0..=10000"
    );
    Ok(settings)
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();
    required("JWT_SECRET")
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

pub fn optional_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        _ => Ok(default),
    }
}
