use crates::domain::value_objects::settings::BookingSettings;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: AuthSecret,
    pub stripe: Stripe,
    pub video: Video,
    pub notifications: Notifications,
    pub booking: BookingSettings,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Video {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    /// Log-only delivery when unset.
    pub webhook_url: Option<String>,
}
