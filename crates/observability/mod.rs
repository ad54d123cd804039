mod alerts;
mod config;
mod layer;

use alerts::{AlertQueue, WebhookAlertSink};
use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber. Must run inside a tokio runtime when alerts are configured.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alerts.as_ref() {
        Some(alerts) => {
            let sink = WebhookAlertSink::new(alerts.webhook_url.clone())?;
            let queue = AlertQueue::spawn(Arc::new(sink));
            Some(
                AlertLayer::new(queue, config.service_context.clone(), alerts.min_level).with_filter(
                    tracing_subscriber::filter::LevelFilter::from_level(alerts.min_level),
                ),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=...` shows the offset in log lines.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            stage = %config.service_context.stage,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        stage = %config.service_context.stage,
        component = %config.service_context.component,
        alerts_enabled = config.alerts.is_some(),
        "observability: initialized"
    );

    Ok(())
}
