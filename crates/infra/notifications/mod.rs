pub mod log_dispatcher;
pub mod webhook_dispatcher;

use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use crate::domain::{
    repositories::notification_dispatcher::NotificationDispatcher,
    value_objects::notifications::NotificationModel,
};
use log_dispatcher::LogNotificationDispatcher;
use webhook_dispatcher::WebhookNotificationDispatcher;

/// Dispatcher picked at startup from configuration.
#[derive(Clone)]
pub enum NotificationChannel {
    Webhook(WebhookNotificationDispatcher),
    Log(LogNotificationDispatcher),
}

impl NotificationChannel {
    /// Webhook delivery when a url is configured, log-only otherwise. Needs a tokio runtime.
    pub fn from_config(webhook_url: Option<&str>) -> Result<Self> {
        match webhook_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(raw) => {
                let url = Url::parse(raw).context("NOTIFICATION_WEBHOOK_URL is invalid")?;
                Ok(Self::Webhook(WebhookNotificationDispatcher::spawn(url)?))
            }
            None => Ok(Self::Log(LogNotificationDispatcher)),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationChannel {
    async fn notify(&self, notification: NotificationModel) -> Result<()> {
        match self {
            Self::Webhook(dispatcher) => dispatcher.notify(notification).await,
            Self::Log(dispatcher) => dispatcher.notify(notification).await,
        }
    }
}
