use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::{
    repositories::notification_dispatcher::NotificationDispatcher,
    value_objects::notifications::NotificationModel,
};

const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Serialize)]
struct NotificationEnvelope<'a> {
    #[serde(flatten)]
    notification: &'a NotificationModel,
    sent_at: chrono::DateTime<Utc>,
}

/// Queues notifications and posts them to a webhook from a background task.
/// `notify` only enqueues, so callers never wait on delivery.
#[derive(Clone)]
pub struct WebhookNotificationDispatcher {
    tx: mpsc::Sender<NotificationModel>,
}

impl WebhookNotificationDispatcher {
    pub fn spawn(webhook_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        let (tx, mut rx) = mpsc::channel::<NotificationModel>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let envelope = NotificationEnvelope {
                    notification: &notification,
                    sent_at: Utc::now(),
                };
                let result = client
                    .post(webhook_url.clone())
                    .json(&envelope)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status());

                match result {
                    Ok(_) => debug!(
                        user_id = %notification.user_id,
                        notification_type = %notification.notification_type,
                        "notification: delivered"
                    ),
                    Err(err) => warn!(
                        user_id = %notification.user_id,
                        notification_type = %notification.notification_type,
                        status = ?err.status(),
                        "notification: delivery failed"
                    ),
                }
            }
        });

        Ok(Self { tx })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotificationDispatcher {
    async fn notify(&self, notification: NotificationModel) -> Result<()> {
        self.tx.try_send(notification).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => anyhow!("notification queue full"),
            mpsc::error::TrySendError::Closed(_) => anyhow!("notification queue closed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::notification_types::NotificationType;
    use uuid::Uuid;

    #[test]
    fn envelope_flattens_the_notification() {
        let notification = NotificationModel::new(
            Uuid::nil(),
            NotificationType::BookingAccepted,
            "Booking accepted",
            "See you soon",
            serde_json::json!({ "booking_id": "b-1" }),
        );
        let envelope = NotificationEnvelope {
            notification: &notification,
            sent_at: Utc::now(),
        };

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["notification_type"], "BOOKING_ACCEPTED");
        assert_eq!(value["metadata"]["booking_id"], "b-1");
        assert!(value["sent_at"].is_string());
    }
}
