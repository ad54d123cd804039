use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::{
    repositories::notification_dispatcher::NotificationDispatcher,
    value_objects::notifications::NotificationModel,
};

/// Used when no notification webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn notify(&self, notification: NotificationModel) -> Result<()> {
        info!(
            user_id = %notification.user_id,
            notification_type = %notification.notification_type,
            title = %notification.title,
            "notification: logged"
        );
        Ok(())
    }
}
