use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::notifications::NotificationModel;

/// Fire-and-forget delivery. Callers log failures and move on.
#[async_trait]
#[automock]
pub trait NotificationDispatcher {
    async fn notify(&self, notification: NotificationModel) -> Result<()>;
}
