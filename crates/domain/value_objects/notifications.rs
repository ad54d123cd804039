use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::notification_types::NotificationType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationModel {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

impl NotificationModel {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            metadata,
        }
    }
}
