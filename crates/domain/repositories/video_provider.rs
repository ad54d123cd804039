use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::sessions::VideoRoomModel;

#[async_trait]
#[automock]
pub trait VideoProvider {
    async fn create_room(&self, session_id: Uuid, host_id: Uuid) -> Result<VideoRoomModel>;
    async fn end_room(&self, room_ref: &str) -> Result<()>;
    async fn get_recording(&self, room_ref: &str) -> Result<Option<String>>;
}
