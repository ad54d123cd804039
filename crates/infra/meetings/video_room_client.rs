use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use crate::domain::{
    repositories::video_provider::VideoProvider, value_objects::sessions::VideoRoomModel,
};

/// REST client for the meeting-room service (`POST /rooms`, `POST /rooms/{ref}/end`,
/// `GET /rooms/{ref}/recording`).
pub struct VideoRoomClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct CreateRoomRequest {
    name: String,
    host_id: Uuid,
    external_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RoomResponse {
    id: String,
    join_url: String,
}

#[derive(Debug, Deserialize)]
struct RecordingResponse {
    url: Option<String>,
    status: Option<String>,
}

impl VideoRoomClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self> {
        let base_url = Url::parse(base_url).context("VIDEO_API_URL is not a valid url")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).context("building video api url")
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        error!(status = %status, body = %body, context = %context, "video: api request failed");
        bail!("video api request failed: {context} (status {status})");
    }
}

#[async_trait]
impl VideoProvider for VideoRoomClient {
    async fn create_room(&self, session_id: Uuid, host_id: Uuid) -> Result<VideoRoomModel> {
        let resp = self
            .http
            .post(self.endpoint("/rooms")?)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&CreateRoomRequest {
                name: format!("session-{session_id}"),
                host_id,
                external_id: session_id,
            })
            .send()
            .await?;
        let room: RoomResponse = Self::ensure_success(resp, "create room").await?.json().await?;

        info!(%session_id, room_ref = %room.id, "video: room created");
        Ok(VideoRoomModel {
            room_ref: room.id,
            join_url: room.join_url,
        })
    }

    async fn end_room(&self, room_ref: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.endpoint(&format!("/rooms/{room_ref}/end"))?)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;
        // Ending an already-closed room is not an error.
        if resp.status() == StatusCode::NOT_FOUND || resp.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        Self::ensure_success(resp, "end room").await?;
        Ok(())
    }

    async fn get_recording(&self, room_ref: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(self.endpoint(&format!("/rooms/{room_ref}/recording"))?)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let recording: RecordingResponse = Self::ensure_success(resp, "get recording")
            .await?
            .json()
            .await?;

        Ok(match recording.status.as_deref() {
            Some("ready") | None => recording.url,
            Some(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = VideoRoomClient::new("https://video.example.com/api/", "key".to_string()).unwrap();

        assert_eq!(
            client.endpoint("/rooms/abc/end").unwrap().as_str(),
            "https://video.example.com/api/rooms/abc/end"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(VideoRoomClient::new("not a url", "key".to_string()).is_err());
    }
}
