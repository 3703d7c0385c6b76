use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::application::ports::{MediaDefaults, Room, RoomError, RoomProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.daily.co/v1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct RoomResponse {
    name: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Room provider backed by a Daily-style REST API.
pub struct HttpRoomProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRoomProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_timeout(base_url, api_key, REQUEST_TIMEOUT)
    }

    /// `timeout` bounds each request from connect to the last body byte.
    pub fn with_timeout(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_room(&self, name: &str) -> Result<Room, RoomError> {
        let response = self
            .client
            .get(self.url(&format!("/rooms/{}", name)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RoomError::Request(e.to_string()))?;
        let room: RoomResponse = parse(response).await?;
        Ok(Room {
            name: room.name,
            url: room.url,
        })
    }
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, RoomError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RoomError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| RoomError::Malformed(e.to_string()))
}

#[async_trait]
impl RoomProvider for HttpRoomProvider {
    async fn ensure_room(&self, name: &str, expires_at: DateTime<Utc>) -> Result<Room, RoomError> {
        let response = self
            .client
            .post(self.url("/rooms"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "name": name,
                "privacy": "private",
                "properties": {
                    "exp": expires_at.timestamp(),
                    "eject_at_room_exp": true,
                }
            }))
            .send()
            .await
            .map_err(|e| RoomError::Request(e.to_string()))?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("already exists") {
                debug!("room {} already exists, fetching it", name);
                return self.fetch_room(name).await;
            }
            return Err(RoomError::Status {
                status: StatusCode::BAD_REQUEST.as_u16(),
                body,
            });
        }

        let room: RoomResponse = parse(response).await?;
        Ok(Room {
            name: room.name,
            url: room.url,
        })
    }

    async fn issue_room_token(
        &self,
        name: &str,
        expires_at: DateTime<Utc>,
        is_owner: bool,
        media: MediaDefaults,
    ) -> Result<String, RoomError> {
        let response = self
            .client
            .post(self.url("/meeting-tokens"))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "properties": {
                    "room_name": name,
                    "exp": expires_at.timestamp(),
                    "is_owner": is_owner,
                    "start_audio_off": media.start_audio_off,
                    "start_video_off": media.start_video_off,
                }
            }))
            .send()
            .await
            .map_err(|e| RoomError::Request(e.to_string()))?;
        let token: TokenResponse = parse(response).await?;
        Ok(token.token)
    }

    async fn delete_room(&self, name: &str) -> Result<(), RoomError> {
        let response = self
            .client
            .delete(self.url(&format!("/rooms/{}", name)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RoomError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(RoomError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}
