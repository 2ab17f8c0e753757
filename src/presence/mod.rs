//! Live room presence.
//!
//! Used to decide whether an end signal should be honored at all: a room
//! that still has live participants is not ended unless the caller forces
//! it. Presence is served by the realtime layer, reached over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[async_trait]
pub trait RoomPresence: Send + Sync {
    async fn participant_count(&self, room_name: &str) -> Result<usize>;
}

#[derive(Debug, Deserialize)]
struct PresenceResponse {
    count: usize,
}

pub struct HttpRoomPresence {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoomPresence {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl RoomPresence for HttpRoomPresence {
    async fn participant_count(&self, room_name: &str) -> Result<usize> {
        let url = format!("{}/rooms/{}/participants/count", self.base_url, room_name);
        debug!("Querying room presence: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to query room presence")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Presence service returned {}", status);
        }

        let presence: PresenceResponse = response
            .json()
            .await
            .context("Failed to parse presence response")?;
        Ok(presence.count)
    }
}

/// Presence stand-in when no realtime service is configured: every room
/// reads as empty, so end signals are always honored.
pub struct NoPresence;

#[async_trait]
impl RoomPresence for NoPresence {
    async fn participant_count(&self, _room_name: &str) -> Result<usize> {
        Ok(0)
    }
}
