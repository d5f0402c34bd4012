// src/status/source.rs
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::models::status::StatusSample;

const USER_AGENT: &str = concat!("blockdir/", env!("CARGO_PKG_VERSION"));

#[derive(Debug)]
pub enum StatusError {
    Transport(String),
    Http(u16),
    Decode(String),
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Status request failed: {}", e),
            Self::Http(code) => write!(f, "Status source answered HTTP {}", code),
            Self::Decode(e) => write!(f, "Malformed status response: {}", e),
        }
    }
}

impl std::error::Error for StatusError {}

/// Anything that can tell whether a Minecraft server is reachable.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<StatusSample, StatusError>;
}

/// Single attempt; any failure reads as an offline server.
pub async fn sample_or_offline(source: &dyn StatusSource, address: &str) -> StatusSample {
    match source.fetch(address).await {
        Ok(sample) => sample,
        Err(e) => {
            warn!("Error checking server {}: {}", address, e);
            StatusSample::offline()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    #[serde(default)]
    online: bool,
    players: Option<RawPlayers>,
    motd: Option<RawMotd>,
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlayers {
    #[serde(default)]
    online: i64,
    #[serde(default)]
    max: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RawMotd {
    #[serde(default)]
    clean: Vec<String>,
    #[serde(default)]
    raw: Vec<String>,
}

impl From<RawStatus> for StatusSample {
    fn from(raw: RawStatus) -> Self {
        let players = raw.players.unwrap_or_default();
        let motd = raw.motd.and_then(|m| {
            let clean = m.clean.join(" ");
            if !clean.is_empty() {
                return Some(clean);
            }
            let raw = m.raw.join(" ");
            (!raw.is_empty()).then_some(raw)
        });
        StatusSample {
            online: raw.online,
            players: players.online,
            max_players: players.max,
            motd,
            version: raw.version.filter(|v| !v.is_empty()),
        }
    }
}

/// Client for the mcsrvstat.us v3 API (or anything answering in its format).
pub struct McSrvStatClient {
    client: reqwest::Client,
    base_url: String,
}

impl McSrvStatClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusSource for McSrvStatClient {
    async fn fetch(&self, address: &str) -> Result<StatusSample, StatusError> {
        let url = format!("{}/{}", self.base_url, address.trim());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StatusError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StatusError::Http(response.status().as_u16()));
        }

        let raw = response
            .json::<RawStatus>()
            .await
            .map_err(|e| StatusError::Decode(e.to_string()))?;
        debug!("Server {} status: online={} players={:?}", address, raw.online, raw.players);
        Ok(raw.into())
    }
}
