use serde::{Deserialize, Serialize};

/// One query's result from the external status source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSample {
    pub online: bool,
    pub players: i64,
    pub max_players: i64,
    pub motd: Option<String>,
    pub version: Option<String>,
}

impl StatusSample {
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Tri-state view of a listing's live status as the poller publishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub is_loading: bool,
    pub online: bool,
    pub players: i64,
    pub max_players: i64,
}

impl LiveStatus {
    pub fn loading() -> Self {
        Self { is_loading: true, online: false, players: 0, max_players: 0 }
    }

    pub fn offline() -> Self {
        Self { is_loading: false, online: false, players: 0, max_players: 0 }
    }

    pub fn settled(sample: &StatusSample) -> Self {
        if !sample.online {
            return Self::offline();
        }
        Self {
            is_loading: false,
            online: true,
            players: sample.players,
            max_players: sample.max_players,
        }
    }
}
