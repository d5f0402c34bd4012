// src/models/server.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Unknown approval status: {}", other)),
        }
    }
}

/// A directory entry for one Minecraft server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerListing {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Network address handed to the status source, e.g. `play.example.net:25566`.
    pub ip: String,
    pub description: String,
    pub long_description: String,
    pub version: String,
    pub country: String,
    pub tags: Vec<String>,
    pub website: Option<String>,
    pub discord: Option<String>,
    pub banner_url: String,
    pub logo_url: Option<String>,
    pub max_players: i64,
    pub players: i64,
    pub is_online: bool,
    pub motd: Option<String>,
    pub status: ApprovalStatus,
    pub featured: bool,
    pub verified: bool,
    pub views: u64,
    pub last_checked: Option<DateTime<Utc>>,
    /// Only ever advanced by a check that reported the server online.
    pub last_online: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-editable part of a listing, already validated.
#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub name: String,
    pub ip: String,
    pub description: String,
    pub long_description: String,
    pub version: String,
    pub country: String,
    pub tags: Vec<String>,
    pub website: Option<String>,
    pub discord: Option<String>,
    pub banner_url: String,
    pub logo_url: Option<String>,
    pub max_players: i64,
}

impl ServerListing {
    /// New listings go live immediately; nothing at the write path sets `pending`.
    pub fn from_draft(owner_id: &str, draft: ListingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: draft.name,
            ip: draft.ip,
            description: draft.description,
            long_description: draft.long_description,
            version: draft.version,
            country: draft.country,
            tags: draft.tags,
            website: draft.website,
            discord: draft.discord,
            banner_url: draft.banner_url,
            logo_url: draft.logo_url,
            max_players: draft.max_players,
            players: 0,
            is_online: false,
            motd: None,
            status: ApprovalStatus::Approved,
            featured: false,
            verified: false,
            views: 0,
            last_checked: None,
            last_online: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_draft(&mut self, draft: ListingDraft, now: DateTime<Utc>) {
        self.name = draft.name;
        self.ip = draft.ip;
        self.description = draft.description;
        self.long_description = draft.long_description;
        self.version = draft.version;
        self.country = draft.country;
        self.tags = draft.tags;
        self.website = draft.website;
        self.discord = draft.discord;
        self.banner_url = draft.banner_url;
        self.logo_url = draft.logo_url;
        self.max_players = draft.max_players;
        self.updated_at = now;
    }
}

/// Fields written back by one status check.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub checked_at: DateTime<Utc>,
    pub online: bool,
    pub players: i64,
    pub motd: Option<String>,
}

/// Per-day view counters for a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub views: u64,
    pub unique_visitors: u64,
}

impl DailyAnalytics {
    pub fn empty(date: NaiveDate) -> Self {
        Self { date, views: 0, unique_visitors: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub server_id: String,
    pub user_id: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
