// src/storage/memory.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::models::server::{ApprovalStatus, DailyAnalytics, Review, ServerListing, StatusUpdate};
use crate::models::user::{Account, ChatMessage, Notification, NotificationLog, Profile, Role};

/// Chat history kept in memory; older messages fall off the front.
const CHAT_HISTORY_LIMIT: usize = 1000;
const DEFAULT_SESSION_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    NotFound(String),
    Conflict(String),
    UsernameTaken(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "{} not found", what),
            Self::Conflict(what) => write!(f, "{} already exists", what),
            Self::UsernameTaken(name) => write!(f, "Username {} is taken", name),
        }
    }
}

impl std::error::Error for StorageError {}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone)]
struct Session {
    account_id: String,
    expires_at: DateTime<Utc>,
}

/// In-process store for everything the directory persists.
pub struct Directory {
    servers: DashMap<String, ServerListing>,
    notifications: DashMap<String, Notification>,
    notification_logs: RwLock<Vec<NotificationLog>>,
    accounts: DashMap<String, Account>,
    account_emails: DashMap<String, String>,
    profiles: DashMap<String, Profile>,
    /// Lowercased username -> account id.
    usernames: DashMap<String, String>,
    roles: DashMap<String, HashSet<Role>>,
    sessions: DashMap<String, Session>,
    reviews: DashMap<(String, String), Review>,
    view_tracking: DashMap<(String, String), DateTime<Utc>>,
    analytics: DashMap<(String, NaiveDate), DailyAnalytics>,
    chat: RwLock<VecDeque<ChatMessage>>,
    view_dedupe_window: Duration,
    session_ttl: Duration,
}

impl Directory {
    pub fn new(view_dedupe_hours: i64) -> Self {
        Self {
            servers: DashMap::new(),
            notifications: DashMap::new(),
            notification_logs: RwLock::new(Vec::new()),
            accounts: DashMap::new(),
            account_emails: DashMap::new(),
            profiles: DashMap::new(),
            usernames: DashMap::new(),
            roles: DashMap::new(),
            sessions: DashMap::new(),
            reviews: DashMap::new(),
            view_tracking: DashMap::new(),
            analytics: DashMap::new(),
            chat: RwLock::new(VecDeque::new()),
            view_dedupe_window: Duration::hours(view_dedupe_hours),
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    // ---- listings ----

    pub fn insert_server(&self, listing: ServerListing) -> ServerListing {
        self.servers.insert(listing.id.clone(), listing.clone());
        listing
    }

    pub fn get_server(&self, id: &str) -> StorageResult<ServerListing> {
        self.servers
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StorageError::NotFound(format!("Server {}", id)))
    }

    pub fn get_servers(&self) -> Vec<ServerListing> {
        self.servers.iter().map(|r| r.value().clone()).collect()
    }

    pub fn servers_with_status(&self, status: ApprovalStatus) -> Vec<ServerListing> {
        self.servers
            .iter()
            .filter(|r| r.value().status == status)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn servers_owned_by(&self, owner_id: &str) -> Vec<ServerListing> {
        self.servers
            .iter()
            .filter(|r| r.value().owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn update_server<F>(&self, id: &str, f: F) -> StorageResult<ServerListing>
    where
        F: FnOnce(&mut ServerListing),
    {
        let mut entry = self
            .servers
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("Server {}", id)))?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    /// Writes one status check back to the listing. `last_online` only moves
    /// on an online check and a missing motd keeps the previous one.
    pub fn apply_status(&self, id: &str, update: &StatusUpdate) -> StorageResult<ServerListing> {
        self.update_server(id, |server| {
            server.last_checked = Some(update.checked_at);
            server.is_online = update.online;
            server.players = update.players;
            if let Some(motd) = update.motd.as_ref().filter(|m| !m.is_empty()) {
                server.motd = Some(motd.clone());
            }
            if update.online {
                server.last_online = Some(update.checked_at);
            }
        })
    }

    /// Removes a listing together with its reviews and view bookkeeping.
    pub fn remove_server(&self, id: &str) -> StorageResult<ServerListing> {
        let (_, removed) = self
            .servers
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(format!("Server {}", id)))?;
        self.reviews.retain(|(server_id, _), _| server_id != id);
        self.view_tracking.retain(|(server_id, _), _| server_id != id);
        self.analytics.retain(|(server_id, _), _| server_id != id);
        Ok(removed)
    }

    // ---- notifications ----

    pub fn push_notification(&self, notification: Notification) {
        self.notifications.insert(notification.id.clone(), notification);
    }

    /// Newest first.
    pub fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        let mut list: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn mark_notification_read(&self, user_id: &str, id: &str) -> StorageResult<Notification> {
        match self.notifications.get_mut(id) {
            Some(mut entry) if entry.user_id == user_id => {
                entry.read = true;
                Ok(entry.value().clone())
            }
            _ => Err(StorageError::NotFound(format!("Notification {}", id))),
        }
    }

    pub fn mark_all_read(&self, user_id: &str) -> usize {
        let mut count = 0;
        for mut entry in self.notifications.iter_mut() {
            if entry.user_id == user_id && !entry.read {
                entry.read = true;
                count += 1;
            }
        }
        count
    }

    pub fn log_notification(&self, log: NotificationLog) {
        self.notification_logs.write().push(log);
    }

    /// Newest first.
    pub fn notification_logs(&self) -> Vec<NotificationLog> {
        let mut logs = self.notification_logs.read().clone();
        logs.reverse();
        logs
    }

    // ---- accounts ----

    /// Email and username are both unique, compared case-insensitively.
    pub fn create_account(&self, account: Account, profile: Profile, roles: HashSet<Role>) -> StorageResult<Account> {
        let email = account.email.trim().to_lowercase();
        match self.account_emails.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::Conflict(format!("Account {}", account.email)));
            }
            Entry::Vacant(slot) => {
                slot.insert(account.id.clone());
            }
        }
        let claimed = match self.usernames.entry(profile.username.to_lowercase()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(account.id.clone());
                true
            }
        };
        if !claimed {
            self.account_emails.remove(&email);
            return Err(StorageError::UsernameTaken(profile.username));
        }
        self.profiles.insert(account.id.clone(), profile);
        self.roles.insert(account.id.clone(), roles);
        self.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.accounts.get(id).map(|r| r.value().clone())
    }

    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        let id = self.account_emails.get(&email.trim().to_lowercase())?.value().clone();
        self.account(&id)
    }

    /// Oldest account first.
    pub fn accounts(&self) -> Vec<Account> {
        let mut list: Vec<Account> = self.accounts.iter().map(|r| r.value().clone()).collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    pub fn record_sign_in(&self, id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let mut entry = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("Account {}", id)))?;
        entry.last_sign_in_at = Some(at);
        Ok(())
    }

    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).map(|r| r.value().clone())
    }

    /// Applies `f` to a copy of the profile and stores it, moving the
    /// username index entry when the name changed.
    pub fn update_profile<F>(&self, id: &str, f: F) -> StorageResult<Profile>
    where
        F: FnOnce(&mut Profile),
    {
        let mut entry = self
            .profiles
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("Profile {}", id)))?;
        let mut next = entry.value().clone();
        f(&mut next);
        next.id = id.to_string();

        let old_key = entry.username.to_lowercase();
        let new_key = next.username.to_lowercase();
        if new_key != old_key {
            match self.usernames.entry(new_key) {
                Entry::Occupied(_) => return Err(StorageError::UsernameTaken(next.username)),
                Entry::Vacant(slot) => {
                    slot.insert(id.to_string());
                }
            }
            self.usernames.remove(&old_key);
        }
        *entry = next;
        Ok(entry.value().clone())
    }

    pub fn has_role(&self, user_id: &str, role: Role) -> bool {
        self.roles
            .get(user_id)
            .map(|r| r.value().contains(&role))
            .unwrap_or(false)
    }

    /// Hands out a new opaque bearer token for the account.
    pub fn issue_session(&self, account_id: &str) -> String {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        let token = hex::encode(bytes);
        self.sessions.insert(
            token.clone(),
            Session {
                account_id: account_id.to_string(),
                expires_at: Utc::now() + self.session_ttl,
            },
        );
        token
    }

    /// Expired tokens resolve to nothing.
    pub fn resolve_session(&self, token: &str) -> Option<Account> {
        let id = {
            let session = self.sessions.get(token)?;
            if session.expires_at <= Utc::now() {
                return None;
            }
            session.account_id.clone()
        };
        self.account(&id)
    }

    pub fn revoke_session(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn prune_sessions(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before - self.sessions.len()
    }

    // ---- reviews ----

    /// One review per (server, user); a second call replaces the first.
    pub fn upsert_review(
        &self,
        server_id: &str,
        user_id: &str,
        rating: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> StorageResult<Review> {
        if !self.servers.contains_key(server_id) {
            return Err(StorageError::NotFound(format!("Server {}", server_id)));
        }
        let key = (server_id.to_string(), user_id.to_string());
        let mut entry = self.reviews.entry(key).or_insert_with(|| Review {
            id: uuid::Uuid::new_v4().to_string(),
            server_id: server_id.to_string(),
            user_id: user_id.to_string(),
            rating,
            comment: None,
            created_at: now,
            updated_at: now,
        });
        entry.rating = rating;
        entry.comment = comment;
        entry.updated_at = now;
        Ok(entry.value().clone())
    }

    /// Newest first.
    pub fn reviews_for(&self, server_id: &str) -> Vec<Review> {
        let mut list: Vec<Review> = self
            .reviews
            .iter()
            .filter(|r| r.key().0 == server_id)
            .map(|r| r.value().clone())
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// `(review count, average rating)`; the average is 0 with no reviews.
    pub fn rating_summary(&self, server_id: &str) -> (usize, f64) {
        let ratings: Vec<u8> = self
            .reviews
            .iter()
            .filter(|r| r.key().0 == server_id)
            .map(|r| r.value().rating)
            .collect();
        if ratings.is_empty() {
            return (0, 0.0);
        }
        let sum: u32 = ratings.iter().map(|r| *r as u32).sum();
        (ratings.len(), sum as f64 / ratings.len() as f64)
    }

    // ---- view tracking ----

    /// Counts a page view of `server_id` from `ip`. Every call bumps the day's
    /// view counter; a pair not seen within the dedupe window also bumps the
    /// listing total and the day's unique visitors. Returns whether the view
    /// was unique.
    pub fn track_view(&self, server_id: &str, ip: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        if !self.servers.contains_key(server_id) {
            return Err(StorageError::NotFound(format!("Server {}", server_id)));
        }

        let unique = match self.view_tracking.entry((server_id.to_string(), ip.to_string())) {
            Entry::Occupied(mut seen) => {
                if now.signed_duration_since(*seen.get()) >= self.view_dedupe_window {
                    seen.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        };
        if unique {
            self.update_server(server_id, |server| server.views += 1)?;
        }

        let mut day = self
            .analytics
            .entry((server_id.to_string(), now.date_naive()))
            .or_insert_with(|| DailyAnalytics::empty(now.date_naive()));
        day.views += 1;
        if unique {
            day.unique_visitors += 1;
        }
        Ok(unique)
    }

    /// Drops view rows that can no longer affect deduplication.
    pub fn prune_view_tracking(&self, now: DateTime<Utc>) -> usize {
        let before = self.view_tracking.len();
        let window = self.view_dedupe_window;
        self.view_tracking
            .retain(|_, last| now.signed_duration_since(*last) < window);
        before - self.view_tracking.len()
    }

    /// The last `days` days ending at `today`, oldest first, zero-filled.
    pub fn analytics_for(&self, server_id: &str, days: u32, today: NaiveDate) -> Vec<DailyAnalytics> {
        (0..days as i64)
            .rev()
            .map(|offset| {
                let date = today - Duration::days(offset);
                self.analytics
                    .get(&(server_id.to_string(), date))
                    .map(|r| r.value().clone())
                    .unwrap_or_else(|| DailyAnalytics::empty(date))
            })
            .collect()
    }

    // ---- chat ----

    pub fn push_chat(&self, message: ChatMessage) {
        let mut chat = self.chat.write();
        chat.push_back(message);
        while chat.len() > CHAT_HISTORY_LIMIT {
            chat.pop_front();
        }
    }

    /// The latest `limit` messages, oldest first.
    pub fn recent_chat(&self, limit: usize) -> Vec<ChatMessage> {
        let chat = self.chat.read();
        let skip = chat.len().saturating_sub(limit);
        chat.iter().skip(skip).cloned().collect()
    }
}
