// src/sweep.rs
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::models::server::{ApprovalStatus, StatusUpdate};
use crate::models::user::{Notification, NotificationCategory};
use crate::status::source::{sample_or_offline, StatusSource};
use crate::storage::memory::Directory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineState {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepUpdate {
    pub id: String,
    pub status: OnlineState,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub success: bool,
    pub checked: usize,
    pub updates: Vec<SweepUpdate>,
}

#[derive(Debug, Clone, Copy)]
pub struct OfflinePolicy {
    /// Owners are warned on exactly this many whole days offline.
    pub warning_days: i64,
    /// Listings offline for at least this many whole days are deleted.
    pub deletion_days: i64,
}

impl OfflinePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            warning_days: config.offline_warning_days,
            deletion_days: config.offline_deletion_days,
        }
    }
}

impl Default for OfflinePolicy {
    fn default() -> Self {
        Self { warning_days: 15, deletion_days: 30 }
    }
}

/// One pass over every approved listing, one at a time.
///
/// The warning fires on `days == warning_days` only, so a day the sweep did
/// not run is a day the warning can be missed.
pub async fn run_sweep(
    store: &Directory,
    source: &dyn StatusSource,
    policy: &OfflinePolicy,
    now: DateTime<Utc>,
) -> SweepSummary {
    let servers = store.servers_with_status(ApprovalStatus::Approved);
    info!("Checking {} servers", servers.len());

    let mut updates = Vec::with_capacity(servers.len());
    for server in &servers {
        let sample = sample_or_offline(source, &server.ip).await;

        let update = StatusUpdate {
            checked_at: now,
            online: sample.online,
            players: if sample.online { sample.players } else { 0 },
            motd: sample.motd.clone(),
        };
        if let Err(e) = store.apply_status(&server.id, &update) {
            error!("Error updating server {}: {}", server.id, e);
            continue;
        }

        if let (false, Some(last_online)) = (sample.online, server.last_online) {
            let days_offline = now.signed_duration_since(last_online).num_days();
            info!("Server {} offline for {} days", server.name, days_offline);

            if days_offline >= policy.deletion_days {
                match store.remove_server(&server.id) {
                    Ok(_) => store.push_notification(Notification::new(
                        &server.owner_id,
                        "Server Deleted - Offline Too Long".to_string(),
                        format!(
                            "Your server \"{}\" has been automatically deleted as it has been offline for more than {} days.",
                            server.name, policy.deletion_days
                        ),
                        NotificationCategory::Danger,
                    )),
                    Err(e) => error!("Error deleting server {}: {}", server.id, e),
                }
                continue;
            }

            if days_offline == policy.warning_days {
                store.push_notification(Notification::new(
                    &server.owner_id,
                    "Server Offline Warning".to_string(),
                    format!(
                        "Your server \"{}\" has been offline for {} days. It will be automatically deleted if it remains offline for {} days.",
                        server.name, policy.warning_days, policy.deletion_days
                    ),
                    NotificationCategory::Warning,
                ));
            }
        }

        updates.push(SweepUpdate {
            id: server.id.clone(),
            status: if sample.online { OnlineState::Online } else { OnlineState::Offline },
        });
    }

    SweepSummary {
        success: true,
        checked: servers.len(),
        updates,
    }
}

/// Runs the sweep every `interval`, starting immediately, and prunes stale
/// view-tracking rows and expired sessions after each pass.
pub fn spawn_schedule(
    store: Arc<Directory>,
    source: Arc<dyn StatusSource>,
    policy: OfflinePolicy,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let summary = run_sweep(&store, source.as_ref(), &policy, Utc::now()).await;
            let online = summary
                .updates
                .iter()
                .filter(|u| u.status == OnlineState::Online)
                .count();
            info!(
                "Scheduled sweep checked {} servers, {} online",
                summary.checked, online
            );
            let pruned = store.prune_view_tracking(Utc::now());
            if pruned > 0 {
                debug!("Pruned {} stale view-tracking rows", pruned);
            }
            let expired = store.prune_sessions(Utc::now());
            if expired > 0 {
                debug!("Pruned {} expired sessions", expired);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::server::ServerListing;
    use crate::status::testing::{Reply, ScriptedSource};
    use crate::storage::memory::tests::draft;
    use chrono::Duration as ChronoDuration;

    fn seed(store: &Directory, ip: &str, last_online: Option<DateTime<Utc>>) -> ServerListing {
        let mut listing = ServerListing::from_draft("owner-1", draft(&format!("Server {}", ip), ip), Utc::now());
        listing.last_online = last_online;
        listing.motd = Some("old motd".to_string());
        store.insert_server(listing)
    }

    #[tokio::test]
    async fn persists_status_and_reports_updates() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("up", vec![Reply::Online { players: 4, max: 10, motd: Some("Welcome".into()) }]);
        source.script("down", vec![Reply::Offline]);
        let up = seed(&store, "up", None);
        let down = seed(&store, "down", None);
        let now = Utc::now();

        let summary = run_sweep(&store, &source, &OfflinePolicy::default(), now).await;

        assert!(summary.success);
        assert_eq!(summary.checked, 2);
        assert!(summary.updates.contains(&SweepUpdate { id: up.id.clone(), status: OnlineState::Online }));
        assert!(summary.updates.contains(&SweepUpdate { id: down.id.clone(), status: OnlineState::Offline }));

        let up = store.get_server(&up.id).unwrap();
        assert!(up.is_online);
        assert_eq!(up.players, 4);
        assert_eq!(up.motd.as_deref(), Some("Welcome"));
        assert_eq!(up.last_online, Some(now));

        let down = store.get_server(&down.id).unwrap();
        assert!(!down.is_online);
        assert_eq!(down.motd.as_deref(), Some("old motd"));
        assert_eq!(down.last_checked, Some(now));
        assert_eq!(down.last_online, None);
    }

    #[tokio::test]
    async fn transport_errors_count_as_offline() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        let listing = seed(&store, "unscripted", None);

        let summary = run_sweep(&store, &source, &OfflinePolicy::default(), Utc::now()).await;

        assert_eq!(summary.updates[0].status, OnlineState::Offline);
        assert!(!store.get_server(&listing.id).unwrap().is_online);
    }

    #[tokio::test]
    async fn only_approved_listings_are_swept() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        let listing = seed(&store, "pending", None);
        store
            .update_server(&listing.id, |s| s.status = ApprovalStatus::Rejected)
            .unwrap();

        let summary = run_sweep(&store, &source, &OfflinePolicy::default(), Utc::now()).await;

        assert_eq!(summary.checked, 0);
        assert_eq!(source.total_calls(), 0);
    }

    #[tokio::test]
    async fn rerun_without_elapsed_time_changes_nothing() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("up", vec![Reply::online(6, 10)]);
        source.script("down", vec![Reply::Offline]);
        let now = Utc::now();
        let up = seed(&store, "up", None);
        let down = seed(&store, "down", Some(now - ChronoDuration::days(3)));
        let ids = [up.id.clone(), down.id.clone()];

        run_sweep(&store, &source, &OfflinePolicy::default(), now).await;
        let first: Vec<_> = ids.iter().map(|id| store.get_server(id).unwrap()).collect();
        run_sweep(&store, &source, &OfflinePolicy::default(), now).await;
        let second: Vec<_> = ids.iter().map(|id| store.get_server(id).unwrap()).collect();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.is_online, b.is_online);
            assert_eq!(a.players, b.players);
            assert_eq!(a.last_online, b.last_online);
            assert_eq!(b.last_checked, Some(now));
        }
        assert!(store.notifications_for("owner-1").is_empty());
    }

    #[tokio::test]
    async fn last_checked_always_advances() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("down", vec![Reply::Offline]);
        let now = Utc::now();
        let down = seed(&store, "down", Some(now - ChronoDuration::days(3)));

        run_sweep(&store, &source, &OfflinePolicy::default(), now).await;
        let later = now + ChronoDuration::minutes(10);
        run_sweep(&store, &source, &OfflinePolicy::default(), later).await;

        let down = store.get_server(&down.id).unwrap();
        assert_eq!(down.last_checked, Some(later));
        assert_eq!(down.last_online, Some(now - ChronoDuration::days(3)));
    }

    #[tokio::test]
    async fn deletion_boundary_is_thirty_whole_days() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("almost", vec![Reply::Offline]);
        source.script("expired", vec![Reply::Offline]);
        let now = Utc::now();
        let almost = seed(&store, "almost", Some(now - ChronoDuration::days(29) - ChronoDuration::hours(23)));
        let expired = seed(&store, "expired", Some(now - ChronoDuration::days(30)));

        let summary = run_sweep(&store, &source, &OfflinePolicy::default(), now).await;

        assert!(store.get_server(&almost.id).is_ok());
        assert!(store.get_server(&expired.id).is_err());
        assert_eq!(summary.checked, 2);
        assert_eq!(summary.updates, vec![SweepUpdate { id: almost.id.clone(), status: OnlineState::Offline }]);

        let notes = store.notifications_for("owner-1");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Server Deleted - Offline Too Long");
        assert!(notes[0].message.contains(&expired.name));
    }

    #[tokio::test]
    async fn warning_fires_on_exactly_fifteen_days() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("fifteen", vec![Reply::Offline]);
        source.script("sixteen", vec![Reply::Offline]);
        let now = Utc::now();
        seed(&store, "fifteen", Some(now - ChronoDuration::days(15)));
        seed(&store, "sixteen", Some(now - ChronoDuration::days(16)));

        run_sweep(&store, &source, &OfflinePolicy::default(), now).await;

        let notes = store.notifications_for("owner-1");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Server Offline Warning");
        assert_eq!(notes[0].category, NotificationCategory::Warning);
        assert!(notes[0].message.contains("Server fifteen"));
    }

    #[tokio::test]
    async fn online_listing_is_never_deleted() {
        let store = Directory::new(24);
        let source = ScriptedSource::new();
        source.script("back", vec![Reply::online(1, 10)]);
        let now = Utc::now();
        let listing = seed(&store, "back", Some(now - ChronoDuration::days(45)));

        run_sweep(&store, &source, &OfflinePolicy::default(), now).await;

        let listing = store.get_server(&listing.id).unwrap();
        assert_eq!(listing.last_online, Some(now));
    }
}
