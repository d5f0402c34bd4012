use futures::future::join_all;
use serde::Serialize;

use crate::models::server::ServerListing;
use crate::status::source::StatusSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTotals {
    pub total_players: i64,
    pub total_servers: usize,
}

/// Sums online players over `servers` with one query each, all in flight at
/// once. Single attempt per server: a failure or an offline answer adds 0.
pub async fn total_players(source: &dyn StatusSource, servers: &[ServerListing]) -> PlayerTotals {
    let counts = join_all(servers.iter().map(|server| async move {
        match source.fetch(&server.ip).await {
            Ok(sample) if sample.online => sample.players,
            _ => 0,
        }
    }))
    .await;

    PlayerTotals {
        total_players: counts.into_iter().sum(),
        total_servers: servers.len(),
    }
}
