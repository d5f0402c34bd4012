// src/handlers/stats.rs
use actix_web::{web, HttpResponse};
use log::debug;

use crate::models::server::ApprovalStatus;
use crate::status::aggregate;
use crate::status::source::StatusSource;
use crate::storage::memory::Directory;

/// Live player count across every approved listing.
pub async fn total_players(
    storage: web::Data<Directory>,
    status: web::Data<dyn StatusSource>,
) -> HttpResponse {
    let servers = storage.servers_with_status(ApprovalStatus::Approved);
    let totals = aggregate::total_players(status.get_ref(), &servers).await;
    debug!("{} players across {} servers", totals.total_players, totals.total_servers);
    HttpResponse::Ok().json(totals)
}
