// src/handlers/index.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::models::server::ApprovalStatus;
use crate::storage::memory::Directory;

pub async fn index(storage: web::Data<Directory>) -> HttpResponse {
    let listed = storage.servers_with_status(ApprovalStatus::Approved).len();
    HttpResponse::Ok().json(json!({ "status": "ok", "servers": listed }))
}
