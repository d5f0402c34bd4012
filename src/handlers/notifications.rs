// src/handlers/notifications.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::handlers::auth::require_user;
use crate::storage::memory::Directory;
use crate::utils::RequestError;

pub async fn list_notifications(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    Ok(HttpResponse::Ok().json(storage.notifications_for(&account.id)))
}

/// Someone else's notification id is reported as missing.
pub async fn mark_read(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let notification = storage.mark_notification_read(&account.id, &path)?;
    Ok(HttpResponse::Ok().json(notification))
}

pub async fn mark_all_read(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let updated = storage.mark_all_read(&account.id);
    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}
