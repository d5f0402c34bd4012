// src/handlers/admin.rs
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{error, info};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::auth::{require_admin, validate_username};
use crate::handlers::servers::optional;
use crate::models::server::ApprovalStatus;
use crate::models::user::{Notification, NotificationCategory, NotificationLog};
use crate::storage::memory::Directory;
use crate::utils::RequestError;

pub async fn list_all_servers(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    require_admin(&req, &storage)?;
    let mut servers = storage.get_servers();
    servers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(servers))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

/// Moderation decision. Listings can be approved or rejected, never sent
/// back to pending.
pub async fn set_server_status(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
    body: web::Json<StatusChange>,
) -> Result<HttpResponse, RequestError> {
    let admin = require_admin(&req, &storage)?;
    let status = match body.status.parse::<ApprovalStatus>() {
        Ok(s @ (ApprovalStatus::Approved | ApprovalStatus::Rejected)) => s,
        _ => {
            return Err(RequestError::BadRequest(format!(
                "Invalid status: {}",
                body.status
            )))
        }
    };
    let updated = storage.update_server(&path, |s| {
        s.status = status;
        s.updated_at = Utc::now();
    })?;
    info!("Server {} {} by {}", updated.id, status, admin.id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn toggle_featured(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    require_admin(&req, &storage)?;
    let updated = storage.update_server(&path, |s| s.featured = !s.featured)?;
    info!("Server {} featured: {}", updated.id, updated.featured);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn toggle_verified(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    require_admin(&req, &storage)?;
    let updated = storage.update_server(&path, |s| s.verified = !s.verified)?;
    info!("Server {} verified: {}", updated.id, updated.verified);
    Ok(HttpResponse::Ok().json(updated))
}

#[derive(Debug, Deserialize)]
pub struct SendNotification {
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    pub category: Option<String>,
}

pub async fn send_notification(
    req: HttpRequest,
    storage: web::Data<Directory>,
    body: web::Json<SendNotification>,
) -> Result<HttpResponse, RequestError> {
    let admin = require_admin(&req, &storage)?;
    let body = body.into_inner();

    let title = body.title.trim();
    let message = body.message.trim();
    if title.is_empty() || message.is_empty() {
        return Err(RequestError::BadRequest("Please fill in title and message".to_string()));
    }
    if body.user_ids.is_empty() {
        return Err(RequestError::BadRequest("Please select at least one user".to_string()));
    }
    let category = match body.category.as_deref() {
        None | Some("") => NotificationCategory::default(),
        Some(raw) => raw.parse().map_err(RequestError::BadRequest)?,
    };
    if let Some(missing) = body.user_ids.iter().find(|id| storage.account(id).is_none()) {
        error!("Notification addressed to unknown user {}", missing);
        return Err(RequestError::BadRequest(format!("Unknown user: {}", missing)));
    }

    for recipient in &body.user_ids {
        storage.push_notification(Notification::new(
            recipient,
            title.to_string(),
            message.to_string(),
            category,
        ));
        storage.log_notification(NotificationLog {
            id: uuid::Uuid::new_v4().to_string(),
            admin_id: admin.id.clone(),
            recipient_id: recipient.clone(),
            title: title.to_string(),
            message: message.to_string(),
            category,
            created_at: Utc::now(),
        });
    }

    info!("Admin {} sent \"{}\" to {} users", admin.id, title, body.user_ids.len());
    Ok(HttpResponse::Ok().json(json!({ "sent": body.user_ids.len() })))
}

#[derive(Debug, Deserialize)]
pub struct UserEdit {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_premium: Option<bool>,
}

pub async fn update_user(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
    body: web::Json<UserEdit>,
) -> Result<HttpResponse, RequestError> {
    let admin = require_admin(&req, &storage)?;
    let edit = body.into_inner();
    let username = edit.username.as_deref().map(validate_username).transpose()?;
    let full_name = edit.full_name.map(|n| optional(Some(n)));

    let profile = storage.update_profile(&path, |p| {
        if let Some(username) = username {
            p.username = username;
        }
        if let Some(full_name) = full_name {
            p.full_name = full_name;
        }
        if let Some(is_premium) = edit.is_premium {
            p.is_premium = is_premium;
        }
    })?;
    info!("User {} updated by {}", profile.id, admin.id);
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn notification_logs(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    require_admin(&req, &storage)?;
    Ok(HttpResponse::Ok().json(storage.notification_logs()))
}
