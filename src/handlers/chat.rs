// src/handlers/chat.rs
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::handlers::auth::require_user;
use crate::models::user::{ChatMessage, Role};
use crate::storage::memory::Directory;
use crate::utils::{check_rate, Limiters, RequestError};

const DEFAULT_HISTORY: usize = 100;
const MAX_MESSAGE_LEN: usize = 500;
const LINK_MARKERS: [&str; 4] = ["http://", "https://", "www.", "discord.gg/"];

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub is_admin: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

fn entry(storage: &Directory, message: ChatMessage) -> ChatEntry {
    ChatEntry {
        username: storage
            .profile(&message.user_id)
            .map(|p| p.username)
            .unwrap_or_else(|| "Unknown".to_string()),
        is_admin: storage.has_role(&message.user_id, Role::Admin),
        id: message.id,
        user_id: message.user_id,
        message: message.message,
        created_at: message.created_at,
    }
}

pub fn contains_link(message: &str) -> bool {
    let lower = message.to_lowercase();
    LINK_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn list_messages(
    storage: web::Data<Directory>,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY);
    let entries: Vec<ChatEntry> = storage
        .recent_chat(limit)
        .into_iter()
        .map(|m| entry(&storage, m))
        .collect();
    HttpResponse::Ok().json(entries)
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub message: String,
}

pub async fn post_message(
    req: HttpRequest,
    storage: web::Data<Directory>,
    limiters: web::Data<Limiters>,
    body: web::Json<PostMessage>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    check_rate(&limiters.chat, &account.id, "chat")?;

    let text = body.message.trim();
    if text.is_empty() {
        return Err(RequestError::BadRequest("Message cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(RequestError::BadRequest(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LEN
        )));
    }
    if !storage.has_role(&account.id, Role::Admin) && contains_link(text) {
        debug!("Blocked link from {}", account.id);
        return Err(RequestError::BadRequest("Links are not allowed".to_string()));
    }

    let message = ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: account.id,
        message: text.to_string(),
        created_at: Utc::now(),
    };
    storage.push_chat(message.clone());
    Ok(HttpResponse::Created().json(entry(&storage, message)))
}
