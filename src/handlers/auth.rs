// src/handlers/auth.rs
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::config::Config;
use crate::models::user::{Account, Profile, Role};
use crate::storage::memory::{Directory, StorageError};
use crate::utils::{bearer_token, RequestError};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_USERNAME_LEN: usize = 32;

pub fn new_salt() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Trimmed username of 1 to 32 characters.
pub fn validate_username(raw: &str) -> Result<String, RequestError> {
    let username = raw.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(RequestError::BadRequest(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

/// Resolves the bearer token to an account; anything else is a 401.
pub fn require_user(req: &HttpRequest, store: &Directory) -> Result<Account, RequestError> {
    let token = bearer_token(req).ok_or(RequestError::Unauthorized)?;
    store.resolve_session(token).ok_or_else(|| {
        debug!("Rejected unknown session token");
        RequestError::Unauthorized
    })
}

/// Like [`require_user`] but the account must also hold the admin role (403).
pub fn require_admin(req: &HttpRequest, store: &Directory) -> Result<Account, RequestError> {
    let account = require_user(req, store)?;
    if !store.has_role(&account.id, Role::Admin) {
        warn!("Non-admin {} attempted an admin action", account.id);
        return Err(RequestError::Forbidden("Forbidden - Admin access required".to_string()));
    }
    Ok(account)
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub user_id: String,
}

pub async fn signup(
    store: web::Data<Directory>,
    config: web::Data<Config>,
    body: web::Json<SignupRequest>,
) -> Result<HttpResponse, RequestError> {
    let body = body.into_inner();
    let email = body.email.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(RequestError::BadRequest("Invalid email address".to_string()));
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(RequestError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let username = validate_username(&body.username)?;

    let salt = new_salt();
    let account = Account {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.clone(),
        password_hash: hash_password(&salt, &body.password),
        password_salt: salt,
        created_at: Utc::now(),
        last_sign_in_at: Some(Utc::now()),
    };
    let profile = Profile {
        id: account.id.clone(),
        username,
        full_name: body.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        avatar_url: None,
        is_premium: false,
    };
    let mut roles = HashSet::from([Role::User]);
    if config.is_admin_email(&email) {
        roles.insert(Role::Admin);
    }

    let account = store.create_account(account, profile, roles).map_err(|e| match e {
        StorageError::Conflict(_) => RequestError::Conflict("User already registered".to_string()),
        other => other.into(),
    })?;
    let access_token = store.issue_session(&account.id);
    info!("Registered account {}", account.id);

    Ok(HttpResponse::Created().json(SessionResponse {
        access_token,
        user_id: account.id,
    }))
}

pub async fn login(
    store: web::Data<Directory>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, RequestError> {
    let account = match store.account_by_email(&body.email) {
        Some(a) => a,
        None => {
            debug!("Login for unknown email");
            return Err(RequestError::Unauthorized);
        }
    };
    if hash_password(&account.password_salt, &body.password) != account.password_hash {
        warn!("Failed login for account {}", account.id);
        return Err(RequestError::Unauthorized);
    }

    store.record_sign_in(&account.id, Utc::now())?;
    let access_token = store.issue_session(&account.id);
    Ok(HttpResponse::Ok().json(SessionResponse {
        access_token,
        user_id: account.id,
    }))
}

pub async fn logout(req: HttpRequest, store: web::Data<Directory>) -> Result<HttpResponse, RequestError> {
    let token = bearer_token(&req).ok_or(RequestError::Unauthorized)?;
    if !store.revoke_session(token) {
        return Err(RequestError::Unauthorized);
    }
    Ok(HttpResponse::NoContent().finish())
}
