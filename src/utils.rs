// src/utils.rs
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, ResponseError};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{clock::DefaultClock, RateLimiter};
use log::{debug, warn};
use serde_json::json;
use std::fmt;

use crate::config::Config;
use crate::storage::memory::StorageError;

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Used when no proxy header names the caller.
pub const UNKNOWN_IP: &str = "unknown";

#[derive(Debug)]
pub enum RequestError {
    Unauthorized,
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    RateLimitExceeded,
    Internal(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::Forbidden(msg) => write!(f, "{}", msg),
            Self::BadRequest(msg) => write!(f, "{}", msg),
            Self::NotFound(msg) => write!(f, "{}", msg),
            Self::Conflict(msg) => write!(f, "{}", msg),
            Self::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            Self::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl ResponseError for RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        with_cors(&mut HttpResponse::build(self.status_code()))
            .json(json!({ "error": self.to_string() }))
    }
}

impl From<StorageError> for RequestError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::NotFound(e.to_string()),
            StorageError::Conflict(_) => Self::Conflict(e.to_string()),
            StorageError::UsernameTaken(_) => {
                Self::Conflict("This username is already taken".to_string())
            }
        }
    }
}

pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-caller rate limiters, one per throttled action.
pub struct Limiters {
    pub track_view: KeyedLimiter,
    pub submit: KeyedLimiter,
    pub chat: KeyedLimiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Self {
        Self {
            track_view: RateLimiter::keyed(config.track_view_quota()),
            submit: RateLimiter::keyed(config.submit_quota()),
            chat: RateLimiter::keyed(config.chat_quota()),
        }
    }
}

pub fn check_rate(limiter: &KeyedLimiter, key: &str, action: &str) -> Result<(), RequestError> {
    if limiter.check_key(&key.to_string()).is_err() {
        warn!("Rate limit exceeded for {} by {}", action, key);
        return Err(RequestError::RateLimitExceeded);
    }
    Ok(())
}

/// Adds the permissive CORS headers the browser-facing functions answer with.
pub fn with_cors(builder: &mut HttpResponseBuilder) -> &mut HttpResponseBuilder {
    builder
        .insert_header(("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN))
        .insert_header(("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS))
}

pub async fn cors_preflight() -> HttpResponse {
    with_cors(&mut HttpResponse::Ok()).finish()
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Caller address as the proxies in front of us report it.
///
/// Prefers the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// `CF-Connecting-IP`. The value is not parsed; whatever the proxy sent is
/// what views get attributed to.
pub fn extract_client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded_for) = header_str(req, "X-Forwarded-For") {
        if let Some(first_ip) = forwarded_for.split(',').next().map(str::trim) {
            if !first_ip.is_empty() {
                return first_ip.to_string();
            }
        }
    }

    if let Some(real_ip) = header_str(req, "X-Real-IP") {
        debug!("Using X-Real-IP: {}", real_ip);
        return real_ip.to_string();
    }

    if let Some(cf_ip) = header_str(req, "CF-Connecting-IP") {
        return cf_ip.to_string();
    }

    UNKNOWN_IP.to_string()
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    header_str(req, "Authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
