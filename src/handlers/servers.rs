// src/handlers/servers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, error, info};
use serde::Deserialize;

use crate::config::Config;
use crate::handlers::auth::require_user;
use crate::models::server::{ApprovalStatus, ListingDraft, ServerListing};
use crate::models::user::{Account, Role};
use crate::search::{ListingQuery, RatedListing};
use crate::status::poller::{RetryPolicy, StatusPoller};
use crate::status::source::StatusSource;
use crate::storage::memory::Directory;
use crate::utils::{check_rate, Limiters, RequestError};

const DEFAULT_ANALYTICS_DAYS: u32 = 7;
const MAX_ANALYTICS_DAYS: u32 = 90;

/// Submission and edit form. Tags arrive as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingForm {
    pub name: String,
    pub ip: String,
    pub description: String,
    #[serde(default)]
    pub long_description: String,
    pub version: String,
    pub country: String,
    #[serde(default)]
    pub tags: String,
    pub website: Option<String>,
    pub discord: Option<String>,
    pub max_players: i64,
    pub banner_url: String,
    pub logo_url: Option<String>,
}

pub(crate) fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &str, min: usize, max: Option<usize>) -> Result<(), String> {
    let len = value.chars().count();
    if len < min {
        return Err(format!("{} must be at least {} characters", field, min));
    }
    if let Some(max) = max {
        if len > max {
            return Err(format!("{} must be at most {} characters", field, max));
        }
    }
    Ok(())
}

impl ListingForm {
    pub fn validate(self) -> Result<ListingDraft, String> {
        let name = self.name.trim().to_string();
        let ip = self.ip.trim().to_string();
        let description = self.description.trim().to_string();
        let long_description = self.long_description.trim().to_string();
        let version = self.version.trim().to_string();
        let country = self.country.trim().to_uppercase();
        let banner_url = self.banner_url.trim().to_string();

        check_len("Name", &name, 3, Some(100))?;
        check_len("Server address", &ip, 3, None)?;
        check_len("Description", &description, 10, Some(200))?;
        check_len("Long description", &long_description, 50, Some(2000))?;
        check_len("Version", &version, 1, None)?;
        check_len("Country", &country, 2, None)?;

        if !(1..=100_000).contains(&self.max_players) {
            return Err("Max players must be between 1 and 100000".to_string());
        }
        if !is_http_url(&banner_url) {
            return Err("Banner URL must be a valid URL".to_string());
        }
        let website = optional(self.website);
        if matches!(&website, Some(w) if !is_http_url(w)) {
            return Err("Website must be a valid URL".to_string());
        }
        let logo_url = optional(self.logo_url);
        if matches!(&logo_url, Some(l) if !is_http_url(l)) {
            return Err("Logo URL must be a valid URL".to_string());
        }

        let tags = self
            .tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ListingDraft {
            name,
            ip,
            description,
            long_description,
            version,
            country,
            tags,
            website,
            discord: optional(self.discord),
            banner_url,
            logo_url,
            max_players: self.max_players,
        })
    }
}

fn rate(storage: &Directory, listing: ServerListing) -> RatedListing {
    let (review_count, average_rating) = storage.rating_summary(&listing.id);
    RatedListing { listing, review_count, average_rating }
}

/// Owners manage their own listings; admins manage all of them.
fn require_manager(storage: &Directory, account: &Account, listing: &ServerListing) -> Result<(), RequestError> {
    if listing.owner_id == account.id || storage.has_role(&account.id, Role::Admin) {
        return Ok(());
    }
    Err(RequestError::Forbidden("You do not manage this server".to_string()))
}

pub async fn list_servers(
    storage: web::Data<Directory>,
    query: web::Query<ListingQuery>,
) -> HttpResponse {
    let listings = storage
        .servers_with_status(ApprovalStatus::Approved)
        .into_iter()
        .map(|l| rate(&storage, l))
        .collect();
    let results = query.apply(listings);
    debug!("Listing {} servers", results.len());
    HttpResponse::Ok().json(results)
}

pub async fn get_server(
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    let listing = storage.get_server(&path)?;
    Ok(HttpResponse::Ok().json(rate(&storage, listing)))
}

pub async fn my_servers(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let mut listings = storage.servers_owned_by(&account.id);
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(HttpResponse::Ok().json(listings))
}

pub async fn submit_server(
    req: HttpRequest,
    storage: web::Data<Directory>,
    limiters: web::Data<Limiters>,
    form: web::Json<ListingForm>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    check_rate(&limiters.submit, &account.id, "submit")?;

    let draft = form.into_inner().validate().map_err(|e| {
        debug!("Rejected submission from {}: {}", account.id, e);
        RequestError::BadRequest(e)
    })?;
    let listing = storage.insert_server(ServerListing::from_draft(&account.id, draft, Utc::now()));
    info!("Server {} ({}) listed by {}", listing.name, listing.id, account.id);

    Ok(HttpResponse::Created().json(listing))
}

pub async fn update_server(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
    form: web::Json<ListingForm>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let existing = storage.get_server(&path)?;
    require_manager(&storage, &account, &existing)?;

    let draft = form.into_inner().validate().map_err(RequestError::BadRequest)?;
    let updated = storage.update_server(&existing.id, |s| s.apply_draft(draft, Utc::now()))?;
    info!("Server {} updated by {}", updated.id, account.id);
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_server(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let existing = storage.get_server(&path)?;
    require_manager(&storage, &account, &existing)?;

    storage.remove_server(&existing.id)?;
    info!("Removed server {} ({})", existing.name, existing.id);
    Ok(HttpResponse::NoContent().finish())
}

/// Polls the status source for one listing and answers once it settles.
/// The poller lives as long as the request; a dropped connection cancels it.
pub async fn live_status(
    storage: web::Data<Directory>,
    status: web::Data<dyn StatusSource>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    let listing = storage.get_server(&path)?;
    let poller = StatusPoller::spawn(
        status.into_inner(),
        &listing.ip,
        RetryPolicy::from_config(&config),
    );
    let live = poller.settled().await;
    Ok(HttpResponse::Ok().json(live))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<u32>,
}

pub async fn analytics(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
    query: web::Query<AnalyticsQuery>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let listing = storage.get_server(&path)?;
    require_manager(&storage, &account, &listing)?;

    let days = query
        .days
        .unwrap_or(DEFAULT_ANALYTICS_DAYS)
        .clamp(1, MAX_ANALYTICS_DAYS);
    Ok(HttpResponse::Ok().json(storage.analytics_for(&listing.id, days, Utc::now().date_naive())))
}

pub async fn list_reviews(
    storage: web::Data<Directory>,
    path: web::Path<String>,
) -> Result<HttpResponse, RequestError> {
    let listing = storage.get_server(&path)?;
    Ok(HttpResponse::Ok().json(storage.reviews_for(&listing.id)))
}

#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    pub comment: Option<String>,
}

pub async fn submit_review(
    req: HttpRequest,
    storage: web::Data<Directory>,
    path: web::Path<String>,
    form: web::Json<ReviewForm>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    if !(1..=5).contains(&form.rating) {
        return Err(RequestError::BadRequest("Rating must be between 1 and 5".to_string()));
    }
    let form = form.into_inner();
    let review = storage
        .upsert_review(&path, &account.id, form.rating, optional(form.comment), Utc::now())
        .map_err(|e| {
            error!("Error saving review: {}", e);
            RequestError::from(e)
        })?;
    Ok(HttpResponse::Ok().json(review))
}
