// src/handlers/functions.rs
//
// The three browser-callable functions: status sweep, admin user listing and
// view tracking. Every response carries the permissive CORS headers.
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::handlers::auth::require_admin;
use crate::models::server::{ApprovalStatus, ServerListing};
use crate::status::source::StatusSource;
use crate::storage::memory::Directory;
use crate::sweep::{run_sweep, OfflinePolicy};
use crate::utils::{check_rate, extract_client_ip, with_cors, Limiters, RequestError};

pub async fn check_server_status(
    storage: web::Data<Directory>,
    status: web::Data<dyn StatusSource>,
    config: web::Data<Config>,
) -> HttpResponse {
    let policy = OfflinePolicy::from_config(&config);
    let summary = run_sweep(&storage, status.get_ref(), &policy, Utc::now()).await;
    info!("Manual sweep checked {} servers", summary.checked);
    with_cors(&mut HttpResponse::Ok()).json(summary)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnedServer {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub status: ApprovalStatus,
    pub players: i64,
    pub is_online: bool,
}

impl From<&ServerListing> for OwnedServer {
    fn from(server: &ServerListing) -> Self {
        Self {
            id: server.id.clone(),
            name: server.name.clone(),
            owner_id: server.owner_id.clone(),
            status: server.status,
            players: server.players,
            is_online: server.is_online,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub servers: Vec<OwnedServer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserData>,
}

pub async fn get_users_data(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    require_admin(&req, &storage)?;

    let servers = storage.get_servers();
    let users: Vec<UserData> = storage
        .accounts()
        .into_iter()
        .map(|account| {
            let profile = storage.profile(&account.id);
            UserData {
                username: profile
                    .as_ref()
                    .map(|p| p.username.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                full_name: profile.as_ref().and_then(|p| p.full_name.clone()),
                avatar_url: profile.as_ref().and_then(|p| p.avatar_url.clone()),
                is_premium: profile.as_ref().map(|p| p.is_premium).unwrap_or(false),
                servers: servers
                    .iter()
                    .filter(|s| s.owner_id == account.id)
                    .map(OwnedServer::from)
                    .collect(),
                id: account.id,
                email: account.email,
                created_at: account.created_at,
                last_sign_in: account.last_sign_in_at,
            }
        })
        .collect();

    info!("Successfully fetched {} users", users.len());
    Ok(with_cors(&mut HttpResponse::Ok()).json(UsersResponse { users }))
}

#[derive(Debug, Deserialize)]
pub struct TrackViewPayload {
    pub server_id: Option<String>,
}

pub async fn track_view(
    req: HttpRequest,
    storage: web::Data<Directory>,
    limiters: web::Data<Limiters>,
    body: web::Bytes,
) -> Result<HttpResponse, RequestError> {
    let payload: TrackViewPayload = serde_json::from_slice(&body).map_err(|e| {
        error!("Unexpected error reading track-view payload: {}", e);
        RequestError::Internal("Internal server error".to_string())
    })?;

    let server_id = match payload.server_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(RequestError::BadRequest("Missing server_id".to_string())),
    };

    let client_ip = extract_client_ip(&req);
    check_rate(&limiters.track_view, &client_ip, "track-view")?;
    info!("Tracking view for server {} from {}", server_id, client_ip);

    if let Err(e) = storage.track_view(&server_id, &client_ip, Utc::now()) {
        error!("Error tracking view: {}", e);
        return Err(RequestError::Internal("Failed to track view".to_string()));
    }

    Ok(with_cors(&mut HttpResponse::Ok()).json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{bearer, TestState};
    use crate::status::testing::Reply;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    #[actix_web::test]
    async fn preflight_allows_any_origin() {
        let state = TestState::new();
        let app = test_app!(state);

        for uri in [
            "/functions/v1/check-server-status",
            "/functions/v1/get-users-data",
            "/functions/v1/track-view",
        ] {
            let req = actix_test::TestRequest::default()
                .method(actix_web::http::Method::OPTIONS)
                .uri(uri)
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
            assert_eq!(resp.headers().get("Access-Control-Allow-Origin").unwrap(), "*");
            assert_eq!(
                resp.headers().get("Access-Control-Allow-Headers").unwrap(),
                "authorization, x-client-info, apikey, content-type"
            );
        }
    }

    #[actix_web::test]
    async fn sweep_endpoint_reports_summary() {
        let state = TestState::new();
        state.source.script("up.example", vec![Reply::online(3, 10)]);
        let (owner, _) = state.user("owner@example.com");
        let listing = state.listing(&owner, "Alpha", "up.example");
        let app = test_app!(state);

        let req = actix_test::TestRequest::post().uri("/functions/v1/check-server-status").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("Access-Control-Allow-Origin"));

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["checked"], 1);
        assert_eq!(body["updates"][0]["id"], listing.id);
        assert_eq!(body["updates"][0]["status"], "online");
        assert_eq!(state.store.get_server(&listing.id).unwrap().players, 3);
    }

    #[actix_web::test]
    async fn users_data_requires_token() {
        let state = TestState::new();
        let app = test_app!(state);

        let req = actix_test::TestRequest::get().uri("/functions/v1/get-users-data").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = actix_test::TestRequest::get()
            .uri("/functions/v1/get-users-data")
            .insert_header(bearer("not-a-session"))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn users_data_rejects_non_admin() {
        let state = TestState::new();
        let (_, token) = state.user("player@example.com");
        let app = test_app!(state);

        let req = actix_test::TestRequest::get()
            .uri("/functions/v1/get-users-data")
            .insert_header(bearer(&token))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Forbidden - Admin access required");
    }

    #[actix_web::test]
    async fn users_data_lists_every_account_with_listings() {
        let state = TestState::new();
        let (_, admin_token) = state.admin("admin@example.com");
        let (alice, _) = state.user("alice@example.com");
        let (bob, _) = state.user("bob@example.com");
        state.listing(&alice, "Alpha", "a.example");
        state.listing(&alice, "Beta", "b.example");
        let app = test_app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/functions/v1/get-users-data")
            .insert_header(bearer(&admin_token))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: UsersResponse = actix_test::read_body_json(resp).await;

        assert_eq!(body.users.len(), 3);
        let alice_row = body.users.iter().find(|u| u.id == alice).unwrap();
        assert_eq!(alice_row.servers.len(), 2);
        assert_eq!(alice_row.username, "alice");
        assert!(alice_row.servers.iter().all(|s| s.owner_id == alice));
        let bob_row = body.users.iter().find(|u| u.id == bob).unwrap();
        assert!(bob_row.servers.is_empty());
    }

    #[actix_web::test]
    async fn track_view_requires_server_id() {
        let state = TestState::new();
        let app = test_app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/functions/v1/track-view")
            .set_json(serde_json::json!({}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing server_id");
    }

    #[actix_web::test]
    async fn track_view_attributes_first_forwarded_address() {
        let state = TestState::new();
        let (owner, _) = state.user("owner@example.com");
        let listing = state.listing(&owner, "Alpha", "a.example");
        let app = test_app!(state);

        for _ in 0..2 {
            let req = actix_test::TestRequest::post()
                .uri("/functions/v1/track-view")
                .insert_header(("x-forwarded-for", "1.2.3.4, 5.6.7.8"))
                .set_json(serde_json::json!({ "server_id": listing.id }))
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let req = actix_test::TestRequest::post()
            .uri("/functions/v1/track-view")
            .insert_header(("x-real-ip", "5.6.7.8"))
            .set_json(serde_json::json!({ "server_id": listing.id }))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        // 1.2.3.4 counted once, 5.6.7.8 once
        assert_eq!(state.store.get_server(&listing.id).unwrap().views, 2);
        assert!(!state.store.track_view(&listing.id, "1.2.3.4", Utc::now()).unwrap());
    }

    #[actix_web::test]
    async fn track_view_on_unknown_listing_is_server_error() {
        let state = TestState::new();
        let app = test_app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/functions/v1/track-view")
            .set_json(serde_json::json!({ "server_id": "does-not-exist" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "Failed to track view");
    }

    #[actix_web::test]
    async fn track_view_limit_applies_after_validation() {
        let state = TestState::with_config(Config {
            track_view_period_secs: 60,
            track_view_burst_limit: 1,
            ..Config::default()
        });
        let (owner, _) = state.user("owner@example.com");
        let listing = state.listing(&owner, "Alpha", "a.example");
        let app = test_app!(state);

        let track = |body: serde_json::Value| {
            actix_test::TestRequest::post()
                .uri("/functions/v1/track-view")
                .insert_header(("x-forwarded-for", "1.2.3.4"))
                .set_json(body)
                .to_request()
        };
        for _ in 0..3 {
            let resp = actix_test::call_service(&app, track(serde_json::json!({}))).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        let ok = actix_test::call_service(&app, track(serde_json::json!({ "server_id": listing.id }))).await;
        assert_eq!(ok.status(), StatusCode::OK);
        let limited = actix_test::call_service(&app, track(serde_json::json!({ "server_id": listing.id }))).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key("Access-Control-Allow-Origin"));
    }
}
