// src/handlers/profile.rs
use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;

use crate::handlers::auth::{require_user, validate_username};
use crate::handlers::servers::{is_http_url, optional};
use crate::storage::memory::Directory;
use crate::utils::RequestError;

pub async fn get_profile(
    req: HttpRequest,
    storage: web::Data<Directory>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let profile = storage
        .profile(&account.id)
        .ok_or_else(|| RequestError::NotFound("Profile not found".to_string()))?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Absent fields stay as they are; an empty string clears an optional one.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn update_profile(
    req: HttpRequest,
    storage: web::Data<Directory>,
    form: web::Json<ProfileForm>,
) -> Result<HttpResponse, RequestError> {
    let account = require_user(&req, &storage)?;
    let form = form.into_inner();

    let username = form.username.as_deref().map(validate_username).transpose()?;
    let avatar_url = form.avatar_url.map(|a| optional(Some(a)));
    if matches!(&avatar_url, Some(Some(url)) if !is_http_url(url)) {
        return Err(RequestError::BadRequest("Avatar URL must be a valid URL".to_string()));
    }
    let full_name = form.full_name.map(|n| optional(Some(n)));

    let profile = storage.update_profile(&account.id, |p| {
        if let Some(username) = username {
            p.username = username;
        }
        if let Some(avatar_url) = avatar_url {
            p.avatar_url = avatar_url;
        }
        if let Some(full_name) = full_name {
            p.full_name = full_name;
        }
    })?;
    info!("Profile {} updated", profile.id);
    Ok(HttpResponse::Ok().json(profile))
}

#[cfg(test)]
mod tests {
    use crate::handlers::testing::{bearer, TestState};
    use crate::models::user::Profile;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::json;

    #[actix_web::test]
    async fn owner_edits_username_and_avatar() {
        let state = TestState::new();
        let (id, token) = state.user("steve@example.com");
        let app = test_app!(state);

        let req = actix_test::TestRequest::put()
            .uri("/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "username": "  Notch ", "avatar_url": "https://cdn.example/a.png" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let profile: Profile = actix_test::read_body_json(resp).await;
        assert_eq!(profile.id, id);
        assert_eq!(profile.username, "Notch");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn.example/a.png"));

        let req = actix_test::TestRequest::put()
            .uri("/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "avatar_url": "" }))
            .to_request();
        let profile: Profile = actix_test::read_body_json(actix_test::call_service(&app, req).await).await;
        assert_eq!(profile.avatar_url, None);
        assert_eq!(profile.username, "Notch");

        let req = actix_test::TestRequest::get()
            .uri("/profile")
            .insert_header(bearer(&token))
            .to_request();
        let profile: Profile = actix_test::read_body_json(actix_test::call_service(&app, req).await).await;
        assert_eq!(profile.username, "Notch");
    }

    #[actix_web::test]
    async fn taken_username_is_rejected() {
        let state = TestState::new();
        let (id, token) = state.user("steve@example.com");
        state.user("alex@example.com");
        let app = test_app!(state);

        let req = actix_test::TestRequest::put()
            .uri("/profile")
            .insert_header(bearer(&token))
            .set_json(json!({ "username": "ALEX" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "This username is already taken");
        assert_eq!(state.store.profile(&id).unwrap().username, "steve");
    }

    #[actix_web::test]
    async fn invalid_fields_are_bad_requests() {
        let state = TestState::new();
        let (_, token) = state.user("steve@example.com");
        let app = test_app!(state);

        for body in [
            json!({ "username": "   " }),
            json!({ "username": "x".repeat(33) }),
            json!({ "avatar_url": "javascript:alert(1)" }),
        ] {
            let req = actix_test::TestRequest::put()
                .uri("/profile")
                .insert_header(bearer(&token))
                .set_json(body)
                .to_request();
            assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }

        let req = actix_test::TestRequest::put().uri("/profile").set_json(json!({})).to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
