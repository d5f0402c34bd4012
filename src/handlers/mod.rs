use actix_web::http::Method;
use actix_web::web;

use crate::utils::{cors_preflight, RequestError};

#[cfg(test)]
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.store.clone())
                .app_data($state.status.clone())
                .app_data($state.config.clone())
                .app_data($state.limiters.clone())
                .configure(crate::handlers::configure),
        )
        .await
    };
}

pub mod admin;
pub mod auth;
pub mod chat;
pub mod functions;
pub mod index;
pub mod notifications;
pub mod profile;
pub mod servers;
pub mod stats;

fn preflight() -> actix_web::Route {
    web::method(Method::OPTIONS).to(cors_preflight)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| RequestError::BadRequest(err.to_string()).into()),
    )
    .route("/", web::get().to(index::index))
    .service(
        web::scope("/functions/v1")
            .route("/check-server-status", web::post().to(functions::check_server_status))
            .route("/check-server-status", web::get().to(functions::check_server_status))
            .route("/check-server-status", preflight())
            .route("/get-users-data", web::get().to(functions::get_users_data))
            .route("/get-users-data", web::post().to(functions::get_users_data))
            .route("/get-users-data", preflight())
            .route("/track-view", web::post().to(functions::track_view))
            .route("/track-view", preflight()),
    )
    .service(
        web::scope("/auth")
            .route("/signup", web::post().to(auth::signup))
            .route("/login", web::post().to(auth::login))
            .route("/logout", web::post().to(auth::logout)),
    )
    .route("/profile", web::get().to(profile::get_profile))
    .route("/profile", web::put().to(profile::update_profile))
    .route("/servers", web::get().to(servers::list_servers))
    .route("/servers", web::post().to(servers::submit_server))
    .route("/servers/mine", web::get().to(servers::my_servers))
    .route("/servers/{id}", web::get().to(servers::get_server))
    .route("/servers/{id}", web::put().to(servers::update_server))
    .route("/servers/{id}", web::delete().to(servers::delete_server))
    .route("/servers/{id}/status", web::get().to(servers::live_status))
    .route("/servers/{id}/analytics", web::get().to(servers::analytics))
    .route("/servers/{id}/reviews", web::get().to(servers::list_reviews))
    .route("/servers/{id}/reviews", web::post().to(servers::submit_review))
    .route("/stats/players", web::get().to(stats::total_players))
    .route("/notifications", web::get().to(notifications::list_notifications))
    .route("/notifications/read-all", web::post().to(notifications::mark_all_read))
    .route("/notifications/{id}/read", web::post().to(notifications::mark_read))
    .service(
        web::scope("/admin")
            .route("/servers", web::get().to(admin::list_all_servers))
            .route("/servers/{id}/status", web::post().to(admin::set_server_status))
            .route("/servers/{id}/featured", web::post().to(admin::toggle_featured))
            .route("/servers/{id}/verified", web::post().to(admin::toggle_verified))
            .route("/users/{id}", web::put().to(admin::update_user))
            .route("/notifications", web::post().to(admin::send_notification))
            .route("/notifications/logs", web::get().to(admin::notification_logs)),
    )
    .route("/chat", web::get().to(chat::list_messages))
    .route("/chat", web::post().to(chat::post_message));
}
