// src/main.rs
mod config;
mod handlers;
mod models;
mod search;
mod status;
mod storage;
mod sweep;
mod utils;

use actix_web::{ middleware, web, App, HttpServer };
use env_logger::Env;
use std::sync::Arc;
use std::time::Duration;
use log::{ error, info };

use crate::config::Config;
use crate::status::source::{ McSrvStatClient, StatusSource };
use crate::storage::memory::Directory;
use crate::sweep::OfflinePolicy;
use crate::utils::Limiters;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = config.bind();

    let store = Arc::new(
        Directory::new(config.view_dedupe_hours)
            .with_session_ttl(chrono::Duration::hours(config.session_ttl_hours))
    );

    let client = McSrvStatClient::new(
        &config.status_api_base,
        Duration::from_secs(config.status_timeout_secs)
    ).map_err(|e| {
        error!("Failed to build status client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Failed to build status client: {}", e))
    })?;
    let source: Arc<dyn StatusSource> = Arc::new(client);

    // Hourly offline sweep; lives for the whole process
    let _sweeper = sweep::spawn_schedule(
        store.clone(),
        source.clone(),
        OfflinePolicy::from_config(&config),
        Duration::from_secs(config.sweep_interval_secs.max(1))
    );

    let store = web::Data::from(store);
    let status: web::Data<dyn StatusSource> = web::Data::from(source);
    let limiters = web::Data::new(Limiters::from_config(&config));
    let config = web::Data::new(config);

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(store.clone())
            .app_data(status.clone())
            .app_data(config.clone())
            .app_data(limiters.clone())
            .configure(handlers::configure)
    })
        .bind(&bind)?
        .run().await
}
