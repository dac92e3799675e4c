#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web static file surface for the detection pipeline.
//!
//! Serves the map client at `/` and the generated `GeoJSON` artifacts at
//! `/data`, so a browser map can poll the current risk area while the
//! pipeline runs. No API beyond a health probe; the pipeline writes
//! everything the client needs as plain files.

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use serde::Serialize;

/// `GET /api/health` response body.
#[derive(Serialize)]
struct ApiHealth {
    healthy: bool,
    version: String,
}

/// `GET /api/health`
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Server configuration, read from the environment at the binary boundary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Directory holding the generated artifact files.
    pub data_dir: String,
    /// Directory holding the static map client.
    pub client_dir: String,
}

impl ServerConfig {
    /// Reads `BIND_ADDR`, `PORT`, `QUAKEWATCH_DATA_DIR`, and
    /// `QUAKEWATCH_CLIENT_DIR`, with local-development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("QUAKEWATCH_DATA_DIR")
                .unwrap_or_else(|_| "data/generated".to_string()),
            client_dir: std::env::var("QUAKEWATCH_CLIENT_DIR")
                .unwrap_or_else(|_| "client".to_string()),
        }
    }
}

/// Runs the server until the process is stopped.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    log::info!(
        "Starting server on {}:{} (data: {}, client: {})",
        config.bind_addr,
        config.port,
        config.data_dir,
        config.client_dir
    );

    let bind = (config.bind_addr.clone(), config.port);
    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .service(web::scope("/api").route("/health", web::get().to(health)))
            // Generated artifact files, one GeoJSON per entity collection
            .service(Files::new("/data", config.data_dir.clone()).show_files_listing())
            // Static map client
            .service(Files::new("/", config.client_dir.clone()).index_file("map.html"))
    })
    .bind(bind)?
    .run()
    .await
}
