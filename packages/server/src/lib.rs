#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for trip demand exports.
//!
//! Serves the demand aggregates, heatmap polygons and start→finish
//! segments of one configured dataset as JSON. Results are memoized by the
//! shared [`Pipeline`].

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use trip_demand_pipeline::Pipeline;
use trip_demand_pipeline::config::PipelineConfig;

/// Shared application state.
pub struct AppState {
    /// Pipeline with its result cache.
    pub pipeline: Arc<Pipeline>,
    /// Dataset, resolution and default segment limit.
    pub config: PipelineConfig,
}

impl AppState {
    /// Reads the pipeline configuration from the environment and binds the
    /// process-wide grid index.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no grid index
    /// revision is available.
    pub fn from_env() -> Result<Self, trip_demand_pipeline::PipelineError> {
        let config = PipelineConfig::from_env()?;
        let pipeline = Pipeline::from_global(config.cache_ttl)?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            config,
        })
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/demand", web::get().to(handlers::demand))
            .route("/demand/top", web::get().to(handlers::top_cells))
            .route("/heatmap", web::get().to(handlers::heatmap))
            .route("/segments", web::get().to(handlers::segments))
            .route("/cache/flush", web::post().to(handlers::flush_cache)),
    );
}

/// Starts the trip demand API server.
///
/// This is a regular async function; the caller provides the async
/// runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration is invalid, the
/// grid index cannot be bound, or the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let state = AppState::from_env().map_err(std::io::Error::other)?;
    log::info!(
        "Serving {} at resolution {}",
        state.config.dataset_path.display(),
        state.config.resolution
    );
    let state = web::Data::new(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
