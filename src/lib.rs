use axum::{
    routing::{get, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod champions;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

use champions::ChampionService;

/// Build the HTTP router around a champion service
pub fn app(service: ChampionService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Root and health
        .route("/", get(|| async { "Champions API - v1.0" }))
        .route("/health", get(routes::health::health_check))

        // Champion endpoints
        .route(
            "/champions",
            get(routes::champions::fetch_champions)
                .post(routes::champions::create_champion)
                .put(routes::champions::update_one_champion),
        )
        .route("/champions/batch", put(routes::champions::update_multiple_champions))
        .route("/champions/search", get(routes::champions::search_champions))
        .route("/champions/{champion_id}", get(routes::champions::fetch_champion))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
