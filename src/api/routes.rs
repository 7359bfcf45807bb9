use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Identity reported by the shell
        .route(
            "/session",
            get(handlers::get_session).put(handlers::put_session),
        )
        // Wishlist
        .route("/favorites", get(handlers::get_favorites))
        .route("/favorites/toggle", post(handlers::toggle_favorite))
        // Metadata
        .route("/titles/search", get(handlers::search_titles))
        .route("/titles/:id/favorite", post(handlers::toggle_favorite_by_id))
        .with_state(state)
}
