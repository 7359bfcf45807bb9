use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::AppResult;
use crate::models::{FavoriteEntry, TitleId, TitleSummary, ToggleAction, Viewer, WatchStatus};
use crate::services::{
    backend::FavoritesBackend,
    favorites::{FavoritesView, ToggleOutcome},
    identity::IdentitySource,
};

use super::AppState;

/// How long a session change waits for the new scope to load
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteItem {
    pub id: TitleId,
    pub display_name: String,
    pub poster_url: Option<String>,
    pub rating: f64,
    pub added_at: Option<DateTime<Utc>>,
    pub status: WatchStatus,
}

impl FavoriteItem {
    fn from_entry(entry: &FavoriteEntry, image_base_url: &str) -> Self {
        Self {
            id: entry.title_id(),
            display_name: entry.display_name().to_string(),
            poster_url: entry.poster_url(image_base_url),
            rating: entry.rating(),
            added_at: entry.added_at,
            status: entry.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub scope: FavoritesBackend,
    pub loading: bool,
    pub error: Option<String>,
    pub count: usize,
    pub favorites: Vec<FavoriteItem>,
}

impl FavoritesResponse {
    fn from_view(view: &FavoritesView, image_base_url: &str) -> Self {
        Self {
            scope: view.scope.clone(),
            loading: view.loading(),
            error: view.error().map(str::to_string),
            count: view.favorites.len(),
            favorites: view
                .favorites
                .iter()
                .map(|entry| FavoriteItem::from_entry(entry, image_base_url))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub action: ToggleAction,
    pub title_id: TitleId,
    pub display_name: String,
    pub message: String,
}

impl From<ToggleOutcome> for ToggleResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        Self {
            message: outcome.message(),
            action: outcome.action,
            title_id: outcome.title_id,
            display_name: outcome.display_name,
        }
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Get the signed-in viewer, `null` when anonymous
pub async fn get_session(State(state): State<AppState>) -> Json<Option<Viewer>> {
    Json(state.identity.current())
}

/// Report a sign-in or sign-out and return the wishlist of the new scope
pub async fn put_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Json<FavoritesResponse> {
    let scope = FavoritesBackend::resolve(request.viewer.as_ref());
    state.identity.set(request.viewer);

    let view = match tokio::time::timeout(SETTLE_TIMEOUT, state.favorites.settled(&scope)).await {
        Ok(view) => view,
        Err(_) => {
            tracing::warn!(scope = ?scope, "Wishlist scope still loading after session change");
            state.favorites.current_favorites()
        }
    };

    Json(FavoritesResponse::from_view(&view, &state.image_base_url))
}

/// Get the wishlist of the active scope
pub async fn get_favorites(State(state): State<AppState>) -> Json<FavoritesResponse> {
    let view = state.favorites.current_favorites();
    Json(FavoritesResponse::from_view(&view, &state.image_base_url))
}

/// Toggle a title given its full record
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Json(title): Json<TitleSummary>,
) -> AppResult<Json<ToggleResponse>> {
    let outcome = state.favorites.toggle(title).await?;
    Ok(Json(outcome.into()))
}

/// Toggle a title by id, fetching its record from the metadata provider
pub async fn toggle_favorite_by_id(
    State(state): State<AppState>,
    Path(title_id): Path<TitleId>,
) -> AppResult<Json<ToggleResponse>> {
    // Removing needs no lookup, the stored record is enough
    let stored = state
        .favorites
        .current_favorites()
        .favorites
        .get(title_id)
        .map(|entry| entry.title.clone());

    let title = match stored {
        Some(title) => title,
        None => state.metadata.title_details(title_id).await?,
    };

    let outcome = state.favorites.toggle(title).await?;
    Ok(Json(outcome.into()))
}

/// Search titles through the metadata provider
pub async fn search_titles(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<TitleSummary>>> {
    let titles = state.metadata.search_titles(&params.q).await?;
    Ok(Json(titles))
}
