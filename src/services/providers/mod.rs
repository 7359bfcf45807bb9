use tracing::instrument;

/// Title metadata abstraction
///
/// Titles are favorited as the metadata provider delivers them. The wishlist
/// never writes back to the provider.
use crate::{
    error::{AppError, AppResult},
    models::{TitleId, TitleSummary},
};

pub mod tmdb;

/// Trait for title metadata providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch one title record by id
    async fn title_details(&self, title_id: TitleId) -> AppResult<TitleSummary>;

    /// Search titles by name
    async fn search_titles(&self, query: &str) -> AppResult<Vec<TitleSummary>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Stand-in used when no provider is configured
///
/// Favoriting full title records still works; only lookups by id and search
/// are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait::async_trait]
impl MetadataProvider for UnconfiguredProvider {
    #[instrument(skip(self))]
    async fn title_details(&self, title_id: TitleId) -> AppResult<TitleSummary> {
        Err(unconfigured())
    }

    #[instrument(skip(self))]
    async fn search_titles(&self, query: &str) -> AppResult<Vec<TitleSummary>> {
        Err(unconfigured())
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}

fn unconfigured() -> AppError {
    tracing::warn!("Metadata lookup requested but TMDB_API_KEY is not set");
    AppError::ExternalApi("TMDB API key is not configured".to_string())
}
