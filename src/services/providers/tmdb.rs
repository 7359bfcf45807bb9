/// TMDB metadata provider
///
/// API Flow:
/// 1. Title details: /movie/{id} → full movie record
/// 2. Search: /search/multi → movies, shows and people; people are dropped
use crate::{
    error::{AppError, AppResult},
    models::{TitleId, TitleSummary, TmdbMovieDetail, TmdbPage},
    services::providers::MetadataProvider,
};
use reqwest::{Client as HttpClient, StatusCode};

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    language: String,
}

impl TmdbProvider {
    pub fn new(api_key: String, api_url: String, language: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            language,
        }
    }

    async fn get(&self, path: &str, extra: &[(&str, &str)]) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("language", self.language.as_str()),
            ])
            .query(extra)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("TMDB has no resource at {}", path)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = %path, status = %status, body = %body, "TMDB request failed");
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn title_details(&self, title_id: TitleId) -> AppResult<TitleSummary> {
        let response = self.get(&format!("/movie/{}", title_id), &[]).await?;

        let response_text = response.text().await?;
        let detail: TmdbMovieDetail = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(error = %e, response = %response_text, "Failed to deserialize TMDB response");
            AppError::ExternalApi(format!("Failed to parse TMDB response: {}", e))
        })?;

        tracing::info!(title_id = title_id, title = %detail.title, "Fetched title details");

        Ok(detail.into())
    }

    async fn search_titles(&self, query: &str) -> AppResult<Vec<TitleSummary>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let response = self
            .get("/search/multi", &[("query", query), ("include_adult", "false")])
            .await?;
        let page: TmdbPage = response.json().await?;

        let titles: Vec<TitleSummary> = page
            .results
            .into_iter()
            .filter(|result| result["media_type"] != "person")
            .filter_map(|result| serde_json::from_value::<TitleSummary>(result).ok())
            .collect();

        tracing::info!(
            query = %query,
            results = titles.len(),
            provider = "tmdb",
            "Title search completed"
        );

        Ok(titles)
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
