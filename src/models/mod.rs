use serde::Deserialize;
use serde_json::Value;

pub mod favorite;
pub mod title;
pub mod viewer;

pub use favorite::{FavoriteEntry, FavoritesList, ToggleAction, WatchStatus};
pub use title::{TitleId, TitleSummary};
pub use viewer::{Viewer, ViewerId};

// ============================================================================
// TMDB API Types
// ============================================================================

/// Paged list response (`/search/multi`, `/movie/popular`, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    pub page: u32,
    pub results: Vec<Value>,
    pub total_pages: u32,
    pub total_results: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

/// Response from GET /movie/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetail {
    pub id: TitleId,
    pub title: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
}

impl From<TmdbMovieDetail> for TitleSummary {
    fn from(detail: TmdbMovieDetail) -> Self {
        // TMDB sends "" for unknown release dates
        let release_date = detail.release_date.filter(|d| !d.is_empty());

        let mut extra = serde_json::Map::new();
        if let Some(runtime) = detail.runtime {
            extra.insert("runtime".to_string(), runtime.into());
        }

        TitleSummary {
            id: detail.id,
            title: Some(detail.title),
            name: detail.name,
            poster_path: detail.poster_path,
            backdrop_path: detail.backdrop_path,
            overview: detail.overview,
            vote_average: detail.vote_average,
            release_date,
            genre_ids: Some(detail.genres.iter().map(|g| g.id).collect()),
            extra,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_movie_detail_to_title_summary() {
        let detail: TmdbMovieDetail = serde_json::from_value(json!({
            "id": 27205,
            "title": "Inception",
            "overview": "Cobb, a skilled thief...",
            "poster_path": "/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg",
            "backdrop_path": null,
            "vote_average": 8.369,
            "release_date": "2010-07-15",
            "runtime": 148,
            "genres": [{ "id": 28, "name": "Action" }, { "id": 878, "name": "Science Fiction" }]
        }))
        .unwrap();

        let title: TitleSummary = detail.into();
        assert_eq!(title.id, 27205);
        assert_eq!(title.display_name(), "Inception");
        assert_eq!(title.backdrop_path, None);
        assert_eq!(title.genre_ids, Some(vec![28, 878]));
        assert_eq!(title.release_date.as_deref(), Some("2010-07-15"));
        assert_eq!(title.extra.get("runtime"), Some(&json!(148)));
    }

    #[test]
    fn test_empty_release_date_is_dropped() {
        let detail: TmdbMovieDetail = serde_json::from_value(json!({
            "id": 1,
            "title": "Unreleased",
            "release_date": ""
        }))
        .unwrap();

        let title: TitleSummary = detail.into();
        assert_eq!(title.release_date, None);
        assert_eq!(title.genre_ids, Some(vec![]));
        assert!(title.extra.is_empty());
    }

    #[test]
    fn test_page_deserializes() {
        let page: TmdbPage = serde_json::from_value(json!({
            "page": 1,
            "results": [{ "id": 1, "title": "A", "media_type": "movie" }],
            "total_pages": 1,
            "total_results": 1
        }))
        .unwrap();
        assert_eq!(page.results.len(), 1);
    }
}
