use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a title in the metadata provider's id space
pub type TitleId = i64;

/// A movie or TV show record as delivered by the metadata provider
///
/// Movies carry `title`, TV shows carry `name`. Every field except `id` may be
/// missing. Fields this type doesn't model are kept in `extra` so they survive
/// a round trip through either store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TitleSummary {
    pub id: TitleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre_ids: Option<Vec<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TitleSummary {
    /// Creates a movie record with only an id and a title
    pub fn new(id: TitleId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Name shown to viewers: movie title, then show name, then original name
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .or(self.original_name.as_deref())
            .unwrap_or("Untitled")
    }

    /// Poster path, falling back to the backdrop
    pub fn artwork_path(&self) -> Option<&str> {
        self.poster_path
            .as_deref()
            .or(self.backdrop_path.as_deref())
    }

    /// Vote average, 0.0 when the provider sent none
    pub fn rating(&self) -> f64 {
        self.vote_average.unwrap_or(0.0)
    }
}
