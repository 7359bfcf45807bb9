use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{TitleId, TitleSummary};

/// Keys owned by the entry rather than the title record
const ENTRY_KEYS: [&str; 2] = ["addedAt", "status"];

/// Where a title sits in the viewer's watch plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum WatchStatus {
    #[default]
    WantToWatch,
}

/// Outcome of flipping a title's membership
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// One favorited title
///
/// Keeps the title record exactly as the metadata provider delivered it at
/// favoriting time, so the entry renders without a follow-up fetch. Rating and
/// artwork can drift from the provider's current data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteEntry {
    #[serde(flatten)]
    pub title: TitleSummary,
    /// Absent for entries written before timestamps were recorded
    #[serde(rename = "addedAt", default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: WatchStatus,
}

impl FavoriteEntry {
    /// Creates an entry for a title favorited at `added_at`
    ///
    /// Entry keys the caller left in the title's extra fields are dropped, so
    /// the stored record never carries them twice.
    pub fn new(mut title: TitleSummary, added_at: DateTime<Utc>) -> Self {
        for key in ENTRY_KEYS {
            title.extra.remove(key);
        }
        Self {
            title,
            added_at: Some(added_at),
            status: WatchStatus::WantToWatch,
        }
    }

    pub fn title_id(&self) -> TitleId {
        self.title.id
    }

    pub fn display_name(&self) -> &str {
        self.title.display_name()
    }

    pub fn artwork_path(&self) -> Option<&str> {
        self.title.artwork_path()
    }

    pub fn rating(&self) -> f64 {
        self.title.rating()
    }

    /// Full artwork URL under the given image base
    pub fn poster_url(&self, image_base_url: &str) -> Option<String> {
        self.artwork_path()
            .map(|path| format!("{}{}", image_base_url.trim_end_matches('/'), path))
    }
}

/// The favorited titles of one viewer scope
///
/// `titleId` is unique within a list. Lists built from stored data keep the
/// first occurrence of a duplicated id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FavoriteEntry>", into = "Vec<FavoriteEntry>")]
pub struct FavoritesList {
    entries: Vec<FavoriteEntry>,
}

impl From<Vec<FavoriteEntry>> for FavoritesList {
    fn from(entries: Vec<FavoriteEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<FavoritesList> for Vec<FavoriteEntry> {
    fn from(list: FavoritesList) -> Self {
        list.entries
    }
}

impl FavoritesList {
    /// Creates an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list in the given order, dropping repeated title ids
    pub fn from_entries(entries: impl IntoIterator<Item = FavoriteEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.title_id()))
            .collect();
        Self { entries }
    }

    /// Builds a list in arrival order: untimestamped entries first, then by
    /// `addedAt`, ties broken by title id
    pub fn by_arrival(entries: impl IntoIterator<Item = FavoriteEntry>) -> Self {
        let mut entries: Vec<FavoriteEntry> = entries.into_iter().collect();
        entries.sort_by(|a, b| {
            a.added_at
                .cmp(&b.added_at)
                .then_with(|| a.title_id().cmp(&b.title_id()))
        });
        Self::from_entries(entries)
    }

    pub fn contains(&self, title_id: TitleId) -> bool {
        self.get(title_id).is_some()
    }

    pub fn get(&self, title_id: TitleId) -> Option<&FavoriteEntry> {
        self.entries.iter().find(|entry| entry.title_id() == title_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FavoriteEntry> {
        self.entries.iter()
    }

    pub fn title_ids(&self) -> Vec<TitleId> {
        self.entries.iter().map(FavoriteEntry::title_id).collect()
    }

    /// Returns the list with `title` removed if present, appended otherwise
    pub fn toggled(&self, title: TitleSummary, now: DateTime<Utc>) -> (Self, ToggleAction) {
        let title_id = title.id;
        if self.contains(title_id) {
            let entries = self
                .entries
                .iter()
                .filter(|entry| entry.title_id() != title_id)
                .cloned()
                .collect();
            (Self { entries }, ToggleAction::Removed)
        } else {
            let mut entries = self.entries.clone();
            entries.push(FavoriteEntry::new(title, now));
            (Self { entries }, ToggleAction::Added)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let list = FavoritesList::new();
        let (list, action) = list.toggled(TitleSummary::new(42, "Inception"), at(1));
        assert_eq!(action, ToggleAction::Added);
        assert_eq!(list.title_ids(), vec![42]);

        let (list, action) = list.toggled(TitleSummary::new(42, "Inception"), at(2));
        assert_eq!(action, ToggleAction::Removed);
        assert!(list.is_empty());
    }

    #[test]
    fn test_toggle_appends_in_insertion_order() {
        let mut list = FavoritesList::new();
        for (id, name) in [(3, "Heat"), (1, "Alien"), (2, "Brazil")] {
            list = list.toggled(TitleSummary::new(id, name), at(id)).0;
        }
        assert_eq!(list.title_ids(), vec![3, 1, 2]);
    }

    #[test]
    fn test_ids_stay_unique_across_toggle_sequences() {
        let ids = [5, 5, 6, 5, 7, 6, 6, 5, 7, 7, 7];
        let mut list = FavoritesList::new();
        for (step, id) in ids.iter().enumerate() {
            list = list.toggled(TitleSummary::new(*id, "t"), at(step as i64)).0;
            let mut seen = list.title_ids();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), list.len());
        }
    }

    #[test]
    fn test_entry_keys_in_title_record_are_not_duplicated() {
        // A record echoed back from a wishlist listing carries the entry's own keys
        let title: TitleSummary = serde_json::from_value(json!({
            "id": 2,
            "title": "Brazil",
            "status": "want_to_watch",
            "addedAt": "2020-01-01T00:00:00Z",
            "rating": 7.9
        }))
        .unwrap();

        let list = FavoritesList::new()
            .toggled(TitleSummary::new(1, "Alien"), at(1))
            .0
            .toggled(title, at(2))
            .0;
        let stored = serde_json::to_string(&list).unwrap();
        assert_eq!(stored.matches("\"status\"").count(), 2);
        assert_eq!(stored.matches("\"addedAt\"").count(), 2);

        let reloaded: FavoritesList = serde_json::from_str(&stored).unwrap();
        assert_eq!(reloaded.title_ids(), vec![1, 2]);
        let entry = reloaded.get(2).unwrap();
        assert_eq!(entry.added_at, Some(at(2)));
        assert_eq!(entry.title.extra.get("rating"), Some(&json!(7.9)));
    }

    #[test]
    fn test_from_entries_drops_duplicates() {
        let entries = vec![
            FavoriteEntry::new(TitleSummary::new(1, "first"), at(1)),
            FavoriteEntry::new(TitleSummary::new(1, "again"), at(2)),
            FavoriteEntry::new(TitleSummary::new(2, "second"), at(3)),
        ];
        let list = FavoritesList::from_entries(entries);
        assert_eq!(list.title_ids(), vec![1, 2]);
        assert_eq!(list.get(1).unwrap().display_name(), "first");
    }

    #[test]
    fn test_by_arrival_orders_untimestamped_first() {
        let mut legacy = FavoriteEntry::new(TitleSummary::new(9, "Legacy"), at(0));
        legacy.added_at = None;
        let entries = vec![
            FavoriteEntry::new(TitleSummary::new(2, "Later"), at(20)),
            FavoriteEntry::new(TitleSummary::new(1, "Earlier"), at(10)),
            legacy,
        ];
        let list = FavoritesList::by_arrival(entries);
        assert_eq!(list.title_ids(), vec![9, 1, 2]);
    }

    #[test]
    fn test_legacy_local_layout_deserializes() {
        // Raw title records without addedAt or status
        let raw = json!([
            { "id": 42, "title": "Inception", "poster_path": "/p.jpg", "vote_average": 8.4 },
            { "id": 1399, "name": "Game of Thrones" }
        ]);
        let list: FavoritesList = serde_json::from_value(raw).unwrap();
        assert_eq!(list.len(), 2);

        let first = list.get(42).unwrap();
        assert_eq!(first.added_at, None);
        assert_eq!(first.status, WatchStatus::WantToWatch);
        assert_eq!(first.rating(), 8.4);
        assert_eq!(list.get(1399).unwrap().display_name(), "Game of Thrones");
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = FavoriteEntry::new(TitleSummary::new(7, "Dune"), at(0));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["title"], "Dune");
        assert_eq!(value["status"], "want_to_watch");
        assert_eq!(value["addedAt"], "1970-01-01T00:00:00Z");
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_poster_url() {
        let mut title = TitleSummary::new(7, "Dune");
        title.poster_path = Some("/d5NXSklXo0qyIYkgV94XAgMIckC.jpg".to_string());
        let entry = FavoriteEntry::new(title, at(0));
        assert_eq!(
            entry.poster_url("https://image.tmdb.org/t/p/w500/").as_deref(),
            Some("https://image.tmdb.org/t/p/w500/d5NXSklXo0qyIYkgV94XAgMIckC.jpg")
        );
    }
}
