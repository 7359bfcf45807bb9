use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    error::AppResult,
    models::{TitleSummary, WatchStatus},
};

/// Recursively drops absent values
///
/// Object fields holding `null` are removed and `null` array elements are
/// dropped, at every depth. The remote store rejects absent values anywhere in
/// a document.
pub fn strip_absent(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_absent(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_absent)
                .collect(),
        ),
        other => other,
    }
}

/// Builds the remote document for a newly favorited title
pub fn wishlist_document(
    title: &TitleSummary,
    added_at: DateTime<Utc>,
    status: WatchStatus,
) -> AppResult<Value> {
    let mut document = match strip_absent(serde_json::to_value(title)?) {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    document.insert("addedAt".to_string(), serde_json::to_value(added_at)?);
    document.insert("status".to_string(), serde_json::to_value(status)?);
    Ok(Value::Object(document))
}
