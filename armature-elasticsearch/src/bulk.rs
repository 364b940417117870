//! Bulk request lines and responses.

use crate::error::{ElasticsearchError, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Action line for indexing a document, with an optional id and routing.
pub(crate) fn index_action(index: &str, id: Option<&str>, routing: Option<&str>) -> Value {
    let mut action = Map::new();
    action.insert("_index".to_string(), json!(index));
    if let Some(id) = id {
        action.insert("_id".to_string(), json!(id));
    }
    if let Some(routing) = routing {
        action.insert("routing".to_string(), json!(routing));
    }
    json!({ "index": action })
}

/// Bulk operation response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkResponse {
    /// Whether there were errors.
    pub errors: bool,
    /// Individual item results, in request order.
    pub items: Vec<BulkItem>,
}

/// Individual bulk item result, keyed by operation type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BulkItem {
    Index(BulkItemStatus),
    Create(BulkItemStatus),
    Update(BulkItemStatus),
    Delete(BulkItemStatus),
}

impl BulkItem {
    fn status(&self) -> &BulkItemStatus {
        match self {
            BulkItem::Index(s) | BulkItem::Create(s) | BulkItem::Update(s) | BulkItem::Delete(s) => s,
        }
    }
}

/// Status of a bulk item operation.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkItemStatus {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    pub error: Option<BulkItemError>,
}

/// Bulk item error details.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkItemError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
}

impl BulkResponse {
    /// Item statuses in request order, or `BulkError` if any item failed.
    pub fn into_statuses(self) -> Result<Vec<BulkItemStatus>> {
        let statuses: Vec<BulkItemStatus> =
            self.items.iter().map(|item| item.status().clone()).collect();

        if !self.errors {
            return Ok(statuses);
        }

        let errors: Vec<String> = statuses
            .iter()
            .filter_map(|s| {
                s.error
                    .as_ref()
                    .map(|e| format!("{}: {} ({})", s.id, e.reason, e.error_type))
            })
            .collect();

        Err(ElasticsearchError::BulkError {
            succeeded: statuses.len() - errors.len(),
            failed: errors.len(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_action() {
        assert_eq!(
            index_action("books", Some("1"), Some("eu")),
            json!({"index": {"_index": "books", "_id": "1", "routing": "eu"}})
        );
        assert_eq!(
            index_action("books", None, None),
            json!({"index": {"_index": "books"}})
        );
    }

    #[test]
    fn test_successful_response() {
        let response: BulkResponse = serde_json::from_value(json!({
            "took": 5,
            "errors": false,
            "items": [
                {"index": {"_index": "books", "_id": "1", "_version": 1, "status": 201}},
                {"index": {"_index": "books", "_id": "2", "_version": 3, "status": 200}}
            ]
        }))
        .unwrap();

        let statuses = response.into_statuses().unwrap();
        assert_eq!(statuses[1].id, "2");
        assert_eq!(statuses[1].version, Some(3));
    }

    #[test]
    fn test_failed_items() {
        let response: BulkResponse = serde_json::from_value(json!({
            "took": 5,
            "errors": true,
            "items": [
                {"index": {"_index": "books", "_id": "1", "status": 201}},
                {"index": {"_index": "books", "_id": "2", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "bad year"}}}
            ]
        }))
        .unwrap();

        match response.into_statuses() {
            Err(ElasticsearchError::BulkError {
                succeeded,
                failed,
                errors,
            }) => {
                assert_eq!(succeeded, 1);
                assert_eq!(failed, 1);
                assert_eq!(errors, vec!["2: bad year (mapper_parsing_exception)".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
