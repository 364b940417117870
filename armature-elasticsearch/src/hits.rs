//! Search results.

use crate::aggregation::Aggregations;
use crate::entity::{Entity, EntityInformation};
use crate::error::{ElasticsearchError, Result};
use crate::paging::{Page, Pageable};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Relation of the reported total to the real number of matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TotalHitsRelation {
    /// The total is exact.
    #[default]
    EqualTo,
    /// The total is a lower bound.
    GreaterThanOrEqualTo,
    /// Totals were not tracked.
    Off,
}

/// A single hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<T> {
    /// Document id.
    pub id: String,
    /// Index the document was found in.
    pub index: String,
    /// Relevance score.
    pub score: Option<f64>,
    /// Sort values, usable for `search_after`.
    pub sort_values: Vec<Value>,
    /// Highlighted fragments by field.
    pub highlight_fields: HashMap<String, Vec<String>>,
    /// Routing value.
    pub routing: Option<String>,
    /// Document version.
    pub version: Option<i64>,
    /// Sequence number.
    pub seq_no: Option<i64>,
    /// Primary term.
    pub primary_term: Option<i64>,
    /// Names of matched named queries.
    pub matched_queries: Vec<String>,
    /// Deserialized document.
    pub content: T,
}

impl<T: DeserializeOwned> SearchHit<T> {
    pub(crate) fn from_hit(hit: &Value) -> Result<Self> {
        let source = hit
            .get("_source")
            .ok_or_else(|| ElasticsearchError::Query("hit without _source".to_string()))?;

        let highlight_fields = hit["highlight"]
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, fragments)| (field.clone(), strings(fragments)))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id: hit["_id"].as_str().unwrap_or_default().to_string(),
            index: hit["_index"].as_str().unwrap_or_default().to_string(),
            score: hit["_score"].as_f64(),
            sort_values: hit["sort"].as_array().cloned().unwrap_or_default(),
            highlight_fields,
            routing: hit["_routing"].as_str().map(str::to_string),
            version: hit["_version"].as_i64(),
            seq_no: hit["_seq_no"].as_i64(),
            primary_term: hit["_primary_term"].as_i64(),
            matched_queries: strings(&hit["matched_queries"]),
            content: serde_json::from_value(source.clone())?,
        })
    }
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Hits of one search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits<T> {
    /// Total number of matches.
    pub total_hits: u64,
    /// Relation of `total_hits` to the real total.
    pub total_hits_relation: TotalHitsRelation,
    /// Maximum score.
    pub max_score: Option<f64>,
    /// Hits in engine order.
    pub search_hits: Vec<SearchHit<T>>,
    /// Aggregation results.
    pub aggregations: Option<Aggregations>,
    /// Scroll id, for scrolled searches.
    pub scroll_id: Option<String>,
    /// Point-in-time id returned by the engine.
    pub point_in_time_id: Option<String>,
}

impl<T> SearchHits<T> {
    /// Empty result.
    pub fn empty() -> Self {
        Self {
            total_hits: 0,
            total_hits_relation: TotalHitsRelation::EqualTo,
            max_score: None,
            search_hits: Vec::new(),
            aggregations: None,
            scroll_id: None,
            point_in_time_id: None,
        }
    }

    /// Whether any hits were returned.
    pub fn has_search_hits(&self) -> bool {
        !self.search_hits.is_empty()
    }

    /// Number of returned hits.
    pub fn len(&self) -> usize {
        self.search_hits.len()
    }

    /// Whether no hits were returned.
    pub fn is_empty(&self) -> bool {
        self.search_hits.is_empty()
    }

    /// Unwrap the documents, dropping hit metadata.
    pub fn into_contents(self) -> Vec<T> {
        self.search_hits.into_iter().map(|h| h.content).collect()
    }
}

impl<T: DeserializeOwned> SearchHits<T> {
    /// Parse a search (or scroll) response body.
    pub fn from_response(body: &Value) -> Result<Self> {
        let hits = &body["hits"];

        let (total_hits, total_hits_relation) = match &hits["total"] {
            // pre-7.0 engines answer with a bare number
            Value::Number(n) => (n.as_u64().unwrap_or(0), TotalHitsRelation::EqualTo),
            Value::Object(total) => {
                let relation = match total.get("relation").and_then(Value::as_str) {
                    Some("gte") => TotalHitsRelation::GreaterThanOrEqualTo,
                    _ => TotalHitsRelation::EqualTo,
                };
                (
                    total.get("value").and_then(Value::as_u64).unwrap_or(0),
                    relation,
                )
            }
            _ => (0, TotalHitsRelation::Off),
        };

        let search_hits = hits["hits"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(SearchHit::<T>::from_hit)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            total_hits,
            total_hits_relation,
            max_score: hits["max_score"].as_f64(),
            search_hits,
            aggregations: Aggregations::from_response(body.get("aggregations")),
            scroll_id: body["_scroll_id"].as_str().map(str::to_string),
            point_in_time_id: body["pit_id"].as_str().map(str::to_string),
        })
    }
}

impl<T: Entity> SearchHits<T> {
    /// Write hit ids and versions into the loaded entities.
    pub(crate) fn hydrate(mut self, info: &EntityInformation<T>) -> Self {
        for hit in &mut self.search_hits {
            info.hydrate(&mut hit.content, &hit.id, hit.version);
        }
        self
    }
}

/// Search hits bound to the page request that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<T> {
    /// The hits.
    pub search_hits: SearchHits<T>,
    /// The page request.
    pub pageable: Pageable,
}

/// Bind hits to the page request that produced them.
pub fn search_page_for<T>(search_hits: SearchHits<T>, pageable: Pageable) -> SearchPage<T> {
    SearchPage {
        search_hits,
        pageable,
    }
}

impl<T> SearchPage<T> {
    /// Unwrap into a page of documents.
    pub fn into_page(self) -> Page<T> {
        let total = self.search_hits.total_hits;
        Page::new(self.search_hits.into_contents(), self.pageable, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Book {
        title: String,
    }

    fn response() -> Value {
        json!({
            "took": 3,
            "_scroll_id": "scroll-1",
            "hits": {
                "total": {"value": 12, "relation": "gte"},
                "max_score": 1.5,
                "hits": [
                    {
                        "_index": "books",
                        "_id": "1",
                        "_score": 1.5,
                        "_routing": "eu",
                        "_seq_no": 4,
                        "_primary_term": 1,
                        "sort": [1.5, "1"],
                        "matched_queries": ["by_title"],
                        "highlight": {"title": ["<em>Dune</em>"]},
                        "_source": {"title": "Dune"}
                    },
                    {"_index": "books", "_id": "2", "_score": 0.5, "_source": {"title": "Emma"}}
                ]
            },
            "aggregations": {"count": {"value": 2.0}}
        })
    }

    #[test]
    fn test_parse_response() {
        let hits: SearchHits<Book> = SearchHits::from_response(&response()).unwrap();

        assert_eq!(hits.total_hits, 12);
        assert_eq!(hits.total_hits_relation, TotalHitsRelation::GreaterThanOrEqualTo);
        assert_eq!(hits.max_score, Some(1.5));
        assert_eq!(hits.scroll_id.as_deref(), Some("scroll-1"));
        assert_eq!(hits.len(), 2);

        let first = &hits.search_hits[0];
        assert_eq!(first.id, "1");
        assert_eq!(first.routing.as_deref(), Some("eu"));
        assert_eq!(first.seq_no, Some(4));
        assert_eq!(first.sort_values, vec![json!(1.5), json!("1")]);
        assert_eq!(first.matched_queries, vec!["by_title".to_string()]);
        assert_eq!(first.highlight_fields["title"], vec!["<em>Dune</em>".to_string()]);
        assert_eq!(first.content.title, "Dune");

        let aggs = hits.aggregations.as_ref().unwrap();
        assert_eq!(aggs.get("count").unwrap().metric_value(), Some(2.0));
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let body = json!({"hits": {"total": 1, "hits": [{"_id": "1"}]}});
        let result: Result<SearchHits<Book>> = SearchHits::from_response(&body);
        assert!(matches!(result, Err(ElasticsearchError::Query(_))));
    }

    #[test]
    fn test_search_page_unwraps() {
        let hits: SearchHits<Book> = SearchHits::from_response(&response()).unwrap();
        let page = search_page_for(hits, Pageable::of(0, 2).unwrap()).into_page();

        assert_eq!(page.total_elements, 12);
        assert_eq!(page.total_pages(), 6);
        assert_eq!(page.content[1], Book { title: "Emma".into() });
    }
}
