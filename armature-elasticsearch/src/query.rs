//! Search request descriptors.

use crate::aggregation::Aggregation;
use crate::coordinates::IndexCoordinates;
use crate::criteria::{MoreLikeThisClause, QueryClause};
use crate::error::{ElasticsearchError, Result};
use crate::paging::{Pageable, Sort};
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Render a duration as an engine time value (`30s`, `1500ms`).
pub(crate) fn time_value(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Point-in-time reference carried by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct PointInTime {
    /// Id returned by `open_point_in_time`.
    pub id: String,
    /// How long the engine keeps the context alive after this request.
    pub keep_alive: Duration,
}

/// A search request: criteria plus paging, sorting and result shaping.
///
/// Built per call. Paging is optional; without it the engine default page
/// applies, unless `max_results` caps the result size.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    criteria: QueryClause,
    pageable: Option<Pageable>,
    sort: Sort,
    max_results: Option<usize>,
    source_includes: Vec<String>,
    source_excludes: Vec<String>,
    highlight_fields: Vec<String>,
    aggregations: Vec<(String, Aggregation)>,
    track_total_hits: Option<bool>,
    min_score: Option<f64>,
    routing: Option<String>,
    timeout: Option<Duration>,
    scroll_time: Option<Duration>,
    point_in_time: Option<PointInTime>,
    search_after: Option<Vec<Value>>,
    explain: bool,
}

impl Query {
    /// Query with the given criteria.
    pub fn new(criteria: QueryClause) -> Self {
        Self {
            criteria,
            pageable: None,
            sort: Sort::unsorted(),
            max_results: None,
            source_includes: Vec::new(),
            source_excludes: Vec::new(),
            highlight_fields: Vec::new(),
            aggregations: Vec::new(),
            track_total_hits: None,
            min_score: None,
            routing: None,
            timeout: None,
            scroll_time: None,
            point_in_time: None,
            search_after: None,
            explain: false,
        }
    }

    /// Match-all query.
    pub fn find_all() -> Self {
        Self::new(QueryClause::MatchAll)
    }

    /// Ids query. Page size equals the number of ids; paging is left unset
    /// for an empty list.
    pub fn ids(ids: Vec<String>) -> Self {
        let size = ids.len();
        let query = Self::new(QueryClause::Ids(ids));
        match Pageable::of(0, size) {
            Ok(pageable) => query.with_pageable(pageable),
            Err(_) => query,
        }
    }

    /// Set paging.
    pub fn with_pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }

    /// Add sort orders, applied after the pageable's own sort.
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort.orders.extend(sort.orders);
        self
    }

    /// Cap the number of returned hits. Overrides the page size.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Restrict returned source fields.
    pub fn with_source_filter(mut self, includes: Vec<String>, excludes: Vec<String>) -> Self {
        self.source_includes = includes;
        self.source_excludes = excludes;
        self
    }

    /// Request highlighting for fields.
    pub fn with_highlight(mut self, fields: Vec<String>) -> Self {
        self.highlight_fields = fields;
        self
    }

    /// Add a named aggregation.
    pub fn with_aggregation(mut self, name: impl Into<String>, aggregation: Aggregation) -> Self {
        self.aggregations.push((name.into(), aggregation));
        self
    }

    /// Track total hits accurately beyond the engine's default limit.
    pub fn with_track_total_hits(mut self, track: bool) -> Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Minimum score for returned hits.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Route the request to specific shards.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Per-request search timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Scroll context keep-alive for streamed searches.
    pub fn with_scroll_time(mut self, scroll_time: Duration) -> Self {
        self.scroll_time = Some(scroll_time);
        self
    }

    /// Search within a point-in-time.
    pub fn with_point_in_time(mut self, id: impl Into<String>, keep_alive: Duration) -> Self {
        self.point_in_time = Some(PointInTime {
            id: id.into(),
            keep_alive,
        });
        self
    }

    /// Continue after the sort values of a previous hit.
    pub fn with_search_after(mut self, values: Vec<Value>) -> Self {
        self.search_after = Some(values);
        self
    }

    /// Ask the engine to explain scores.
    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    /// Criteria.
    pub fn criteria(&self) -> &QueryClause {
        &self.criteria
    }

    /// Paging, if set.
    pub fn pageable(&self) -> Option<&Pageable> {
        self.pageable.as_ref()
    }

    /// Result cap, if set.
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    /// Routing, if set.
    pub fn routing(&self) -> Option<&str> {
        self.routing.as_deref()
    }

    /// Scroll keep-alive, if set.
    pub fn scroll_time(&self) -> Option<Duration> {
        self.scroll_time
    }

    /// Point-in-time, if set.
    pub fn point_in_time(&self) -> Option<&PointInTime> {
        self.point_in_time.as_ref()
    }

    /// Named aggregations.
    pub fn aggregations(&self) -> &[(String, Aggregation)] {
        &self.aggregations
    }

    /// Sort values to continue after, if set.
    pub fn search_after(&self) -> Option<&[Value]> {
        self.search_after.as_deref()
    }

    /// All sort orders: pageable sort first, then the extra sort.
    pub fn effective_sort(&self) -> Sort {
        let mut sort = self
            .pageable
            .as_ref()
            .map(|p| p.sort().clone())
            .unwrap_or_default();
        sort.orders.extend(self.sort.orders.iter().cloned());
        sort
    }

    /// Offset of the first hit.
    pub fn from(&self) -> Option<usize> {
        self.pageable.as_ref().map(Pageable::offset)
    }

    /// Requested number of hits.
    pub fn size(&self) -> Option<usize> {
        self.max_results
            .or_else(|| self.pageable.as_ref().map(Pageable::page_size))
    }

    /// Render the search request body.
    pub fn to_search_body(&self) -> Value {
        let mut body = Map::new();

        body.insert("query".to_string(), self.criteria.to_json());

        if self.max_results.is_none() {
            if let Some(from) = self.from() {
                body.insert("from".to_string(), json!(from));
            }
        }
        if let Some(size) = self.size() {
            body.insert("size".to_string(), json!(size));
        }

        let sort = self.effective_sort();
        if !sort.is_unsorted() {
            body.insert("sort".to_string(), sort.to_json());
        }

        if !self.source_includes.is_empty() || !self.source_excludes.is_empty() {
            body.insert(
                "_source".to_string(),
                json!({ "includes": self.source_includes, "excludes": self.source_excludes }),
            );
        }

        if !self.highlight_fields.is_empty() {
            let fields: Map<String, Value> = self
                .highlight_fields
                .iter()
                .map(|f| (f.clone(), json!({})))
                .collect();
            body.insert("highlight".to_string(), json!({ "fields": fields }));
        }

        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(name, agg)| (name.clone(), agg.to_json()))
                .collect();
            body.insert("aggregations".to_string(), Value::Object(aggs));
        }

        if let Some(track) = self.track_total_hits {
            body.insert("track_total_hits".to_string(), json!(track));
        }
        if let Some(min_score) = self.min_score {
            body.insert("min_score".to_string(), json!(min_score));
        }
        if let Some(timeout) = self.timeout {
            body.insert("timeout".to_string(), json!(time_value(timeout)));
        }
        if let Some(pit) = &self.point_in_time {
            body.insert(
                "pit".to_string(),
                json!({ "id": pit.id, "keep_alive": time_value(pit.keep_alive) }),
            );
        }
        if let Some(values) = &self.search_after {
            body.insert("search_after".to_string(), json!(values));
        }
        if self.explain {
            body.insert("explain".to_string(), json!(true));
        }

        Value::Object(body)
    }
}

/// Similarity search seeded by a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThisQuery {
    id: String,
    fields: Vec<String>,
    pageable: Option<Pageable>,
    parameters: Vec<(&'static str, Value)>,
}

impl MoreLikeThisQuery {
    /// Seed the query with the document `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
            pageable: None,
            parameters: Vec::new(),
        }
    }

    /// Seed document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Compare only these fields.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Set paging.
    pub fn with_pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }

    /// Minimum frequency of a term in the seed document.
    pub fn min_term_freq(self, value: u32) -> Self {
        self.parameter("min_term_freq", json!(value))
    }

    /// Maximum number of selected query terms.
    pub fn max_query_terms(self, value: u32) -> Self {
        self.parameter("max_query_terms", json!(value))
    }

    /// Minimum number of documents a term must appear in.
    pub fn min_doc_freq(self, value: u32) -> Self {
        self.parameter("min_doc_freq", json!(value))
    }

    /// Maximum number of documents a term may appear in.
    pub fn max_doc_freq(self, value: u32) -> Self {
        self.parameter("max_doc_freq", json!(value))
    }

    /// Minimum word length.
    pub fn min_word_len(self, value: u32) -> Self {
        self.parameter("min_word_len", json!(value))
    }

    /// Maximum word length.
    pub fn max_word_len(self, value: u32) -> Self {
        self.parameter("max_word_len", json!(value))
    }

    /// Boost factor for selected terms.
    pub fn boost_terms(self, value: f32) -> Self {
        self.parameter("boost_terms", json!(value))
    }

    /// Words ignored when selecting terms.
    pub fn stop_words(self, words: Vec<String>) -> Self {
        self.parameter("stop_words", json!(words))
    }

    fn parameter(mut self, name: &'static str, value: Value) -> Self {
        self.parameters.retain(|(n, _)| *n != name);
        self.parameters.push((name, value));
        self
    }

    /// Build the search query against `index`.
    ///
    /// Fails with `InvalidArgument` when the seed id is blank.
    pub fn to_query(&self, index: &IndexCoordinates) -> Result<Query> {
        if self.id.trim().is_empty() {
            return Err(ElasticsearchError::invalid(
                "more-like-this query needs a seed document id",
            ));
        }

        let clause = self.parameters.iter().fold(
            MoreLikeThisClause::new(index, self.id.clone()).fields(self.fields.clone()),
            |clause, (name, value)| clause.parameter(name, value.clone()),
        );

        let query = Query::new(QueryClause::MoreLikeThis(clause));
        Ok(match &self.pageable {
            Some(pageable) => query.with_pageable(pageable.clone()),
            None => query,
        })
    }
}
