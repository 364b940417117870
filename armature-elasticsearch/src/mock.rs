//! In-memory engine for tests.
//!
//! [`InMemoryOperations`] implements every operation trait over process
//! memory and records each engine call it receives. Writes are visible to
//! `get` and `exists` at once, and to `search` and `count` after a refresh
//! or right away when the refresh policy makes them visible.
//!
//! Query evaluation covers the clauses an entity repository produces plus
//! the common term-level and full-text ones. Text is tokenized on
//! non-alphanumeric characters and lowercased; scores are the number of
//! matching terms.

use crate::aggregation::{Aggregation, Metric};
use crate::coordinates::IndexCoordinates;
use crate::criteria::{BoolClause, MoreLikeThisClause, QueryClause};
use crate::entity::{Entity, EntityInformation, VersionType};
use crate::error::{ElasticsearchError, Result};
use crate::hits::SearchHits;
use crate::index::{
    AliasAction, AliasActions, AliasData, IndexInformation, IndexOperations, IndexSchema,
    PutComponentTemplateRequest, PutIndexTemplateRequest, PutTemplateRequest, TemplateResponse,
};
use crate::mapping::{Mapping, Settings};
use crate::operations::{
    ByQueryResponse, ClusterHealth, ClusterOperations, DocumentOperations,
    ElasticsearchOperations, MultiGetItem, RefreshPolicy, Script, ScriptOperations,
    SearchOperations, UpdateOutcome, UpdateResult,
};
use crate::paging::{Direction, Sort};
use crate::query::Query;
use crate::routing::{DefaultRoutingResolver, RoutingResolver};
use crate::stream::{ScrollCursor, SearchHitsIterator};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Hits per page when a query sets neither paging nor a result cap.
const DEFAULT_PAGE_SIZE: usize = 10;

// =============================================================================
// Engine state
// =============================================================================

#[derive(Debug, Clone)]
struct StoredDocument {
    source: Value,
    version: i64,
    routing: Option<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: BTreeMap<String, StoredDocument>,
    searchable: BTreeMap<String, StoredDocument>,
    settings: Settings,
    mapping: Map<String, Value>,
    aliases: Vec<AliasData>,
}

impl IndexState {
    fn refresh(&mut self) {
        self.searchable = self.documents.clone();
    }

    fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a.alias == alias)
    }
}

#[derive(Debug)]
struct ScrollState {
    remaining: VecDeque<Value>,
    batch_size: usize,
    total: usize,
}

#[derive(Debug, Default)]
struct EngineState {
    indices: BTreeMap<String, IndexState>,
    templates: BTreeMap<String, Value>,
    index_templates: BTreeMap<String, Value>,
    component_templates: BTreeMap<String, Value>,
    scripts: BTreeMap<String, Script>,
    scrolls: HashMap<String, ScrollState>,
    point_in_times: HashMap<String, Vec<String>>,
    sequence: u64,
}

impl EngineState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{}", self.sequence)
    }

    /// Concrete indices behind `name`: the index itself, a `*` pattern or
    /// the indices carrying `name` as alias.
    fn resolve(&self, name: &str) -> Vec<String> {
        if self.indices.contains_key(name) {
            return vec![name.to_string()];
        }
        if name == "_all" || name.contains('*') {
            return self
                .indices
                .keys()
                .filter(|index| name == "_all" || wildcard_match(name, index))
                .cloned()
                .collect();
        }
        self.indices
            .iter()
            .filter(|(_, state)| state.has_alias(name))
            .map(|(index, _)| index.clone())
            .collect()
    }

    /// Like [`resolve`](Self::resolve) over all names, failing on a
    /// concrete name that matches nothing.
    fn resolve_existing(&self, index: &IndexCoordinates) -> Result<Vec<String>> {
        let mut resolved: Vec<String> = Vec::new();
        for name in index.names() {
            let found = self.resolve(name);
            if found.is_empty() && !name.contains('*') {
                return Err(ElasticsearchError::IndexNotFound(name.clone()));
            }
            for index in found {
                if !resolved.contains(&index) {
                    resolved.push(index);
                }
            }
        }
        Ok(resolved)
    }

    /// Index a write to `name` lands in.
    fn write_index(&self, name: &str) -> Result<String> {
        let candidates = self.resolve(name);
        match candidates.as_slice() {
            [] => Ok(name.to_string()),
            [single] => Ok(single.clone()),
            many => many
                .iter()
                .find(|index| {
                    self.indices.get(*index).is_some_and(|state| {
                        state
                            .aliases
                            .iter()
                            .any(|a| a.alias == name && a.is_write_index == Some(true))
                    })
                })
                .cloned()
                .ok_or_else(|| ElasticsearchError::Engine {
                    status: 400,
                    reason: format!("alias [{name}] has more than one index and no write index"),
                }),
        }
    }

    fn document(&self, index: &IndexCoordinates, id: &str) -> Option<(String, &StoredDocument)> {
        self.resolve(index.index_name())
            .into_iter()
            .find_map(|name| {
                let document = self.indices.get(&name)?.documents.get(id)?;
                Some((name, document))
            })
    }

    fn create_index(&mut self, name: &str, settings: &Settings, mapping: Option<&Mapping>) {
        let mut state = IndexState::default();
        let mut template_settings = Settings::new();

        let legacy = self.templates.values();
        let composable = self.index_templates.values();
        for (template, data) in legacy
            .map(|t| (t, t))
            .chain(composable.map(|t| (t, &t["template"])))
        {
            let applies = strings(&template["index_patterns"])
                .iter()
                .any(|pattern| wildcard_match(pattern, name));
            if !applies {
                continue;
            }
            template_settings = template_settings.merge(&Settings::from_json(data["settings"].clone()));
            if let Some(properties) = data["mappings"].as_object() {
                merge_mapping(&mut state.mapping, properties);
            }
            if let Some(aliases) = data["aliases"].as_object() {
                for (alias, value) in aliases {
                    state.aliases.push(AliasData::from_json(alias, value));
                }
            }
        }

        state.settings = template_settings.merge(settings);
        if let Some(Value::Object(mapping)) = mapping.map(Mapping::to_json) {
            merge_mapping(&mut state.mapping, &mapping);
        }
        self.indices.insert(name.to_string(), state);
    }
}

fn merge_mapping(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_mapping(existing, incoming)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
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

fn record(calls: &Mutex<Vec<String>>, operation: &str, target: &str) {
    debug!(operation, target, "in-memory engine call");
    calls.lock().push(format!("{operation} {target}"));
}

// =============================================================================
// Query evaluation
// =============================================================================

struct Hit {
    index: String,
    id: String,
    score: f64,
    document: StoredDocument,
}

/// Values at a dotted path, flattening arrays. A `.keyword` suffix is ignored.
fn field_values<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let path = path.strip_suffix(".keyword").unwrap_or(path);
    let mut current = vec![source];
    for part in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value.get(part) {
                Some(Value::Array(items)) => next.extend(items.iter()),
                Some(value) => next.push(value),
                None => {}
            }
        }
        current = next;
    }
    current.into_iter().filter(|v| !v.is_null()).collect()
}

fn leaf_values(source: &Value) -> Vec<&Value> {
    match source {
        Value::Object(map) => map.values().flat_map(leaf_values).collect(),
        Value::Array(items) => items.iter().flat_map(leaf_values).collect(),
        Value::Null => Vec::new(),
        leaf => vec![leaf],
    }
}

fn tokens(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string().to_lowercase()],
    }
}

fn terms_of(source: &Value, fields: &[String]) -> BTreeSet<String> {
    let values: Vec<&Value> = if fields.is_empty() {
        leaf_values(source)
    } else {
        fields.iter().flat_map(|f| field_values(source, f)).collect()
    };
    values.into_iter().flat_map(tokens).collect()
}

fn term_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::String(a), other) | (other, Value::String(a)) => *a == other.to_string(),
        _ => actual == expected,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    fn go(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first().copied(), text.first().copied()) {
            (None, None) => true,
            (Some('*'), _) => go(&pattern[1..], text) || (!text.is_empty() && go(pattern, &text[1..])),
            (Some('?'), Some(_)) => go(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => go(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    go(&pattern, &text)
}

fn range_matches(values: &[&Value], bounds: &Map<String, Value>) -> bool {
    values.iter().any(|value| {
        bounds.iter().all(|(op, bound)| {
            let ordering = compare_values(value, bound);
            match op.as_str() {
                "gt" => ordering == Ordering::Greater,
                "gte" => ordering != Ordering::Less,
                "lt" => ordering == Ordering::Less,
                "lte" => ordering != Ordering::Greater,
                _ => true,
            }
        })
    })
}

/// Score of `source` for `clause`, `None` when it does not match.
fn evaluate(state: &EngineState, clause: &QueryClause, id: &str, source: &Value) -> Result<Option<f64>> {
    let matched = |yes: bool| Ok(yes.then_some(1.0));

    match clause {
        QueryClause::MatchAll => matched(true),
        QueryClause::Ids(ids) => matched(ids.iter().any(|i| i == id)),
        QueryClause::Term { field, value } if field == "_id" => {
            matched(value.as_str() == Some(id))
        }
        QueryClause::Term { field, value } => matched(
            field_values(source, field)
                .iter()
                .any(|actual| term_matches(actual, value)),
        ),
        QueryClause::Terms { field, values } => matched(
            field_values(source, field)
                .iter()
                .any(|actual| values.iter().any(|v| term_matches(actual, v))),
        ),
        QueryClause::Match {
            field,
            text,
            operator,
            ..
        } => {
            let wanted = tokens(&Value::String(text.clone()));
            let present: BTreeSet<String> = field_values(source, field)
                .into_iter()
                .flat_map(tokens)
                .collect();
            let hits = wanted.iter().filter(|t| present.contains(*t)).count();
            let all = operator.as_deref() == Some("and");
            let ok = hits > 0 && (!all || hits == wanted.len());
            Ok(ok.then_some(hits as f64))
        }
        QueryClause::Range(range) => {
            matched(range_matches(&field_values(source, &range.field), range.bounds()))
        }
        QueryClause::Bool(bool_clause) => evaluate_bool(state, bool_clause, id, source),
        QueryClause::QueryString { query, fields } => {
            let wanted = tokens(&Value::String(query.clone()));
            let present = terms_of(source, fields);
            let hits = wanted.iter().filter(|t| present.contains(*t)).count();
            Ok((hits > 0).then_some(hits as f64))
        }
        QueryClause::Prefix { field, value } => matched(
            field_values(source, field)
                .iter()
                .any(|v| v.as_str().is_some_and(|s| s.starts_with(value.as_str()))),
        ),
        QueryClause::Wildcard { field, pattern } => matched(
            field_values(source, field)
                .iter()
                .any(|v| v.as_str().is_some_and(|s| wildcard_match(pattern, s))),
        ),
        QueryClause::Exists { field } => matched(!field_values(source, field).is_empty()),
        QueryClause::Nested { query, .. } => evaluate(state, query, id, source),
        QueryClause::MoreLikeThis(clause) => Ok(more_like_this(state, clause, id, source)),
        QueryClause::Raw(_) => Err(ElasticsearchError::Query(
            "raw query clauses are not supported by the in-memory engine".to_string(),
        )),
    }
}

fn evaluate_bool(
    state: &EngineState,
    clause: &BoolClause,
    id: &str,
    source: &Value,
) -> Result<Option<f64>> {
    let mut total = 0.0;

    for must in &clause.must {
        match evaluate(state, must, id, source)? {
            Some(score) => total += score,
            None => return Ok(None),
        }
    }
    for filter in &clause.filter {
        if evaluate(state, filter, id, source)?.is_none() {
            return Ok(None);
        }
    }
    for must_not in &clause.must_not {
        if evaluate(state, must_not, id, source)?.is_some() {
            return Ok(None);
        }
    }

    let mut should_matches = 0;
    for should in &clause.should {
        if let Some(score) = evaluate(state, should, id, source)? {
            should_matches += 1;
            total += score;
        }
    }

    let required = match clause.minimum_should_match {
        Some(n) => usize::try_from(n).unwrap_or(0),
        None if clause.must.is_empty() && clause.filter.is_empty() && !clause.should.is_empty() => 1,
        None => 0,
    };
    if should_matches < required {
        return Ok(None);
    }

    Ok(Some(if total > 0.0 { total } else { 1.0 }))
}

fn more_like_this(
    state: &EngineState,
    clause: &MoreLikeThisClause,
    id: &str,
    source: &Value,
) -> Option<f64> {
    if id == clause.id {
        return None;
    }

    let seed = state
        .resolve(&clause.index)
        .into_iter()
        .find_map(|index| state.indices.get(&index)?.documents.get(&clause.id).cloned())?;

    let seed_terms = terms_of(&seed.source, &clause.fields);
    let shared = terms_of(source, &clause.fields)
        .intersection(&seed_terms)
        .count();
    (shared > 0).then_some(shared as f64)
}

fn sort_value(hit: &Hit, property: &str) -> Option<Value> {
    match property {
        "_score" => Some(json!(hit.score)),
        "_id" => Some(json!(hit.id)),
        _ => field_values(&hit.document.source, property)
            .first()
            .map(|v| (*v).clone()),
    }
}

fn sort_values(hit: &Hit, sort: &Sort) -> Vec<Value> {
    sort.orders
        .iter()
        .map(|order| sort_value(hit, &order.property).unwrap_or(Value::Null))
        .collect()
}

/// Compare two sort value rows. Missing values go last unless the order
/// asks for `_first`.
fn compare_rows(sort: &Sort, a: &[Value], b: &[Value]) -> Ordering {
    for (order, (x, y)) in sort.orders.iter().zip(a.iter().zip(b)) {
        let missing_first = order.missing.as_deref() == Some("_first");
        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if missing_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if missing_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match order.direction {
                Direction::Asc => compare_values(x, y),
                Direction::Desc => compare_values(y, x),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn sort_hits(hits: &mut [Hit], sort: &Sort) {
    if sort.is_unsorted() {
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    } else {
        hits.sort_by(|a, b| compare_rows(sort, &sort_values(a, sort), &sort_values(b, sort)));
    }
}

fn hit_json(hit: &Hit, sort: &Sort) -> Value {
    let mut body = json!({
        "_index": hit.index,
        "_id": hit.id,
        "_score": hit.score,
        "_version": hit.document.version,
        "_source": hit.document.source,
    });
    if let Some(routing) = &hit.document.routing {
        body["_routing"] = json!(routing);
    }
    if !sort.is_unsorted() {
        body["sort"] = json!(sort_values(hit, sort));
    }
    body
}

fn aggregate(hits: &[Hit], aggregations: &[(String, Aggregation)]) -> Value {
    let mut results = Map::new();

    for (name, aggregation) in aggregations {
        let result = match aggregation {
            Aggregation::Terms { field, size } => {
                let mut counts: BTreeMap<String, (Value, u64)> = BTreeMap::new();
                for hit in hits {
                    for value in field_values(&hit.document.source, field) {
                        counts.entry(value.to_string()).or_insert((value.clone(), 0)).1 += 1;
                    }
                }
                let mut buckets: Vec<(Value, u64)> = counts.into_values().collect();
                buckets.sort_by(|a, b| b.1.cmp(&a.1));
                buckets.truncate(size.unwrap_or(DEFAULT_PAGE_SIZE));
                json!({
                    "buckets": buckets
                        .into_iter()
                        .map(|(key, count)| json!({ "key": key, "doc_count": count }))
                        .collect::<Vec<_>>()
                })
            }
            Aggregation::Metric { metric, field } => {
                let values: Vec<&Value> = hits
                    .iter()
                    .flat_map(|hit| field_values(&hit.document.source, field))
                    .collect();
                let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
                let value = match metric {
                    Metric::ValueCount => json!(values.len()),
                    Metric::Cardinality => json!(
                        values
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<BTreeSet<_>>()
                            .len()
                    ),
                    Metric::Sum => json!(numbers.iter().sum::<f64>()),
                    Metric::Avg if numbers.is_empty() => Value::Null,
                    Metric::Avg => json!(numbers.iter().sum::<f64>() / numbers.len() as f64),
                    Metric::Min => numbers.iter().copied().reduce(f64::min).map_or(Value::Null, |v| json!(v)),
                    Metric::Max => numbers.iter().copied().reduce(f64::max).map_or(Value::Null, |v| json!(v)),
                };
                json!({ "value": value })
            }
            Aggregation::DateHistogram { .. }
            | Aggregation::Histogram { .. }
            | Aggregation::Range { .. } => json!({ "buckets": [] }),
        };
        results.insert(name.clone(), result);
    }

    Value::Object(results)
}

fn hits_body(total: usize, max_score: Option<f64>, hits: Vec<Value>) -> Value {
    json!({
        "took": 0,
        "timed_out": false,
        "hits": {
            "total": { "value": total, "relation": "eq" },
            "max_score": max_score,
            "hits": hits,
        }
    })
}

// =============================================================================
// Operations
// =============================================================================

/// In-memory implementation of every operation trait.
///
/// Clones share state and the call log.
#[derive(Clone)]
pub struct InMemoryOperations {
    state: Arc<Mutex<EngineState>>,
    calls: Arc<Mutex<Vec<String>>>,
    refresh_policy: Option<RefreshPolicy>,
    index_prefix: Option<String>,
    routing: Arc<dyn RoutingResolver>,
}

impl Default for InMemoryOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOperations")
            .field("refresh_policy", &self.refresh_policy)
            .field("index_prefix", &self.index_prefix)
            .finish()
    }
}

impl InMemoryOperations {
    /// Empty engine, no refresh policy.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            refresh_policy: None,
            index_prefix: None,
            routing: Arc::new(DefaultRoutingResolver),
        }
    }

    /// Use `policy` for writes.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = Some(policy);
        self
    }

    /// Prefix entity index names.
    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = Some(prefix.into());
        self
    }

    /// Recorded calls as `"<operation> <target>"`, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls of `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .count()
    }

    /// Whether `operation` was called.
    pub fn was_called(&self, operation: &str) -> bool {
        self.call_count(operation) > 0
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Number of scroll contexts not yet cleared.
    pub fn open_scrolls(&self) -> usize {
        self.state.lock().scrolls.len()
    }

    /// Number of point-in-times not yet closed.
    pub fn open_point_in_times(&self) -> usize {
        self.state.lock().point_in_times.len()
    }

    /// Real-time number of documents in `index`, refreshed or not.
    pub fn document_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .indices
            .get(index)
            .map_or(0, |state| state.documents.len())
    }

    fn record(&self, operation: &str, target: impl std::fmt::Display) {
        record(&self.calls, operation, &target.to_string());
    }

    /// Call target with the resolver's routing appended, as `target?routing=r`.
    fn routed(&self, target: String) -> String {
        match self.routing.default_routing() {
            Some(routing) => format!("{target}?routing={routing}"),
            None => target,
        }
    }

    fn makes_visible(&self) -> bool {
        self.refresh_policy.is_some_and(RefreshPolicy::makes_visible)
    }

    fn store(
        &self,
        state: &mut EngineState,
        index: &str,
        id: Option<String>,
        source: Value,
        routing: Option<String>,
        external_version: Option<(i64, VersionType)>,
    ) -> Result<(String, i64)> {
        let target = state.write_index(index)?;
        let id = match id {
            Some(id) => id,
            None => state.next_id("doc"),
        };
        if !state.indices.contains_key(&target) {
            state.create_index(&target, &Settings::new(), None);
        }

        let visible = self.makes_visible();
        let index_state = state.indices.entry(target).or_default();
        let current = index_state.documents.get(&id).map(|d| d.version);

        let version = match (external_version, current) {
            (Some((version, VersionType::External)), Some(current)) if version <= current => {
                return Err(version_conflict(&id, current, version));
            }
            (Some((version, VersionType::ExternalGte)), Some(current)) if version < current => {
                return Err(version_conflict(&id, current, version));
            }
            (Some((version, VersionType::External | VersionType::ExternalGte)), _) => version,
            (_, current) => current.map_or(1, |v| v + 1),
        };

        index_state.documents.insert(
            id.clone(),
            StoredDocument {
                source,
                version,
                routing,
            },
        );
        if visible {
            index_state.refresh();
        }
        Ok((id, version))
    }

    fn entity_source<T: Entity>(
        &self,
        entity: &T,
        info: &EntityInformation<T>,
    ) -> Result<(Option<String>, Value, Option<String>, Option<(i64, VersionType)>)> {
        let id = info.id(entity).map(|id| self.convert_id(&id));
        let source = serde_json::to_value(entity)?;
        let routing = self.entity_routing(entity);
        let external = match (info.version(entity), info.version_type()) {
            (Some(version), Some(version_type)) if version_type != VersionType::Internal => {
                Some((version, version_type))
            }
            _ => None,
        };
        Ok((id, source, routing, external))
    }

    fn matching_hits(state: &EngineState, query: &Query, index: &IndexCoordinates) -> Result<Vec<Hit>> {
        let names = match query.point_in_time() {
            Some(pit) => state
                .point_in_times
                .get(&pit.id)
                .cloned()
                .ok_or_else(|| ElasticsearchError::Query(format!("unknown point in time [{}]", pit.id)))?,
            None => state.resolve_existing(index)?,
        };

        let mut hits = Vec::new();
        for name in &names {
            let Some(index_state) = state.indices.get(name) else {
                continue;
            };
            for (id, document) in &index_state.searchable {
                if let Some(score) = evaluate(state, query.criteria(), id, &document.source)? {
                    hits.push(Hit {
                        index: name.clone(),
                        id: id.clone(),
                        score,
                        document: document.clone(),
                    });
                }
            }
        }

        let sort = query.effective_sort();
        sort_hits(&mut hits, &sort);

        if let Some(after) = query.search_after() {
            hits.retain(|hit| compare_rows(&sort, &sort_values(hit, &sort), after) == Ordering::Greater);
        }
        Ok(hits)
    }

    fn search_body(&self, query: &Query, index: &IndexCoordinates) -> Result<Value> {
        let state = self.state.lock();
        let hits = Self::matching_hits(&state, query, index)?;

        let from = match query.max_results() {
            Some(_) => 0,
            None => query.from().unwrap_or(0),
        };
        let size = query.size().unwrap_or(DEFAULT_PAGE_SIZE);
        let sort = query.effective_sort();
        let max_score = hits.iter().map(|h| h.score).reduce(f64::max);

        let page: Vec<Value> = hits
            .iter()
            .skip(from)
            .take(size)
            .map(|hit| hit_json(hit, &sort))
            .collect();

        let mut body = hits_body(hits.len(), max_score, page);
        if !query.aggregations().is_empty() {
            body["aggregations"] = aggregate(&hits, query.aggregations());
        }
        if let Some(pit) = query.point_in_time() {
            body["pit_id"] = json!(pit.id);
        }
        Ok(body)
    }
}

fn version_conflict(id: &str, current: i64, provided: i64) -> ElasticsearchError {
    ElasticsearchError::Engine {
        status: 409,
        reason: format!(
            "[{id}]: version conflict, current version [{current}] is higher or equal to the one provided [{provided}]"
        ),
    }
}

#[async_trait]
impl DocumentOperations for InMemoryOperations {
    async fn save<T: Entity>(&self, mut entity: T, index: &IndexCoordinates) -> Result<T> {
        self.record("save", index);
        let info = EntityInformation::<T>::new();
        let (id, source, routing, external) = self.entity_source(&entity, &info)?;

        let (id, version) = {
            let mut state = self.state.lock();
            self.store(&mut state, index.index_name(), id, source, routing, external)?
        };

        info.hydrate(&mut entity, &id, Some(version));
        Ok(entity)
    }

    async fn save_all<T: Entity>(
        &self,
        mut entities: Vec<T>,
        index: &IndexCoordinates,
    ) -> Result<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        self.record("save_all", index);

        let info = EntityInformation::<T>::new();
        let mut errors = Vec::new();
        {
            let mut state = self.state.lock();
            for entity in &mut entities {
                let (id, source, routing, external) = self.entity_source(entity, &info)?;
                match self.store(&mut state, index.index_name(), id, source, routing, external) {
                    Ok((id, version)) => info.hydrate(entity, &id, Some(version)),
                    Err(e) => errors.push(e.to_string()),
                }
            }
        }

        if errors.is_empty() {
            Ok(entities)
        } else {
            Err(ElasticsearchError::BulkError {
                succeeded: entities.len() - errors.len(),
                failed: errors.len(),
                errors,
            })
        }
    }

    async fn get<T: Entity>(&self, id: &str, index: &IndexCoordinates) -> Result<Option<T>> {
        self.record("get", self.routed(format!("{index}/{id}")));

        let Some((_, document)) = self.state.lock().document(index, id).map(|(i, d)| (i, d.clone()))
        else {
            return Ok(None);
        };

        let mut entity: T = serde_json::from_value(document.source)?;
        EntityInformation::<T>::new().hydrate(&mut entity, id, Some(document.version));
        Ok(Some(entity))
    }

    async fn multi_get<T: Entity>(
        &self,
        ids: &[String],
        index: &IndexCoordinates,
    ) -> Result<Vec<MultiGetItem<T>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.record("multi_get", self.routed(index.to_string()));

        let info = EntityInformation::<T>::new();
        let state = self.state.lock();
        ids.iter()
            .map(|id| -> Result<MultiGetItem<T>> {
                let found = state.document(index, id);
                let item_index = found
                    .as_ref()
                    .map_or_else(|| index.index_name().to_string(), |(i, _)| i.clone());
                let item = match found {
                    Some((_, document)) => {
                        let mut entity: T = serde_json::from_value(document.source.clone())?;
                        info.hydrate(&mut entity, id, Some(document.version));
                        Some(entity)
                    }
                    None => None,
                };
                Ok(MultiGetItem {
                    id: id.clone(),
                    index: item_index,
                    item,
                    failure: None,
                })
            })
            .collect()
    }

    async fn exists(&self, id: &str, index: &IndexCoordinates) -> Result<bool> {
        self.record("exists", self.routed(format!("{index}/{id}")));
        Ok(self.state.lock().document(index, id).is_some())
    }

    async fn delete(&self, id: &str, index: &IndexCoordinates) -> Result<String> {
        self.record("delete", self.routed(format!("{index}/{id}")));

        let visible = self.makes_visible();
        let mut state = self.state.lock();
        for name in state.resolve(index.index_name()) {
            if let Some(index_state) = state.indices.get_mut(&name) {
                index_state.documents.remove(id);
                if visible {
                    index_state.refresh();
                }
            }
        }
        Ok(id.to_string())
    }

    async fn delete_by_query(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<ByQueryResponse> {
        self.record("delete_by_query", index);

        let visible = self.makes_visible();
        let mut state = self.state.lock();
        let matched: Vec<(String, String)> = Self::matching_hits(&state, query, index)?
            .into_iter()
            .map(|hit| (hit.index, hit.id))
            .collect();

        let mut deleted = 0;
        for (name, id) in &matched {
            if let Some(index_state) = state.indices.get_mut(name) {
                if index_state.documents.remove(id).is_some() {
                    deleted += 1;
                }
            }
        }
        if visible {
            for name in state.resolve_existing(index)? {
                if let Some(index_state) = state.indices.get_mut(&name) {
                    index_state.refresh();
                }
            }
        }

        Ok(ByQueryResponse {
            deleted,
            ..ByQueryResponse::default()
        })
    }

    async fn update(
        &self,
        id: &str,
        document: Value,
        index: &IndexCoordinates,
    ) -> Result<UpdateResult> {
        self.record("update", self.routed(format!("{index}/{id}")));

        let visible = self.makes_visible();
        let mut state = self.state.lock();
        let (name, current) = state
            .document(index, id)
            .map(|(name, d)| (name, d.clone()))
            .ok_or_else(|| ElasticsearchError::DocumentNotFound {
                index: index.index_name().to_string(),
                id: id.to_string(),
            })?;

        let mut merged = current.source.clone();
        if let (Value::Object(target), Value::Object(patch)) = (&mut merged, &document) {
            merge_mapping(target, patch);
        }

        if merged == current.source {
            return Ok(UpdateResult {
                id: id.to_string(),
                index: name,
                outcome: UpdateOutcome::Noop,
                version: Some(current.version),
            });
        }

        let version = current.version + 1;
        if let Some(index_state) = state.indices.get_mut(&name) {
            index_state.documents.insert(
                id.to_string(),
                StoredDocument {
                    source: merged,
                    version,
                    routing: current.routing,
                },
            );
            if visible {
                index_state.refresh();
            }
        }

        Ok(UpdateResult {
            id: id.to_string(),
            index: name,
            outcome: UpdateOutcome::Updated,
            version: Some(version),
        })
    }
}

#[async_trait]
impl SearchOperations for InMemoryOperations {
    async fn count(&self, query: &Query, index: &IndexCoordinates) -> Result<u64> {
        self.record("count", index);
        let state = self.state.lock();
        Ok(Self::matching_hits(&state, query, index)?.len() as u64)
    }

    async fn search<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHits<T>> {
        self.record("search", index);
        let body = self.search_body(query, index)?;
        Ok(SearchHits::from_response(&body)?.hydrate(&EntityInformation::<T>::new()))
    }

    async fn multi_search_with_indexes<T: Entity>(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<T>>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.record("multi_search", requests.len());

        let info = EntityInformation::<T>::new();
        requests
            .iter()
            .map(|(query, index)| -> Result<SearchHits<T>> {
                let body = self.search_body(query, index)?;
                Ok(SearchHits::from_response(&body)?.hydrate(&info))
            })
            .collect()
    }

    async fn multi_search_documents(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<Value>>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        self.record("multi_search", requests.len());

        requests
            .iter()
            .map(|(query, index)| -> Result<SearchHits<Value>> {
                SearchHits::from_response(&self.search_body(query, index)?)
            })
            .collect()
    }

    async fn search_for_stream<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHitsIterator<T>> {
        self.record("search_for_stream", index);

        let batch_size = query.size().unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let (scroll_id, body) = {
            let mut state = self.state.lock();
            let hits = Self::matching_hits(&state, query, index)?;
            let sort = query.effective_sort();
            let total = hits.len();
            let mut remaining: VecDeque<Value> = hits.iter().map(|h| hit_json(h, &sort)).collect();
            let first: Vec<Value> = remaining.drain(..batch_size.min(remaining.len())).collect();

            let scroll_id = state.next_id("scroll");
            state.scrolls.insert(
                scroll_id.clone(),
                ScrollState {
                    remaining,
                    batch_size,
                    total,
                },
            );

            let mut body = hits_body(total, None, first);
            body["_scroll_id"] = json!(scroll_id);
            (scroll_id, body)
        };

        let info = EntityInformation::<T>::new();
        let first = match SearchHits::from_response(&body) {
            Ok(hits) => hits.hydrate(&info),
            Err(e) => {
                self.state.lock().scrolls.remove(&scroll_id);
                record(&self.calls, "clear_scroll", &scroll_id);
                return Err(e);
            }
        };
        let cursor = InMemoryScrollCursor {
            state: self.state.clone(),
            calls: self.calls.clone(),
            scroll_id: Some(scroll_id),
            info,
        };

        Ok(SearchHitsIterator::new(first, Box::new(cursor), query.max_results()))
    }

    async fn open_point_in_time(
        &self,
        index: &IndexCoordinates,
        keep_alive: Duration,
        ignore_unavailable: bool,
    ) -> Result<String> {
        self.record("open_point_in_time", index);
        debug!(?keep_alive, "opening in-memory point in time");

        let mut state = self.state.lock();
        let names = if ignore_unavailable {
            index.names().iter().flat_map(|name| state.resolve(name)).collect()
        } else {
            state.resolve_existing(index)?
        };

        let id = state.next_id("pit");
        state.point_in_times.insert(id.clone(), names);
        Ok(id)
    }

    async fn close_point_in_time(&self, id: &str) -> Result<bool> {
        self.record("close_point_in_time", id);
        Ok(self.state.lock().point_in_times.remove(id).is_some())
    }
}

struct InMemoryScrollCursor<T: Entity> {
    state: Arc<Mutex<EngineState>>,
    calls: Arc<Mutex<Vec<String>>>,
    scroll_id: Option<String>,
    info: EntityInformation<T>,
}

#[async_trait]
impl<T: Entity> ScrollCursor<T> for InMemoryScrollCursor<T> {
    async fn next_batch(&mut self) -> Result<SearchHits<T>> {
        let Some(scroll_id) = self.scroll_id.clone() else {
            return Ok(SearchHits::empty());
        };
        record(&self.calls, "scroll", &scroll_id);

        let body = {
            let mut state = self.state.lock();
            let scroll = state
                .scrolls
                .get_mut(&scroll_id)
                .ok_or_else(|| ElasticsearchError::Query(format!("no scroll context [{scroll_id}]")))?;
            let batch: Vec<Value> = scroll
                .remaining
                .drain(..scroll.batch_size.min(scroll.remaining.len()))
                .collect();
            let mut body = hits_body(scroll.total, None, batch);
            body["_scroll_id"] = json!(scroll_id);
            body
        };

        Ok(SearchHits::from_response(&body)?.hydrate(&self.info))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(scroll_id) = self.scroll_id.take() {
            record(&self.calls, "clear_scroll", &scroll_id);
            self.state.lock().scrolls.remove(&scroll_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ScriptOperations for InMemoryOperations {
    async fn put_script(&self, script: &Script) -> Result<()> {
        self.record("put_script", &script.id);
        self.state
            .lock()
            .scripts
            .insert(script.id.clone(), script.clone());
        Ok(())
    }

    async fn get_script(&self, id: &str) -> Result<Option<Script>> {
        self.record("get_script", id);
        Ok(self.state.lock().scripts.get(id).cloned())
    }

    async fn delete_script(&self, id: &str) -> Result<bool> {
        self.record("delete_script", id);
        Ok(self.state.lock().scripts.remove(id).is_some())
    }
}

#[async_trait]
impl ClusterOperations for InMemoryOperations {
    async fn health(&self) -> Result<ClusterHealth> {
        self.record("health", "cluster");
        let indices = self.state.lock().indices.len() as u32;
        Ok(ClusterHealth {
            cluster_name: "in-memory".to_string(),
            status: "green".to_string(),
            number_of_nodes: 1,
            number_of_data_nodes: 1,
            active_primary_shards: indices,
            active_shards: indices,
            ..ClusterHealth::default()
        })
    }
}

impl ElasticsearchOperations for InMemoryOperations {
    type IndexOps = InMemoryIndexOperations;
    type ClusterOps = InMemoryOperations;

    fn index_ops_with_schema(
        &self,
        index: IndexCoordinates,
        schema: Option<IndexSchema>,
    ) -> Self::IndexOps {
        InMemoryIndexOperations {
            engine: self.clone(),
            index,
            schema,
        }
    }

    fn cluster(&self) -> Self::ClusterOps {
        self.clone()
    }

    fn refresh_policy(&self) -> Option<RefreshPolicy> {
        self.refresh_policy
    }

    fn index_prefix(&self) -> Option<&str> {
        self.index_prefix.as_deref()
    }

    fn routing_resolver(&self) -> &Arc<dyn RoutingResolver> {
        &self.routing
    }

    fn with_routing(&self, resolver: Arc<dyn RoutingResolver>) -> Self {
        Self {
            routing: resolver,
            ..self.clone()
        }
    }
}

// =============================================================================
// Index operations
// =============================================================================

/// In-memory index operations bound to one set of coordinates.
#[derive(Clone, Debug)]
pub struct InMemoryIndexOperations {
    engine: InMemoryOperations,
    index: IndexCoordinates,
    schema: Option<IndexSchema>,
}

impl InMemoryIndexOperations {
    fn create_index(&self, settings: &Settings, mapping: Option<&Mapping>) -> Result<bool> {
        let name = self.index.index_name();
        self.engine.record("create_index", name);

        let mut state = self.engine.state.lock();
        if !state.resolve(name).is_empty() {
            return Err(ElasticsearchError::IndexExists(name.to_string()));
        }
        state.create_index(name, settings, mapping);
        Ok(true)
    }

    fn aliases_where<F>(&self, keep_index: F, alias_names: &[&str]) -> BTreeMap<String, Vec<AliasData>>
    where
        F: Fn(&str) -> bool,
    {
        let state = self.engine.state.lock();
        state
            .indices
            .iter()
            .filter(|(name, _)| keep_index(name.as_str()))
            .filter_map(|(name, index_state)| {
                let aliases: Vec<AliasData> = index_state
                    .aliases
                    .iter()
                    .filter(|a| alias_names.is_empty() || alias_names.contains(&a.alias.as_str()))
                    .cloned()
                    .collect();
                (alias_names.is_empty() || !aliases.is_empty()).then(|| (name.clone(), aliases))
            })
            .collect()
    }
}

#[async_trait]
impl IndexOperations for InMemoryIndexOperations {
    fn index_coordinates(&self) -> &IndexCoordinates {
        &self.index
    }

    fn schema(&self) -> Option<&IndexSchema> {
        self.schema.as_ref()
    }

    async fn create(&self) -> Result<bool> {
        self.create_index(&Settings::new(), None)
    }

    async fn create_with_settings(&self, settings: &Settings) -> Result<bool> {
        self.create_index(settings, None)
    }

    async fn create_with_settings_and_mapping(
        &self,
        settings: &Settings,
        mapping: &Mapping,
    ) -> Result<bool> {
        self.create_index(settings, Some(mapping))
    }

    async fn delete(&self) -> Result<bool> {
        self.engine.record("delete_index", &self.index);

        let mut state = self.engine.state.lock();
        let names = state.resolve_existing(&self.index)?;
        for name in names {
            state.indices.remove(&name);
        }
        Ok(true)
    }

    async fn exists(&self) -> Result<bool> {
        self.engine.record("index_exists", &self.index);
        let state = self.engine.state.lock();
        Ok(self
            .index
            .names()
            .iter()
            .all(|name| !state.resolve(name).is_empty()))
    }

    async fn refresh(&self) -> Result<()> {
        self.engine.record("refresh", &self.index);

        let mut state = self.engine.state.lock();
        for name in state.resolve_existing(&self.index)? {
            if let Some(index_state) = state.indices.get_mut(&name) {
                index_state.refresh();
            }
        }
        Ok(())
    }

    async fn put_mapping(&self, mapping: &Mapping) -> Result<bool> {
        self.engine.record("put_mapping", &self.index);

        let mut state = self.engine.state.lock();
        let Value::Object(mapping) = mapping.to_json() else {
            return Ok(false);
        };
        for name in state.resolve_existing(&self.index)? {
            if let Some(index_state) = state.indices.get_mut(&name) {
                merge_mapping(&mut index_state.mapping, &mapping);
            }
        }
        Ok(true)
    }

    async fn get_mapping(&self) -> Result<Map<String, Value>> {
        self.engine.record("get_mapping", &self.index);

        let state = self.engine.state.lock();
        let names = state.resolve_existing(&self.index)?;
        Ok(names
            .first()
            .and_then(|name| state.indices.get(name))
            .map(|index_state| index_state.mapping.clone())
            .unwrap_or_default())
    }

    async fn get_settings(&self, include_defaults: bool) -> Result<Settings> {
        self.engine.record("get_settings", &self.index);

        let state = self.engine.state.lock();
        let names = state.resolve_existing(&self.index)?;
        let settings = names
            .first()
            .and_then(|name| state.indices.get(name))
            .map(|index_state| index_state.settings.clone())
            .unwrap_or_default();

        if include_defaults {
            let defaults = Settings::new()
                .shards(1)
                .replicas(1)
                .refresh_interval("1s");
            return Ok(defaults.merge(&settings));
        }
        Ok(settings)
    }

    async fn alias(&self, actions: &AliasActions) -> Result<bool> {
        if actions.is_empty() {
            return Err(ElasticsearchError::invalid("alias actions must not be empty"));
        }
        self.engine.record("alias", &self.index);

        let mut state = self.engine.state.lock();
        for action in &actions.actions {
            match action {
                AliasAction::Add(parameters) => {
                    for index in &parameters.indices {
                        let index_state = state
                            .indices
                            .get_mut(index)
                            .ok_or_else(|| ElasticsearchError::IndexNotFound(index.clone()))?;
                        for alias in &parameters.aliases {
                            index_state.aliases.retain(|a| &a.alias != alias);
                            index_state.aliases.push(AliasData {
                                alias: alias.clone(),
                                filter: parameters.filter.clone(),
                                index_routing: parameters
                                    .index_routing
                                    .clone()
                                    .or_else(|| parameters.routing.clone()),
                                search_routing: parameters
                                    .search_routing
                                    .clone()
                                    .or_else(|| parameters.routing.clone()),
                                is_write_index: parameters.is_write_index,
                                is_hidden: parameters.is_hidden,
                            });
                        }
                    }
                }
                AliasAction::Remove(parameters) => {
                    for index in &parameters.indices {
                        if let Some(index_state) = state.indices.get_mut(index) {
                            index_state
                                .aliases
                                .retain(|a| !parameters.aliases.contains(&a.alias));
                        }
                    }
                }
                AliasAction::RemoveIndex(parameters) => {
                    for index in &parameters.indices {
                        state.indices.remove(index);
                    }
                }
            }
        }
        Ok(true)
    }

    async fn get_aliases(&self, alias_names: &[&str]) -> Result<BTreeMap<String, Vec<AliasData>>> {
        self.engine.record("get_aliases", alias_names.join(","));
        Ok(self.aliases_where(|_| true, alias_names))
    }

    async fn get_aliases_for_index(
        &self,
        index_names: &[&str],
    ) -> Result<BTreeMap<String, Vec<AliasData>>> {
        self.engine.record("get_aliases", index_names.join(","));

        let wanted: Vec<String> = {
            let state = self.engine.state.lock();
            index_names.iter().flat_map(|name| state.resolve(name)).collect()
        };
        Ok(self.aliases_where(
            |name| index_names.is_empty() || wanted.iter().any(|w| w == name),
            &[],
        ))
    }

    async fn put_template(&self, request: &PutTemplateRequest) -> Result<bool> {
        self.engine.record("put_template", &request.name);
        self.engine
            .state
            .lock()
            .templates
            .insert(request.name.clone(), request.to_json());
        Ok(true)
    }

    async fn get_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        self.engine.record("get_template", name);
        let state = self.engine.state.lock();
        Ok(state
            .templates
            .get(name)
            .and_then(|stored| TemplateResponse::from_legacy(name, &json!({ name: stored }))))
    }

    async fn exists_template(&self, name: &str) -> Result<bool> {
        self.engine.record("exists_template", name);
        Ok(self.engine.state.lock().templates.contains_key(name))
    }

    async fn delete_template(&self, name: &str) -> Result<bool> {
        self.engine.record("delete_template", name);
        Ok(self.engine.state.lock().templates.remove(name).is_some())
    }

    async fn put_index_template(&self, request: &PutIndexTemplateRequest) -> Result<bool> {
        self.engine.record("put_index_template", &request.name);
        self.engine
            .state
            .lock()
            .index_templates
            .insert(request.name.clone(), request.to_json());
        Ok(true)
    }

    async fn exists_index_template(&self, name: &str) -> Result<bool> {
        self.engine.record("exists_index_template", name);
        Ok(self.engine.state.lock().index_templates.contains_key(name))
    }

    async fn get_index_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        self.engine.record("get_index_template", name);
        let state = self.engine.state.lock();
        Ok(state.index_templates.get(name).and_then(|stored| {
            TemplateResponse::from_index_template(
                name,
                &json!({ "index_templates": [{ "name": name, "index_template": stored }] }),
            )
        }))
    }

    async fn delete_index_template(&self, name: &str) -> Result<bool> {
        self.engine.record("delete_index_template", name);
        Ok(self.engine.state.lock().index_templates.remove(name).is_some())
    }

    async fn put_component_template(&self, request: &PutComponentTemplateRequest) -> Result<bool> {
        self.engine.record("put_component_template", &request.name);
        self.engine
            .state
            .lock()
            .component_templates
            .insert(request.name.clone(), request.to_json());
        Ok(true)
    }

    async fn exists_component_template(&self, name: &str) -> Result<bool> {
        self.engine.record("exists_component_template", name);
        Ok(self.engine.state.lock().component_templates.contains_key(name))
    }

    async fn get_component_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        self.engine.record("get_component_template", name);
        let state = self.engine.state.lock();
        Ok(state.component_templates.get(name).and_then(|stored| {
            TemplateResponse::from_component_template(
                name,
                &json!({ "component_templates": [{ "name": name, "component_template": stored }] }),
            )
        }))
    }

    async fn delete_component_template(&self, name: &str) -> Result<bool> {
        self.engine.record("delete_component_template", name);
        Ok(self
            .engine
            .state
            .lock()
            .component_templates
            .remove(name)
            .is_some())
    }

    async fn get_information(&self, index: &IndexCoordinates) -> Result<Vec<IndexInformation>> {
        self.engine.record("get_information", index);

        let state = self.engine.state.lock();
        Ok(state
            .resolve_existing(index)?
            .into_iter()
            .filter_map(|name| {
                let index_state = state.indices.get(&name)?;
                Some(IndexInformation {
                    settings: index_state.settings.clone(),
                    mapping: Some(Value::Object(index_state.mapping.clone())),
                    aliases: index_state.aliases.clone(),
                    name,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::RangeClause;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("books-*", "books-2024"));
        assert!(wildcard_match("b?oks", "books"));
        assert!(!wildcard_match("books-*", "films-2024"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn test_field_values_flatten_arrays() {
        let source = json!({"author": {"names": ["Frank", "Herbert"]}, "tags": ["a", "b"]});
        assert_eq!(field_values(&source, "author.names").len(), 2);
        assert_eq!(field_values(&source, "tags.keyword").len(), 2);
        assert!(field_values(&source, "missing").is_empty());
    }

    #[test]
    fn test_evaluate_clauses() {
        let state = EngineState::default();
        let source = json!({"title": "The Left Hand of Darkness", "year": 1969, "genre": "scifi"});
        let eval = |clause: QueryClause| evaluate(&state, &clause, "1", &source).unwrap();

        assert_eq!(eval(QueryClause::matching("title", "darkness hand")), Some(2.0));
        assert_eq!(eval(QueryClause::term("genre", "scifi")), Some(1.0));
        assert_eq!(eval(QueryClause::term("year", "1969")), Some(1.0));
        assert!(eval(QueryClause::term("genre", "crime")).is_none());
        assert!(eval(RangeClause::new("year").gte(1960).lt(1970).build()).is_some());
        assert!(eval(RangeClause::new("year").gt(1969).build()).is_none());
        assert!(eval(QueryClause::ids(["1"])).is_some());

        let bool_clause = BoolClause::new()
            .must(QueryClause::term("genre", "scifi"))
            .must_not(QueryClause::matching("title", "dune"))
            .build();
        assert!(eval(bool_clause).is_some());

        assert!(evaluate(&state, &QueryClause::Raw(json!({})), "1", &source).is_err());
    }

    #[test]
    fn test_sort_rows_put_missing_last() {
        let sort = Sort::by(crate::paging::Order::desc("year"));
        let rows = [vec![json!(1990)], vec![Value::Null], vec![json!(2001)]];
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| compare_rows(&sort, a, b));
        assert_eq!(sorted, vec![vec![json!(2001)], vec![json!(1990)], vec![Value::Null]]);
    }
}
