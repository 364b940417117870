//! Operation traits.
//!
//! The engine is reached through a small set of capability traits:
//! [`DocumentOperations`], [`SearchOperations`] and [`ScriptOperations`],
//! aggregated by [`ElasticsearchOperations`], which also hands out
//! [`IndexOperations`] and [`ClusterOperations`] values. Behavior shared by
//! every implementation lives in the free functions at the end of this
//! module.

use crate::coordinates::IndexCoordinates;
use crate::entity::{Entity, EntityId, EntityInformation};
use crate::error::{ElasticsearchError, Result};
use crate::hits::{SearchHit, SearchHits};
use crate::index::{IndexOperations, IndexSchema};
use crate::query::{MoreLikeThisQuery, Query};
use crate::routing::RoutingResolver;
use crate::stream::SearchHitsIterator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Refresh policy
// =============================================================================

/// Refresh behavior requested with every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Refresh the affected shards right away (`refresh=true`).
    #[serde(alias = "true")]
    Immediate,
    /// Wait for the next scheduled refresh (`refresh=wait_for`).
    #[serde(alias = "wait_for")]
    WaitUntil,
    /// Do not refresh (`refresh=false`).
    #[serde(alias = "false")]
    None,
}

impl RefreshPolicy {
    /// Value of the `refresh` request parameter.
    pub fn to_param(self) -> opensearch::params::Refresh {
        match self {
            RefreshPolicy::Immediate => opensearch::params::Refresh::True,
            RefreshPolicy::WaitUntil => opensearch::params::Refresh::WaitFor,
            RefreshPolicy::None => opensearch::params::Refresh::False,
        }
    }

    /// Whether writes under this policy are searchable when they return.
    pub fn makes_visible(self) -> bool {
        !matches!(self, RefreshPolicy::None)
    }
}

impl FromStr for RefreshPolicy {
    type Err = ElasticsearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "immediate" | "true" => Ok(RefreshPolicy::Immediate),
            "wait_until" | "wait_for" => Ok(RefreshPolicy::WaitUntil),
            "none" | "false" => Ok(RefreshPolicy::None),
            other => Err(ElasticsearchError::Configuration(format!(
                "Unknown refresh policy: {other}"
            ))),
        }
    }
}

// =============================================================================
// Result types
// =============================================================================

/// One entry of a multi-get response.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetItem<T> {
    /// Requested id.
    pub id: String,
    /// Index the lookup ran against.
    pub index: String,
    /// The document, `None` when absent.
    pub item: Option<T>,
    /// Failure reason for this id.
    pub failure: Option<String>,
}

/// Outcome of a delete-by-query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByQueryResponse {
    /// Number of deleted documents.
    pub deleted: u64,
    /// Time taken in milliseconds.
    pub took_ms: u64,
    /// Whether the request timed out.
    pub timed_out: bool,
    /// Failure reasons.
    pub failures: Vec<String>,
}

impl ByQueryResponse {
    pub(crate) fn from_response(body: &Value) -> Self {
        let failures = body["failures"]
            .as_array()
            .map(|failures| {
                failures
                    .iter()
                    .map(|f| {
                        f["cause"]["reason"]
                            .as_str()
                            .unwrap_or("Unknown error")
                            .to_string()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            deleted: body["deleted"].as_u64().unwrap_or(0),
            took_ms: body["took"].as_u64().unwrap_or(0),
            timed_out: body["timed_out"].as_bool().unwrap_or(false),
            failures,
        }
    }
}

/// Result of a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The document changed.
    Updated,
    /// The update changed nothing.
    Noop,
    /// The document did not exist and was created.
    Created,
}

/// Partial update response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    /// Document id.
    pub id: String,
    /// Index.
    pub index: String,
    /// Outcome.
    pub outcome: UpdateOutcome,
    /// New version.
    pub version: Option<i64>,
}

/// A stored script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Script id.
    pub id: String,
    /// Script language, usually `painless`.
    pub language: String,
    /// Script source.
    pub source: String,
}

impl Script {
    /// A painless script.
    pub fn painless(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: "painless".to_string(),
            source: source.into(),
        }
    }
}

/// Cluster health summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// `green`, `yellow` or `red`.
    pub status: String,
    /// Whether the health request timed out.
    #[serde(default)]
    pub timed_out: bool,
    /// Number of nodes.
    #[serde(default)]
    pub number_of_nodes: u32,
    /// Number of data nodes.
    #[serde(default)]
    pub number_of_data_nodes: u32,
    /// Active primary shards.
    #[serde(default)]
    pub active_primary_shards: u32,
    /// Active shards.
    #[serde(default)]
    pub active_shards: u32,
    /// Relocating shards.
    #[serde(default)]
    pub relocating_shards: u32,
    /// Unassigned shards.
    #[serde(default)]
    pub unassigned_shards: u32,
}

// =============================================================================
// Capability traits
// =============================================================================

/// Single-document and bulk document operations.
#[async_trait]
pub trait DocumentOperations: Send + Sync {
    /// Index `entity`. Returns it with a generated id and new version
    /// written back.
    async fn save<T: Entity>(&self, entity: T, index: &IndexCoordinates) -> Result<T>;

    /// Index all entities in one bulk request.
    async fn save_all<T: Entity>(
        &self,
        entities: Vec<T>,
        index: &IndexCoordinates,
    ) -> Result<Vec<T>>;

    /// Real-time lookup by id. `None` when absent.
    async fn get<T: Entity>(&self, id: &str, index: &IndexCoordinates) -> Result<Option<T>>;

    /// Real-time lookup of several ids, one entry per id in request order.
    async fn multi_get<T: Entity>(
        &self,
        ids: &[String],
        index: &IndexCoordinates,
    ) -> Result<Vec<MultiGetItem<T>>>;

    /// Whether a document with `id` exists.
    async fn exists(&self, id: &str, index: &IndexCoordinates) -> Result<bool>;

    /// Delete by id. Returns the id; deleting an absent id is not an error.
    async fn delete(&self, id: &str, index: &IndexCoordinates) -> Result<String>;

    /// Delete every document matching `query`.
    async fn delete_by_query(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<ByQueryResponse>;

    /// Merge `document` into the stored document with `id`.
    async fn update(
        &self,
        id: &str,
        document: Value,
        index: &IndexCoordinates,
    ) -> Result<UpdateResult>;
}

/// Query execution.
#[async_trait]
pub trait SearchOperations: Send + Sync {
    /// Number of documents matching `query`.
    async fn count(&self, query: &Query, index: &IndexCoordinates) -> Result<u64>;

    /// Execute `query`.
    async fn search<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHits<T>>;

    /// Execute several queries, each against its own index, in one round-trip.
    async fn multi_search_with_indexes<T: Entity>(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<T>>>;

    /// Like [`multi_search_with_indexes`](Self::multi_search_with_indexes)
    /// for requests over different entity types. Hits keep their raw
    /// `_source`.
    async fn multi_search_documents(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<Value>>>;

    /// Execute `query` as a scroll and iterate the hits lazily.
    async fn search_for_stream<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHitsIterator<T>>;

    /// Open a point-in-time on `index`, returning its id.
    async fn open_point_in_time(
        &self,
        index: &IndexCoordinates,
        keep_alive: Duration,
        ignore_unavailable: bool,
    ) -> Result<String>;

    /// Close a point-in-time. Returns whether the engine released it.
    async fn close_point_in_time(&self, id: &str) -> Result<bool>;

    /// Execute several queries against the same index.
    async fn multi_search<T: Entity>(
        &self,
        queries: &[Query],
        index: &IndexCoordinates,
    ) -> Result<Vec<SearchHits<T>>> {
        let requests: Vec<(Query, IndexCoordinates)> = queries
            .iter()
            .map(|q| (q.clone(), index.clone()))
            .collect();
        self.multi_search_with_indexes(&requests).await
    }

    /// Documents similar to the query's seed document.
    async fn search_more_like_this<T: Entity>(
        &self,
        query: &MoreLikeThisQuery,
        index: &IndexCoordinates,
    ) -> Result<SearchHits<T>> {
        let query = query.to_query(index)?;
        self.search(&query, index).await
    }
}

/// Stored script management.
#[async_trait]
pub trait ScriptOperations: Send + Sync {
    /// Store or replace a script.
    async fn put_script(&self, script: &Script) -> Result<()>;

    /// Fetch a script. `None` when absent.
    async fn get_script(&self, id: &str) -> Result<Option<Script>>;

    /// Delete a script. Returns whether it existed.
    async fn delete_script(&self, id: &str) -> Result<bool>;
}

/// Cluster-level operations.
#[async_trait]
pub trait ClusterOperations: Send + Sync {
    /// Cluster health.
    async fn health(&self) -> Result<ClusterHealth>;
}

/// Everything a repository needs from the engine.
pub trait ElasticsearchOperations:
    DocumentOperations + SearchOperations + ScriptOperations + Clone + 'static
{
    /// Index operations handed out by this implementation.
    type IndexOps: IndexOperations + 'static;
    /// Cluster operations handed out by this implementation.
    type ClusterOps: ClusterOperations;

    /// Index operations bound to `index` and optionally to an entity schema.
    fn index_ops_with_schema(
        &self,
        index: IndexCoordinates,
        schema: Option<IndexSchema>,
    ) -> Self::IndexOps;

    /// Cluster operations.
    fn cluster(&self) -> Self::ClusterOps;

    /// Configured refresh policy. `None` means writes are not refreshed by
    /// the engine and callers refresh explicitly.
    fn refresh_policy(&self) -> Option<RefreshPolicy>;

    /// Prefix prepended to entity index names.
    fn index_prefix(&self) -> Option<&str>;

    /// Routing resolver.
    fn routing_resolver(&self) -> &Arc<dyn RoutingResolver>;

    /// A copy of these operations using `resolver`.
    fn with_routing(&self, resolver: Arc<dyn RoutingResolver>) -> Self;

    /// Index operations bound to `index`.
    fn index_ops(&self, index: IndexCoordinates) -> Self::IndexOps {
        self.index_ops_with_schema(index, None)
    }

    /// Index operations bound to the index and schema of `T`.
    fn index_ops_for<T: Entity>(&self) -> Self::IndexOps {
        let info = EntityInformation::<T>::new();
        self.index_ops_with_schema(
            self.index_coordinates_for::<T>(),
            Some(IndexSchema::of(&info)),
        )
    }

    /// Index of `T` with the configured prefix applied.
    fn index_coordinates_for<T: Entity>(&self) -> IndexCoordinates {
        let info = EntityInformation::<T>::new();
        match self.index_prefix() {
            Some(prefix) => info.index_coordinates().with_prefix(prefix),
            None => info.index_coordinates().clone(),
        }
    }

    /// Routing for `entity`: its own routing first, then the resolver's.
    fn entity_routing<T: Entity>(&self, entity: &T) -> Option<String> {
        EntityInformation::<T>::new()
            .routing(entity)
            .or_else(|| self.routing_resolver().default_routing())
    }

    /// Engine string id of `id`.
    fn convert_id<I: EntityId>(&self, id: &I) -> String {
        id.to_id_string()
    }
}

// =============================================================================
// Free functions
// =============================================================================

/// Query matching every document.
pub fn match_all_query() -> Query {
    Query::find_all()
}

/// Query matching the given ids.
pub fn ids_query(ids: Vec<String>) -> Query {
    Query::ids(ids)
}

/// First hit of `query`, or `None`.
pub async fn search_one<T, O>(
    operations: &O,
    query: &Query,
    index: &IndexCoordinates,
) -> Result<Option<SearchHit<T>>>
where
    T: Entity,
    O: SearchOperations,
{
    let query = query.clone().with_max_results(1);
    let hits: SearchHits<T> = operations.search(&query, index).await?;
    Ok(hits.search_hits.into_iter().next())
}

/// Open a point-in-time failing on unavailable indices.
pub async fn open_point_in_time_default<O>(
    operations: &O,
    index: &IndexCoordinates,
    keep_alive: Duration,
) -> Result<String>
where
    O: SearchOperations,
{
    operations
        .open_point_in_time(index, keep_alive, false)
        .await
}
