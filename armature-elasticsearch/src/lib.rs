//! Elasticsearch object mapping and repositories for the Armature framework.
//!
//! This crate maps serde types to engine documents and provides:
//! - Entity metadata: index, id, version, routing and schema per type
//! - Document, search, script and cluster operations behind traits
//! - Index lifecycle, alias and template management
//! - Typed search results, paging and scroll streams
//! - Generic repositories with CRUD and similarity search
//! - An in-memory engine for tests (`mock` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use armature_elasticsearch::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Article {
//!     id: Option<String>,
//!     title: String,
//! }
//!
//! impl Entity for Article {
//!     type Id = String;
//!
//!     fn metadata() -> EntityMetadata<Self> {
//!         EntityMetadata::new("articles", "id", |a: &Article| a.id.clone())
//!             .with_id_setter(|a, id| a.id = Some(id))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let config = ElasticsearchConfig::new("http://localhost:9200")
//!         .with_refresh_policy(RefreshPolicy::Immediate);
//!     let template = ElasticsearchTemplate::new(config)?;
//!
//!     let articles = SimpleElasticsearchRepository::<Article, _>::new(template).await?;
//!     let saved = articles
//!         .save(Article { id: None, title: "Hello search".to_string() })
//!         .await?;
//!
//!     let page = articles.find_all_page(&Pageable::of(0, 20)?).await?;
//!     println!("{} of {} articles, first id {:?}", page.number_of_elements(), page.total_elements, saved.id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod aggregation;
mod bulk;
mod client;
mod config;
mod coordinates;
mod criteria;
mod entity;
mod error;
mod hits;
mod index;
mod index_ops;
pub mod logging;
mod mapping;
mod operations;
mod paging;
mod query;
mod repository;
mod routing;
mod stream;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use aggregation::{Aggregation, AggregationResult, Aggregations, Metric, RangeBucket};
pub use client::ElasticsearchTemplate;
pub use config::{ElasticsearchConfig, TlsConfig};
pub use coordinates::IndexCoordinates;
pub use criteria::{BoolClause, MoreLikeThisClause, QueryClause, RangeClause};
pub use entity::{Entity, EntityId, EntityInformation, EntityMetadata, VersionType};
pub use error::{ElasticsearchError, Result};
pub use hits::{SearchHit, SearchHits, SearchPage, TotalHitsRelation, search_page_for};
pub use index::{
    AliasAction, AliasActionParameters, AliasActions, AliasData, IndexInformation,
    IndexOperations, IndexSchema, PutComponentTemplateRequest, PutIndexTemplateRequest,
    PutTemplateRequest, TemplateData, TemplateResponse, get_bound_information, put_entity_mapping,
};
pub use index_ops::{DefaultClusterOperations, DefaultIndexOperations};
pub use logging::LogFormat;
pub use mapping::{FieldType, Mapping, MappingField, Settings};
pub use operations::{
    ByQueryResponse, ClusterHealth, ClusterOperations, DocumentOperations,
    ElasticsearchOperations, MultiGetItem, RefreshPolicy, Script, ScriptOperations,
    SearchOperations, UpdateOutcome, UpdateResult, ids_query, match_all_query,
    open_point_in_time_default, search_one,
};
pub use paging::{Direction, Order, Page, Pageable, Sort};
pub use query::{MoreLikeThisQuery, PointInTime, Query};
pub use repository::{ElasticsearchRepository, SimpleElasticsearchRepository};
pub use routing::{DefaultRoutingResolver, FixedRoutingResolver, RoutingResolver};
pub use stream::{ScrollCursor, SearchHitsIterator};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        DocumentOperations, ElasticsearchConfig, ElasticsearchError, ElasticsearchOperations,
        ElasticsearchRepository, ElasticsearchTemplate, Entity, EntityMetadata, IndexCoordinates,
        IndexOperations, Order, Page, Pageable, Query, QueryClause, RefreshPolicy, Result,
        SearchOperations, SimpleElasticsearchRepository, Sort,
    };
}
