//! Integration tests for armature-elasticsearch

use armature_elasticsearch::mock::InMemoryOperations;
use armature_elasticsearch::*;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: Option<String>,
    title: String,
    tags: Vec<String>,
    views: i64,
}

impl Article {
    fn new(id: &str, title: &str, tags: &[&str], views: i64) -> Self {
        Self {
            id: Some(id.to_string()),
            title: title.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            views,
        }
    }
}

impl Entity for Article {
    type Id = String;

    fn metadata() -> EntityMetadata<Self> {
        EntityMetadata::new("articles", "id", |a: &Article| a.id.clone())
            .with_id_setter(|a, id| a.id = Some(id))
            .with_settings(Settings::new().shards(1).replicas(0))
            .with_mapping(
                Mapping::new()
                    .field("title", MappingField::text())
                    .field("tags", MappingField::keyword())
                    .field("views", MappingField::long()),
            )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LedgerEntry {
    id: String,
    amount: i64,
    #[serde(skip)]
    version: Option<i64>,
}

impl Entity for LedgerEntry {
    type Id = String;

    fn metadata() -> EntityMetadata<Self> {
        EntityMetadata::new("ledger", "id", |e: &LedgerEntry| Some(e.id.clone()))
            .with_version(|e| e.version, |e, v| e.version = Some(v))
            .with_version_type(VersionType::External)
            .create_index(false)
    }
}

fn articles() -> Vec<Article> {
    vec![
        Article::new("1", "Rust ownership explained", &["rust", "memory"], 120),
        Article::new("2", "Async Rust in practice", &["rust", "async"], 300),
        Article::new("3", "Tuning search relevance", &["search"], 80),
        Article::new("4", "Index aliases for zero downtime", &["search", "ops"], 45),
    ]
}

async fn seeded() -> (
    InMemoryOperations,
    SimpleElasticsearchRepository<Article, InMemoryOperations>,
) {
    let operations = InMemoryOperations::new().with_refresh_policy(RefreshPolicy::Immediate);
    let repository = SimpleElasticsearchRepository::new(operations.clone())
        .await
        .unwrap();
    repository.save_all(articles()).await.unwrap();
    (operations, repository)
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_toml() {
    let config = ElasticsearchConfig::from_toml_str(
        r#"
        urls = ["http://search-1:9200", "http://search-2:9200"]
        username = "elastic"
        password = "changeme"
        request_timeout = 5
        refresh_policy = "wait_until"
        index_prefix = "staging-"
        log_format = "compact"
        "#,
    )
    .unwrap();

    assert_eq!(config.urls.len(), 2);
    assert_eq!(config.request_timeout, Duration::from_secs(5));
    assert_eq!(config.refresh_policy, Some(RefreshPolicy::WaitUntil));
    assert_eq!(config.index_prefix.as_deref(), Some("staging-"));
    assert_eq!(config.log_format, LogFormat::Compact);
}

#[test]
fn test_config_rejects_missing_urls() {
    assert!(ElasticsearchConfig::from_toml_str("urls = []").is_err());
}

#[test]
fn test_error_display() {
    let err = ElasticsearchError::DocumentNotFound {
        index: "articles".to_string(),
        id: "42".to_string(),
    };
    assert_eq!(err.to_string(), "Document not found: articles/42");
}

// =============================================================================
// Repositories
// =============================================================================

#[tokio::test]
async fn test_repository_uses_index_prefix() {
    let operations = InMemoryOperations::new()
        .with_refresh_policy(RefreshPolicy::Immediate)
        .with_index_prefix("test-");
    let repository = SimpleElasticsearchRepository::<Article, _>::new(operations.clone())
        .await
        .unwrap();

    assert_eq!(repository.index_coordinates().index_name(), "test-articles");

    repository
        .save(Article::new("1", "Prefixed", &["rust"], 1))
        .await
        .unwrap();
    assert_eq!(operations.document_count("test-articles"), 1);
    assert_eq!(operations.document_count("articles"), 0);

    let settings = repository.index_operations().get_settings(false).await.unwrap();
    assert_eq!(settings.get("index.number_of_shards"), Some(&json!(1)));
}

#[tokio::test]
async fn test_repository_crud_round() {
    let (_, repository) = seeded().await;

    assert_eq!(repository.count().await.unwrap(), 4);
    assert!(repository.exists_by_id(&"2".to_string()).await.unwrap());

    let found = repository.find_by_id(&"3".to_string()).await.unwrap();
    assert_eq!(found.map(|a| a.title), Some("Tuning search relevance".to_string()));

    repository.delete_by_id(&"3".to_string()).await.unwrap();
    assert!(repository.find_by_id(&"3".to_string()).await.unwrap().is_none());
    assert_eq!(repository.count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_fixed_routing_reaches_every_id_lookup() {
    let operations = InMemoryOperations::new().with_refresh_policy(RefreshPolicy::Immediate);
    let routed = operations.with_routing(Arc::new(FixedRoutingResolver::new("eu")));
    let repository = SimpleElasticsearchRepository::<Article, _>::new(routed.clone())
        .await
        .unwrap();
    repository
        .save(Article::new("1", "Regional news", &["eu"], 10))
        .await
        .unwrap();
    operations.clear_calls();

    assert!(repository.exists_by_id(&"1".to_string()).await.unwrap());
    assert!(repository.find_by_id(&"1".to_string()).await.unwrap().is_some());
    let items: Vec<MultiGetItem<Article>> = routed
        .multi_get(&["1".to_string()], &IndexCoordinates::of("articles"))
        .await
        .unwrap();
    assert!(items[0].item.is_some());
    repository.delete_by_id(&"1".to_string()).await.unwrap();

    assert_eq!(
        operations.calls(),
        vec![
            "exists articles/1?routing=eu",
            "get articles/1?routing=eu",
            "multi_get articles?routing=eu",
            "delete articles/1?routing=eu",
        ]
    );
}

#[tokio::test]
async fn test_repository_search_similar() {
    let (_, repository) = seeded().await;
    let seed = Article::new("1", "Rust ownership explained", &["rust", "memory"], 120);

    let page = repository
        .search_similar(&seed, Some(&["tags"]), &Pageable::of(0, 10).unwrap())
        .await
        .unwrap();

    let ids: Vec<_> = page.content.into_iter().filter_map(|a| a.id).collect();
    assert_eq!(ids, vec!["2".to_string()]);
}

#[tokio::test]
async fn test_external_versions_reject_stale_writes() {
    let operations = InMemoryOperations::new();
    let index = IndexCoordinates::of("ledger");

    let entry = LedgerEntry {
        id: "tx-1".to_string(),
        amount: 10,
        version: Some(5),
    };
    let saved = operations.save(entry.clone(), &index).await.unwrap();
    assert_eq!(saved.version, Some(5));

    let stale = operations.save(entry.clone(), &index).await;
    assert!(matches!(
        stale,
        Err(ElasticsearchError::Engine { status: 409, .. })
    ));

    let newer = LedgerEntry {
        version: Some(6),
        amount: 12,
        ..entry
    };
    let saved = operations.save(newer, &index).await.unwrap();
    assert_eq!(saved.version, Some(6));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_with_criteria_and_aggregations() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let query = Query::new(
        BoolClause::new()
            .must(QueryClause::term("tags", "rust"))
            .filter(RangeClause::new("views").gte(100).build())
            .build(),
    )
    .with_sort(Sort::by(Order::desc("views")))
    .with_aggregation("tags", Aggregation::terms("tags"))
    .with_aggregation("avg_views", Aggregation::metric(Metric::Avg, "views"));

    let hits: SearchHits<Article> = operations.search(&query, &index).await.unwrap();
    assert_eq!(hits.total_hits, 2);

    let ids: Vec<_> = hits.search_hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "1"]);
    assert_eq!(hits.search_hits[0].sort_values, vec![json!(300)]);

    let aggregations = hits.aggregations.as_ref().unwrap();
    let buckets = aggregations.get("tags").unwrap().buckets();
    assert_eq!(buckets[0], (json!("rust"), 2));
    assert_eq!(
        aggregations.get("avg_views").unwrap().metric_value(),
        Some(210.0)
    );
}

#[tokio::test]
async fn test_search_pages_and_search_after() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");
    let sort = Sort::by(Order::asc("views"));

    let first = Query::find_all().with_pageable(Pageable::of_sorted(0, 2, sort.clone()).unwrap());
    let hits: SearchHits<Article> = operations.search(&first, &index).await.unwrap();
    let page = search_page_for(hits, Pageable::of_sorted(0, 2, sort.clone()).unwrap()).into_page();
    assert_eq!(page.total_pages(), 2);
    assert!(page.has_next());

    let last_sort = vec![json!(80)];
    let after = Query::find_all()
        .with_sort(sort)
        .with_max_results(10)
        .with_search_after(last_sort);
    let hits: SearchHits<Article> = operations.search(&after, &index).await.unwrap();
    let views: Vec<_> = hits.into_contents().into_iter().map(|a| a.views).collect();
    assert_eq!(views, vec![120, 300]);
}

#[tokio::test]
async fn test_multi_search() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let results: Vec<SearchHits<Article>> = operations
        .multi_search(
            &[
                Query::new(QueryClause::term("tags", "search")),
                Query::new(QueryClause::matching("title", "rust")),
            ],
            &index,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].total_hits, 2);
    assert_eq!(results[1].total_hits, 2);
}

#[tokio::test]
async fn test_multi_search_across_entity_types() {
    let (operations, _) = seeded().await;
    let entry = LedgerEntry {
        id: "tx-1".to_string(),
        amount: 10,
        version: Some(1),
    };
    operations
        .save(entry, &IndexCoordinates::of("ledger"))
        .await
        .unwrap();

    let results = operations
        .multi_search_documents(&[
            (Query::find_all(), IndexCoordinates::of("articles")),
            (Query::find_all(), IndexCoordinates::of("ledger")),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].total_hits, 4);
    assert_eq!(results[1].total_hits, 1);
    assert_eq!(results[1].search_hits[0].id, "tx-1");
    assert_eq!(results[1].search_hits[0].content["amount"], json!(10));
    assert_eq!(operations.call_count("multi_search"), 1);
}

#[tokio::test]
async fn test_unrefreshed_writes_are_not_searchable() {
    let operations = InMemoryOperations::new();
    let index = IndexCoordinates::of("articles");

    operations
        .save(Article::new("1", "Draft", &[], 0), &index)
        .await
        .unwrap();

    assert!(operations.exists("1", &index).await.unwrap());
    assert_eq!(operations.count(&Query::find_all(), &index).await.unwrap(), 0);

    operations.index_ops(index.clone()).refresh().await.unwrap();
    assert_eq!(operations.count(&Query::find_all(), &index).await.unwrap(), 1);
}

#[tokio::test]
async fn test_scroll_stream_reads_every_hit() {
    let operations = InMemoryOperations::new().with_refresh_policy(RefreshPolicy::Immediate);
    let index = IndexCoordinates::of("articles");
    let many: Vec<Article> = (0..25)
        .map(|i| Article::new(&i.to_string(), "Bulk", &["bulk"], i))
        .collect();
    operations.save_all(many, &index).await.unwrap();

    let query = Query::find_all().with_pageable(Pageable::of(0, 10).unwrap());
    let iterator = operations
        .search_for_stream::<Article>(&query, &index)
        .await
        .unwrap();
    assert_eq!(iterator.total_hits(), 25);

    let hits: Vec<_> = iterator.into_stream().try_collect().await.unwrap();
    assert_eq!(hits.len(), 25);
    assert_eq!(operations.call_count("scroll"), 3);
    assert_eq!(operations.open_scrolls(), 0);
}

#[tokio::test]
async fn test_scroll_respects_max_results() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let query = Query::find_all().with_max_results(3);
    let hits = operations
        .search_for_stream::<Article>(&query, &index)
        .await
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(operations.open_scrolls(), 0);
}

#[tokio::test]
async fn test_scroll_is_cleared_when_first_batch_fails() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let result = operations
        .search_for_stream::<LedgerEntry>(&Query::find_all(), &index)
        .await;

    assert!(matches!(result, Err(ElasticsearchError::Serialization(_))));
    assert_eq!(operations.call_count("clear_scroll"), 1);
    assert_eq!(operations.open_scrolls(), 0);
}

#[tokio::test]
async fn test_point_in_time_lifecycle() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let pit = operations
        .open_point_in_time(&index, Duration::from_secs(60), false)
        .await
        .unwrap();
    assert_eq!(operations.open_point_in_times(), 1);

    let query = Query::find_all().with_point_in_time(pit.clone(), Duration::from_secs(60));
    let hits: SearchHits<Article> = operations.search(&query, &index).await.unwrap();
    assert_eq!(hits.total_hits, 4);
    assert_eq!(hits.point_in_time_id.as_deref(), Some(pit.as_str()));

    assert!(operations.close_point_in_time(&pit).await.unwrap());
    assert!(!operations.close_point_in_time(&pit).await.unwrap());

    let missing = operations
        .open_point_in_time(&IndexCoordinates::of("nope"), Duration::from_secs(1), false)
        .await;
    assert!(matches!(missing, Err(ElasticsearchError::IndexNotFound(_))));
}

// =============================================================================
// Documents
// =============================================================================

#[tokio::test]
async fn test_partial_update() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let result = operations
        .update("1", json!({"views": 121}), &index)
        .await
        .unwrap();
    assert_eq!(result.outcome, UpdateOutcome::Updated);

    let result = operations
        .update("1", json!({"views": 121}), &index)
        .await
        .unwrap();
    assert_eq!(result.outcome, UpdateOutcome::Noop);

    let missing = operations.update("99", json!({"views": 1}), &index).await;
    assert!(matches!(
        missing,
        Err(ElasticsearchError::DocumentNotFound { .. })
    ));
}

#[tokio::test]
async fn test_multi_get_marks_missing_items() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let items: Vec<MultiGetItem<Article>> = operations
        .multi_get(&["1".to_string(), "missing".to_string()], &index)
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert!(items[0].item.is_some());
    assert!(items[1].item.is_none());
}

#[tokio::test]
async fn test_delete_by_query() {
    let (operations, repository) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let response = operations
        .delete_by_query(&Query::new(QueryClause::term("tags", "search")), &index)
        .await
        .unwrap();
    assert_eq!(response.deleted, 2);
    assert_eq!(repository.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_stored_scripts() {
    let operations = InMemoryOperations::new();
    let script = Script::painless("bump", "ctx._source.views += 1");

    operations.put_script(&script).await.unwrap();
    assert_eq!(operations.get_script("bump").await.unwrap(), Some(script));
    assert!(operations.delete_script("bump").await.unwrap());
    assert!(operations.get_script("bump").await.unwrap().is_none());
}

// =============================================================================
// Indices
// =============================================================================

#[tokio::test]
async fn test_alias_write_index_receives_writes() {
    let operations = InMemoryOperations::new().with_refresh_policy(RefreshPolicy::Immediate);
    let v1 = operations.index_ops(IndexCoordinates::of("events-v1"));
    v1.create().await.unwrap();

    let actions = AliasActions::new().add(AliasAction::Add(
        AliasActionParameters::new(["events-v1"], ["events"]).write_index(true),
    ));
    assert!(v1.alias(&actions).await.unwrap());

    let alias = IndexCoordinates::of("events");
    operations
        .save(Article::new("e1", "Deployed", &[], 0), &alias)
        .await
        .unwrap();
    assert_eq!(operations.document_count("events-v1"), 1);

    let aliases = v1.get_aliases(&["events"]).await.unwrap();
    assert_eq!(aliases["events-v1"][0].is_write_index, Some(true));

    assert!(v1.alias(&AliasActions::new()).await.is_err());
}

#[tokio::test]
async fn test_index_template_applies_to_new_indices() {
    let operations = InMemoryOperations::new();
    let templates = operations.index_ops(IndexCoordinates::of("logs-2024"));

    let request = PutIndexTemplateRequest::new("logs", vec!["logs-*".to_string()])
        .data(TemplateData {
            settings: Settings::new().shards(3),
            ..TemplateData::default()
        })
        .priority(10);
    templates.put_index_template(&request).await.unwrap();
    assert!(templates.exists_index_template("logs").await.unwrap());

    let stored = templates.get_index_template("logs").await.unwrap().unwrap();
    assert_eq!(stored.index_patterns, vec!["logs-*".to_string()]);
    assert_eq!(stored.priority, Some(10));

    templates.create().await.unwrap();
    let settings = templates.get_settings(false).await.unwrap();
    assert_eq!(settings.get("index.number_of_shards"), Some(&json!(3)));

    assert!(templates.delete_index_template("logs").await.unwrap());
    assert!(!templates.exists_index_template("logs").await.unwrap());
}

#[tokio::test]
async fn test_index_lifecycle_errors() {
    let operations = InMemoryOperations::new();
    let index = operations.index_ops(IndexCoordinates::of("things"));

    assert!(!index.exists().await.unwrap());
    assert!(index.create().await.unwrap());
    assert!(index.create().await.unwrap_err().is_index_exists());
    assert!(index.delete().await.unwrap());
    assert!(matches!(
        index.delete().await,
        Err(ElasticsearchError::IndexNotFound(_))
    ));
}

#[tokio::test]
async fn test_bound_index_helpers() {
    let operations = InMemoryOperations::new();
    let index = operations.index_ops_for::<Article>();
    index.create().await.unwrap();

    assert!(put_entity_mapping(&index).await.unwrap());
    let mapping = index.get_mapping().await.unwrap();
    assert_eq!(mapping["properties"]["tags"]["type"], json!("keyword"));

    let information = get_bound_information(&index).await.unwrap();
    assert_eq!(information.len(), 1);
    assert_eq!(information[0].name, "articles");
}

#[tokio::test]
async fn test_search_one_and_default_point_in_time() {
    let (operations, _) = seeded().await;
    let index = IndexCoordinates::of("articles");

    let query = Query::new(QueryClause::term("tags", "async"));
    let hit = search_one::<Article, _>(&operations, &query, &index)
        .await
        .unwrap();
    assert_eq!(hit.map(|h| h.id), Some("2".to_string()));

    let query = Query::new(QueryClause::term("tags", "go"));
    let none = search_one::<Article, _>(&operations, &query, &index)
        .await
        .unwrap();
    assert!(none.is_none());

    let pit = open_point_in_time_default(&operations, &index, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(operations.close_point_in_time(&pit).await.unwrap());
}

#[tokio::test]
async fn test_cluster_health() {
    let operations = InMemoryOperations::new();
    let health = operations.cluster().health().await.unwrap();
    assert_eq!(health.status, "green");
}

// Note: These tests require a running engine on localhost:9200
// They are disabled by default but can be run with: cargo test -- --ignored

#[tokio::test]
#[ignore]
async fn test_live_repository_round_trip() {
    let config = ElasticsearchConfig::new("http://localhost:9200")
        .with_refresh_policy(RefreshPolicy::Immediate);
    let template = ElasticsearchTemplate::new(config).unwrap();
    let repository = SimpleElasticsearchRepository::<Article, _>::new(template)
        .await
        .unwrap();

    repository.delete_all().await.unwrap();
    repository.save_all(articles()).await.unwrap();
    assert_eq!(repository.count().await.unwrap(), 4);

    let page = repository
        .find_all_page(&Pageable::of_sorted(0, 2, Sort::by(Order::desc("views"))).unwrap())
        .await
        .unwrap();
    assert_eq!(page.content[0].views, 300);

    repository.index_operations().delete().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_live_ping() {
    let template = ElasticsearchTemplate::new(ElasticsearchConfig::new("http://localhost:9200"))
        .unwrap();
    assert!(template.ping().await.unwrap());
}
