//! Engine-backed operations over the `opensearch` transport.

use crate::{
    bulk::{self, BulkResponse},
    config::ElasticsearchConfig,
    coordinates::IndexCoordinates,
    entity::{Entity, EntityInformation, VersionType},
    error::{ElasticsearchError, Result},
    hits::SearchHits,
    index::IndexSchema,
    index_ops::{DefaultClusterOperations, DefaultIndexOperations},
    operations::{
        ByQueryResponse, DocumentOperations, ElasticsearchOperations, MultiGetItem,
        RefreshPolicy, Script, ScriptOperations, SearchOperations, UpdateOutcome, UpdateResult,
    },
    query::{Query, time_value},
    routing::{DefaultRoutingResolver, RoutingResolver},
    stream::{ScrollCursor, SearchHitsIterator},
};
use async_trait::async_trait;
use opensearch::{
    BulkParts, ClearScrollParts, DeleteByQueryParts, DeleteParts, DeleteScriptParts, ExistsParts,
    GetParts, GetScriptParts, IndexParts, MgetParts, MsearchParts, OpenSearch, PutScriptParts,
    ScrollParts, SearchParts, UpdateParts,
    http::{
        Method, StatusCode,
        headers::HeaderMap,
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scroll keep-alive used when a streamed query does not set one.
const DEFAULT_SCROLL_TIME: Duration = Duration::from_secs(60);

/// Read a response body, turning a non-success status into an error.
pub(crate) async fn response_body(response: Response, index: &str) -> Result<Value> {
    let status = response.status_code();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)?
    };

    if !status.is_success() {
        return Err(ElasticsearchError::from_response(status, &body, index));
    }
    Ok(body)
}

/// Send a request to an endpoint the typed builders do not cover.
pub(crate) async fn send_raw(
    client: &OpenSearch,
    method: Method,
    path: &str,
    query_string: Option<&[(&str, &str)]>,
    body: Option<Value>,
) -> Result<Response> {
    debug!(%path, "sending raw request");
    let response = client
        .send(
            method,
            path,
            HeaderMap::new(),
            query_string,
            body.map(JsonBody::new),
            None,
        )
        .await?;
    Ok(response)
}

fn version_type_param(version_type: VersionType) -> opensearch::params::VersionType {
    match version_type {
        VersionType::Internal => opensearch::params::VersionType::Internal,
        VersionType::External => opensearch::params::VersionType::External,
        VersionType::ExternalGte => opensearch::params::VersionType::ExternalGte,
    }
}

/// Operations against a live cluster.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct ElasticsearchTemplate {
    client: Arc<OpenSearch>,
    config: Arc<ElasticsearchConfig>,
    routing: Arc<dyn RoutingResolver>,
}

impl ElasticsearchTemplate {
    /// Connect using `config`. Only the first URL is used.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        config.validate()?;
        info!(urls = ?config.urls, "initializing elasticsearch client");

        let url = config
            .urls
            .first()
            .ok_or_else(|| ElasticsearchError::Configuration("No URLs provided".to_string()))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| ElasticsearchError::Configuration(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout)
            .disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }

        #[cfg(any(feature = "rustls", feature = "native-tls"))]
        if let Some(tls) = &config.tls {
            use opensearch::cert::{Certificate, CertificateValidation};

            if tls.danger_accept_invalid_certs {
                builder = builder.cert_validation(CertificateValidation::None);
            } else if let Some(path) = &tls.ca_cert {
                let pem = std::fs::read(path).map_err(|e| {
                    ElasticsearchError::Configuration(format!("Cannot read CA certificate {path}: {e}"))
                })?;
                let certificate = Certificate::from_pem(&pem)
                    .map_err(|e| ElasticsearchError::Configuration(e.to_string()))?;
                builder = builder.cert_validation(CertificateValidation::Full(certificate));
            }
        }

        let transport = builder
            .build()
            .map_err(|e| ElasticsearchError::Connection(e.to_string()))?;

        debug!("elasticsearch client initialized");

        Ok(Self::from_client(OpenSearch::new(transport), config))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: OpenSearch, config: ElasticsearchConfig) -> Self {
        Self {
            client: Arc::new(client),
            config: Arc::new(config),
            routing: Arc::new(DefaultRoutingResolver),
        }
    }

    /// The underlying client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// The configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    /// Whether the cluster answers.
    pub async fn ping(&self) -> Result<bool> {
        let response = self.client.ping().send().await?;
        Ok(response.status_code().is_success())
    }

    fn refresh_param(&self) -> Option<opensearch::params::Refresh> {
        self.config.refresh_policy.map(RefreshPolicy::to_param)
    }

    fn routing_for(&self, query: &Query) -> Option<String> {
        query
            .routing()
            .map(str::to_string)
            .or_else(|| self.routing.default_routing())
    }

    /// Run an `_msearch` and return one response body per request.
    async fn execute_multi_search(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<Value>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = requests.len(), "executing multi search");

        let mut lines: Vec<JsonBody<Value>> = Vec::with_capacity(requests.len() * 2);
        for (query, index) in requests {
            lines.push(json!({ "index": index.joined() }).into());
            lines.push(query.to_search_body().into());
        }

        let response = self
            .client
            .msearch(MsearchParts::None)
            .body(lines)
            .send()
            .await?;
        let body = response_body(response, "").await?;
        let responses = body["responses"].as_array().cloned().unwrap_or_default();

        responses
            .into_iter()
            .zip(requests)
            .map(|(item, (_, index))| -> Result<Value> {
                if item.get("error").is_some() {
                    let status = item["status"]
                        .as_u64()
                        .and_then(|s| StatusCode::from_u16(s as u16).ok())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                    return Err(ElasticsearchError::from_response(status, &item, &index.joined()));
                }
                Ok(item)
            })
            .collect()
    }

    async fn execute_search(
        &self,
        query: &Query,
        index: &IndexCoordinates,
        scroll: Option<Duration>,
    ) -> Result<Value> {
        let names = index.name_refs();
        let routing = self.routing_for(query);
        let routing_values: Vec<&str> = routing.iter().map(String::as_str).collect();
        let scroll_value = scroll.map(time_value);

        // a point-in-time search names no index
        let parts = if query.point_in_time().is_some() {
            SearchParts::None
        } else {
            SearchParts::Index(&names)
        };

        let mut body = query.to_search_body();
        if scroll.is_some() {
            if let Value::Object(map) = &mut body {
                map.remove("from");
            }
        }

        debug!(index = %index, scroll = ?scroll_value, "executing search");

        let mut request = self.client.search(parts);
        if !routing_values.is_empty() {
            request = request.routing(&routing_values);
        }
        if let Some(scroll) = scroll_value.as_deref() {
            request = request.scroll(scroll);
        }

        let response = request.body(body).send().await?;
        response_body(response, &index.joined()).await
    }
}

impl std::fmt::Debug for ElasticsearchTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchTemplate")
            .field("urls", &self.config.urls)
            .field("routing", &self.routing)
            .finish()
    }
}

// =============================================================================
// Document Operations
// =============================================================================

#[async_trait]
impl DocumentOperations for ElasticsearchTemplate {
    async fn save<T: Entity>(&self, mut entity: T, index: &IndexCoordinates) -> Result<T> {
        let info = EntityInformation::<T>::new();
        let index_name = index.index_name();
        let id = info.id(&entity).map(|id| self.convert_id(&id));
        let routing = self.entity_routing(&entity);
        let version = info.version(&entity);

        debug!(index = index_name, id = ?id, "saving document");

        let parts = match &id {
            Some(id) => IndexParts::IndexId(index_name, id),
            None => IndexParts::Index(index_name),
        };

        let mut request = self.client.index(parts);
        if let Some(refresh) = self.refresh_param() {
            request = request.refresh(refresh);
        }
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }
        if let (Some(version), Some(version_type)) = (version, info.version_type()) {
            if version_type != VersionType::Internal {
                request = request
                    .version(version)
                    .version_type(version_type_param(version_type));
            }
        }

        let response = request.body(&entity).send().await?;
        let body = response_body(response, index_name).await?;

        if let Some(generated) = body["_id"].as_str() {
            info.hydrate(&mut entity, generated, body["_version"].as_i64());
        }
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

        let info = EntityInformation::<T>::new();
        let index_name = index.index_name();
        debug!(index = index_name, count = entities.len(), "bulk saving documents");

        let mut lines: Vec<JsonBody<Value>> = Vec::with_capacity(entities.len() * 2);
        for entity in &entities {
            let id = info.id(entity).map(|id| self.convert_id(&id));
            let routing = self.entity_routing(entity);
            lines.push(bulk::index_action(index_name, id.as_deref(), routing.as_deref()).into());
            lines.push(serde_json::to_value(entity)?.into());
        }

        let mut request = self.client.bulk(BulkParts::Index(index_name));
        if let Some(refresh) = self.refresh_param() {
            request = request.refresh(refresh);
        }

        let response = request.body(lines).send().await?;
        let body = response_body(response, index_name).await?;
        let statuses = serde_json::from_value::<BulkResponse>(body)?.into_statuses()?;

        for (entity, status) in entities.iter_mut().zip(statuses) {
            info.hydrate(entity, &status.id, status.version);
        }
        Ok(entities)
    }

    async fn get<T: Entity>(&self, id: &str, index: &IndexCoordinates) -> Result<Option<T>> {
        let index_name = index.index_name();
        debug!(index = index_name, id, "getting document");

        let routing = self.routing.default_routing();
        let mut request = self.client.get(GetParts::IndexId(index_name, id));
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }

        let response = request.send().await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response_body(response, index_name).await?;
        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }

        let info = EntityInformation::<T>::new();
        let mut entity: T = serde_json::from_value(body["_source"].clone())?;
        info.hydrate(&mut entity, id, body["_version"].as_i64());
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

        let index_name = index.index_name();
        debug!(index = index_name, count = ids.len(), "multi-getting documents");

        let routing = self.routing.default_routing();
        let mut request = self
            .client
            .mget(MgetParts::Index(index_name))
            .body(json!({ "ids": ids }));
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }

        let response = request.send().await?;
        let body = response_body(response, index_name).await?;

        let info = EntityInformation::<T>::new();
        let docs = body["docs"].as_array().cloned().unwrap_or_default();

        docs.into_iter()
            .map(|doc| -> Result<MultiGetItem<T>> {
                let id = doc["_id"].as_str().unwrap_or_default().to_string();
                let index = doc["_index"].as_str().unwrap_or(index_name).to_string();

                if let Some(error) = doc.get("error") {
                    let reason = error["reason"]
                        .as_str()
                        .or_else(|| error.as_str())
                        .unwrap_or("Unknown error")
                        .to_string();
                    return Ok(MultiGetItem {
                        id,
                        index,
                        item: None,
                        failure: Some(reason),
                    });
                }

                let item = if doc["found"].as_bool().unwrap_or(false) {
                    let mut entity: T = serde_json::from_value(doc["_source"].clone())?;
                    info.hydrate(&mut entity, &id, doc["_version"].as_i64());
                    Some(entity)
                } else {
                    None
                };

                Ok(MultiGetItem {
                    id,
                    index,
                    item,
                    failure: None,
                })
            })
            .collect()
    }

    async fn exists(&self, id: &str, index: &IndexCoordinates) -> Result<bool> {
        let index_name = index.index_name();
        let routing = self.routing.default_routing();
        let mut request = self.client.exists(ExistsParts::IndexId(index_name, id));
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }

        let response = request.send().await?;

        match response.status_code() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ElasticsearchError::Engine {
                status: status.as_u16(),
                reason: format!("exists check for {index_name}/{id} failed"),
            }),
        }
    }

    async fn delete(&self, id: &str, index: &IndexCoordinates) -> Result<String> {
        let index_name = index.index_name();
        debug!(index = index_name, id, "deleting document");

        let routing = self.routing.default_routing();
        let mut request = self.client.delete(DeleteParts::IndexId(index_name, id));
        if let Some(refresh) = self.refresh_param() {
            request = request.refresh(refresh);
        }
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }

        let response = request.send().await?;
        let status = response.status_code();
        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        // an absent document answers 404 with result "not_found"
        if status.is_success() || body["result"].as_str() == Some("not_found") {
            return Ok(id.to_string());
        }
        Err(ElasticsearchError::from_response(status, &body, index_name))
    }

    async fn delete_by_query(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<ByQueryResponse> {
        let names = index.name_refs();
        let routing = self.routing_for(query);
        let routing_values: Vec<&str> = routing.iter().map(String::as_str).collect();

        debug!(index = %index, "deleting by query");

        let mut request = self.client.delete_by_query(DeleteByQueryParts::Index(&names));
        if let Some(policy) = self.config.refresh_policy {
            request = request.refresh(policy.makes_visible());
        }
        if !routing_values.is_empty() {
            request = request.routing(&routing_values);
        }

        let response = request
            .body(json!({ "query": query.criteria().to_json() }))
            .send()
            .await?;
        let body = response_body(response, &index.joined()).await?;
        Ok(ByQueryResponse::from_response(&body))
    }

    async fn update(
        &self,
        id: &str,
        document: Value,
        index: &IndexCoordinates,
    ) -> Result<UpdateResult> {
        let index_name = index.index_name();
        debug!(index = index_name, id, "updating document");

        let routing = self.routing.default_routing();
        let mut request = self.client.update(UpdateParts::IndexId(index_name, id));
        if let Some(refresh) = self.refresh_param() {
            request = request.refresh(refresh);
        }
        if let Some(routing) = routing.as_deref() {
            request = request.routing(routing);
        }

        let response = request.body(json!({ "doc": document })).send().await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(ElasticsearchError::DocumentNotFound {
                index: index_name.to_string(),
                id: id.to_string(),
            });
        }
        let body = response_body(response, index_name).await?;

        let outcome = match body["result"].as_str() {
            Some("noop") => UpdateOutcome::Noop,
            Some("created") => UpdateOutcome::Created,
            _ => UpdateOutcome::Updated,
        };

        Ok(UpdateResult {
            id: body["_id"].as_str().unwrap_or(id).to_string(),
            index: body["_index"].as_str().unwrap_or(index_name).to_string(),
            outcome,
            version: body["_version"].as_i64(),
        })
    }
}

// =============================================================================
// Search Operations
// =============================================================================

#[async_trait]
impl SearchOperations for ElasticsearchTemplate {
    async fn count(&self, query: &Query, index: &IndexCoordinates) -> Result<u64> {
        let query = query.clone().with_max_results(0).with_track_total_hits(true);
        let body = self.execute_search(&query, index, None).await?;
        Ok(SearchHits::<Value>::from_response(&body)?.total_hits)
    }

    async fn search<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHits<T>> {
        let body = self.execute_search(query, index, None).await?;
        let info = EntityInformation::<T>::new();
        Ok(SearchHits::from_response(&body)?.hydrate(&info))
    }

    async fn multi_search_with_indexes<T: Entity>(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<T>>> {
        let info = EntityInformation::<T>::new();
        self.execute_multi_search(requests)
            .await?
            .iter()
            .map(|item| -> Result<SearchHits<T>> {
                Ok(SearchHits::from_response(item)?.hydrate(&info))
            })
            .collect()
    }

    async fn multi_search_documents(
        &self,
        requests: &[(Query, IndexCoordinates)],
    ) -> Result<Vec<SearchHits<Value>>> {
        self.execute_multi_search(requests)
            .await?
            .iter()
            .map(SearchHits::from_response)
            .collect()
    }

    async fn search_for_stream<T: Entity>(
        &self,
        query: &Query,
        index: &IndexCoordinates,
    ) -> Result<SearchHitsIterator<T>> {
        let scroll_time = query.scroll_time().unwrap_or(DEFAULT_SCROLL_TIME);
        let body = self.execute_search(query, index, Some(scroll_time)).await?;

        let mut cursor = ClientScrollCursor {
            client: self.client.clone(),
            scroll_id: body["_scroll_id"].as_str().map(str::to_string),
            scroll_time,
            index: index.joined(),
            info: EntityInformation::<T>::new(),
        };

        let first = match SearchHits::from_response(&body) {
            Ok(hits) => hits.hydrate(&cursor.info),
            Err(e) => {
                if let Err(clear) = cursor.close().await {
                    warn!(index = %cursor.index, error = %clear, "failed to clear scroll");
                }
                return Err(e);
            }
        };
        if let Some(next) = &first.scroll_id {
            cursor.scroll_id = Some(next.clone());
        }

        Ok(SearchHitsIterator::new(
            first,
            Box::new(cursor),
            query.max_results(),
        ))
    }

    async fn open_point_in_time(
        &self,
        index: &IndexCoordinates,
        keep_alive: Duration,
        ignore_unavailable: bool,
    ) -> Result<String> {
        let index_name = index.joined();
        let path = format!("/{}/_pit", index_name);
        let keep_alive = time_value(keep_alive);
        let ignore_unavailable = ignore_unavailable.to_string();
        let params = [
            ("keep_alive", keep_alive.as_str()),
            ("ignore_unavailable", ignore_unavailable.as_str()),
        ];

        debug!(index = %index_name, %keep_alive, "opening point in time");

        let response = send_raw(&self.client, Method::Post, &path, Some(&params[..]), None).await?;
        let body = response_body(response, &index_name).await?;

        body["id"]
            .as_str()
            .or_else(|| body["pit_id"].as_str())
            .map(str::to_string)
            .ok_or_else(|| ElasticsearchError::Query("No point in time id in response".to_string()))
    }

    async fn close_point_in_time(&self, id: &str) -> Result<bool> {
        debug!("closing point in time");

        let response = send_raw(
            &self.client,
            Method::Delete,
            "/_pit",
            None,
            Some(json!({ "id": id })),
        )
        .await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body = response_body(response, "").await?;
        Ok(body["succeeded"].as_bool().unwrap_or(false))
    }
}

/// Scroll cursor over the `_search/scroll` endpoint.
struct ClientScrollCursor<T: Entity> {
    client: Arc<OpenSearch>,
    scroll_id: Option<String>,
    scroll_time: Duration,
    index: String,
    info: EntityInformation<T>,
}

#[async_trait]
impl<T: Entity> ScrollCursor<T> for ClientScrollCursor<T> {
    async fn next_batch(&mut self) -> Result<SearchHits<T>> {
        let Some(scroll_id) = self.scroll_id.clone() else {
            return Ok(SearchHits::empty());
        };

        let response = self
            .client
            .scroll(ScrollParts::None)
            .body(json!({
                "scroll": time_value(self.scroll_time),
                "scroll_id": scroll_id,
            }))
            .send()
            .await?;
        let body = response_body(response, &self.index).await?;

        let hits = SearchHits::from_response(&body)?.hydrate(&self.info);
        if let Some(next) = &hits.scroll_id {
            self.scroll_id = Some(next.clone());
        }
        Ok(hits)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(scroll_id) = self.scroll_id.take() else {
            return Ok(());
        };

        debug!(index = %self.index, "clearing scroll");

        let response = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await?;

        // an expired context is already gone
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response_body(response, &self.index).await.map(|_| ())
    }
}

// =============================================================================
// Script Operations
// =============================================================================

#[async_trait]
impl ScriptOperations for ElasticsearchTemplate {
    async fn put_script(&self, script: &Script) -> Result<()> {
        debug!(id = %script.id, "storing script");

        let response = self
            .client
            .put_script(PutScriptParts::Id(&script.id))
            .body(json!({
                "script": { "lang": script.language, "source": script.source }
            }))
            .send()
            .await?;
        response_body(response, "").await.map(|_| ())
    }

    async fn get_script(&self, id: &str) -> Result<Option<Script>> {
        let response = self.client.get_script(GetScriptParts::Id(id)).send().await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response_body(response, "").await?;
        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }

        let script = &body["script"];
        Ok(Some(Script {
            id: id.to_string(),
            language: script["lang"].as_str().unwrap_or("painless").to_string(),
            source: script["source"].as_str().unwrap_or_default().to_string(),
        }))
    }

    async fn delete_script(&self, id: &str) -> Result<bool> {
        debug!(id, "deleting script");

        let response = self
            .client
            .delete_script(DeleteScriptParts::Id(id))
            .send()
            .await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response_body(response, "").await?;
        Ok(body["acknowledged"].as_bool().unwrap_or(false))
    }
}

impl ElasticsearchOperations for ElasticsearchTemplate {
    type IndexOps = DefaultIndexOperations;
    type ClusterOps = DefaultClusterOperations;

    fn index_ops_with_schema(
        &self,
        index: IndexCoordinates,
        schema: Option<IndexSchema>,
    ) -> Self::IndexOps {
        DefaultIndexOperations::new(self.client.clone(), index, schema)
    }

    fn cluster(&self) -> Self::ClusterOps {
        DefaultClusterOperations::new(self.client.clone())
    }

    fn refresh_policy(&self) -> Option<RefreshPolicy> {
        self.config.refresh_policy
    }

    fn index_prefix(&self) -> Option<&str> {
        self.config.index_prefix.as_deref()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::FixedRoutingResolver;

    fn template(config: ElasticsearchConfig) -> ElasticsearchTemplate {
        ElasticsearchTemplate::new(config).unwrap()
    }

    #[test]
    fn test_rejects_invalid_url() {
        let config = ElasticsearchConfig::new("not a url");
        assert!(matches!(
            ElasticsearchTemplate::new(config),
            Err(ElasticsearchError::Configuration(_))
        ));
    }

    #[test]
    fn test_exposes_config() {
        let ops = template(
            ElasticsearchConfig::new("http://localhost:9200")
                .with_refresh_policy(RefreshPolicy::WaitUntil)
                .with_index_prefix("test-"),
        );

        assert_eq!(ops.refresh_policy(), Some(RefreshPolicy::WaitUntil));
        assert_eq!(ops.index_prefix(), Some("test-"));
        assert!(ops.refresh_param().is_some());
    }

    #[test]
    fn test_with_routing_keeps_transport() {
        let ops = template(ElasticsearchConfig::new("http://localhost:9200"));
        assert_eq!(ops.routing_resolver().default_routing(), None);

        let routed = ops.with_routing(Arc::new(FixedRoutingResolver::new("eu")));
        assert_eq!(routed.routing_resolver().default_routing(), Some("eu".to_string()));
        assert!(Arc::ptr_eq(&ops.client, &routed.client));

        let query = Query::find_all();
        assert_eq!(routed.routing_for(&query), Some("eu".to_string()));
        assert_eq!(
            routed.routing_for(&query.with_routing("us")),
            Some("us".to_string())
        );
    }
}
