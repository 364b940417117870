//! Index and cluster operations over the `opensearch` transport.

use crate::client::{response_body, send_raw};
use crate::coordinates::IndexCoordinates;
use crate::error::{ElasticsearchError, Result};
use crate::index::{
    AliasActions, AliasData, IndexInformation, IndexOperations, IndexSchema,
    PutComponentTemplateRequest, PutIndexTemplateRequest, PutTemplateRequest, TemplateResponse,
    create_index_body, parse_aliases,
};
use crate::mapping::{Mapping, Settings};
use crate::operations::{ClusterHealth, ClusterOperations};
use async_trait::async_trait;
use opensearch::cluster::ClusterHealthParts;
use opensearch::http::{Method, StatusCode};
use opensearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesDeleteTemplateParts, IndicesExistsParts,
    IndicesExistsTemplateParts, IndicesGetAliasParts, IndicesGetMappingParts, IndicesGetParts,
    IndicesGetSettingsParts, IndicesGetTemplateParts, IndicesPutMappingParts,
    IndicesPutTemplateParts, IndicesRefreshParts,
};
use opensearch::OpenSearch;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

fn acknowledged(body: &Value) -> bool {
    body["acknowledged"].as_bool().unwrap_or(false)
}

/// First per-index section of a response keyed by concrete index name.
/// Aliases resolve to the index behind them, so the key is not looked up.
fn first_index_entry(body: &Value) -> Option<&Value> {
    body.as_object()?.values().next()
}

/// Index operations bound to one set of index coordinates.
#[derive(Clone)]
pub struct DefaultIndexOperations {
    client: Arc<OpenSearch>,
    index: IndexCoordinates,
    schema: Option<IndexSchema>,
}

impl DefaultIndexOperations {
    pub(crate) fn new(
        client: Arc<OpenSearch>,
        index: IndexCoordinates,
        schema: Option<IndexSchema>,
    ) -> Self {
        Self {
            client,
            index,
            schema,
        }
    }

    async fn create_index(&self, body: Value) -> Result<bool> {
        let name = self.index.index_name();
        info!(index = name, "creating index");

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body)
            .send()
            .await?;

        let body = response_body(response, name).await?;
        Ok(acknowledged(&body))
    }

    async fn template_exists(&self, path: &str) -> Result<bool> {
        let response = send_raw(&self.client, Method::Head, path, None, None).await?;
        Ok(response.status_code().is_success())
    }

    async fn template_body(&self, path: &str) -> Result<Option<Value>> {
        let response = send_raw(&self.client, Method::Get, path, None, None).await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response_body(response, "").await.map(Some)
    }

    async fn template_delete(&self, path: &str) -> Result<bool> {
        let response = send_raw(&self.client, Method::Delete, path, None, None).await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response_body(response, "").await?;
        Ok(acknowledged(&body))
    }

    async fn template_put(&self, path: &str, body: Value) -> Result<bool> {
        let response = send_raw(&self.client, Method::Put, path, None, Some(body)).await?;
        let body = response_body(response, "").await?;
        Ok(acknowledged(&body))
    }
}

impl std::fmt::Debug for DefaultIndexOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultIndexOperations")
            .field("index", &self.index)
            .field("schema", &self.schema)
            .finish()
    }
}

#[async_trait]
impl IndexOperations for DefaultIndexOperations {
    fn index_coordinates(&self) -> &IndexCoordinates {
        &self.index
    }

    fn schema(&self) -> Option<&IndexSchema> {
        self.schema.as_ref()
    }

    async fn create(&self) -> Result<bool> {
        self.create_index(create_index_body(&Settings::new(), None))
            .await
    }

    async fn create_with_settings(&self, settings: &Settings) -> Result<bool> {
        self.create_index(create_index_body(settings, None)).await
    }

    async fn create_with_settings_and_mapping(
        &self,
        settings: &Settings,
        mapping: &Mapping,
    ) -> Result<bool> {
        self.create_index(create_index_body(settings, Some(mapping)))
            .await
    }

    async fn delete(&self) -> Result<bool> {
        let names = self.index.name_refs();
        info!(index = %self.index, "deleting index");

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&names))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Err(ElasticsearchError::IndexNotFound(self.index.joined()));
        }

        let body = response_body(response, &self.index.joined()).await?;
        Ok(acknowledged(&body))
    }

    async fn exists(&self) -> Result<bool> {
        let names = self.index.name_refs();
        debug!(index = %self.index, "checking if index exists");

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&names))
            .send()
            .await?;

        Ok(response.status_code().is_success())
    }

    async fn refresh(&self) -> Result<()> {
        let names = self.index.name_refs();
        debug!(index = %self.index, "refreshing index");

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&names))
            .send()
            .await?;

        response_body(response, &self.index.joined()).await.map(|_| ())
    }

    async fn put_mapping(&self, mapping: &Mapping) -> Result<bool> {
        let names = self.index.name_refs();
        debug!(index = %self.index, "putting mapping");

        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&names))
            .body(mapping.to_json())
            .send()
            .await?;

        let body = response_body(response, &self.index.joined()).await?;
        Ok(acknowledged(&body))
    }

    async fn get_mapping(&self) -> Result<Map<String, Value>> {
        let names = self.index.name_refs();
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&names))
            .send()
            .await?;

        let body = response_body(response, &self.index.joined()).await?;
        Ok(first_index_entry(&body)
            .and_then(|entry| entry["mappings"].as_object())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_settings(&self, include_defaults: bool) -> Result<Settings> {
        let names = self.index.name_refs();
        let response = self
            .client
            .indices()
            .get_settings(IndicesGetSettingsParts::Index(&names))
            .include_defaults(include_defaults)
            .send()
            .await?;

        let body = response_body(response, &self.index.joined()).await?;
        let Some(entry) = first_index_entry(&body) else {
            return Ok(Settings::new());
        };

        let settings = Settings::from_json(entry["settings"].clone());
        if include_defaults {
            return Ok(Settings::from_json(entry["defaults"].clone()).merge(&settings));
        }
        Ok(settings)
    }

    async fn alias(&self, actions: &AliasActions) -> Result<bool> {
        if actions.is_empty() {
            return Err(ElasticsearchError::invalid("alias actions must not be empty"));
        }

        debug!(index = %self.index, "updating aliases");

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(actions.to_json())
            .send()
            .await?;

        let body = response_body(response, &self.index.joined()).await?;
        Ok(acknowledged(&body))
    }

    async fn get_aliases(&self, alias_names: &[&str]) -> Result<BTreeMap<String, Vec<AliasData>>> {
        let parts = if alias_names.is_empty() {
            IndicesGetAliasParts::None
        } else {
            IndicesGetAliasParts::Name(alias_names)
        };

        let response = self.client.indices().get_alias(parts).send().await?;
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(BTreeMap::new());
        }

        let body = response_body(response, "").await?;
        Ok(parse_aliases(&body))
    }

    async fn get_aliases_for_index(
        &self,
        index_names: &[&str],
    ) -> Result<BTreeMap<String, Vec<AliasData>>> {
        let parts = if index_names.is_empty() {
            IndicesGetAliasParts::None
        } else {
            IndicesGetAliasParts::Index(index_names)
        };

        let response = self.client.indices().get_alias(parts).send().await?;
        let body = response_body(response, &index_names.join(",")).await?;
        Ok(parse_aliases(&body))
    }

    // =========================================================================
    // Legacy templates
    // =========================================================================

    async fn put_template(&self, request: &PutTemplateRequest) -> Result<bool> {
        info!(template = %request.name, "putting template");

        let response = self
            .client
            .indices()
            .put_template(IndicesPutTemplateParts::Name(&request.name))
            .body(request.to_json())
            .send()
            .await?;

        let body = response_body(response, "").await?;
        Ok(acknowledged(&body))
    }

    async fn get_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        let names = [name];
        let response = self
            .client
            .indices()
            .get_template(IndicesGetTemplateParts::Name(&names))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response_body(response, "").await?;
        Ok(TemplateResponse::from_legacy(name, &body))
    }

    async fn exists_template(&self, name: &str) -> Result<bool> {
        let names = [name];
        let response = self
            .client
            .indices()
            .exists_template(IndicesExistsTemplateParts::Name(&names))
            .send()
            .await?;

        Ok(response.status_code().is_success())
    }

    async fn delete_template(&self, name: &str) -> Result<bool> {
        info!(template = name, "deleting template");

        let response = self
            .client
            .indices()
            .delete_template(IndicesDeleteTemplateParts::Name(name))
            .send()
            .await?;

        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body = response_body(response, "").await?;
        Ok(acknowledged(&body))
    }

    // =========================================================================
    // Composable and component templates
    // =========================================================================

    async fn put_index_template(&self, request: &PutIndexTemplateRequest) -> Result<bool> {
        info!(template = %request.name, "putting index template");
        self.template_put(&format!("/_index_template/{}", request.name), request.to_json())
            .await
    }

    async fn exists_index_template(&self, name: &str) -> Result<bool> {
        self.template_exists(&format!("/_index_template/{name}"))
            .await
    }

    async fn get_index_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        let body = self
            .template_body(&format!("/_index_template/{name}"))
            .await?;
        Ok(body.and_then(|body| TemplateResponse::from_index_template(name, &body)))
    }

    async fn delete_index_template(&self, name: &str) -> Result<bool> {
        info!(template = name, "deleting index template");
        self.template_delete(&format!("/_index_template/{name}"))
            .await
    }

    async fn put_component_template(&self, request: &PutComponentTemplateRequest) -> Result<bool> {
        info!(template = %request.name, "putting component template");
        self.template_put(
            &format!("/_component_template/{}", request.name),
            request.to_json(),
        )
        .await
    }

    async fn exists_component_template(&self, name: &str) -> Result<bool> {
        self.template_exists(&format!("/_component_template/{name}"))
            .await
    }

    async fn get_component_template(&self, name: &str) -> Result<Option<TemplateResponse>> {
        let body = self
            .template_body(&format!("/_component_template/{name}"))
            .await?;
        Ok(body.and_then(|body| TemplateResponse::from_component_template(name, &body)))
    }

    async fn delete_component_template(&self, name: &str) -> Result<bool> {
        info!(template = name, "deleting component template");
        self.template_delete(&format!("/_component_template/{name}"))
            .await
    }

    async fn get_information(&self, index: &IndexCoordinates) -> Result<Vec<IndexInformation>> {
        let names = index.name_refs();
        let response = self
            .client
            .indices()
            .get(IndicesGetParts::Index(&names))
            .send()
            .await?;

        let body = response_body(response, &index.joined()).await?;
        Ok(IndexInformation::from_response(&body))
    }
}

/// Cluster operations.
#[derive(Clone)]
pub struct DefaultClusterOperations {
    client: Arc<OpenSearch>,
}

impl DefaultClusterOperations {
    pub(crate) fn new(client: Arc<OpenSearch>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterOperations for DefaultClusterOperations {
    async fn health(&self) -> Result<ClusterHealth> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await?;

        let body = response_body(response, "").await?;
        Ok(serde_json::from_value(body)?)
    }
}
