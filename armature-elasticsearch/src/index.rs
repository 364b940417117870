//! Index lifecycle operations.

use crate::coordinates::IndexCoordinates;
use crate::entity::{Entity, EntityInformation};
use crate::error::Result;
use crate::mapping::{Mapping, Settings};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Settings and mapping an index is created with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSchema {
    /// Index settings.
    pub settings: Settings,
    /// Field mapping.
    pub mapping: Option<Mapping>,
}

impl IndexSchema {
    /// Schema declared by an entity type.
    pub fn of<T: Entity>(info: &EntityInformation<T>) -> Self {
        Self {
            settings: info.settings().clone(),
            mapping: info.mapping().cloned(),
        }
    }
}

/// Body of a create-index request.
pub(crate) fn create_index_body(settings: &Settings, mapping: Option<&Mapping>) -> Value {
    let mut body = Map::new();
    if !settings.is_empty() {
        body.insert("settings".to_string(), settings.to_json());
    }
    if let Some(mapping) = mapping {
        body.insert("mappings".to_string(), mapping.to_json());
    }
    Value::Object(body)
}

// =============================================================================
// Aliases
// =============================================================================

/// Parameters of a single alias action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasActionParameters {
    /// Target indices.
    pub indices: Vec<String>,
    /// Alias names.
    pub aliases: Vec<String>,
    /// Filter query.
    pub filter: Option<Value>,
    /// Routing for both indexing and search.
    pub routing: Option<String>,
    /// Routing for indexing.
    pub index_routing: Option<String>,
    /// Routing for search.
    pub search_routing: Option<String>,
    /// Whether the index is the write index of the alias.
    pub is_write_index: Option<bool>,
    /// Whether the alias is hidden.
    pub is_hidden: Option<bool>,
}

impl AliasActionParameters {
    /// Parameters for `aliases` on `indices`.
    pub fn new<I, A>(indices: I, aliases: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            indices: indices.into_iter().map(Into::into).collect(),
            aliases: aliases.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set a filter query.
    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set routing.
    pub fn routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Mark as write index.
    pub fn write_index(mut self, is_write_index: bool) -> Self {
        self.is_write_index = Some(is_write_index);
        self
    }

    fn to_json(&self, with_aliases: bool) -> Value {
        let mut body = Map::new();
        body.insert("indices".to_string(), json!(self.indices));
        if with_aliases {
            body.insert("aliases".to_string(), json!(self.aliases));
        }
        for (key, value) in [
            ("routing", &self.routing),
            ("index_routing", &self.index_routing),
            ("search_routing", &self.search_routing),
        ] {
            if let Some(value) = value {
                body.insert(key.to_string(), json!(value));
            }
        }
        if let Some(filter) = &self.filter {
            body.insert("filter".to_string(), filter.clone());
        }
        if let Some(flag) = self.is_write_index {
            body.insert("is_write_index".to_string(), json!(flag));
        }
        if let Some(flag) = self.is_hidden {
            body.insert("is_hidden".to_string(), json!(flag));
        }
        Value::Object(body)
    }
}

/// One alias action.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasAction {
    /// Add aliases.
    Add(AliasActionParameters),
    /// Remove aliases.
    Remove(AliasActionParameters),
    /// Remove the indices themselves.
    RemoveIndex(AliasActionParameters),
}

impl AliasAction {
    fn to_json(&self) -> Value {
        match self {
            AliasAction::Add(p) => json!({ "add": p.to_json(true) }),
            AliasAction::Remove(p) => json!({ "remove": p.to_json(true) }),
            AliasAction::RemoveIndex(p) => json!({ "remove_index": p.to_json(false) }),
        }
    }
}

/// Alias actions applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasActions {
    /// Actions in order.
    pub actions: Vec<AliasAction>,
}

impl AliasActions {
    /// No actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn add(mut self, action: AliasAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Whether no actions are present.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Body of an update-aliases request.
    pub fn to_json(&self) -> Value {
        json!({ "actions": self.actions.iter().map(AliasAction::to_json).collect::<Vec<_>>() })
    }
}

/// An alias as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasData {
    /// Alias name.
    pub alias: String,
    /// Filter query.
    pub filter: Option<Value>,
    /// Routing for indexing.
    pub index_routing: Option<String>,
    /// Routing for search.
    pub search_routing: Option<String>,
    /// Whether the index is the write index.
    pub is_write_index: Option<bool>,
    /// Whether the alias is hidden.
    pub is_hidden: Option<bool>,
}

impl AliasData {
    /// An alias with no options.
    pub fn named(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    pub(crate) fn from_json(alias: &str, value: &Value) -> Self {
        Self {
            alias: alias.to_string(),
            filter: value.get("filter").cloned(),
            index_routing: value["index_routing"].as_str().map(str::to_string),
            search_routing: value["search_routing"].as_str().map(str::to_string),
            is_write_index: value["is_write_index"].as_bool(),
            is_hidden: value["is_hidden"].as_bool(),
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(filter) = &self.filter {
            body.insert("filter".to_string(), filter.clone());
        }
        if let Some(routing) = &self.index_routing {
            body.insert("index_routing".to_string(), json!(routing));
        }
        if let Some(routing) = &self.search_routing {
            body.insert("search_routing".to_string(), json!(routing));
        }
        if let Some(flag) = self.is_write_index {
            body.insert("is_write_index".to_string(), json!(flag));
        }
        if let Some(flag) = self.is_hidden {
            body.insert("is_hidden".to_string(), json!(flag));
        }
        Value::Object(body)
    }
}

/// Parse a get-alias response (`{index: {aliases: {name: {...}}}}`).
pub(crate) fn parse_aliases(body: &Value) -> BTreeMap<String, Vec<AliasData>> {
    body.as_object()
        .map(|indices| {
            indices
                .iter()
                .map(|(index, data)| (index.clone(), parse_alias_map(&data["aliases"])))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_alias_map(aliases: &Value) -> Vec<AliasData> {
    aliases
        .as_object()
        .map(|aliases| {
            aliases
                .iter()
                .map(|(name, value)| AliasData::from_json(name, value))
                .collect()
        })
        .unwrap_or_default()
}

fn alias_map_json(aliases: &[AliasData]) -> Value {
    Value::Object(
        aliases
            .iter()
            .map(|a| (a.alias.clone(), a.to_json()))
            .collect(),
    )
}

// =============================================================================
// Templates
// =============================================================================

/// Settings, mapping and aliases carried by a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateData {
    /// Index settings.
    pub settings: Settings,
    /// Field mapping.
    pub mapping: Option<Mapping>,
    /// Aliases.
    pub aliases: Vec<AliasData>,
}

impl TemplateData {
    fn insert_into(&self, body: &mut Map<String, Value>) {
        if !self.settings.is_empty() {
            body.insert("settings".to_string(), self.settings.to_json());
        }
        if let Some(mapping) = &self.mapping {
            body.insert("mappings".to_string(), mapping.to_json());
        }
        if !self.aliases.is_empty() {
            body.insert("aliases".to_string(), alias_map_json(&self.aliases));
        }
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();
        self.insert_into(&mut body);
        Value::Object(body)
    }
}

/// Legacy index template.
#[derive(Debug, Clone, PartialEq)]
pub struct PutTemplateRequest {
    /// Template name.
    pub name: String,
    /// Index patterns the template applies to.
    pub index_patterns: Vec<String>,
    /// Template content.
    pub data: TemplateData,
    /// Order among matching templates.
    pub order: Option<i64>,
    /// Template version.
    pub version: Option<i64>,
}

impl PutTemplateRequest {
    /// Template `name` for `index_patterns`.
    pub fn new(name: impl Into<String>, index_patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            index_patterns,
            data: TemplateData::default(),
            order: None,
            version: None,
        }
    }

    /// Set content.
    pub fn data(mut self, data: TemplateData) -> Self {
        self.data = data;
        self
    }

    /// Set order.
    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Set version.
    pub fn version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Request body.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("index_patterns".to_string(), json!(self.index_patterns));
        self.data.insert_into(&mut body);
        if let Some(order) = self.order {
            body.insert("order".to_string(), json!(order));
        }
        if let Some(version) = self.version {
            body.insert("version".to_string(), json!(version));
        }
        Value::Object(body)
    }
}

/// Composable index template.
#[derive(Debug, Clone, PartialEq)]
pub struct PutIndexTemplateRequest {
    /// Template name.
    pub name: String,
    /// Index patterns the template applies to.
    pub index_patterns: Vec<String>,
    /// Template content.
    pub data: TemplateData,
    /// Component templates, in order.
    pub composed_of: Vec<String>,
    /// Priority among matching templates.
    pub priority: Option<i64>,
    /// Template version.
    pub version: Option<i64>,
}

impl PutIndexTemplateRequest {
    /// Template `name` for `index_patterns`.
    pub fn new(name: impl Into<String>, index_patterns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            index_patterns,
            data: TemplateData::default(),
            composed_of: Vec::new(),
            priority: None,
            version: None,
        }
    }

    /// Set content.
    pub fn data(mut self, data: TemplateData) -> Self {
        self.data = data;
        self
    }

    /// Compose from component templates.
    pub fn composed_of(mut self, components: Vec<String>) -> Self {
        self.composed_of = components;
        self
    }

    /// Set priority.
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Request body.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("index_patterns".to_string(), json!(self.index_patterns));
        body.insert("template".to_string(), self.data.to_json());
        if !self.composed_of.is_empty() {
            body.insert("composed_of".to_string(), json!(self.composed_of));
        }
        if let Some(priority) = self.priority {
            body.insert("priority".to_string(), json!(priority));
        }
        if let Some(version) = self.version {
            body.insert("version".to_string(), json!(version));
        }
        Value::Object(body)
    }
}

/// Component template.
#[derive(Debug, Clone, PartialEq)]
pub struct PutComponentTemplateRequest {
    /// Template name.
    pub name: String,
    /// Template content.
    pub data: TemplateData,
    /// Template version.
    pub version: Option<i64>,
}

impl PutComponentTemplateRequest {
    /// Component template `name` with `data`.
    pub fn new(name: impl Into<String>, data: TemplateData) -> Self {
        Self {
            name: name.into(),
            data,
            version: None,
        }
    }

    /// Request body.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("template".to_string(), self.data.to_json());
        if let Some(version) = self.version {
            body.insert("version".to_string(), json!(version));
        }
        Value::Object(body)
    }
}

/// A template as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateResponse {
    /// Template name.
    pub name: String,
    /// Index patterns, empty for component templates.
    pub index_patterns: Vec<String>,
    /// Settings.
    pub settings: Settings,
    /// Raw mapping.
    pub mapping: Option<Value>,
    /// Aliases.
    pub aliases: Vec<AliasData>,
    /// Component templates (composable templates only).
    pub composed_of: Vec<String>,
    /// Order (legacy templates only).
    pub order: Option<i64>,
    /// Priority (composable templates only).
    pub priority: Option<i64>,
    /// Version.
    pub version: Option<i64>,
}

impl TemplateResponse {
    fn with_template_section(name: &str, section: &Value) -> Self {
        Self {
            name: name.to_string(),
            settings: Settings::from_json(section["settings"].clone()),
            mapping: section.get("mappings").cloned(),
            aliases: parse_alias_map(&section["aliases"]),
            ..Self::default()
        }
    }

    /// Parse a legacy get-template response.
    pub(crate) fn from_legacy(name: &str, body: &Value) -> Option<Self> {
        let template = body.get(name)?;
        Some(Self {
            index_patterns: strings(&template["index_patterns"]),
            order: template["order"].as_i64(),
            version: template["version"].as_i64(),
            ..Self::with_template_section(name, template)
        })
    }

    /// Parse a get-index-template response.
    pub(crate) fn from_index_template(name: &str, body: &Value) -> Option<Self> {
        let entry = find_named(&body["index_templates"], name)?;
        let template = &entry["index_template"];
        Some(Self {
            index_patterns: strings(&template["index_patterns"]),
            composed_of: strings(&template["composed_of"]),
            priority: template["priority"].as_i64(),
            version: template["version"].as_i64(),
            ..Self::with_template_section(name, &template["template"])
        })
    }

    /// Parse a get-component-template response.
    pub(crate) fn from_component_template(name: &str, body: &Value) -> Option<Self> {
        let entry = find_named(&body["component_templates"], name)?;
        let template = &entry["component_template"];
        Some(Self {
            version: template["version"].as_i64(),
            ..Self::with_template_section(name, &template["template"])
        })
    }
}

fn find_named<'a>(entries: &'a Value, name: &str) -> Option<&'a Value> {
    entries
        .as_array()?
        .iter()
        .find(|entry| entry["name"].as_str() == Some(name))
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

// =============================================================================
// Index information
// =============================================================================

/// Settings, mapping and aliases of a concrete index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInformation {
    /// Index name.
    pub name: String,
    /// Settings.
    pub settings: Settings,
    /// Raw mapping.
    pub mapping: Option<Value>,
    /// Aliases.
    pub aliases: Vec<AliasData>,
}

impl IndexInformation {
    /// Parse a get-index response (`{index: {settings, mappings, aliases}}`).
    pub(crate) fn from_response(body: &Value) -> Vec<Self> {
        body.as_object()
            .map(|indices| {
                indices
                    .iter()
                    .map(|(name, data)| Self {
                        name: name.clone(),
                        settings: Settings::from_json(data["settings"].clone()),
                        mapping: data.get("mappings").cloned(),
                        aliases: parse_alias_map(&data["aliases"]),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Lifecycle operations on the index (or indices) this value is bound to.
///
/// `create*` on an existing index fails with
/// [`IndexExists`](crate::ElasticsearchError::IndexExists); `delete` on a
/// missing one fails with [`IndexNotFound`](crate::ElasticsearchError::IndexNotFound).
#[async_trait]
pub trait IndexOperations: Send + Sync {
    /// Bound index coordinates.
    fn index_coordinates(&self) -> &IndexCoordinates;

    /// Bound entity schema, if any.
    fn schema(&self) -> Option<&IndexSchema>;

    /// Create the index with engine defaults.
    async fn create(&self) -> Result<bool>;

    /// Create the index with `settings`.
    async fn create_with_settings(&self, settings: &Settings) -> Result<bool>;

    /// Create the index with `settings` and `mapping`.
    async fn create_with_settings_and_mapping(
        &self,
        settings: &Settings,
        mapping: &Mapping,
    ) -> Result<bool>;

    /// Delete the index.
    async fn delete(&self) -> Result<bool>;

    /// Whether the index exists.
    async fn exists(&self) -> Result<bool>;

    /// Make recent writes searchable.
    async fn refresh(&self) -> Result<()>;

    /// Replace or extend the mapping.
    async fn put_mapping(&self, mapping: &Mapping) -> Result<bool>;

    /// Current mapping of the index.
    async fn get_mapping(&self) -> Result<Map<String, Value>>;

    /// Current settings, optionally including engine defaults.
    async fn get_settings(&self, include_defaults: bool) -> Result<Settings>;

    /// Apply alias actions.
    async fn alias(&self, actions: &AliasActions) -> Result<bool>;

    /// Aliases with the given names, by index.
    async fn get_aliases(&self, alias_names: &[&str]) -> Result<BTreeMap<String, Vec<AliasData>>>;

    /// Aliases of the given indices, by index.
    async fn get_aliases_for_index(
        &self,
        index_names: &[&str],
    ) -> Result<BTreeMap<String, Vec<AliasData>>>;

    /// Store a legacy template.
    async fn put_template(&self, request: &PutTemplateRequest) -> Result<bool>;

    /// Fetch a legacy template.
    async fn get_template(&self, name: &str) -> Result<Option<TemplateResponse>>;

    /// Whether a legacy template exists.
    async fn exists_template(&self, name: &str) -> Result<bool>;

    /// Delete a legacy template.
    async fn delete_template(&self, name: &str) -> Result<bool>;

    /// Store a composable index template.
    async fn put_index_template(&self, request: &PutIndexTemplateRequest) -> Result<bool>;

    /// Whether a composable index template exists.
    async fn exists_index_template(&self, name: &str) -> Result<bool>;

    /// Fetch a composable index template.
    async fn get_index_template(&self, name: &str) -> Result<Option<TemplateResponse>>;

    /// Delete a composable index template.
    async fn delete_index_template(&self, name: &str) -> Result<bool>;

    /// Store a component template.
    async fn put_component_template(&self, request: &PutComponentTemplateRequest) -> Result<bool>;

    /// Whether a component template exists.
    async fn exists_component_template(&self, name: &str) -> Result<bool>;

    /// Fetch a component template.
    async fn get_component_template(&self, name: &str) -> Result<Option<TemplateResponse>>;

    /// Delete a component template.
    async fn delete_component_template(&self, name: &str) -> Result<bool>;

    /// Settings, mapping and aliases of every index behind `index`.
    async fn get_information(&self, index: &IndexCoordinates) -> Result<Vec<IndexInformation>>;

    /// Mapping of the bound entity, empty without one.
    fn create_mapping(&self) -> Mapping {
        self.schema()
            .and_then(|schema| schema.mapping.clone())
            .unwrap_or_default()
    }

    /// Settings of the bound entity, empty without one.
    fn create_settings(&self) -> Settings {
        self.schema()
            .map(|schema| schema.settings.clone())
            .unwrap_or_default()
    }

    /// Create the index with the bound entity's settings and mapping.
    async fn create_with_mapping(&self) -> Result<bool> {
        let settings = self.create_settings();
        let mapping = self.create_mapping();
        self.create_with_settings_and_mapping(&settings, &mapping)
            .await
    }
}

/// Put the bound entity's mapping on the index.
pub async fn put_entity_mapping<I: IndexOperations + ?Sized>(operations: &I) -> Result<bool> {
    let mapping = operations.create_mapping();
    operations.put_mapping(&mapping).await
}

/// Information on the bound index.
pub async fn get_bound_information<I: IndexOperations + ?Sized>(
    operations: &I,
) -> Result<Vec<IndexInformation>> {
    operations
        .get_information(operations.index_coordinates())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingField;

    #[test]
    fn test_create_body() {
        let body = create_index_body(
            &Settings::new().shards(1),
            Some(&Mapping::new().field("title", MappingField::text())),
        );
        assert_eq!(
            body,
            json!({
                "settings": {"index": {"number_of_shards": 1}},
                "mappings": {"properties": {"title": {"type": "text"}}}
            })
        );
        assert_eq!(create_index_body(&Settings::new(), None), json!({}));
    }

    #[test]
    fn test_alias_actions_json() {
        let actions = AliasActions::new()
            .add(AliasAction::Add(
                AliasActionParameters::new(["books-v2"], ["books"]).write_index(true),
            ))
            .add(AliasAction::Remove(AliasActionParameters::new(["books-v1"], ["books"])))
            .add(AliasAction::RemoveIndex(AliasActionParameters::new(
                ["books-v0"],
                Vec::<String>::new(),
            )));

        assert_eq!(
            actions.to_json(),
            json!({"actions": [
                {"add": {"indices": ["books-v2"], "aliases": ["books"], "is_write_index": true}},
                {"remove": {"indices": ["books-v1"], "aliases": ["books"]}},
                {"remove_index": {"indices": ["books-v0"]}}
            ]})
        );
    }

    #[test]
    fn test_parse_aliases() {
        let body = json!({
            "books-v2": {"aliases": {"books": {"is_write_index": true, "index_routing": "eu"}}},
            "authors": {"aliases": {}}
        });
        let aliases = parse_aliases(&body);
        assert_eq!(aliases["books-v2"][0].alias, "books");
        assert_eq!(aliases["books-v2"][0].is_write_index, Some(true));
        assert_eq!(aliases["books-v2"][0].index_routing.as_deref(), Some("eu"));
        assert!(aliases["authors"].is_empty());
    }

    #[test]
    fn test_template_round_trip_through_engine_shapes() {
        let data = TemplateData {
            settings: Settings::new().shards(1),
            mapping: Some(Mapping::new().field("title", MappingField::text())),
            aliases: vec![AliasData::named("all-books")],
        };

        let legacy = PutTemplateRequest::new("books", vec!["books-*".into()])
            .data(data.clone())
            .order(1);
        let parsed =
            TemplateResponse::from_legacy("books", &json!({"books": legacy.to_json()})).unwrap();
        assert_eq!(parsed.index_patterns, vec!["books-*".to_string()]);
        assert_eq!(parsed.order, Some(1));
        assert_eq!(parsed.aliases[0].alias, "all-books");

        let composable = PutIndexTemplateRequest::new("books", vec!["books-*".into()])
            .data(data.clone())
            .composed_of(vec!["base".into()])
            .priority(10);
        let body = json!({"index_templates": [{"name": "books", "index_template": composable.to_json()}]});
        let parsed = TemplateResponse::from_index_template("books", &body).unwrap();
        assert_eq!(parsed.composed_of, vec!["base".to_string()]);
        assert_eq!(parsed.priority, Some(10));
        assert_eq!(parsed.settings.get("index.number_of_shards"), Some(&json!(1)));

        let component = PutComponentTemplateRequest::new("base", data);
        let body = json!({"component_templates": [{"name": "base", "component_template": component.to_json()}]});
        let parsed = TemplateResponse::from_component_template("base", &body).unwrap();
        assert!(parsed.mapping.is_some());
        assert!(TemplateResponse::from_component_template("other", &body).is_none());
    }

    #[test]
    fn test_index_information() {
        let body = json!({
            "books": {
                "aliases": {"all-books": {}},
                "mappings": {"properties": {"title": {"type": "text"}}},
                "settings": {"index": {"number_of_shards": "1"}}
            }
        });
        let info = IndexInformation::from_response(&body);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "books");
        assert_eq!(info[0].aliases[0].alias, "all-books");
        assert_eq!(info[0].settings.get("index.number_of_shards"), Some(&json!("1")));
    }
}
