//! Index settings and field mappings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Index settings.
///
/// Stored in nested form (`{"index": {"number_of_shards": 1}}`); dotted
/// paths address nested keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap settings returned by the engine.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    /// Set number of shards.
    pub fn shards(self, shards: i32) -> Self {
        self.set("index.number_of_shards", json!(shards))
    }

    /// Set number of replicas.
    pub fn replicas(self, replicas: i32) -> Self {
        self.set("index.number_of_replicas", json!(replicas))
    }

    /// Set refresh interval.
    pub fn refresh_interval(self, interval: impl Into<String>) -> Self {
        self.set("index.refresh_interval", json!(interval.into()))
    }

    /// Set the analysis section.
    pub fn analysis(self, analysis: Value) -> Self {
        self.set("index.analysis", analysis)
    }

    /// Set a value at a dotted path.
    pub fn set(mut self, path: &str, value: Value) -> Self {
        let parts: Vec<&str> = path.split('.').collect();
        insert_path(&mut self.values, &parts, value);
        self
    }

    /// Read a value at a dotted path.
    ///
    /// Falls back to a flat key (`"index.number_of_shards"`) as returned with
    /// `flat_settings`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }

        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Merge another settings object into this one, the other side wins.
    pub fn merge(mut self, other: &Settings) -> Self {
        merge_objects(&mut self.values, &other.values);
        self
    }

    /// Whether no settings are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render as JSON.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

fn insert_path(target: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = target
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

fn merge_objects(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_objects(existing, incoming)
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Field mapping configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    /// Field definitions.
    pub properties: BTreeMap<String, MappingField>,
    /// Dynamic mapping setting.
    pub dynamic: Option<String>,
}

impl Mapping {
    /// Create a new mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, field: MappingField) -> Self {
        self.properties.insert(name.into(), field);
        self
    }

    /// Set dynamic mapping.
    pub fn dynamic(mut self, dynamic: impl Into<String>) -> Self {
        self.dynamic = Some(dynamic.into());
        self
    }

    /// Render as the body of a put-mapping request.
    pub fn to_json(&self) -> Value {
        let mut mapping = Map::new();

        if let Some(dynamic) = &self.dynamic {
            mapping.insert("dynamic".to_string(), json!(dynamic));
        }

        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, field)| (name.clone(), field.to_json()))
            .collect();
        mapping.insert("properties".to_string(), Value::Object(properties));

        Value::Object(mapping)
    }
}

/// Field mapping definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingField {
    /// Field type.
    pub field_type: FieldType,
    /// Analyzer.
    pub analyzer: Option<String>,
    /// Search analyzer.
    pub search_analyzer: Option<String>,
    /// Date format.
    pub format: Option<String>,
    /// Whether to index the field.
    pub index: Option<bool>,
    /// Whether to store the field.
    pub store: Option<bool>,
    /// Null value.
    pub null_value: Option<Value>,
    /// Nested properties (for object/nested types).
    pub properties: Option<BTreeMap<String, MappingField>>,
}

impl MappingField {
    /// Create a field of the given type.
    pub fn of(field_type: FieldType) -> Self {
        Self {
            field_type,
            analyzer: None,
            search_analyzer: None,
            format: None,
            index: None,
            store: None,
            null_value: None,
            properties: None,
        }
    }

    /// Create a new text field.
    pub fn text() -> Self {
        Self::of(FieldType::Text)
    }

    /// Create a new keyword field.
    pub fn keyword() -> Self {
        Self::of(FieldType::Keyword)
    }

    /// Create a new integer field.
    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    /// Create a new long field.
    pub fn long() -> Self {
        Self::of(FieldType::Long)
    }

    /// Create a new double field.
    pub fn double() -> Self {
        Self::of(FieldType::Double)
    }

    /// Create a new boolean field.
    pub fn boolean() -> Self {
        Self::of(FieldType::Boolean)
    }

    /// Create a new date field.
    pub fn date() -> Self {
        Self::of(FieldType::Date)
    }

    /// Create a new object field.
    pub fn object() -> Self {
        Self::of(FieldType::Object)
    }

    /// Create a new nested field.
    pub fn nested() -> Self {
        Self::of(FieldType::Nested)
    }

    /// Set analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// Set search analyzer.
    pub fn search_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.search_analyzer = Some(analyzer.into());
        self
    }

    /// Set date format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Exclude the field from the index.
    pub fn not_indexed(mut self) -> Self {
        self.index = Some(false);
        self
    }

    /// Add nested property.
    pub fn property(mut self, name: impl Into<String>, field: MappingField) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), field);
        self
    }

    fn to_json(&self) -> Value {
        let mut field = Map::new();

        field.insert("type".to_string(), json!(self.field_type.as_str()));

        if let Some(analyzer) = &self.analyzer {
            field.insert("analyzer".to_string(), json!(analyzer));
        }
        if let Some(search_analyzer) = &self.search_analyzer {
            field.insert("search_analyzer".to_string(), json!(search_analyzer));
        }
        if let Some(format) = &self.format {
            field.insert("format".to_string(), json!(format));
        }
        if let Some(index) = self.index {
            field.insert("index".to_string(), json!(index));
        }
        if let Some(store) = self.store {
            field.insert("store".to_string(), json!(store));
        }
        if let Some(null_value) = &self.null_value {
            field.insert("null_value".to_string(), null_value.clone());
        }
        if let Some(properties) = &self.properties {
            let props: Map<String, Value> = properties
                .iter()
                .map(|(name, prop)| (name.clone(), prop.to_json()))
                .collect();
            field.insert("properties".to_string(), Value::Object(props));
        }

        Value::Object(field)
    }
}

/// Field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Full-text searchable field.
    Text,
    /// Exact match keyword field.
    Keyword,
    /// 64-bit integer.
    Long,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    Short,
    /// 8-bit integer.
    Byte,
    /// Double precision float.
    Double,
    /// Single precision float.
    Float,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Binary data.
    Binary,
    /// IP address.
    Ip,
    /// Completion suggester.
    Completion,
    /// Geo point.
    GeoPoint,
    /// Nested object.
    Nested,
    /// Object.
    Object,
    /// Flattened.
    Flattened,
    /// Search-as-you-type.
    SearchAsYouType,
}

impl FieldType {
    fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Binary => "binary",
            FieldType::Ip => "ip",
            FieldType::Completion => "completion",
            FieldType::GeoPoint => "geo_point",
            FieldType::Nested => "nested",
            FieldType::Object => "object",
            FieldType::Flattened => "flattened",
            FieldType::SearchAsYouType => "search_as_you_type",
        }
    }
}
