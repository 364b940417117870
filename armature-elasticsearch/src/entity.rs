//! Entity metadata.
//!
//! An entity type describes itself once through an [`EntityMetadata`]
//! descriptor: its index, how to read and write its id, version and routing,
//! and the schema used when the index is created automatically.
//!
//! # Example
//!
//! ```rust
//! use armature_elasticsearch::{Entity, EntityMetadata, Mapping, MappingField};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Book {
//!     id: Option<String>,
//!     title: String,
//! }
//!
//! impl Entity for Book {
//!     type Id = String;
//!
//!     fn metadata() -> EntityMetadata<Self> {
//!         EntityMetadata::new("books", "id", |b: &Book| b.id.clone())
//!             .with_id_setter(|b, id| b.id = Some(id))
//!             .with_mapping(Mapping::new().field("title", MappingField::text()))
//!     }
//! }
//! ```

use crate::coordinates::IndexCoordinates;
use crate::mapping::{Mapping, Settings};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// An id value that can be turned into the engine's string id.
pub trait EntityId: Clone + Send + Sync + 'static {
    /// String form sent to the engine.
    fn to_id_string(&self) -> String;
}

impl EntityId for String {
    fn to_id_string(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_entity_id_for_integers {
    ($($ty:ty),*) => {
        $(
            impl EntityId for $ty {
                fn to_id_string(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_entity_id_for_integers!(i16, i32, i64, i128, u16, u32, u64, u128, usize);

/// A type stored as documents in an index.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Id type.
    type Id: EntityId;

    /// Describe the entity. Called once per repository or operations lookup.
    fn metadata() -> EntityMetadata<Self>;
}

/// Versioning scheme for entities carrying a version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionType {
    /// Engine managed versions.
    #[default]
    Internal,
    /// Caller supplied versions, must be greater than the stored one.
    External,
    /// Caller supplied versions, greater than or equal to the stored one.
    ExternalGte,
}

impl VersionType {
    /// Name used in request parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Internal => "internal",
            VersionType::External => "external",
            VersionType::ExternalGte => "external_gte",
        }
    }
}

/// Accessors and index settings of an entity type.
pub struct EntityMetadata<T: Entity> {
    index: IndexCoordinates,
    id_attribute: String,
    id: fn(&T) -> Option<T::Id>,
    set_id: Option<fn(&mut T, String)>,
    version: Option<fn(&T) -> Option<i64>>,
    set_version: Option<fn(&mut T, i64)>,
    version_type: Option<VersionType>,
    routing: Option<fn(&T) -> Option<String>>,
    create_index: bool,
    settings: Settings,
    mapping: Option<Mapping>,
}

impl<T: Entity> EntityMetadata<T> {
    /// Describe an entity stored in `index` whose id lives in `id_attribute`.
    pub fn new(
        index: impl Into<IndexCoordinates>,
        id_attribute: impl Into<String>,
        id: fn(&T) -> Option<T::Id>,
    ) -> Self {
        Self {
            index: index.into(),
            id_attribute: id_attribute.into(),
            id,
            set_id: None,
            version: None,
            set_version: None,
            version_type: None,
            routing: None,
            create_index: true,
            settings: Settings::new(),
            mapping: None,
        }
    }

    /// Write engine generated ids back into saved entities.
    pub fn with_id_setter(mut self, set_id: fn(&mut T, String)) -> Self {
        self.set_id = Some(set_id);
        self
    }

    /// Track a version attribute.
    pub fn with_version(
        mut self,
        version: fn(&T) -> Option<i64>,
        set_version: fn(&mut T, i64),
    ) -> Self {
        self.version = Some(version);
        self.set_version = Some(set_version);
        self
    }

    /// Set the versioning scheme.
    pub fn with_version_type(mut self, version_type: VersionType) -> Self {
        self.version_type = Some(version_type);
        self
    }

    /// Derive a routing value from each entity.
    pub fn with_routing(mut self, routing: fn(&T) -> Option<String>) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Whether repositories create the index when it is missing. Default `true`.
    pub fn create_index(mut self, create: bool) -> Self {
        self.create_index = create;
        self
    }

    /// Settings used when creating the index.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Mapping used when creating the index.
    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Index settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Index mapping, if declared.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }
}

impl<T: Entity> fmt::Debug for EntityMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("index", &self.index)
            .field("id_attribute", &self.id_attribute)
            .field("versioned", &self.version.is_some())
            .field("version_type", &self.version_type)
            .field("create_index", &self.create_index)
            .finish_non_exhaustive()
    }
}

/// Entity metadata resolved once and shared.
pub struct EntityInformation<T: Entity> {
    metadata: Arc<EntityMetadata<T>>,
}

impl<T: Entity> Clone for EntityInformation<T> {
    fn clone(&self) -> Self {
        Self {
            metadata: Arc::clone(&self.metadata),
        }
    }
}

impl<T: Entity> fmt::Debug for EntityInformation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.metadata.fmt(f)
    }
}

impl<T: Entity> Default for EntityInformation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityInformation<T> {
    /// Resolve the metadata of `T`.
    pub fn new() -> Self {
        Self::from_metadata(T::metadata())
    }

    /// Wrap an explicit descriptor.
    pub fn from_metadata(metadata: EntityMetadata<T>) -> Self {
        Self {
            metadata: Arc::new(metadata),
        }
    }

    /// Id of `entity`, if it has one.
    pub fn id(&self, entity: &T) -> Option<T::Id> {
        (self.metadata.id)(entity)
    }

    /// Write a generated id into `entity`. Returns `false` without a setter.
    pub fn set_id(&self, entity: &mut T, id: String) -> bool {
        match self.metadata.set_id {
            Some(set_id) => {
                set_id(entity, id);
                true
            }
            None => false,
        }
    }

    /// Name of the id attribute.
    pub fn id_attribute(&self) -> &str {
        &self.metadata.id_attribute
    }

    /// Index of the entity type, without any configured prefix.
    pub fn index_coordinates(&self) -> &IndexCoordinates {
        &self.metadata.index
    }

    /// Version of `entity`, if versioned.
    pub fn version(&self, entity: &T) -> Option<i64> {
        self.metadata.version.and_then(|version| version(entity))
    }

    /// Write a new version into `entity`.
    pub fn set_version(&self, entity: &mut T, version: i64) {
        if let Some(set_version) = self.metadata.set_version {
            set_version(entity, version);
        }
    }

    /// Fill in the engine-side id and version of a loaded document. The id
    /// is only written when the source did not carry one.
    pub fn hydrate(&self, entity: &mut T, id: &str, version: Option<i64>) {
        if self.id(entity).is_none() {
            self.set_id(entity, id.to_string());
        }
        if let Some(version) = version {
            self.set_version(entity, version);
        }
    }

    /// Versioning scheme, if declared.
    pub fn version_type(&self) -> Option<VersionType> {
        self.metadata.version_type
    }

    /// Routing of `entity`, if declared.
    pub fn routing(&self, entity: &T) -> Option<String> {
        self.metadata.routing.and_then(|routing| routing(entity))
    }

    /// Whether the index is created when missing.
    pub fn create_index(&self) -> bool {
        self.metadata.create_index
    }

    /// Index settings.
    pub fn settings(&self) -> &Settings {
        self.metadata.settings()
    }

    /// Index mapping, if declared.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.metadata.mapping()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mapping::MappingField;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Book {
        pub id: Option<String>,
        pub title: String,
        pub genre: String,
        #[serde(default)]
        pub version: Option<i64>,
    }

    impl Book {
        pub(crate) fn new(id: &str, title: &str, genre: &str) -> Self {
            Self {
                id: Some(id.to_string()),
                title: title.to_string(),
                genre: genre.to_string(),
                version: None,
            }
        }
    }

    impl Entity for Book {
        type Id = String;

        fn metadata() -> EntityMetadata<Self> {
            EntityMetadata::new("books", "id", |b: &Book| b.id.clone())
                .with_id_setter(|b, id| b.id = Some(id))
                .with_version(|b| b.version, |b, v| b.version = Some(v))
                .with_routing(|b| Some(b.genre.clone()))
                .with_settings(Settings::new().shards(1))
                .with_mapping(
                    Mapping::new()
                        .field("title", MappingField::text())
                        .field("genre", MappingField::keyword()),
                )
        }
    }

    #[test]
    fn test_accessors() {
        let info = EntityInformation::<Book>::new();
        let mut book = Book::new("1", "Dune", "scifi");

        assert_eq!(info.id(&book), Some("1".to_string()));
        assert_eq!(info.id_attribute(), "id");
        assert_eq!(info.index_coordinates().index_name(), "books");
        assert_eq!(info.routing(&book), Some("scifi".to_string()));
        assert!(info.create_index());
        assert!(info.mapping().is_some());

        assert_eq!(info.version(&book), None);
        info.set_version(&mut book, 3);
        assert_eq!(info.version(&book), Some(3));

        book.id = None;
        assert!(info.set_id(&mut book, "generated".into()));
        assert_eq!(book.id.as_deref(), Some("generated"));
    }

    #[test]
    fn test_hydrate_keeps_source_id() {
        let info = EntityInformation::<Book>::new();

        let mut loaded = Book::new("1", "Dune", "scifi");
        info.hydrate(&mut loaded, "other", Some(2));
        assert_eq!(loaded.id.as_deref(), Some("1"));
        assert_eq!(loaded.version, Some(2));

        loaded.id = None;
        info.hydrate(&mut loaded, "7", None);
        assert_eq!(loaded.id.as_deref(), Some("7"));
        assert_eq!(loaded.version, Some(2));
    }

    #[test]
    fn test_integer_ids() {
        assert_eq!(42u64.to_id_string(), "42");
        assert_eq!((-7i32).to_id_string(), "-7");
        assert_eq!("abc".to_string().to_id_string(), "abc");
    }

    #[test]
    fn test_version_type_names() {
        assert_eq!(VersionType::default().as_str(), "internal");
        assert_eq!(VersionType::ExternalGte.as_str(), "external_gte");
    }
}
