//! Entity repository.
//!
//! [`SimpleElasticsearchRepository`] binds an [`Entity`] type to its index
//! and translates repository calls into queries on an
//! [`ElasticsearchOperations`] implementation.
//!
//! When the operations carry no refresh policy, every write is followed by
//! an explicit index refresh so that it is visible to the next search.

use crate::coordinates::IndexCoordinates;
use crate::entity::{Entity, EntityInformation};
use crate::error::{ElasticsearchError, Result};
use crate::hits::{SearchHits, search_page_for};
use crate::index::IndexOperations;
use crate::operations::ElasticsearchOperations;
use crate::paging::{Page, Pageable, Sort};
use crate::query::{MoreLikeThisQuery, Query};
use async_trait::async_trait;
use tracing::{debug, info};

/// CRUD, paging and similarity search for one entity type.
#[async_trait]
pub trait ElasticsearchRepository<T: Entity>: Send + Sync {
    /// Entity with `id`, `None` when absent.
    async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>>;

    /// Whether an entity with `id` exists.
    async fn exists_by_id(&self, id: &T::Id) -> Result<bool>;

    /// Every entity of the index.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Every entity of the index, sorted.
    async fn find_all_sorted(&self, sort: &Sort) -> Result<Vec<T>>;

    /// One page of entities.
    async fn find_all_page(&self, pageable: &Pageable) -> Result<Page<T>>;

    /// Entities with the given ids. Absent ids are skipped.
    async fn find_all_by_id(&self, ids: &[T::Id]) -> Result<Vec<T>>;

    /// Number of entities in the index.
    async fn count(&self) -> Result<u64>;

    /// Store `entity`, returning it with a generated id and new version.
    async fn save(&self, entity: T) -> Result<T>;

    /// Store all entities in one bulk request.
    async fn save_all(&self, entities: Vec<T>) -> Result<Vec<T>>;

    /// Entities similar to `entity`, compared on `fields` (all fields when `None`).
    async fn search_similar(
        &self,
        entity: &T,
        fields: Option<&[&str]>,
        pageable: &Pageable,
    ) -> Result<Page<T>>;

    /// Delete the entity with `id`.
    async fn delete_by_id(&self, id: &T::Id) -> Result<()>;

    /// Delete `entity`. Does nothing when it has no id.
    async fn delete(&self, entity: &T) -> Result<()>;

    /// Delete the entities with the given ids.
    async fn delete_all_by_id(&self, ids: &[T::Id]) -> Result<()>;

    /// Delete the given entities.
    async fn delete_all_entities(&self, entities: &[T]) -> Result<()>;

    /// Delete every entity of the index.
    async fn delete_all(&self) -> Result<()>;
}

/// Repository over an [`ElasticsearchOperations`] implementation.
pub struct SimpleElasticsearchRepository<T, O>
where
    T: Entity,
    O: ElasticsearchOperations,
{
    operations: O,
    index_operations: O::IndexOps,
    entity_information: EntityInformation<T>,
    index: IndexCoordinates,
}

impl<T, O> SimpleElasticsearchRepository<T, O>
where
    T: Entity,
    O: ElasticsearchOperations,
{
    /// Bind `T` to its index, creating the index with the entity's settings
    /// and mapping when the entity asks for it and it does not exist yet.
    pub async fn new(operations: O) -> Result<Self> {
        let entity_information = EntityInformation::<T>::new();
        let index = operations.index_coordinates_for::<T>();
        let index_operations = operations.index_ops_for::<T>();

        let repository = Self {
            operations,
            index_operations,
            entity_information,
            index,
        };

        if repository.entity_information.create_index() {
            repository.create_index_if_absent().await?;
        }

        Ok(repository)
    }

    /// The operations this repository delegates to.
    pub fn operations(&self) -> &O {
        &self.operations
    }

    /// Index operations bound to the entity index.
    pub fn index_operations(&self) -> &O::IndexOps {
        &self.index_operations
    }

    /// Metadata of the entity type.
    pub fn entity_information(&self) -> &EntityInformation<T> {
        &self.entity_information
    }

    /// Index the repository reads and writes.
    pub fn index_coordinates(&self) -> &IndexCoordinates {
        &self.index
    }

    async fn create_index_if_absent(&self) -> Result<()> {
        if self.index_operations.exists().await? {
            return Ok(());
        }

        match self.index_operations.create_with_mapping().await {
            Ok(_) => {
                info!(index = %self.index, "created entity index");
                Ok(())
            }
            // another instance created it between the check and the create
            Err(e) if e.is_index_exists() => {
                debug!(index = %self.index, "entity index already created");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn string_id(&self, id: &T::Id) -> Result<String> {
        let id = self.operations.convert_id(id);
        if id.trim().is_empty() {
            return Err(ElasticsearchError::invalid("id must not be blank"));
        }
        Ok(id)
    }

    fn string_ids(&self, ids: &[T::Id]) -> Result<Vec<String>> {
        ids.iter().map(|id| self.string_id(id)).collect()
    }

    async fn refresh_if_needed(&self) -> Result<()> {
        if self.operations.refresh_policy().is_none() {
            self.index_operations.refresh().await?;
        }
        Ok(())
    }

    async fn find_all_with(&self, sort: Option<&Sort>) -> Result<Vec<T>> {
        let total = self.count().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let size = usize::try_from(total).unwrap_or(usize::MAX).max(1);
        let pageable = match sort {
            Some(sort) => Pageable::of_sorted(0, size, sort.clone())?,
            None => Pageable::of(0, size)?,
        };

        let query = Query::find_all().with_pageable(pageable);
        let hits: SearchHits<T> = self.operations.search(&query, &self.index).await?;
        Ok(hits.into_contents())
    }

    async fn delete_ids(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!(index = %self.index, count = ids.len(), "deleting by ids");
        self.operations
            .delete_by_query(&Query::ids(ids), &self.index)
            .await?;
        self.refresh_if_needed().await
    }
}

impl<T, O> Clone for SimpleElasticsearchRepository<T, O>
where
    T: Entity,
    O: ElasticsearchOperations,
    O::IndexOps: Clone,
{
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
            index_operations: self.index_operations.clone(),
            entity_information: self.entity_information.clone(),
            index: self.index.clone(),
        }
    }
}

#[async_trait]
impl<T, O> ElasticsearchRepository<T> for SimpleElasticsearchRepository<T, O>
where
    T: Entity,
    O: ElasticsearchOperations,
{
    async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>> {
        let id = self.string_id(id)?;
        self.operations.get(&id, &self.index).await
    }

    async fn exists_by_id(&self, id: &T::Id) -> Result<bool> {
        let id = self.string_id(id)?;
        self.operations.exists(&id, &self.index).await
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        self.find_all_with(None).await
    }

    async fn find_all_sorted(&self, sort: &Sort) -> Result<Vec<T>> {
        sort.validate()?;
        self.find_all_with(Some(sort)).await
    }

    async fn find_all_page(&self, pageable: &Pageable) -> Result<Page<T>> {
        pageable.validate()?;

        let query = Query::find_all().with_pageable(pageable.clone());
        let hits: SearchHits<T> = self.operations.search(&query, &self.index).await?;
        Ok(search_page_for(hits, pageable.clone()).into_page())
    }

    async fn find_all_by_id(&self, ids: &[T::Id]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::ids(self.string_ids(ids)?);
        let hits: SearchHits<T> = self.operations.search(&query, &self.index).await?;
        Ok(hits.into_contents())
    }

    async fn count(&self) -> Result<u64> {
        let query = Query::find_all().with_max_results(0);
        self.operations.count(&query, &self.index).await
    }

    async fn save(&self, entity: T) -> Result<T> {
        let saved = self.operations.save(entity, &self.index).await?;
        self.refresh_if_needed().await?;
        Ok(saved)
    }

    async fn save_all(&self, entities: Vec<T>) -> Result<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }

        let saved = self.operations.save_all(entities, &self.index).await?;
        self.refresh_if_needed().await?;
        Ok(saved)
    }

    async fn search_similar(
        &self,
        entity: &T,
        fields: Option<&[&str]>,
        pageable: &Pageable,
    ) -> Result<Page<T>> {
        pageable.validate()?;
        let id = match self.entity_information.id(entity) {
            Some(id) => self.string_id(&id)?,
            None => {
                return Err(ElasticsearchError::invalid(
                    "entity must have an id for a more-like-this search",
                ));
            }
        };

        let mut query = MoreLikeThisQuery::new(id).with_pageable(pageable.clone());
        if let Some(fields) = fields {
            query = query.with_fields(fields.iter().map(|f| f.to_string()).collect());
        }

        let hits: SearchHits<T> = self
            .operations
            .search_more_like_this(&query, &self.index)
            .await?;
        Ok(search_page_for(hits, pageable.clone()).into_page())
    }

    async fn delete_by_id(&self, id: &T::Id) -> Result<()> {
        let id = self.string_id(id)?;
        self.operations.delete(&id, &self.index).await?;
        self.refresh_if_needed().await
    }

    async fn delete(&self, entity: &T) -> Result<()> {
        match self.entity_information.id(entity) {
            Some(id) => self.delete_by_id(&id).await,
            None => Ok(()),
        }
    }

    async fn delete_all_by_id(&self, ids: &[T::Id]) -> Result<()> {
        let ids = self.string_ids(ids)?;
        self.delete_ids(ids).await
    }

    async fn delete_all_entities(&self, entities: &[T]) -> Result<()> {
        let ids: Vec<T::Id> = entities
            .iter()
            .filter_map(|entity| self.entity_information.id(entity))
            .collect();
        self.delete_all_by_id(&ids).await
    }

    async fn delete_all(&self) -> Result<()> {
        debug!(index = %self.index, "deleting all documents");
        self.operations
            .delete_by_query(&Query::find_all(), &self.index)
            .await?;
        self.refresh_if_needed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::Book;
    use crate::mock::InMemoryOperations;
    use crate::operations::RefreshPolicy;
    use crate::paging::Order;

    async fn repository(
        operations: &InMemoryOperations,
    ) -> SimpleElasticsearchRepository<Book, InMemoryOperations> {
        SimpleElasticsearchRepository::new(operations.clone())
            .await
            .unwrap()
    }

    fn books() -> Vec<Book> {
        vec![
            Book::new("a", "Dune", "scifi"),
            Book::new("b", "Emma", "classic"),
            Book::new("c", "Hyperion", "scifi"),
        ]
    }

    #[tokio::test]
    async fn test_new_creates_index_once() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        assert!(repo.index_operations().exists().await.unwrap());
        assert_eq!(operations.call_count("create_index"), 1);

        let _again = repository(&operations).await;
        assert_eq!(operations.call_count("create_index"), 1);
    }

    #[tokio::test]
    async fn test_save_then_find() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;

        let saved = repo.save(Book::new("a", "Dune", "scifi")).await.unwrap();
        assert_eq!(saved.version, Some(1));

        let found = repo.find_by_id(&"a".to_string()).await.unwrap();
        assert_eq!(found.map(|b| b.title), Some("Dune".to_string()));
        assert_eq!(repo.find_by_id(&"zzz".to_string()).await.unwrap(), None);
        assert!(repo.exists_by_id(&"a".to_string()).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_writes_generated_id_back() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;

        let mut book = Book::new("x", "Solaris", "scifi");
        book.id = None;
        let saved = repo.save(book).await.unwrap();

        let id = saved.id.clone().unwrap();
        assert!(!id.is_empty());
        assert!(repo.find_by_id(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_follows_policy() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        repo.save(Book::new("a", "Dune", "scifi")).await.unwrap();
        assert_eq!(operations.call_count("refresh"), 1);

        let operations = InMemoryOperations::new().with_refresh_policy(RefreshPolicy::Immediate);
        let repo = repository(&operations).await;
        repo.save(Book::new("a", "Dune", "scifi")).await.unwrap();
        assert_eq!(operations.call_count("refresh"), 0);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_and_delete_all() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        assert_eq!(repo.count().await.unwrap(), 0);

        repo.save_all(books()).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 3);

        repo.delete_all().await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_all_skips_search_when_empty() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;

        assert!(repo.find_all().await.unwrap().is_empty());
        assert_eq!(operations.call_count("count"), 1);
        assert_eq!(operations.call_count("search"), 0);

        repo.save_all(books()).await.unwrap();
        let sorted = repo
            .find_all_sorted(&Sort::by(Order::desc("title")))
            .await
            .unwrap();
        let titles: Vec<_> = sorted.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Hyperion", "Emma", "Dune"]);
    }

    #[tokio::test]
    async fn test_find_all_page() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        repo.save_all(books()).await.unwrap();

        let pageable = Pageable::of_sorted(1, 2, Sort::by(Order::asc("title"))).unwrap();
        let page = repo.find_all_page(&pageable).await.unwrap();

        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].title, "Hyperion");
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_find_all_page_bounds() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        repo.save_all(books()).await.unwrap();
        operations.clear_calls();

        let zero: std::result::Result<Pageable, _> =
            serde_json::from_value(serde_json::json!({"page": 0, "size": 0}));
        assert!(zero.is_err());

        let first = Pageable::of(0, 2).unwrap();
        let page = repo.find_all_page(&first).await.unwrap();
        assert_eq!(page.total_pages(), 2);
        assert!(page.has_next());

        let far = Pageable::of(usize::MAX, 1).unwrap();
        let page = repo.find_all_page(&far).await.unwrap();
        assert!(page.is_empty());
        assert!(!page.has_next());

        assert_eq!(operations.call_count("search"), 2);
    }

    #[tokio::test]
    async fn test_find_all_by_id() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        repo.save_all(books()).await.unwrap();

        let found = repo
            .find_all_by_id(&["a".to_string(), "c".to_string(), "missing".to_string()])
            .await
            .unwrap();
        let mut ids: Vec<_> = found.into_iter().filter_map(|b| b.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c"]);

        operations.clear_calls();
        assert!(repo.find_all_by_id(&[]).await.unwrap().is_empty());
        assert!(operations.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_variants() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        let saved = repo.save_all(books()).await.unwrap();

        repo.delete(&saved[0]).await.unwrap();
        assert!(!repo.exists_by_id(&"a".to_string()).await.unwrap());

        repo.delete_all_entities(&saved[1..2]).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.delete_by_id(&"c".to_string()).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);

        operations.clear_calls();
        repo.delete_all_by_id(&[]).await.unwrap();
        let mut without_id = Book::new("z", "Untitled", "none");
        without_id.id = None;
        repo.delete(&without_id).await.unwrap();
        assert!(operations.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_fail_before_engine_call() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        operations.clear_calls();

        assert!(matches!(
            repo.find_by_id(&"  ".to_string()).await,
            Err(ElasticsearchError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.find_all_sorted(&Sort::by(Order::asc(""))).await,
            Err(ElasticsearchError::InvalidArgument(_))
        ));

        let mut without_id = Book::new("z", "Untitled", "none");
        without_id.id = None;
        let pageable = Pageable::of(0, 10).unwrap();
        assert!(matches!(
            repo.search_similar(&without_id, None, &pageable).await,
            Err(ElasticsearchError::InvalidArgument(_))
        ));

        assert!(operations.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_similar() {
        let operations = InMemoryOperations::new();
        let repo = repository(&operations).await;
        repo.save_all(books()).await.unwrap();

        let seed = Book::new("a", "Dune", "scifi");
        let page = repo
            .search_similar(&seed, Some(&["genre"]), &Pageable::of(0, 10).unwrap())
            .await
            .unwrap();

        let ids: Vec<_> = page.content.into_iter().filter_map(|b| b.id).collect();
        assert_eq!(ids, vec!["c"]);
    }
}
