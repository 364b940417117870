//! Paging and sorting.

use crate::error::{ElasticsearchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl Direction {
    /// Direction as sent to the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A single sort order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Property to sort by.
    pub property: String,
    /// Direction.
    pub direction: Direction,
    /// Placement of documents missing the property (`_first`, `_last`).
    pub missing: Option<String>,
}

impl Order {
    /// Ascending order on `property`.
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
            missing: None,
        }
    }

    /// Descending order on `property`.
    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
            missing: None,
        }
    }

    /// Set placement of documents missing the property.
    pub fn missing(mut self, missing: impl Into<String>) -> Self {
        self.missing = Some(missing.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut order = json!({ "order": self.direction.as_str() });
        if let Some(missing) = &self.missing {
            order["missing"] = json!(missing);
        }
        json!({ &self.property: order })
    }
}

/// Sort specification, an ordered list of orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Orders, most significant first.
    pub orders: Vec<Order>,
}

impl Sort {
    /// No sorting.
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sort by a single order.
    pub fn by(order: Order) -> Self {
        Self {
            orders: vec![order],
        }
    }

    /// Append an order.
    pub fn and(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Whether no orders are present.
    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    /// Fail with `InvalidArgument` if any order has an empty property.
    pub fn validate(&self) -> Result<()> {
        if self.orders.iter().any(|o| o.property.trim().is_empty()) {
            return Err(ElasticsearchError::invalid(
                "sort property must not be empty",
            ));
        }
        Ok(())
    }

    /// Render as the `sort` array of a search body.
    pub fn to_json(&self) -> Value {
        Value::Array(self.orders.iter().map(Order::to_json).collect())
    }
}

/// Page request: zero-based page number, page size and sort.
///
/// Deserialization goes through [`Pageable::of_sorted`], so a deserialized
/// request is as valid as a constructed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PageableFields")]
pub struct Pageable {
    page: usize,
    size: usize,
    sort: Sort,
}

#[derive(Deserialize)]
struct PageableFields {
    page: usize,
    size: usize,
    #[serde(default)]
    sort: Sort,
}

impl TryFrom<PageableFields> for Pageable {
    type Error = ElasticsearchError;

    fn try_from(fields: PageableFields) -> Result<Self> {
        Self::of_sorted(fields.page, fields.size, fields.sort)
    }
}

impl Pageable {
    /// Unsorted page request.
    ///
    /// Fails with `InvalidArgument` when `size` is zero.
    pub fn of(page: usize, size: usize) -> Result<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    /// Sorted page request.
    ///
    /// Fails with `InvalidArgument` when `size` is zero, when the offset of
    /// the page does not fit in `usize`, or when the sort is invalid.
    pub fn of_sorted(page: usize, size: usize, sort: Sort) -> Result<Self> {
        let pageable = Self { page, size, sort };
        pageable.validate()?;
        Ok(pageable)
    }

    /// Check the invariants of a page request.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(ElasticsearchError::invalid("page size must be at least 1"));
        }
        if self.page.checked_mul(self.size).is_none() {
            return Err(ElasticsearchError::invalid(format!(
                "page {} of size {} is out of range",
                self.page, self.size
            )));
        }
        self.sort.validate()
    }

    /// Zero-based page number.
    pub fn page_number(&self) -> usize {
        self.page
    }

    /// Page size.
    pub fn page_size(&self) -> usize {
        self.size
    }

    /// Sort.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Offset of the first element.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Request for the following page.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    /// Request for the first page.
    pub fn first(&self) -> Self {
        Self {
            page: 0,
            ..self.clone()
        }
    }

    /// Request for the previous page, or the first page.
    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            ..self.clone()
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// The elements of this page, at most `pageable.page_size()` of them.
    pub content: Vec<T>,
    /// The request this page answers.
    pub pageable: Pageable,
    /// Total number of elements across all pages.
    pub total_elements: u64,
}

impl<T> Page<T> {
    /// Create a page. `content` is truncated to the page size.
    pub fn new(mut content: Vec<T>, pageable: Pageable, total_elements: u64) -> Self {
        content.truncate(pageable.page_size());
        Self {
            content,
            pageable,
            total_elements,
        }
    }

    /// Total number of pages.
    pub fn total_pages(&self) -> u64 {
        match self.pageable.page_size() as u64 {
            0 => 0,
            size => self.total_elements.div_ceil(size),
        }
    }

    /// Number of elements on this page.
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    /// Whether there is a next page.
    pub fn has_next(&self) -> bool {
        (self.pageable.page_number() as u64).saturating_add(1) < self.total_pages()
    }

    /// Whether there is a previous page.
    pub fn has_previous(&self) -> bool {
        self.pageable.page_number() > 0
    }

    /// Whether this page is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Map elements to a different type.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total_elements: self.total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pageable_rejects_zero_size() {
        assert!(matches!(
            Pageable::of(0, 0),
            Err(ElasticsearchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pageable_rejects_offset_overflow() {
        assert!(matches!(
            Pageable::of(usize::MAX / 2, 10),
            Err(ElasticsearchError::InvalidArgument(_))
        ));
        assert!(Pageable::of(usize::MAX, 1).is_ok());
        assert_eq!(Pageable::of(usize::MAX, 1).unwrap().next().offset(), usize::MAX);
    }

    #[test]
    fn test_pageable_deserialize_validates() {
        let zero: std::result::Result<Pageable, _> =
            serde_json::from_value(json!({"page": 0, "size": 0, "sort": {"orders": []}}));
        assert!(zero.is_err());

        let overflow: std::result::Result<Pageable, _> =
            serde_json::from_value(json!({"page": usize::MAX / 2, "size": 10}));
        assert!(overflow.is_err());

        let blank_sort: std::result::Result<Pageable, _> = serde_json::from_value(json!({
            "page": 0,
            "size": 5,
            "sort": {"orders": [{"property": " ", "direction": "asc", "missing": null}]}
        }));
        assert!(blank_sort.is_err());

        let pageable: Pageable = serde_json::from_value(json!({"page": 1, "size": 5})).unwrap();
        assert_eq!(pageable, Pageable::of(1, 5).unwrap());
        assert_eq!(
            serde_json::from_value::<Pageable>(serde_json::to_value(&pageable).unwrap()).unwrap(),
            pageable
        );
    }

    #[test]
    fn test_pageable_navigation() {
        let page = Pageable::of(2, 10).unwrap();
        assert_eq!(page.offset(), 20);
        assert_eq!(page.next().page_number(), 3);
        assert_eq!(page.first().page_number(), 0);
        assert_eq!(page.first().previous_or_first().page_number(), 0);
    }

    #[test]
    fn test_sort_validation() {
        let sort = Sort::by(Order::asc("title")).and(Order::desc(""));
        assert!(sort.validate().is_err());
        assert!(Pageable::of_sorted(0, 5, sort).is_err());
    }

    #[test]
    fn test_sort_json() {
        let sort = Sort::by(Order::desc("year").missing("_last")).and(Order::asc("title"));
        assert_eq!(
            sort.to_json(),
            json!([
                {"year": {"order": "desc", "missing": "_last"}},
                {"title": {"order": "asc"}}
            ])
        );
    }

    #[test]
    fn test_page_metadata() {
        let page = Page::new(vec![1, 2, 3], Pageable::of(0, 3).unwrap(), 7);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let last = Page::new(vec![7], Pageable::of(2, 3).unwrap(), 7);
        assert!(!last.has_next());
        assert!(last.has_previous());
    }

    #[test]
    fn test_page_truncates_to_size() {
        let page = Page::new(vec![1, 2, 3, 4], Pageable::of(0, 2).unwrap(), 4);
        assert_eq!(page.content, vec![1, 2]);
        assert_eq!(page.map(|n| n * 10).content, vec![10, 20]);
    }
}
