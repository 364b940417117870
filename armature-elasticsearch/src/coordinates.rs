//! Index coordinates.

use std::fmt;
use std::sync::Arc;

/// Immutable set of one or more index names an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexCoordinates {
    names: Arc<[String]>,
}

impl IndexCoordinates {
    /// Coordinates for a single index.
    pub fn of(name: impl Into<String>) -> Self {
        Self {
            names: Arc::from(vec![name.into()]),
        }
    }

    /// Coordinates for several indices.
    ///
    /// # Panics
    ///
    /// Panics if `names` is empty.
    pub fn of_many<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        assert!(!names.is_empty(), "IndexCoordinates needs at least one index name");
        Self {
            names: Arc::from(names),
        }
    }

    /// All index names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Index names as string slices, ready for the client's `Parts` enums.
    pub fn name_refs(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    /// The first index name.
    pub fn index_name(&self) -> &str {
        &self.names[0]
    }

    /// Comma separated names, as used in request paths.
    pub fn joined(&self) -> String {
        self.names.join(",")
    }

    /// New coordinates with `prefix` prepended to every name.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::of_many(self.names.iter().map(|n| format!("{prefix}{n}")))
    }
}

impl fmt::Display for IndexCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

impl From<&str> for IndexCoordinates {
    fn from(name: &str) -> Self {
        Self::of(name)
    }
}

impl From<String> for IndexCoordinates {
    fn from(name: String) -> Self {
        Self::of(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_index() {
        let index = IndexCoordinates::of("books");
        assert_eq!(index.index_name(), "books");
        assert_eq!(index.names().len(), 1);
        assert_eq!(index.to_string(), "books");
    }

    #[test]
    fn test_many_and_prefix() {
        let index = IndexCoordinates::of_many(["books", "authors"]);
        assert_eq!(index.joined(), "books,authors");
        assert_eq!(index.name_refs(), vec!["books", "authors"]);

        let prefixed = index.with_prefix("dev-");
        assert_eq!(prefixed.names(), &["dev-books".to_string(), "dev-authors".to_string()]);
        // original untouched
        assert_eq!(index.index_name(), "books");
    }

    #[test]
    #[should_panic]
    fn test_empty_panics() {
        let _ = IndexCoordinates::of_many(Vec::<String>::new());
    }
}
