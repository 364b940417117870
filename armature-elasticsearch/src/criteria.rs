//! Query clauses rendered to the engine's query DSL.

use crate::coordinates::IndexCoordinates;
use serde_json::{Map, Value, json};

/// A query clause, the `query` part of a search body.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    /// Match all documents.
    MatchAll,
    /// Full-text match.
    Match {
        /// Field to search.
        field: String,
        /// Search text.
        text: String,
        /// Operator (`and`/`or`).
        operator: Option<String>,
        /// Fuzziness for typo tolerance.
        fuzziness: Option<String>,
    },
    /// Exact term.
    Term {
        /// Field name.
        field: String,
        /// Exact value.
        value: Value,
    },
    /// Any of several exact terms.
    Terms {
        /// Field name.
        field: String,
        /// Values to match.
        values: Vec<Value>,
    },
    /// Numeric or date range.
    Range(RangeClause),
    /// Boolean combination.
    Bool(BoolClause),
    /// Lucene query string.
    QueryString {
        /// Query string.
        query: String,
        /// Fields to search, all fields when empty.
        fields: Vec<String>,
    },
    /// Prefix match.
    Prefix {
        /// Field name.
        field: String,
        /// Prefix value.
        value: String,
    },
    /// Wildcard pattern.
    Wildcard {
        /// Field name.
        field: String,
        /// Pattern.
        pattern: String,
    },
    /// Field presence.
    Exists {
        /// Field name.
        field: String,
    },
    /// Query on a nested object path.
    Nested {
        /// Nested path.
        path: String,
        /// Inner clause.
        query: Box<QueryClause>,
        /// Score mode.
        score_mode: Option<String>,
    },
    /// Documents by id.
    Ids(Vec<String>),
    /// Documents similar to a seed document.
    MoreLikeThis(MoreLikeThisClause),
    /// Raw JSON clause.
    Raw(Value),
}

impl QueryClause {
    /// Full-text match clause.
    pub fn matching(field: impl Into<String>, text: impl Into<String>) -> Self {
        QueryClause::Match {
            field: field.into(),
            text: text.into(),
            operator: None,
            fuzziness: None,
        }
    }

    /// Exact term clause.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        QueryClause::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Terms clause.
    pub fn terms<V: Into<Value>>(field: impl Into<String>, values: Vec<V>) -> Self {
        QueryClause::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Query string clause.
    pub fn query_string(query: impl Into<String>) -> Self {
        QueryClause::QueryString {
            query: query.into(),
            fields: Vec::new(),
        }
    }

    /// Prefix clause.
    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        QueryClause::Prefix {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wildcard clause.
    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        QueryClause::Wildcard {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Exists clause.
    pub fn exists(field: impl Into<String>) -> Self {
        QueryClause::Exists {
            field: field.into(),
        }
    }

    /// Nested clause.
    pub fn nested(path: impl Into<String>, query: QueryClause) -> Self {
        QueryClause::Nested {
            path: path.into(),
            query: Box::new(query),
            score_mode: None,
        }
    }

    /// Ids clause.
    pub fn ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        QueryClause::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Render the clause as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            QueryClause::MatchAll => json!({ "match_all": {} }),
            QueryClause::Match {
                field,
                text,
                operator,
                fuzziness,
            } => {
                let mut body = json!({ "query": text });
                if let Some(op) = operator {
                    body["operator"] = json!(op);
                }
                if let Some(fuzz) = fuzziness {
                    body["fuzziness"] = json!(fuzz);
                }
                json!({ "match": { field: body } })
            }
            QueryClause::Term { field, value } => json!({ "term": { field: value } }),
            QueryClause::Terms { field, values } => json!({ "terms": { field: values } }),
            QueryClause::Range(range) => range.to_json(),
            QueryClause::Bool(bool_clause) => bool_clause.to_json(),
            QueryClause::QueryString { query, fields } => {
                let mut body = json!({ "query": query });
                if !fields.is_empty() {
                    body["fields"] = json!(fields);
                }
                json!({ "query_string": body })
            }
            QueryClause::Prefix { field, value } => json!({ "prefix": { field: value } }),
            QueryClause::Wildcard { field, pattern } => {
                json!({ "wildcard": { field: pattern } })
            }
            QueryClause::Exists { field } => json!({ "exists": { "field": field } }),
            QueryClause::Nested {
                path,
                query,
                score_mode,
            } => {
                let mut body = json!({ "path": path, "query": query.to_json() });
                if let Some(mode) = score_mode {
                    body["score_mode"] = json!(mode);
                }
                json!({ "nested": body })
            }
            QueryClause::Ids(ids) => json!({ "ids": { "values": ids } }),
            QueryClause::MoreLikeThis(mlt) => mlt.to_json(),
            QueryClause::Raw(value) => value.clone(),
        }
    }
}

/// Range clause.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeClause {
    /// Field name.
    pub field: String,
    bounds: Map<String, Value>,
}

impl RangeClause {
    /// Create an unbounded range on `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bounds: Map::new(),
        }
    }

    /// Greater than.
    pub fn gt(self, value: impl Into<Value>) -> Self {
        self.bound("gt", value.into())
    }

    /// Greater than or equal.
    pub fn gte(self, value: impl Into<Value>) -> Self {
        self.bound("gte", value.into())
    }

    /// Less than.
    pub fn lt(self, value: impl Into<Value>) -> Self {
        self.bound("lt", value.into())
    }

    /// Less than or equal.
    pub fn lte(self, value: impl Into<Value>) -> Self {
        self.bound("lte", value.into())
    }

    /// Date format for date fields.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.bound("format", json!(format.into()))
    }

    /// Wrap into a clause.
    pub fn build(self) -> QueryClause {
        QueryClause::Range(self)
    }

    /// Bounds by operator (`gt`, `gte`, `lt`, `lte`, `format`).
    pub fn bounds(&self) -> &Map<String, Value> {
        &self.bounds
    }

    fn bound(mut self, key: &str, value: Value) -> Self {
        self.bounds.insert(key.to_string(), value);
        self
    }

    fn to_json(&self) -> Value {
        json!({ "range": { &self.field: self.bounds } })
    }
}

/// Boolean combination of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolClause {
    /// Must match (AND).
    pub must: Vec<QueryClause>,
    /// Should match (OR).
    pub should: Vec<QueryClause>,
    /// Must not match (NOT).
    pub must_not: Vec<QueryClause>,
    /// Filter (non-scoring).
    pub filter: Vec<QueryClause>,
    /// Minimum should match.
    pub minimum_should_match: Option<i32>,
}

impl BoolClause {
    /// Create an empty bool clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must clause.
    pub fn must(mut self, clause: QueryClause) -> Self {
        self.must.push(clause);
        self
    }

    /// Add a should clause.
    pub fn should(mut self, clause: QueryClause) -> Self {
        self.should.push(clause);
        self
    }

    /// Add a must_not clause.
    pub fn must_not(mut self, clause: QueryClause) -> Self {
        self.must_not.push(clause);
        self
    }

    /// Add a filter clause.
    pub fn filter(mut self, clause: QueryClause) -> Self {
        self.filter.push(clause);
        self
    }

    /// Set minimum should match.
    pub fn minimum_should_match(mut self, min: i32) -> Self {
        self.minimum_should_match = Some(min);
        self
    }

    /// Wrap into a clause.
    pub fn build(self) -> QueryClause {
        QueryClause::Bool(self)
    }

    fn to_json(&self) -> Value {
        let mut body = Map::new();

        for (key, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
            ("filter", &self.filter),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(QueryClause::to_json).collect()),
                );
            }
        }
        if let Some(min) = self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), json!(min));
        }

        json!({ "bool": body })
    }
}

/// More-like-this clause seeded by a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThisClause {
    /// Fields to compare, all fields when empty.
    pub fields: Vec<String>,
    /// Index holding the seed document.
    pub index: String,
    /// Seed document id.
    pub id: String,
    /// Term selection parameters (`min_term_freq`, `max_query_terms`, ...).
    pub parameters: Map<String, Value>,
}

impl MoreLikeThisClause {
    /// Create a clause seeded by `id` in the first index of `index`.
    pub fn new(index: &IndexCoordinates, id: impl Into<String>) -> Self {
        Self {
            fields: Vec::new(),
            index: index.index_name().to_string(),
            id: id.into(),
            parameters: Map::new(),
        }
    }

    /// Restrict the compared fields.
    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Set a tuning parameter.
    pub fn parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut body = self.parameters.clone();
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), json!(self.fields));
        }
        body.insert(
            "like".to_string(),
            json!([{ "_index": self.index, "_id": self.id }]),
        );
        json!({ "more_like_this": body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_clauses() {
        assert_eq!(QueryClause::MatchAll.to_json(), json!({"match_all": {}}));
        assert_eq!(
            QueryClause::term("status", "active").to_json(),
            json!({"term": {"status": "active"}})
        );
        assert_eq!(
            QueryClause::terms("tag", vec!["a", "b"]).to_json(),
            json!({"terms": {"tag": ["a", "b"]}})
        );
        assert_eq!(
            QueryClause::ids(["1", "3"]).to_json(),
            json!({"ids": {"values": ["1", "3"]}})
        );
    }

    #[test]
    fn test_match_with_options() {
        let clause = QueryClause::Match {
            field: "title".into(),
            text: "rust book".into(),
            operator: Some("and".into()),
            fuzziness: None,
        };
        assert_eq!(
            clause.to_json(),
            json!({"match": {"title": {"query": "rust book", "operator": "and"}}})
        );
    }

    #[test]
    fn test_range_and_bool() {
        let clause = BoolClause::new()
            .must(QueryClause::matching("title", "rust"))
            .filter(RangeClause::new("year").gte(2015).lt(2024).build())
            .minimum_should_match(1)
            .build();

        assert_eq!(
            clause.to_json(),
            json!({
                "bool": {
                    "must": [{"match": {"title": {"query": "rust"}}}],
                    "filter": [{"range": {"year": {"gte": 2015, "lt": 2024}}}],
                    "minimum_should_match": 1
                }
            })
        );
    }

    #[test]
    fn test_more_like_this() {
        let clause = MoreLikeThisClause::new(&IndexCoordinates::of("books"), "42")
            .fields(vec!["title".into()])
            .parameter("min_term_freq", 1);

        assert_eq!(
            QueryClause::MoreLikeThis(clause).to_json(),
            json!({
                "more_like_this": {
                    "min_term_freq": 1,
                    "fields": ["title"],
                    "like": [{"_index": "books", "_id": "42"}]
                }
            })
        );
    }
}
