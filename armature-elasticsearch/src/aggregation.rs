//! Aggregation requests and results.

use serde_json::{Map, Value, json};

/// Single-value metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Average.
    Avg,
    /// Sum.
    Sum,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Unique count.
    Cardinality,
    /// Document count with the field present.
    ValueCount,
}

impl Metric {
    fn as_str(&self) -> &'static str {
        match self {
            Metric::Avg => "avg",
            Metric::Sum => "sum",
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Cardinality => "cardinality",
            Metric::ValueCount => "value_count",
        }
    }
}

/// Aggregation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Bucket per distinct term.
    Terms {
        /// Field to aggregate on.
        field: String,
        /// Maximum number of buckets.
        size: Option<usize>,
    },
    /// Date histogram.
    DateHistogram {
        /// Date field.
        field: String,
        /// Calendar interval (`day`, `month`, ...).
        calendar_interval: String,
    },
    /// Numeric histogram.
    Histogram {
        /// Field to aggregate on.
        field: String,
        /// Bucket width.
        interval: f64,
    },
    /// Explicit ranges.
    Range {
        /// Field to aggregate on.
        field: String,
        /// Ranges.
        ranges: Vec<RangeBucket>,
    },
    /// Single-value metric.
    Metric {
        /// Metric kind.
        metric: Metric,
        /// Field.
        field: String,
    },
}

impl Aggregation {
    /// Terms aggregation.
    pub fn terms(field: impl Into<String>) -> Self {
        Aggregation::Terms {
            field: field.into(),
            size: None,
        }
    }

    /// Metric aggregation.
    pub fn metric(metric: Metric, field: impl Into<String>) -> Self {
        Aggregation::Metric {
            metric,
            field: field.into(),
        }
    }

    /// Render as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => {
                let mut terms = json!({ "field": field });
                if let Some(size) = size {
                    terms["size"] = json!(size);
                }
                json!({ "terms": terms })
            }
            Aggregation::DateHistogram {
                field,
                calendar_interval,
            } => json!({
                "date_histogram": { "field": field, "calendar_interval": calendar_interval }
            }),
            Aggregation::Histogram { field, interval } => {
                json!({ "histogram": { "field": field, "interval": interval } })
            }
            Aggregation::Range { field, ranges } => {
                let ranges: Vec<Value> = ranges.iter().map(RangeBucket::to_json).collect();
                json!({ "range": { "field": field, "ranges": ranges } })
            }
            Aggregation::Metric { metric, field } => {
                json!({ metric.as_str(): { "field": field } })
            }
        }
    }
}

/// Range bucket definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBucket {
    /// Optional key.
    pub key: Option<String>,
    /// From value (inclusive).
    pub from: Option<f64>,
    /// To value (exclusive).
    pub to: Option<f64>,
}

impl RangeBucket {
    /// Range between `from` and `to`, either end open when `None`.
    pub fn between(from: Option<f64>, to: Option<f64>) -> Self {
        Self {
            key: None,
            from,
            to,
        }
    }

    /// Name the bucket.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut bucket = Map::new();
        if let Some(key) = &self.key {
            bucket.insert("key".to_string(), json!(key));
        }
        if let Some(from) = self.from {
            bucket.insert("from".to_string(), json!(from));
        }
        if let Some(to) = self.to {
            bucket.insert("to".to_string(), json!(to));
        }
        Value::Object(bucket)
    }
}

/// Aggregation results of a search response, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregations {
    values: Map<String, Value>,
}

impl Aggregations {
    pub(crate) fn from_response(value: Option<&Value>) -> Option<Self> {
        value.and_then(Value::as_object).map(|values| Self {
            values: values.clone(),
        })
    }

    /// Result of the aggregation named `name`.
    pub fn get(&self, name: &str) -> Option<AggregationResult<'_>> {
        self.values.get(name).map(|value| AggregationResult { value })
    }

    /// Aggregation names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// A single aggregation result.
#[derive(Debug, Clone, Copy)]
pub struct AggregationResult<'a> {
    /// Raw result.
    pub value: &'a Value,
}

impl AggregationResult<'_> {
    /// Metric value (avg, sum, min, max, ...).
    pub fn metric_value(&self) -> Option<f64> {
        self.value["value"].as_f64()
    }

    /// Buckets of a bucket aggregation as `(key, doc_count)` pairs.
    pub fn buckets(&self) -> Vec<(Value, u64)> {
        self.value["buckets"]
            .as_array()
            .map(|buckets| {
                buckets
                    .iter()
                    .map(|b| (b["key"].clone(), b["doc_count"].as_u64().unwrap_or(0)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json() {
        assert_eq!(
            Aggregation::terms("genre").to_json(),
            json!({"terms": {"field": "genre"}})
        );
        assert_eq!(
            Aggregation::metric(Metric::Avg, "pages").to_json(),
            json!({"avg": {"field": "pages"}})
        );
        let range = Aggregation::Range {
            field: "price".into(),
            ranges: vec![RangeBucket::between(None, Some(10.0)).key("cheap")],
        };
        assert_eq!(
            range.to_json(),
            json!({"range": {"field": "price", "ranges": [{"key": "cheap", "to": 10.0}]}})
        );
    }

    #[test]
    fn test_results() {
        let body = json!({
            "avg_pages": {"value": 312.5},
            "genres": {"buckets": [{"key": "scifi", "doc_count": 3}, {"key": "crime", "doc_count": 1}]}
        });
        let aggs = Aggregations::from_response(Some(&body)).unwrap();

        assert_eq!(aggs.get("avg_pages").unwrap().metric_value(), Some(312.5));
        assert_eq!(
            aggs.get("genres").unwrap().buckets(),
            vec![(json!("scifi"), 3), (json!("crime"), 1)]
        );
        assert!(aggs.get("missing").is_none());
        assert!(Aggregations::from_response(None).is_none());
    }
}
