//! Generic list-query engine shared by every back-office resource.
//!
//! A request flows `ListQuery` -> [`FilterNormalizer`] -> [`QueryPlanBuilder`]
//! -> aggregation pipeline, with [`ListQueryEngine`] deciding whether the
//! whole-collection cache may answer instead of the store.

pub mod engine;
pub mod filter;
pub mod plan;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use validator::Validate;

pub use engine::{ListQueryEngine, ListResult};
pub use filter::{FilterCondition, FilterNormalizer, NormalizedFilter, parse_date, parse_id};
pub use plan::{Pipeline, QueryPlanBuilder};

/// Input problems detected before the store is touched, plus projection
/// conflicts the store reports back.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid identifier for `{field}`: {value}")]
    InvalidIdentifier { field: String, value: String },
    #[error("Invalid date range for `{field}`: {value}")]
    InvalidDateRange { field: String, value: String },
    #[error("Filtering on `{0}` is not allowed")]
    DisallowedFilterField(String),
    #[error("Unsupported operator `{operator}` on `{field}`")]
    UnsupportedOperator { field: String, operator: String },
    #[error("Invalid sort direction for `{0}`, expected 1 or -1")]
    InvalidSort(String),
    #[error("Invalid projection value for `{0}`, expected 0 or 1")]
    InvalidProjection(String),
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("Projection mismatch: {0}")]
    ProjectionConflict(String),
}

/// Zero-based page request. `currentPage: 0` is the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[validate(range(min = 1, message = "pageSize must be greater than zero"))]
    pub page_size: u64,
    #[serde(default)]
    pub current_page: u64,
}

/// Free-form filter/sort/select/paginate request as decoded at the boundary.
///
/// The free-text term travels separately (the `q` query parameter) and is
/// passed alongside this struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Map<String, Value>>,
}

impl ListQuery {
    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}
