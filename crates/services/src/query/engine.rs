use std::sync::Arc;
use std::time::Duration;

use bson::{Bson, Document};
use mongodb::Database;
use mongodb::error::ErrorKind;
use tracing::{debug, error, warn};
use validator::Validate;

use super::{FilterNormalizer, ListQuery, NormalizedFilter, Pipeline, QueryError, QueryPlanBuilder};
use crate::cache::{CacheKey, CachedList, ListCache};
use crate::dao::{BaseDao, DaoError, DaoResult};
use crate::envelope::ResponsePayload;
use crate::resource::ResourceSchema;

/// Server error codes for "cannot mix inclusion and exclusion" projections.
const PROJECTION_MISMATCH_CODES: [i32; 2] = [31253, 31254];

#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    pub data: Vec<Document>,
    /// Total matches, not the page length.
    pub count: u64,
    pub from_cache: bool,
}

impl ListResult {
    pub fn into_payload(self) -> ResponsePayload {
        ResponsePayload::documents("Success", &self.data, self.count)
    }
}

/// One resource's list endpoint: normalise, plan, then either answer from
/// the whole-collection cache or run the pipeline in a single round trip.
pub struct ListQueryEngine {
    resource: &'static ResourceSchema,
    dao: BaseDao<Document>,
    cache: Arc<dyn ListCache>,
    ttl: Duration,
}

impl ListQueryEngine {
    pub fn new(
        db: &Database,
        resource: &'static ResourceSchema,
        cache: Arc<dyn ListCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            resource,
            dao: BaseDao::new(db, resource.collection),
            cache,
            ttl,
        }
    }

    pub fn resource(&self) -> &'static ResourceSchema {
        self.resource
    }

    pub fn dao(&self) -> &BaseDao<Document> {
        &self.dao
    }

    /// Validates the request and coerces its filter. Runs before any I/O.
    pub fn normalize(&self, query: &ListQuery) -> DaoResult<NormalizedFilter> {
        query
            .validate()
            .map_err(|e| DaoError::Validation(e.to_string()))?;
        match &query.filter {
            Some(raw) => Ok(FilterNormalizer::new(self.resource).normalize(raw)?),
            None => Ok(NormalizedFilter::default()),
        }
    }

    pub fn plan(
        &self,
        query: &ListQuery,
        filter: &NormalizedFilter,
        search_term: Option<&str>,
    ) -> Result<Pipeline, QueryError> {
        QueryPlanBuilder::new(self.resource).build(
            filter,
            query.sort.as_ref(),
            query.select.as_ref(),
            query.pagination.as_ref(),
            search_term,
        )
    }

    pub async fn list(&self, query: &ListQuery, search_term: Option<&str>) -> DaoResult<ListResult> {
        let filter = self.normalize(query)?;
        self.list_normalized(query, filter, search_term).await
    }

    /// Like [`list`](Self::list) but with a filter the caller has already
    /// normalised (and possibly scoped further).
    pub async fn list_normalized(
        &self,
        query: &ListQuery,
        filter: NormalizedFilter,
        search_term: Option<&str>,
    ) -> DaoResult<ListResult> {
        let pipeline = self.plan(query, &filter, search_term)?;

        let cacheable = filter.is_empty()
            && query.pagination.is_none()
            && search_term.is_none_or(|term| term.trim().is_empty());
        let key = cacheable.then(|| CacheKey::new(self.resource.name, pipeline.shape_key()));

        // Generation the snapshot is read at; `None` means do not store it.
        let mut generation = None;
        if let Some(key) = &key {
            match self.cache.get(key).await {
                Ok(Some(cached)) => {
                    debug!(resource = self.resource.name, "Cached list hit");
                    return Ok(ListResult {
                        data: cached.records,
                        count: cached.count,
                        from_cache: true,
                    });
                }
                Ok(None) => debug!(resource = self.resource.name, "Cached list miss"),
                Err(e) => warn!(resource = self.resource.name, error = %e, "List cache read failed, querying store"),
            }
            match self.cache.generation(self.resource.name).await {
                Ok(current) => generation = Some(current),
                Err(e) => warn!(resource = self.resource.name, error = %e, "List cache generation unavailable"),
            }
        }

        let paginated = pipeline.is_paginated();
        let docs = self
            .dao
            .aggregate(pipeline.into_stages())
            .await
            .map_err(|e| classify_store_error(self.resource.name, e))?;

        let result = if paginated {
            unpack_facet(docs)
        } else {
            let count = docs.len() as u64;
            ListResult {
                data: docs,
                count,
                from_cache: false,
            }
        };

        if let (Some(key), Some(generation)) = (&key, generation) {
            let cached = CachedList {
                records: result.data.clone(),
                count: result.count,
            };
            match self.cache.set(key, cached, self.ttl, generation).await {
                Ok(true) => debug!(resource = self.resource.name, count = result.count, "Cached list stored"),
                Ok(false) => debug!(resource = self.resource.name, "Cached list skipped"),
                Err(e) => warn!(resource = self.resource.name, error = %e, "List cache write failed"),
            }
        }

        Ok(result)
    }

    /// Drops every cached shape of this resource. Never fails the caller.
    pub async fn invalidate(&self) {
        if let Err(e) = self.cache.invalidate(self.resource.name).await {
            warn!(resource = self.resource.name, error = %e, "List cache invalidation failed");
        } else {
            debug!(resource = self.resource.name, "List cache invalidated");
        }
    }
}

fn unpack_facet(docs: Vec<Document>) -> ListResult {
    let Some(page) = docs.into_iter().next() else {
        return ListResult {
            data: Vec::new(),
            count: 0,
            from_cache: false,
        };
    };

    let data = page
        .get_array("data")
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_document().cloned())
                .collect()
        })
        .unwrap_or_default();
    // An empty match leaves `metadata` empty, so `count` is absent.
    let count = match page.get("count") {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        _ => 0,
    };

    ListResult {
        data,
        count,
        from_cache: false,
    }
}

fn classify_store_error(resource: &str, e: mongodb::error::Error) -> DaoError {
    if let ErrorKind::Command(ref command_error) = *e.kind {
        if PROJECTION_MISMATCH_CODES.contains(&command_error.code) {
            warn!(resource, message = %command_error.message, "Projection rejected by store");
            return DaoError::Query(QueryError::ProjectionConflict(command_error.message.clone()));
        }
    }
    error!(resource, error = %e, "List query failed");
    DaoError::QueryExecutionFailed(e.to_string())
}
