use bson::{Bson, Document, doc};
use serde_json::{Map, Value};

use super::{NormalizedFilter, Pagination, QueryError};
use crate::resource::ResourceSchema;

pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Ordered aggregation stages ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Document>,
    paginated: bool,
}

impl Pipeline {
    pub fn stages(&self) -> &[Document] {
        &self.stages
    }

    pub fn into_stages(self) -> Vec<Document> {
        self.stages
    }

    /// A paginated pipeline yields one `{ data, count }` document.
    pub fn is_paginated(&self) -> bool {
        self.paginated
    }

    /// Canonical text of the stages, used to key cached results.
    pub fn shape_key(&self) -> String {
        Bson::Array(self.stages.iter().cloned().map(Bson::Document).collect())
            .into_relaxed_extjson()
            .to_string()
    }
}

/// Assembles `match -> sort -> project -> paginate` for one resource.
pub struct QueryPlanBuilder<'a> {
    resource: &'a ResourceSchema,
}

impl<'a> QueryPlanBuilder<'a> {
    pub fn new(resource: &'a ResourceSchema) -> Self {
        Self { resource }
    }

    pub fn build(
        &self,
        filter: &NormalizedFilter,
        sort: Option<&Map<String, Value>>,
        select: Option<&Map<String, Value>>,
        pagination: Option<&Pagination>,
        search_term: Option<&str>,
    ) -> Result<Pipeline, QueryError> {
        let sort = self.sort_document(sort)?;
        let projection = self.projection(select)?;

        let mut stages = Vec::new();

        if let Some(source) = self.resource.month_from {
            stages.push(doc! {
                "$addFields": {
                    "month": {
                        "$month": {
                            "$convert": {
                                "input": format!("${source}"),
                                "to": "date",
                                "onError": Bson::Null,
                                "onNull": Bson::Null,
                            }
                        }
                    }
                }
            });
        }

        let mut matcher = filter.to_document();
        if let Some(search) = search_term.and_then(|term| self.search_clause(term)) {
            matcher.insert("$or", search);
        }
        if !matcher.is_empty() {
            stages.push(doc! { "$match": matcher });
        }

        stages.push(doc! { "$sort": sort });

        let Some(pagination) = pagination else {
            stages.push(doc! { "$project": projection });
            return Ok(Pipeline {
                stages,
                paginated: false,
            });
        };

        let (skip, limit) = page_window(pagination)?;
        stages.push(doc! {
            "$facet": {
                "metadata": [ { "$count": "total" } ],
                "data": [
                    { "$skip": skip },
                    { "$limit": limit },
                    { "$project": projection },
                ],
            }
        });
        stages.push(doc! {
            "$project": {
                "data": 1,
                "count": { "$arrayElemAt": ["$metadata.total", 0] },
            }
        });

        Ok(Pipeline {
            stages,
            paginated: true,
        })
    }

    /// Caller sort, or newest-first when none (or an empty one) is given.
    pub fn sort_document(&self, sort: Option<&Map<String, Value>>) -> Result<Document, QueryError> {
        let Some(sort) = sort.filter(|s| !s.is_empty()) else {
            return Ok(doc! { DEFAULT_SORT_FIELD: -1 });
        };

        let mut document = Document::new();
        for (field, direction) in sort {
            let direction = match direction.as_i64() {
                Some(1) => 1,
                Some(-1) => -1,
                _ => return Err(QueryError::InvalidSort(field.clone())),
            };
            document.insert(field.clone(), Bson::Int32(direction));
        }
        Ok(document)
    }

    /// Projection for reading a single record: the caller's `select` when
    /// there is one, otherwise the whole document minus the secret field.
    pub fn record_projection(&self, select: Option<&Map<String, Value>>) -> Result<Document, QueryError> {
        if select.is_some_and(|s| !s.is_empty()) {
            return self.projection(select);
        }
        let mut projection = Document::new();
        if let Some(secret) = self.resource.secret_field {
            projection.insert(secret, Bson::Int32(0));
        }
        Ok(projection)
    }

    /// Caller projection or the resource default, with the secret field
    /// always withheld.
    pub fn projection(&self, select: Option<&Map<String, Value>>) -> Result<Document, QueryError> {
        let mut fields: Vec<(String, bool)> = match select.filter(|s| !s.is_empty()) {
            Some(select) => select
                .iter()
                .map(|(field, flag)| Ok((field.clone(), projection_flag(field, flag)?)))
                .collect::<Result<_, QueryError>>()?,
            None => self
                .resource
                .default_select
                .iter()
                .map(|field| match field.strip_prefix('-') {
                    Some(excluded) => (excluded.to_string(), false),
                    None => (field.to_string(), true),
                })
                .collect(),
        };

        let includes = fields.iter().any(|(f, on)| *on && f != "_id");
        let excludes = fields.iter().any(|(f, on)| !*on && f != "_id");
        if includes && excludes {
            return Err(QueryError::ProjectionConflict(
                "cannot mix included and excluded fields".to_string(),
            ));
        }

        if let Some(secret) = self.resource.secret_field {
            let nested = format!("{secret}.");
            fields.retain(|(f, _)| f != secret && !f.starts_with(&nested));
            if includes {
                if !fields.iter().any(|(f, on)| *on && f != "_id") {
                    fields.retain(|(f, _)| f != "_id");
                    fields.push(("_id".to_string(), true));
                }
            } else {
                fields.push((secret.to_string(), false));
            }
        }

        Ok(fields
            .into_iter()
            .map(|(field, on)| (field, Bson::Int32(i32::from(on))))
            .collect())
    }

    /// `$or` of case-insensitive substring matches over the search fields.
    pub fn search_clause(&self, term: &str) -> Option<Bson> {
        let term = term.trim();
        if term.is_empty() || self.resource.search_fields.is_empty() {
            return None;
        }
        let pattern = regex::escape(term);
        Some(Bson::Array(
            self.resource
                .search_fields
                .iter()
                .map(|field| {
                    Bson::Document(doc! {
                        *field: { "$regex": pattern.as_str(), "$options": "i" }
                    })
                })
                .collect(),
        ))
    }
}

fn projection_flag(field: &str, flag: &Value) -> Result<bool, QueryError> {
    match flag {
        Value::Bool(on) => Ok(*on),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        _ => Err(QueryError::InvalidProjection(field.to_string())),
    }
}

fn page_window(pagination: &Pagination) -> Result<(i64, i64), QueryError> {
    if pagination.page_size == 0 {
        return Err(QueryError::InvalidPagination(
            "pageSize must be greater than zero".to_string(),
        ));
    }
    let skip = pagination
        .page_size
        .checked_mul(pagination.current_page)
        .and_then(|skip| i64::try_from(skip).ok())
        .ok_or_else(|| QueryError::InvalidPagination("page offset overflows".to_string()))?;
    let limit = i64::try_from(pagination.page_size)
        .map_err(|_| QueryError::InvalidPagination("pageSize too large".to_string()))?;
    Ok((skip, limit))
}
