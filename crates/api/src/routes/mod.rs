pub mod resource;
pub mod task;

use bson::oid::ObjectId;
use serde::Deserialize;

use crate::error::ApiError;

/// Optional free-text term shared by every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub(crate) fn parse_object_id(field: &str, raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {field}")))
}

pub(crate) fn parse_object_ids(field: &str, raw: &[String]) -> Result<Vec<ObjectId>, ApiError> {
    raw.iter().map(|id| parse_object_id(field, id)).collect()
}
