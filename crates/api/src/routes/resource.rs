use axum::{
    Json,
    extract::{Path, State},
};
use backoffice_services::envelope::{document_to_json, json_object_to_document};
use backoffice_services::{ListQuery, ResourceKind, ResourceService, ResponsePayload};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{SearchParams, parse_object_id, parse_object_ids};
use crate::extractors::{JsonBody, QueryParams, auth::AuthUser};
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct InsertManyRequest {
    pub data: Vec<Map<String, Value>>,
    /// Clear the collection before inserting.
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMultipleRequest {
    pub ids: Vec<String>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMultipleRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectParams {
    /// Comma separated field names, `-field` to exclude.
    pub select: Option<String>,
}

fn service<'a>(state: &'a AppState, kind: &str) -> Result<&'a ResourceService, ApiError> {
    kind.parse::<ResourceKind>()
        .ok()
        .and_then(|kind| state.resource(kind))
        .ok_or_else(|| ApiError::NotFound(format!("Unknown resource `{kind}`")))
}

pub async fn get_all(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
    QueryParams(params): QueryParams<SearchParams>,
    JsonBody(query): JsonBody<ListQuery>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let result = service(&state, &kind)?
        .list(&query, params.q.as_deref())
        .await?;
    Ok(Json(result.into_payload()))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((kind, id)): Path<(String, String)>,
    QueryParams(params): QueryParams<SelectParams>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let id = parse_object_id("id", &id)?;
    let select = params.select.as_deref().map(select_from_csv);
    let document = service(&state, &kind)?
        .get_by_id(id, select.as_ref())
        .await?;
    Ok(Json(ResponsePayload::ok("Success").with_data(document_to_json(&document))))
}

pub async fn add(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let id = service(&state, &kind)?
        .add(json_object_to_document(&body))
        .await?;
    Ok(Json(
        ResponsePayload::ok("Data Added Success").with_data(json!({ "_id": id.to_hex() })),
    ))
}

pub async fn insert_many(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
    JsonBody(body): JsonBody<InsertManyRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let documents = body.data.iter().map(json_object_to_document).collect();
    let inserted = service(&state, &kind)?
        .insert_many(documents, body.replace)
        .await?;
    Ok(Json(
        ResponsePayload::ok("Data Added Success").with_count(inserted as u64),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((kind, id)): Path<(String, String)>,
    JsonBody(body): JsonBody<Map<String, Value>>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let id = parse_object_id("id", &id)?;
    service(&state, &kind)?
        .update_by_id(id, json_object_to_document(&body))
        .await?;
    Ok(Json(ResponsePayload::ok("Data Updated Success")))
}

pub async fn update_multiple(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
    JsonBody(body): JsonBody<UpdateMultipleRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    if body.ids.is_empty() {
        return Ok(Json(ResponsePayload::soft_failure("No Data Updated")));
    }
    let ids = parse_object_ids("id", &body.ids)?;
    let modified = service(&state, &kind)?
        .update_many(&ids, json_object_to_document(&body.data))
        .await?;
    Ok(Json(
        ResponsePayload::ok("Data Updated Success").with_count(modified),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let id = parse_object_id("id", &id)?;
    service(&state, &kind)?.delete_by_id(id).await?;
    Ok(Json(ResponsePayload::ok("Data Deleted Success")))
}

pub async fn delete_multiple(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(kind): Path<String>,
    JsonBody(body): JsonBody<DeleteMultipleRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    if body.ids.is_empty() {
        return Ok(Json(ResponsePayload::soft_failure("No Data Deleted")));
    }
    let ids = parse_object_ids("id", &body.ids)?;
    let deleted = service(&state, &kind)?.delete_many(&ids).await?;
    Ok(Json(
        ResponsePayload::ok("Data Deleted Success").with_count(deleted),
    ))
}

fn select_from_csv(raw: &str) -> Map<String, Value> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| match field.strip_prefix('-') {
            Some(excluded) => (excluded.to_string(), Value::from(0)),
            None => (field.to_string(), Value::from(1)),
        })
        .collect()
}
