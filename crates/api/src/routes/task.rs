use axum::{
    Json,
    extract::{Path, State},
};
use backoffice_db::models::ChecklistItem;
use backoffice_services::checklist::{BulkChecklistPatch, ChecklistItemPatch, NewChecklistItem};
use backoffice_services::envelope::document_to_json;
use backoffice_services::{ListQuery, ResponsePayload};
use serde::Deserialize;

use super::{SearchParams, parse_object_id, parse_object_ids};
use crate::extractors::{JsonBody, QueryParams, auth::AuthUser};
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChecklistItemRequest {
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub checked: bool,
    pub expected_time_in_minute: Option<i64>,
    pub actual_time_in_minute: Option<i64>,
    pub user: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChecklistItemRequest {
    pub task_id: String,
    /// Checklist item id.
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub checked: Option<bool>,
    pub expected_time_in_minute: Option<i64>,
    pub actual_time_in_minute: Option<i64>,
    pub user: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMultipleChecklistRequest {
    pub task_id: String,
    #[serde(default)]
    pub ids: Vec<String>,
    pub status: Option<String>,
    pub checked: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub user_id: String,
}

pub async fn get_all(
    State(state): State<AppState>,
    _auth: AuthUser,
    QueryParams(params): QueryParams<SearchParams>,
    JsonBody(query): JsonBody<ListQuery>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let result = state.tasks.list_tasks(&query, params.q.as_deref()).await?;
    Ok(Json(result.into_payload()))
}

pub async fn get_all_by_user(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(params): QueryParams<SearchParams>,
    JsonBody(query): JsonBody<ListQuery>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let result = state
        .tasks
        .list_tasks_for_user(auth.user_id, &query, params.q.as_deref())
        .await?;
    Ok(Json(result.into_payload()))
}

pub async fn add_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(body): JsonBody<AddChecklistItemRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let (task_id, item) = body.into_parts()?;
    let item = state.tasks.add_item(task_id, item).await?;
    item_added(&item)
}

pub async fn add_list_by_user(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<AddChecklistItemRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let (task_id, item) = body.into_parts()?;
    let item = state
        .tasks
        .add_item_for_user(auth.user_id, task_id, item)
        .await?;
    item_added(&item)
}

pub async fn update_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(body): JsonBody<UpdateChecklistItemRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let task_id = parse_object_id("taskId", &body.task_id)?;
    let item_id = parse_object_id("id", &body.id)?;
    let patch = ChecklistItemPatch {
        user: body
            .user
            .as_deref()
            .map(|user| parse_object_id("user", user))
            .transpose()?,
        name: body.name,
        status: body.status,
        checked: body.checked,
        expected_time_in_minute: body.expected_time_in_minute,
        actual_time_in_minute: body.actual_time_in_minute,
        start_date: body.start_date,
        end_date: body.end_date,
        note: body.note,
    };

    // A missing item is a no-op, not a failure
    let applied = state.tasks.update_item(task_id, item_id, &patch).await?;
    Ok(Json(
        ResponsePayload::ok("Data Updated Success").with_count(u64::from(applied)),
    ))
}

pub async fn update_multiple_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    JsonBody(body): JsonBody<UpdateMultipleChecklistRequest>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let task_id = parse_object_id("taskId", &body.task_id)?;
    let item_ids = parse_object_ids("id", &body.ids)?;
    let patch = BulkChecklistPatch {
        status: body.status,
        checked: body.checked,
    };
    Ok(Json(
        state
            .tasks
            .update_items_bulk(task_id, &item_ids, &patch)
            .await?,
    ))
}

pub async fn delete_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((task_id, id)): Path<(String, String)>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let task_id = parse_object_id("taskId", &task_id)?;
    let item_id = parse_object_id("id", &id)?;
    let removed = state.tasks.remove_item(task_id, item_id).await?;
    Ok(Json(
        ResponsePayload::ok("Data Deleted Success").with_count(u64::from(removed)),
    ))
}

pub async fn report_by_admin(
    State(state): State<AppState>,
    _auth: AuthUser,
    QueryParams(params): QueryParams<ReportParams>,
    JsonBody(query): JsonBody<ListQuery>,
) -> Result<Json<ResponsePayload>, ApiError> {
    let viewer = parse_object_id("userId", &params.user_id)?;
    Ok(Json(state.tasks.report_for_user(viewer, query).await?))
}

pub async fn report_by_user(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(query): JsonBody<ListQuery>,
) -> Result<Json<ResponsePayload>, ApiError> {
    Ok(Json(state.tasks.report_for_user(auth.user_id, query).await?))
}

impl AddChecklistItemRequest {
    fn into_parts(self) -> Result<(bson::oid::ObjectId, NewChecklistItem), ApiError> {
        let task_id = parse_object_id("taskId", &self.task_id)?;
        let user = self
            .user
            .as_deref()
            .map(|user| parse_object_id("user", user))
            .transpose()?;
        Ok((
            task_id,
            NewChecklistItem {
                name: self.name,
                status: self.status,
                checked: self.checked,
                expected_time_in_minute: self.expected_time_in_minute,
                actual_time_in_minute: self.actual_time_in_minute,
                user,
                start_date: self.start_date,
                end_date: self.end_date,
                note: self.note,
            },
        ))
    }
}

fn item_added(item: &ChecklistItem) -> Result<Json<ResponsePayload>, ApiError> {
    let document = bson::to_document(item).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(
        ResponsePayload::ok("Data Added Success").with_data(document_to_json(&document)),
    ))
}
