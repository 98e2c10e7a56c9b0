use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use mongodb::Database;
use backoffice_db::models::{ChecklistItem, Task};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::cache::ListCache;
use crate::checklist::{BulkChecklistPatch, BulkUpdate, ChecklistItemPatch, ChecklistStore, NewChecklistItem};
use crate::dao::DaoResult;
use crate::envelope::ResponsePayload;
use crate::query::{FilterCondition, ListQuery, ListQueryEngine, ListResult, NormalizedFilter};
use crate::report::{ReportAggregator, TaskReport};
use crate::resource::ResourceKind;

/// Field a user-scoped flow pins to the acting user.
const ASSIGNEE_FIELD: &str = "assignTo._id";

/// Projection applied to report queries that send no `select`.
const REPORT_SELECT: [&str; 8] = [
    "title",
    "list",
    "project",
    "assignTo",
    "assignBy",
    "assignDate",
    "dueDate",
    "createdAt",
];

/// Tasks: the generic list engine plus checklist edits and KPI reports.
/// Checklist edits drop the task list cache just like any other mutation.
pub struct TaskService {
    engine: ListQueryEngine,
    checklist: ChecklistStore,
}

impl TaskService {
    pub fn new(db: &Database, cache: Arc<dyn ListCache>, ttl: Duration) -> Self {
        Self {
            engine: ListQueryEngine::new(db, ResourceKind::Task.schema(), cache, ttl),
            checklist: ChecklistStore::new(db),
        }
    }

    pub fn engine(&self) -> &ListQueryEngine {
        &self.engine
    }

    pub fn checklist(&self) -> &ChecklistStore {
        &self.checklist
    }

    pub async fn list_tasks(&self, query: &ListQuery, search_term: Option<&str>) -> DaoResult<ListResult> {
        self.engine.list(query, search_term).await
    }

    /// Tasks assigned to `actor`, whatever assignee the caller filtered on.
    pub async fn list_tasks_for_user(
        &self,
        actor: ObjectId,
        query: &ListQuery,
        search_term: Option<&str>,
    ) -> DaoResult<ListResult> {
        let filter = self.assigned_to(actor, query)?;
        self.engine.list_normalized(query, filter, search_term).await
    }

    pub async fn add_item(&self, task_id: ObjectId, item: NewChecklistItem) -> DaoResult<ChecklistItem> {
        let result = self.checklist.insert_item(task_id, item).await;
        self.engine.invalidate().await;
        result
    }

    pub async fn add_item_for_user(
        &self,
        actor: ObjectId,
        task_id: ObjectId,
        item: NewChecklistItem,
    ) -> DaoResult<ChecklistItem> {
        let item = NewChecklistItem {
            user: Some(actor),
            ..item
        };
        self.add_item(task_id, item).await
    }

    pub async fn update_item(
        &self,
        task_id: ObjectId,
        item_id: ObjectId,
        patch: &ChecklistItemPatch,
    ) -> DaoResult<bool> {
        let result = self.checklist.update_item(task_id, item_id, patch).await;
        self.engine.invalidate().await;
        result
    }

    /// An empty id list is a soft failure, not an error.
    pub async fn update_items_bulk(
        &self,
        task_id: ObjectId,
        item_ids: &[ObjectId],
        patch: &BulkChecklistPatch,
    ) -> DaoResult<ResponsePayload> {
        let result = self.checklist.update_items_bulk(task_id, item_ids, patch).await;
        if !matches!(result, Ok(BulkUpdate::Empty)) {
            self.engine.invalidate().await;
        }
        match result? {
            BulkUpdate::Empty => Ok(ResponsePayload::soft_failure("No Data Updated")),
            BulkUpdate::Applied => Ok(ResponsePayload::ok("Success")),
        }
    }

    pub async fn remove_item(&self, task_id: ObjectId, item_id: ObjectId) -> DaoResult<bool> {
        let result = self.checklist.remove_item(task_id, item_id).await;
        self.engine.invalidate().await;
        result
    }

    /// Per-task reports for `viewer` plus the `expectedEndTime` /
    /// `actualEndTime` totals. Pagination and free-text search are ignored.
    pub async fn report_for_user(&self, viewer: ObjectId, query: ListQuery) -> DaoResult<ResponsePayload> {
        let query = ListQuery {
            pagination: None,
            select: query.select.or_else(|| Some(report_select())),
            ..query
        };
        let filter = self.assigned_to(viewer, &query)?;
        let result = self.engine.list_normalized(&query, filter, None).await?;

        let reports = result
            .data
            .into_iter()
            .map(|doc| {
                let task: Task = bson::from_document(doc)?;
                Ok(ReportAggregator::report(&task, viewer))
            })
            .collect::<DaoResult<Vec<TaskReport>>>()?;
        let documents = reports
            .iter()
            .map(TaskReport::to_document)
            .collect::<Result<Vec<_>, _>>()?;
        let kpis = ReportAggregator::kpis(&reports);
        info!(%viewer, tasks = reports.len(), "Task report built");

        Ok(ResponsePayload::documents("Success", &documents, result.count).with_reports(json!({
            "expectedEndTime": kpis.expected_end_time,
            "actualEndTime": kpis.actual_end_time,
        })))
    }

    fn assigned_to(&self, user: ObjectId, query: &ListQuery) -> DaoResult<NormalizedFilter> {
        let mut filter = self.engine.normalize(query)?;
        filter.insert(ASSIGNEE_FIELD, FilterCondition::Equality(user.into()));
        Ok(filter)
    }
}

fn report_select() -> Map<String, Value> {
    REPORT_SELECT
        .iter()
        .map(|field| (field.to_string(), Value::from(1)))
        .collect()
}
