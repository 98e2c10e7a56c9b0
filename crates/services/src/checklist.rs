//! Positional edits to the checklist embedded in a task document.
//!
//! Every operation is a single-document update: the store's positional
//! match-and-set keeps concurrent edits to different items from losing each
//! other. Concurrent edits to the same item are last-write-wins.

use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::Database;
use backoffice_db::models::{ChecklistItem, Task};
use tracing::debug;

use crate::dao::{BaseDao, DaoError, DaoResult};

/// Fields for a new checklist item; identity and timestamps are assigned here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewChecklistItem {
    pub name: String,
    pub status: String,
    pub checked: bool,
    pub expected_time_in_minute: Option<i64>,
    pub actual_time_in_minute: Option<i64>,
    pub user: Option<ObjectId>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

/// Partial update of one item.
///
/// Text and minute fields apply only when present and non-empty/non-zero.
/// `checked` applies whenever present, `false` included. `note` set to `""`
/// clears the stored note, while an absent `note` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChecklistItemPatch {
    pub name: Option<String>,
    pub status: Option<String>,
    pub checked: Option<bool>,
    pub expected_time_in_minute: Option<i64>,
    pub actual_time_in_minute: Option<i64>,
    pub user: Option<ObjectId>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

impl ChecklistItemPatch {
    /// `$set` body addressed at `{prefix}field`.
    pub fn to_set_document(&self, prefix: &str) -> Document {
        let mut set = Document::new();
        let mut put = |field: &str, value: Bson| {
            set.insert(format!("{prefix}{field}"), value);
        };

        if let Some(name) = non_empty(&self.name) {
            put("name", name.into());
        }
        if let Some(status) = non_empty(&self.status) {
            put("status", status.into());
        }
        if let Some(checked) = self.checked {
            put("checked", checked.into());
        }
        if let Some(minutes) = self.expected_time_in_minute.filter(|m| *m != 0) {
            put("expectedTimeInMinute", minutes.into());
        }
        if let Some(minutes) = self.actual_time_in_minute.filter(|m| *m != 0) {
            put("actualTimeInMinute", minutes.into());
        }
        if let Some(user) = self.user {
            put("user", user.into());
        }
        if let Some(end_date) = non_empty(&self.end_date) {
            put("endDate", end_date.into());
        }
        if let Some(start_date) = non_empty(&self.start_date) {
            put("startDate", start_date.into());
        }
        match self.note.as_deref() {
            Some("") => put("note", Bson::Null),
            Some(note) => put("note", note.into()),
            None => {}
        }
        put("updatedAt", DateTime::now().into());
        set
    }
}

/// The limited field set a bulk update may touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkChecklistPatch {
    pub status: Option<String>,
    pub checked: Option<bool>,
}

impl BulkChecklistPatch {
    fn to_set_document(&self, prefix: &str) -> Document {
        ChecklistItemPatch {
            status: self.status.clone(),
            checked: self.checked,
            ..ChecklistItemPatch::default()
        }
        .to_set_document(prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkUpdate {
    /// No ids were supplied; nothing was written.
    Empty,
    Applied,
}

pub struct ChecklistStore {
    tasks: BaseDao<Task>,
}

impl ChecklistStore {
    pub fn new(db: &Database) -> Self {
        Self {
            tasks: BaseDao::new(db, Task::COLLECTION),
        }
    }

    /// Current checklist of a task, newest first.
    pub async fn items(&self, task_id: ObjectId) -> DaoResult<Vec<ChecklistItem>> {
        Ok(self.tasks.find_by_id(task_id).await?.list)
    }

    /// Inserts at index 0. No content uniqueness check.
    pub async fn insert_item(
        &self,
        task_id: ObjectId,
        item: NewChecklistItem,
    ) -> DaoResult<ChecklistItem> {
        let now = DateTime::now();
        let item = ChecklistItem {
            id: ObjectId::new(),
            name: item.name,
            status: item.status,
            checked: item.checked,
            expected_time_in_minute: item.expected_time_in_minute,
            actual_time_in_minute: item.actual_time_in_minute,
            user: item.user,
            start_date: item.start_date,
            end_date: item.end_date,
            note: item.note.filter(|n| !n.is_empty()),
            created_at: Some(now),
            updated_at: Some(now),
        };
        let encoded = bson::to_bson(&item)?;

        let outcome = self
            .tasks
            .update_by_id(
                task_id,
                doc! { "$push": { "list": { "$each": [encoded], "$position": 0 } } },
            )
            .await?;
        if outcome.matched == 0 {
            return Err(DaoError::NotFound);
        }
        debug!(%task_id, item_id = %item.id, "Checklist item inserted");
        Ok(item)
    }

    /// Returns `false` when the task exists but has no item `item_id`.
    pub async fn update_item(
        &self,
        task_id: ObjectId,
        item_id: ObjectId,
        patch: &ChecklistItemPatch,
    ) -> DaoResult<bool> {
        let outcome = self
            .tasks
            .update_one(
                doc! { "_id": task_id, "list._id": item_id },
                doc! { "$set": patch.to_set_document("list.$.") },
            )
            .await?;
        if outcome.matched == 0 {
            return self.missing_item(task_id).await;
        }
        debug!(%task_id, %item_id, "Checklist item updated");
        Ok(true)
    }

    /// Applies `status`/`checked` to each listed item in one atomic write;
    /// ids absent from the checklist are skipped.
    pub async fn update_items_bulk(
        &self,
        task_id: ObjectId,
        item_ids: &[ObjectId],
        patch: &BulkChecklistPatch,
    ) -> DaoResult<BulkUpdate> {
        if item_ids.is_empty() {
            return Ok(BulkUpdate::Empty);
        }

        let ids: Vec<Bson> = item_ids.iter().copied().map(Bson::ObjectId).collect();
        let mut set = patch.to_set_document("list.$[item].");
        set.insert("updatedAt", DateTime::now());
        let outcome = self
            .tasks
            .collection()
            .update_one(doc! { "_id": task_id }, doc! { "$set": set })
            .array_filters(vec![doc! { "item._id": { "$in": ids } }])
            .await?;
        if outcome.matched_count == 0 {
            return Err(DaoError::NotFound);
        }
        debug!(%task_id, items = item_ids.len(), "Checklist items bulk updated");
        Ok(BulkUpdate::Applied)
    }

    /// Returns whether an item was actually removed.
    pub async fn remove_item(&self, task_id: ObjectId, item_id: ObjectId) -> DaoResult<bool> {
        let outcome = self
            .tasks
            .update_one(
                doc! { "_id": task_id, "list._id": item_id },
                doc! { "$pull": { "list": { "_id": item_id } } },
            )
            .await?;
        if outcome.matched == 0 {
            return self.missing_item(task_id).await;
        }
        debug!(%task_id, %item_id, "Checklist item removed");
        Ok(true)
    }

    async fn missing_item(&self, task_id: ObjectId) -> DaoResult<bool> {
        if self.tasks.exists(task_id).await? {
            Ok(false)
        } else {
            Err(DaoError::NotFound)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
