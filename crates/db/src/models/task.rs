use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Status a checklist item must carry before its minutes count as actual time.
pub const APPROVED_STATUS: &str = "Approved";

/// Denormalised `{ _id, name }` pointer embedded in a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagRef {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_by: Option<NamedRef>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub assign_to: Vec<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagRef>,
    /// Checklist, newest first.
    #[serde(default)]
    pub list: Vec<ChecklistItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

/// One unit of tracked work embedded in a task's `list`.
///
/// `id` is assigned on insert and never rewritten; every positional update
/// matches on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_time_in_minute: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_time_in_minute: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

impl ChecklistItem {
    pub fn is_approved(&self) -> bool {
        self.status == APPROVED_STATUS
    }

    pub fn belongs_to(&self, user_id: ObjectId) -> bool {
        self.user == Some(user_id)
    }
}

impl Task {
    pub const COLLECTION: &'static str = "tasks";
}
