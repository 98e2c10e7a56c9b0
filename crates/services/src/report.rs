//! Time-tracking KPIs derived from task checklists. Everything here is a pure
//! function of its inputs.

use bson::{Document, oid::ObjectId};
use serde::Serialize;
use backoffice_db::models::{ChecklistItem, Task};

/// One task as seen by one user.
///
/// `expected_list` is always the full checklist. `list` keeps only the
/// viewer's approved items, and only those count towards `total_actual_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    #[serde(flatten)]
    pub task: Task,
    pub expected_list: Vec<ChecklistItem>,
    pub total_expected_time: i64,
    pub total_actual_time: i64,
}

impl TaskReport {
    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        bson::to_document(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiField {
    TotalExpectedTime,
    TotalActualTime,
}

/// Organisation-wide totals over a reported task set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiReports {
    pub expected_end_time: i64,
    pub actual_end_time: i64,
}

pub struct ReportAggregator;

impl ReportAggregator {
    pub fn report(task: &Task, viewer: ObjectId) -> TaskReport {
        let expected_list = task.list.clone();
        let list: Vec<ChecklistItem> = task
            .list
            .iter()
            .filter(|item| item.belongs_to(viewer) && item.is_approved())
            .cloned()
            .collect();

        let total_expected_time = expected_list
            .iter()
            .map(|item| minutes(item.expected_time_in_minute))
            .sum();
        let total_actual_time = list
            .iter()
            .map(|item| minutes(item.actual_time_in_minute))
            .sum();

        TaskReport {
            task: Task {
                list,
                ..task.clone()
            },
            expected_list,
            total_expected_time,
            total_actual_time,
        }
    }

    pub fn aggregate_kpi(reports: &[TaskReport], field: KpiField) -> i64 {
        reports
            .iter()
            .map(|report| match field {
                KpiField::TotalExpectedTime => report.total_expected_time,
                KpiField::TotalActualTime => report.total_actual_time,
            })
            .sum()
    }

    pub fn kpis(reports: &[TaskReport]) -> KpiReports {
        KpiReports {
            expected_end_time: Self::aggregate_kpi(reports, KpiField::TotalExpectedTime),
            actual_end_time: Self::aggregate_kpi(reports, KpiField::TotalActualTime),
        }
    }
}

fn minutes(value: Option<i64>) -> i64 {
    value.unwrap_or(0)
}
