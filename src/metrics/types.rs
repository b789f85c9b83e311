use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stages::Stage;
use crate::tracker::{LabelAction, TaskState};

/// A contiguous time span during which a task stayed in one stage.
///
/// `end == None` means the interval is still open (the task is open and this
/// is its last interval); its duration is unknown, never guessed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageInterval {
    pub stage: Stage,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl StageInterval {
    pub fn closed(stage: Stage, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            stage,
            start,
            end: Some(end),
            duration_seconds: Some((end - start).num_seconds()),
        }
    }

    pub fn ongoing(stage: Stage, start: DateTime<Utc>) -> Self {
        Self {
            stage,
            start,
            end: None,
            duration_seconds: None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }
}

/// "Still in stage X since T" — the open tail of an open task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OngoingStage {
    pub stage: Stage,
    pub since: DateTime<Utc>,
}

/// Raw label-history entry, retained even for labels no stage maps to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelChange {
    pub label: String,
    pub action: LabelAction,
    pub at: DateTime<Utc>,
    pub actor: Option<String>,
}

/// Raw assignee-history entry. Assignee changes never affect stage
/// classification but are part of the exported task history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeChange {
    pub from: Option<String>,
    pub to: Option<String>,
    pub at: DateTime<Utc>,
    pub actor: Option<String>,
}

/// Stage metrics for a single task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub task_id: u64,
    pub task_iid: u64,
    pub project_id: u64,
    pub title: String,
    pub state: TaskState,
    /// Chronological, non-overlapping, gap-free from creation to the last
    /// known timestamp.
    pub intervals: Vec<StageInterval>,
    /// Total closed-interval seconds per stage. BTreeMap keeps key order
    /// stable for diffable exports.
    pub totals_seconds: BTreeMap<Stage, i64>,
    pub ongoing: Option<OngoingStage>,
    pub label_history: Vec<LabelChange>,
    pub assignee_history: Vec<AssigneeChange>,
    /// Distinct assignees observed over the task's history, in order of
    /// first appearance.
    pub assignees_during_cycle: Vec<String>,
}

/// A task whose event history could not be fetched. Listed in the report
/// instead of aborting the run.
#[derive(Debug, Clone, Serialize)]
pub struct FailedTask {
    pub task_id: u64,
    pub task_iid: u64,
    pub project_id: u64,
    pub title: String,
    pub reason: String,
}

/// Per-user metrics report, assembled fresh per invocation.
///
/// Task order matches the assignment-query order, not fetch completion
/// order, so output is deterministic for a fixed remote state.
#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_id: u64,
    pub username: String,
    pub tasks: Vec<TaskMetrics>,
    pub failed: Vec<FailedTask>,
    /// Aggregate closed-interval seconds per stage across all tasks.
    pub totals_seconds: BTreeMap<Stage, i64>,
    /// False when the run was cancelled and a partial report was requested.
    pub complete: bool,
}
