pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::page::Page;

/// A tracker user, as referenced by tasks and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Opened,
    Closed,
}

/// An issue/ticket from the external tracker. Immutable once fetched: one
/// metrics run works off the snapshot returned by the assignment query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    /// Project-internal id, used by the event-history endpoints.
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Current label set. Raw data only — the state machine replays labels
    /// from the event history instead of seeding from this.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub author: Option<User>,
}

impl Task {
    pub fn is_closed(&self) -> bool {
        self.state == TaskState::Closed
    }

    /// Last known timestamp for a closed task: `closed_at` when the tracker
    /// provides it, `updated_at` otherwise.
    pub fn closed_end(&self) -> DateTime<Utc> {
        self.closed_at.unwrap_or(self.updated_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAction {
    Add,
    Remove,
}

/// One entry of a task's label-change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEvent {
    pub label: String,
    pub action: LabelAction,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub actor: Option<User>,
}

/// One entry of a task's assignee-change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssigneeEvent {
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub to: Option<User>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub actor: Option<User>,
}

/// A label defined on a project, used to derive the label→stage table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The issue-tracker boundary. Implementations own transport, auth, and wire
/// formats; the engine only sees these four paginated/listing operations.
///
/// Every error an implementation returns is surfaced as `Error::Fetch` — the
/// engine treats transport and authorization failures as a single "remote
/// fetch failed" condition per call site.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Tasks assigned to a user, 0-based `page` of `per_page` items. The
    /// order of this listing fixes the task order of the final report.
    async fn assigned_tasks_page(
        &self,
        user_id: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Page<Task>>;

    /// Label-change history for one task.
    async fn label_events_page(
        &self,
        project_id: u64,
        task_iid: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Page<LabelEvent>>;

    /// Assignee-change history for one task.
    async fn assignee_events_page(
        &self,
        project_id: u64,
        task_iid: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Page<AssigneeEvent>>;

    /// Label definitions for a project, in the tracker's own order.
    async fn project_labels(&self, project_id: u64) -> Result<Vec<LabelDef>>;
}
