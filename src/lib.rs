pub mod config;
pub mod date_util;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod metrics;
pub mod page;
pub mod progress;
pub mod stages;
pub mod tracker;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use export::{export_report, suggested_filename, FORMAT_VERSION};
pub use history::{merge_events, normalize_history, Event};
pub use metrics::{
    aggregate_totals, compute_task_metrics, AssigneeChange, FailedTask, LabelChange,
    OngoingStage, StageInterval, TaskMetrics, UserReport,
};
pub use page::{fetch_all, Page, PageCursor, PageSource};
pub use progress::{NoopProgress, ProgressSink};
pub use stages::{ActiveLabels, Stage, StageLabelMap};
pub use tracker::{
    AssigneeEvent, LabelAction, LabelDef, LabelEvent, Task, TaskState, TrackerClient, User,
};
