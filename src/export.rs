use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::date_util::{format_duration, timestamp_key};
use crate::error::Result;
use crate::metrics::{FailedTask, OngoingStage, StageInterval, TaskMetrics, UserReport};
use crate::stages::Stage;
use crate::tracker::TaskState;

/// Bumped whenever the exported field layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Serialize a user report into the export artifact (pretty JSON bytes).
///
/// The caller supplies `generated_at` so identical reports produce
/// byte-identical artifacts for any fixed timestamp — tests diff exports
/// directly. Field order follows struct order and `BTreeMap` key order, so
/// the output is deterministic. Where the bytes land is the caller's
/// business; this only produces content.
pub fn export_report(report: &UserReport, generated_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        generated_at,
        user: UserBlock {
            id: report.user_id,
            username: &report.username,
        },
        summary: SummaryBlock {
            total_tasks: report.tasks.len(),
            failed_tasks: report.failed.len(),
            complete: report.complete,
        },
        totals: totals_block(&report.totals_seconds),
        tasks: report.tasks.iter().map(TaskBlock::from).collect(),
        failed: &report.failed,
    };
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Suggested artifact filename: `cycle_time_<username>_<YYYYMMDD_HHMMSS>.json`.
pub fn suggested_filename(report: &UserReport, generated_at: DateTime<Utc>) -> String {
    format!(
        "cycle_time_{}_{}.json",
        report.username,
        timestamp_key(generated_at)
    )
}

#[derive(Serialize)]
struct Envelope<'a> {
    format_version: u32,
    generated_at: DateTime<Utc>,
    user: UserBlock<'a>,
    summary: SummaryBlock,
    totals: BTreeMap<Stage, TotalBlock>,
    tasks: Vec<TaskBlock<'a>>,
    failed: &'a [FailedTask],
}

#[derive(Serialize)]
struct UserBlock<'a> {
    id: u64,
    username: &'a str,
}

#[derive(Serialize)]
struct SummaryBlock {
    total_tasks: usize,
    failed_tasks: usize,
    complete: bool,
}

#[derive(Serialize)]
struct TotalBlock {
    seconds: i64,
    formatted: String,
}

fn totals_block(totals: &BTreeMap<Stage, i64>) -> BTreeMap<Stage, TotalBlock> {
    totals
        .iter()
        .map(|(stage, seconds)| {
            (
                *stage,
                TotalBlock {
                    seconds: *seconds,
                    formatted: format_duration(*seconds),
                },
            )
        })
        .collect()
}

#[derive(Serialize)]
struct TaskBlock<'a> {
    task_id: u64,
    task_iid: u64,
    project_id: u64,
    title: &'a str,
    state: &'static str,
    intervals: Vec<IntervalBlock>,
    totals: BTreeMap<Stage, TotalBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ongoing: Option<&'a OngoingStage>,
    label_history: &'a [crate::metrics::LabelChange],
    assignee_history: &'a [crate::metrics::AssigneeChange],
    assignees_during_cycle: &'a [String],
}

impl<'a> From<&'a TaskMetrics> for TaskBlock<'a> {
    fn from(metrics: &'a TaskMetrics) -> Self {
        Self {
            task_id: metrics.task_id,
            task_iid: metrics.task_iid,
            project_id: metrics.project_id,
            title: &metrics.title,
            state: match metrics.state {
                TaskState::Opened => "OPENED",
                TaskState::Closed => "CLOSED",
            },
            intervals: metrics.intervals.iter().map(IntervalBlock::from).collect(),
            totals: totals_block(&metrics.totals_seconds),
            ongoing: metrics.ongoing.as_ref(),
            label_history: &metrics.label_history,
            assignee_history: &metrics.assignee_history,
            assignees_during_cycle: &metrics.assignees_during_cycle,
        }
    }
}

#[derive(Serialize)]
struct IntervalBlock {
    stage: Stage,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    duration_seconds: Option<i64>,
    duration_formatted: Option<String>,
}

impl From<&StageInterval> for IntervalBlock {
    fn from(interval: &StageInterval) -> Self {
        Self {
            stage: interval.stage,
            start: interval.start,
            end: interval.end,
            duration_seconds: interval.duration_seconds,
            duration_formatted: interval.duration_seconds.map(format_duration),
        }
    }
}
