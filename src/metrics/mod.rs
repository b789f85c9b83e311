pub mod types;

pub use types::*;

use std::collections::BTreeMap;

use crate::history::Event;
use crate::stages::{ActiveLabels, Stage, StageLabelMap};
use crate::tracker::{LabelAction, Task};

/// Walk a task's normalized event sequence and produce its stage intervals,
/// per-stage totals, and raw histories.
///
/// One state machine run per task, state `(current_stage, stage_start,
/// active_labels)`. The replay starts from an empty active set: trackers emit
/// label events for labels applied at creation, so seeding from the task's
/// current label set would double-count them.
pub fn compute_task_metrics(task: &Task, events: &[Event], map: &StageLabelMap) -> TaskMetrics {
    let mut active = ActiveLabels::new();
    let mut current_stage = map.classify(&active);
    let mut stage_start = task.created_at;

    let mut intervals: Vec<StageInterval> = Vec::new();
    let mut label_history: Vec<LabelChange> = Vec::new();
    let mut assignee_history: Vec<AssigneeChange> = Vec::new();
    let mut assignees: Vec<String> = Vec::new();

    for event in events {
        match event {
            Event::LabelAdded { label, at, actor } => {
                label_history.push(LabelChange {
                    label: label.clone(),
                    action: LabelAction::Add,
                    at: *at,
                    actor: actor.clone(),
                });
                active.add(label);
                // An event timestamped before the current interval start
                // (clock skew, backfilled history) is clamped so intervals
                // stay non-overlapping.
                let at = (*at).max(stage_start);
                let stage = map.classify(&active);
                if stage != current_stage {
                    intervals.push(StageInterval::closed(current_stage, stage_start, at));
                    current_stage = stage;
                    stage_start = at;
                }
            }
            Event::LabelRemoved { label, at, actor } => {
                label_history.push(LabelChange {
                    label: label.clone(),
                    action: LabelAction::Remove,
                    at: *at,
                    actor: actor.clone(),
                });
                active.remove(label);
                let at = (*at).max(stage_start);
                let stage = map.classify(&active);
                if stage != current_stage {
                    intervals.push(StageInterval::closed(current_stage, stage_start, at));
                    current_stage = stage;
                    stage_start = at;
                }
            }
            Event::AssigneeChanged {
                from,
                to,
                at,
                actor,
            } => {
                // Stage is label-driven; assignee changes only feed the
                // exported history.
                assignee_history.push(AssigneeChange {
                    from: from.clone(),
                    to: to.clone(),
                    at: *at,
                    actor: actor.clone(),
                });
                if let Some(to) = to {
                    if !assignees.contains(to) {
                        assignees.push(to.clone());
                    }
                }
            }
        }
    }

    let ongoing = if task.is_closed() {
        let end = task.closed_end().max(stage_start);
        intervals.push(StageInterval::closed(current_stage, stage_start, end));
        None
    } else {
        intervals.push(StageInterval::ongoing(current_stage, stage_start));
        Some(OngoingStage {
            stage: current_stage,
            since: stage_start,
        })
    };

    if assignees.is_empty() {
        if let Some(ref assignee) = task.assignee {
            assignees.push(assignee.username.clone());
        }
    }

    let mut totals_seconds: BTreeMap<Stage, i64> = BTreeMap::new();
    for interval in &intervals {
        if let Some(duration) = interval.duration_seconds {
            *totals_seconds.entry(interval.stage).or_insert(0) += duration;
        }
    }

    TaskMetrics {
        task_id: task.id,
        task_iid: task.iid,
        project_id: task.project_id,
        title: task.title.clone(),
        state: task.state,
        intervals,
        totals_seconds,
        ongoing,
        label_history,
        assignee_history,
        assignees_during_cycle: assignees,
    }
}

/// Sum per-stage totals across tasks for the report aggregate.
pub fn aggregate_totals<'a>(
    tasks: impl IntoIterator<Item = &'a TaskMetrics>,
) -> BTreeMap<Stage, i64> {
    let mut totals: BTreeMap<Stage, i64> = BTreeMap::new();
    for task in tasks {
        for (stage, seconds) in &task.totals_seconds {
            *totals.entry(*stage).or_insert(0) += seconds;
        }
    }
    totals
}
