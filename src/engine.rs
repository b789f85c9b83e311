use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::history::normalize_history;
use crate::metrics::{
    aggregate_totals, compute_task_metrics, FailedTask, TaskMetrics, UserReport,
};
use crate::page::{fetch_all, Page, PageCursor, PageSource};
use crate::progress::{ProgressSink, ProgressTicker};
use crate::stages::StageLabelMap;
use crate::tracker::retry::retry_fetch;
use crate::tracker::{Task, TrackerClient, User};

/// Main entry point: computes per-stage cycle-time metrics for a user's
/// assigned tasks.
pub struct Engine<C> {
    client: Arc<C>,
    config: EngineConfig,
}

/// `PageSource` view of one user's assigned-task listing.
struct AssignedTasks<C> {
    client: Arc<C>,
    user_id: u64,
}

#[async_trait]
impl<C: TrackerClient> PageSource for AssignedTasks<C> {
    type Item = Task;

    async fn fetch_page(&self, page_index: usize, page_size: usize) -> Result<Page<Task>> {
        self.client
            .assigned_tasks_page(self.user_id, page_index, page_size)
            .await
    }
}

enum TaskOutcome {
    Done(Box<TaskMetrics>),
    Failed(FailedTask),
    Abandoned,
}

impl<C: TrackerClient + 'static> Engine<C> {
    pub fn new(client: C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Browsing cursor over a user's assigned tasks, using the configured
    /// browse page size.
    pub fn assigned_tasks_cursor(&self, user_id: u64) -> PageCursor<impl PageSource<Item = Task>> {
        PageCursor::new(
            AssignedTasks {
                client: self.client.clone(),
                user_id,
            },
            self.config.browse_page_size,
        )
    }

    /// Compute the full stage-metrics report for one user.
    ///
    /// Fetches every assigned task, then dispatches per-task
    /// fetch-and-compute work into a bounded pool. Results are keyed by the
    /// task's index in the assignment query and reassembled in that order,
    /// so the report is deterministic for a fixed remote state regardless of
    /// completion order. A task whose history fetch fails lands in the
    /// report's `failed` list; only cancellation stops the run early.
    pub async fn user_report(
        &self,
        user: &User,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<UserReport> {
        let source = AssignedTasks {
            client: self.client.clone(),
            user_id: user.id,
        };
        let tasks = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return self.cancelled_outcome(user, Vec::new(), Vec::new());
            }
            res = fetch_all(&source, self.config.fetch_page_size, self.config.max_retries) => res?,
        };

        let total = tasks.len();
        log::info!("Computing stage metrics for {} ({} tasks)", user.username, total);

        let mut ticker = ProgressTicker::new(progress, self.config.progress_step, total);
        if total == 0 {
            ticker.finish();
            return Ok(self.assemble(user, Vec::new(), Vec::new(), true));
        }

        let stage_maps = self.resolve_stage_maps(&tasks).await;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut workers: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let client = self.client.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let stage_map = stage_maps.get(&task.project_id).cloned();
            let page_size = self.config.fetch_page_size;
            let max_retries = self.config.max_retries;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, TaskOutcome::Abandoned),
                };
                let stage_map = match stage_map {
                    Some(Ok(map)) => map,
                    Some(Err(reason)) => {
                        return (index, TaskOutcome::Failed(failed(&task, reason)))
                    }
                    None => {
                        return (
                            index,
                            TaskOutcome::Failed(failed(
                                &task,
                                "no stage map resolved for project".to_string(),
                            )),
                        )
                    }
                };
                let history = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, TaskOutcome::Abandoned),
                    res = normalize_history(
                        client.as_ref(),
                        task.project_id,
                        task.iid,
                        page_size,
                        max_retries,
                    ) => res,
                };
                match history {
                    Ok(events) => {
                        let metrics = compute_task_metrics(&task, &events, &stage_map);
                        (index, TaskOutcome::Done(Box::new(metrics)))
                    }
                    Err(e) => (index, TaskOutcome::Failed(failed(&task, e.to_string()))),
                }
            });
        }

        // Collect keyed by original index; completion order is irrelevant.
        let mut slots: Vec<Option<TaskOutcome>> = Vec::new();
        slots.resize_with(total, || None);
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    workers.abort_all();
                }
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok((index, outcome))) => {
                        if matches!(outcome, TaskOutcome::Done(_) | TaskOutcome::Failed(_)) {
                            if let TaskOutcome::Failed(ref f) = outcome {
                                progress.on_task_failed(f.task_id, &f.reason);
                            }
                            ticker.tick();
                        }
                        slots[index] = Some(outcome);
                    }
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => log::error!("Task worker panicked: {e}"),
                },
            }
        }

        let mut computed: Vec<TaskMetrics> = Vec::new();
        let mut failures: Vec<FailedTask> = Vec::new();
        for slot in slots {
            match slot {
                Some(TaskOutcome::Done(metrics)) => computed.push(*metrics),
                Some(TaskOutcome::Failed(failure)) => failures.push(failure),
                Some(TaskOutcome::Abandoned) | None => {}
            }
        }

        if cancelled {
            log::info!(
                "Run cancelled for {}: {} tasks settled before cancellation",
                user.username,
                computed.len() + failures.len()
            );
            return self.cancelled_outcome(user, computed, failures);
        }

        ticker.finish();
        if !failures.is_empty() {
            log::warn!(
                "{} of {total} tasks failed to fetch for {}",
                failures.len(),
                user.username
            );
        }
        Ok(self.assemble(user, computed, failures, true))
    }

    /// Resolve a label→stage table per project: the configured table when
    /// present, otherwise derived from each project's label list. A failed
    /// label fetch poisons only that project's tasks.
    async fn resolve_stage_maps(
        &self,
        tasks: &[Task],
    ) -> HashMap<u64, std::result::Result<Arc<StageLabelMap>, String>> {
        let mut maps = HashMap::new();
        for task in tasks {
            if maps.contains_key(&task.project_id) {
                continue;
            }
            let resolved = if let Some(ref map) = self.config.stage_map {
                Ok(Arc::new(map.clone()))
            } else {
                match retry_fetch!(
                    self.client.project_labels(task.project_id),
                    self.config.max_retries
                ) {
                    Ok(labels) => {
                        let map = StageLabelMap::from_project_labels(&labels);
                        if map.is_empty() {
                            log::warn!(
                                "Project {} has no labels matching a stage convention",
                                task.project_id
                            );
                        }
                        Ok(Arc::new(map))
                    }
                    Err(e) => Err(e.to_string()),
                }
            };
            maps.insert(task.project_id, resolved);
        }
        maps
    }

    fn cancelled_outcome(
        &self,
        user: &User,
        computed: Vec<TaskMetrics>,
        failures: Vec<FailedTask>,
    ) -> Result<UserReport> {
        if self.config.partial_on_cancel {
            Ok(self.assemble(user, computed, failures, false))
        } else {
            Err(Error::Cancelled)
        }
    }

    fn assemble(
        &self,
        user: &User,
        tasks: Vec<TaskMetrics>,
        failed: Vec<FailedTask>,
        complete: bool,
    ) -> UserReport {
        let totals_seconds = aggregate_totals(&tasks);
        UserReport {
            user_id: user.id,
            username: user.username.clone(),
            tasks,
            failed,
            totals_seconds,
            complete,
        }
    }
}

fn failed(task: &Task, reason: String) -> FailedTask {
    FailedTask {
        task_id: task.id,
        task_iid: task.iid,
        project_id: task.project_id,
        title: task.title.clone(),
        reason,
    }
}
