/// Observer for coarse-grained progress during a multi-task run.
///
/// Side effect only: implementations must not block the pipeline and can
/// never affect computed results. Supplied by the presentation layer.
pub trait ProgressSink: Send + Sync {
    /// Called after every configured step of processed tasks, and once at
    /// completion regardless of alignment.
    fn on_progress(&self, processed: usize, total: usize);

    /// Called when a task's history fetch fails and the task is recorded in
    /// the report's failed set.
    fn on_task_failed(&self, _task_id: u64, _reason: &str) {}
}

/// A sink that ignores all notifications.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _processed: usize, _total: usize) {}
}

/// Step counter deciding when the sink fires.
///
/// For `total = 25, step = 10` the cadence is {10, 20, 25}: every full step,
/// plus a final call at completion unless the last step-aligned call already
/// reported the total. An empty task set gets exactly one `(0, 0)` call.
pub struct ProgressTicker<'a> {
    sink: &'a dyn ProgressSink,
    step: usize,
    total: usize,
    processed: usize,
    last_reported: Option<usize>,
}

impl<'a> ProgressTicker<'a> {
    pub fn new(sink: &'a dyn ProgressSink, step: usize, total: usize) -> Self {
        Self {
            sink,
            step: step.max(1),
            total,
            processed: 0,
            last_reported: None,
        }
    }

    /// Record one processed task, firing the sink on step boundaries.
    pub fn tick(&mut self) {
        self.processed += 1;
        if self.processed % self.step == 0 {
            self.sink.on_progress(self.processed, self.total);
            self.last_reported = Some(self.processed);
        }
    }

    /// Fire the completion notification if the current count has not already
    /// been reported.
    pub fn finish(&mut self) {
        if self.last_reported != Some(self.processed) {
            self.sink.on_progress(self.processed, self.total);
            self.last_reported = Some(self.processed);
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}
