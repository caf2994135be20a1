use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    cancel::CancellationSignal,
    error::{Result, TubepackError},
    progress::ProgressSink,
    types::ProcessingReport,
};

pub const DEFAULT_TASK_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default)]
struct TaskState {
    progress: usize,
    total: usize,
    status: String,
    completed: bool,
    cancelled: bool,
    results: Option<ProcessingReport>,
}

/// Snapshot of a task as seen by a polling client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub task_id: Uuid,
    pub progress: usize,
    pub total: usize,
    pub status: String,
    pub percent: f64,
    pub completed: bool,
    pub cancelled: bool,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ProcessingReport>,
}

/// A background run. Receives progress as a [`ProgressSink`] and owns the
/// cancellation signal the run observes.
pub struct Task {
    id: Uuid,
    started_at: Instant,
    cancel: CancellationSignal,
    state: Mutex<TaskState>,
    done: watch::Sender<bool>,
}

impl Task {
    fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            cancel: CancellationSignal::new(),
            state: Mutex::new(TaskState {
                status: "Initializing...".to_string(),
                ..TaskState::default()
            }),
            done,
        }
    }

    fn state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().expect("task state poisoned")
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_signal(&self) -> &CancellationSignal {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        let mut state = self.state();
        state.cancelled = true;
        state.status = "Cancelling...".to_string();
    }

    pub fn is_completed(&self) -> bool {
        self.state().completed
    }

    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn info(&self) -> TaskInfo {
        let state = self.state();
        let percent = if state.total > 0 {
            state.progress as f64 / state.total as f64 * 100.0
        } else {
            0.0
        };
        TaskInfo {
            task_id: self.id,
            progress: state.progress,
            total: state.total,
            status: state.status.clone(),
            percent,
            completed: state.completed,
            cancelled: state.cancelled,
            elapsed_seconds: self.age().as_secs(),
            results: if state.completed { state.results.clone() } else { None },
        }
    }

    /// Resolves once the run has finished, successfully or not.
    pub async fn wait(&self) {
        let mut rx = self.done.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    fn complete(&self, result: Result<ProcessingReport>) {
        {
            let mut state = self.state();
            match result {
                Ok(report) => {
                    if report.cancelled {
                        state.cancelled = true;
                    }
                    state.results = Some(report);
                }
                Err(e) => {
                    error!(task_id = %self.id, error = %e, "task failed");
                    state.status = format!("Error: {}", e);
                }
            }
            state.completed = true;
        }
        self.done.send_replace(true);
    }
}

impl ProgressSink for Task {
    fn report(&self, current: usize, total: usize, message: &str) {
        let mut state = self.state();
        state.progress = current;
        state.total = total;
        state.status = message.to_string();
    }
}

/// In-process table of running and finished tasks.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<Uuid, Arc<Task>>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Task>>> {
        self.tasks.lock().expect("task registry poisoned")
    }

    /// Starts `job` on the tokio runtime and returns its task right away.
    ///
    /// The job gets the task so it can report progress and observe cancellation.
    /// A panicking job still completes the task, with an error status.
    pub fn spawn<F, Fut>(&self, job: F) -> Arc<Task>
    where
        F: FnOnce(Arc<Task>) -> Fut,
        Fut: Future<Output = Result<ProcessingReport>> + Send + 'static,
    {
        let task = Arc::new(Task::new());
        self.tasks().insert(task.id(), Arc::clone(&task));
        info!(task_id = %task.id(), "task started");

        let run = tokio::spawn(job(Arc::clone(&task)));
        let handle = Arc::clone(&task);
        tokio::spawn(async move {
            let result = run.await.unwrap_or_else(|e| {
                Err(TubepackError::TaskFailed {
                    reason: e.to_string(),
                })
            });
            handle.complete(result);
        });

        task
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Task>> {
        self.tasks().get(&id).cloned()
    }

    pub fn info(&self, id: Uuid) -> Option<TaskInfo> {
        self.get(id).map(|task| task.info())
    }

    /// Flags the task for cancellation. False when no such task exists.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.get(id) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Drops completed tasks older than `max_age`. Returns how many were removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let mut tasks = self.tasks();
        let before = tasks.len();
        tasks.retain(|_, task| !(task.is_completed() && task.age() > max_age));
        before - tasks.len()
    }

    pub fn len(&self) -> usize {
        self.tasks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks().is_empty()
    }
}
