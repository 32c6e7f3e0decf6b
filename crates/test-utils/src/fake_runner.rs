use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetpipe::dag::Task;
use assetpipe::errors::{AssetpipeError, Result};
use assetpipe::exec::{TaskReport, TaskRunner};
use assetpipe::serve::ReloadNotifier;
use assetpipe::types::NotifyAction;

/// Start/finish ticks of one task run, taken from a shared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpan {
    pub started: usize,
    pub finished: usize,
}

/// A fake runner that:
/// - records a [`RunSpan`] per task run, in completion order
/// - optionally sleeps per task to widen interleavings
/// - fails the tasks named in `failing`
/// - panics in the tasks named in `panicking`
/// - writes nothing
#[derive(Debug, Default)]
pub struct FakeRunner {
    clock: AtomicUsize,
    spans: Mutex<Vec<(String, RunSpan)>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    failing: HashSet<String>,
    panicking: HashSet<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_task_delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// The task records its span, then panics.
    pub fn panicking(mut self, task: &str) -> Self {
        self.panicking.insert(task.to_string());
        self
    }

    /// `(task, span)` for every finished run, in completion order.
    pub fn spans(&self) -> Vec<(String, RunSpan)> {
        self.spans.lock().unwrap().clone()
    }

    /// Names of finished runs, in completion order.
    pub fn executed(&self) -> Vec<String> {
        self.spans().into_iter().map(|(name, _)| name).collect()
    }

    /// How many times `task` finished.
    pub fn count(&self, task: &str) -> usize {
        self.spans().iter().filter(|(name, _)| name == task).count()
    }

    fn tick(&self) -> usize {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }
}

impl TaskRunner for FakeRunner {
    fn run_task<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskReport>> + Send + 'a>> {
        Box::pin(async move {
            let started = self.tick();
            let delay = self
                .delays
                .get(&task.name)
                .copied()
                .unwrap_or(self.default_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let finished = self.tick();
            self.spans
                .lock()
                .unwrap()
                .push((task.name.clone(), RunSpan { started, finished }));

            if self.panicking.contains(&task.name) {
                panic!("task {} configured to panic", task.name);
            }
            if self.failing.contains(&task.name) {
                return Err(AssetpipeError::TaskFailed {
                    task: task.name.clone(),
                    message: "configured to fail".to_string(),
                });
            }
            Ok(TaskReport {
                task: task.name.clone(),
                written: Vec::new(),
                cleared: false,
            })
        })
    }
}

/// Notifier that records every action and wakes waiters.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    actions: Arc<Mutex<Vec<NotifyAction>>>,
    notify: Arc<tokio::sync::Notify>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<NotifyAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Wait until at least `n` notifications were recorded.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.actions.lock().unwrap().len() >= n {
                return;
            }
            notified.await;
        }
    }
}

impl ReloadNotifier for RecordingNotifier {
    fn notify(&self, action: NotifyAction) {
        self.actions.lock().unwrap().push(action);
        self.notify.notify_waiters();
    }
}
