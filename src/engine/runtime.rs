// src/engine/runtime.rs

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dag::Pipeline;
use crate::errors::{AssetpipeError, Result};
use crate::exec::TaskRunner;
use crate::serve::ReloadNotifier;

use super::core::CoreRuntime;
use super::{CoreCommand, RuleName, RuntimeEvent, TaskName, TaskOutcome};

/// Drives the watch core in response to `RuntimeEvent`s and delegates task
/// execution to a `TaskRunner` and notifications to a `ReloadNotifier`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from the
/// channel, spawning tasks and feeding their completions back.
pub struct Runtime<R: TaskRunner> {
    core: CoreRuntime,
    pipeline: Arc<Pipeline>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    event_tx: mpsc::Sender<RuntimeEvent>,
    runner: Arc<R>,
    notifier: Arc<dyn ReloadNotifier>,
    running: JoinSet<()>,
    /// Spawned task id → the dispatch it serves, for reporting panics.
    spawned: HashMap<Id, (RuleName, TaskName)>,
}

impl<R: TaskRunner> fmt::Debug for Runtime<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl<R: TaskRunner> Runtime<R> {
    /// `event_tx` must feed `event_rx`; task completions are sent through it.
    pub fn new(
        core: CoreRuntime,
        pipeline: Arc<Pipeline>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        event_tx: mpsc::Sender<RuntimeEvent>,
        runner: Arc<R>,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Self {
        Self {
            core,
            pipeline,
            event_rx,
            event_tx,
            runner,
            notifier,
            running: JoinSet::new(),
            spawned: HashMap::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (dispatch, notify, abort).
    ///
    /// Returns when shutdown is requested, the channel closes or a task
    /// fails fatally; in-flight tasks are aborted on the way out.
    pub async fn run(mut self) -> Result<()> {
        info!("watch runtime started");
        let result = self.event_loop().await;
        if !self.running.is_empty() {
            info!(tasks = self.running.len(), "aborting in-flight tasks");
        }
        self.running.abort_all();
        while self.running.join_next().await.is_some() {}
        info!("watch runtime exiting");
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut queue: VecDeque<RuntimeEvent> = VecDeque::new();

        loop {
            self.reap_finished(&mut queue);

            let event = match queue.pop_front() {
                Some(e) => e,
                None => tokio::select! {
                    received = self.event_rx.recv() => match received {
                        Some(e) => e,
                        None => {
                            info!("runtime event channel closed; exiting");
                            return Ok(());
                        }
                    },
                    Some(joined) = self.running.join_next_with_id(), if !self.running.is_empty() => {
                        match self.settle(joined) {
                            Some(e) => e,
                            None => continue,
                        }
                    }
                },
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                if let Some(follow_up) = self.execute_command(command)? {
                    queue.push_back(follow_up);
                }
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Execute a single command from the core. Notifications complete
    /// synchronously and yield their `NotifyDelivered` follow-up.
    fn execute_command(&mut self, command: CoreCommand) -> Result<Option<RuntimeEvent>> {
        match command {
            CoreCommand::Dispatch { rule, task } => {
                self.spawn_task(rule, task);
                Ok(None)
            }
            CoreCommand::Notify { rule, action } => {
                info!(rule = %rule, ?action, "notifying preview clients");
                self.notifier.notify(action);
                Ok(Some(RuntimeEvent::NotifyDelivered { rule }))
            }
            CoreCommand::Abort { task, message } => {
                error!(task = %task, error = %message, "task failed; stopping dev run");
                Err(AssetpipeError::TaskFailed { task, message })
            }
        }
    }

    fn spawn_task(&mut self, rule: RuleName, name: TaskName) {
        let tx = self.event_tx.clone();
        let Some(task) = self.pipeline.task(&name).cloned() else {
            warn!(rule = %rule, task = %name, "watch rule runs a task outside the dev pipeline");
            let dispatch = (rule.clone(), name.clone());
            let handle = self.running.spawn(async move {
                let _ = tx
                    .send(RuntimeEvent::TaskCompleted {
                        rule,
                        outcome: TaskOutcome::Failed(format!("task '{name}' is not in the dev pipeline")),
                        task: name,
                    })
                    .await;
            });
            self.spawned.insert(handle.id(), dispatch);
            return;
        };

        debug!(rule = %rule, task = %name, "dispatching task");
        let runner = Arc::clone(&self.runner);
        let dispatch = (rule.clone(), name.clone());
        let handle = self.running.spawn(async move {
            let outcome = match runner.run_task(&task).await {
                Ok(report) => {
                    debug!(task = %name, written = report.written.len(), "task report");
                    TaskOutcome::Success
                }
                Err(e) => TaskOutcome::Failed(e.to_string()),
            };
            let _ = tx
                .send(RuntimeEvent::TaskCompleted {
                    rule,
                    task: name,
                    outcome,
                })
                .await;
        });
        self.spawned.insert(handle.id(), dispatch);
    }

    /// Collect finished tasks without waiting; panics become failed
    /// completions on `queue`.
    fn reap_finished(&mut self, queue: &mut VecDeque<RuntimeEvent>) {
        while let Some(joined) = self.running.try_join_next_with_id() {
            if let Some(event) = self.settle(joined) {
                queue.push_back(event);
            }
        }
    }

    /// Forget a finished task. A task that panicked never sent its
    /// completion, so one is made up here and the core sees a failure.
    fn settle(&mut self, joined: std::result::Result<(Id, ()), JoinError>) -> Option<RuntimeEvent> {
        let err = match joined {
            Ok((id, ())) => {
                self.spawned.remove(&id);
                return None;
            }
            Err(err) => err,
        };
        let (rule, task) = self.spawned.remove(&err.id())?;
        if !err.is_panic() {
            return None;
        }
        error!(rule = %rule, task = %task, error = %err, "watch task panicked");
        let message = format!("task '{task}' panicked");
        Some(RuntimeEvent::TaskCompleted {
            rule,
            task,
            outcome: TaskOutcome::Failed(message),
        })
    }
}
