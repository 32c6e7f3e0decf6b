// src/engine/rules.rs

use tracing::debug;

use crate::engine::{RuleName, TaskName};
use crate::types::NotifyAction;
use crate::watch::WatchRule;

/// Where a watch rule is in its `Idle → Running → Notifying → Idle` cycle.
/// `Running` and `Waiting` alternate while a later task is held by another rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePhase {
    Idle,
    /// Task `next` of the rule's `run` list is in flight.
    Running { next: usize },
    /// Task `next` is due but another rule has it in flight.
    Waiting { next: usize },
    /// All tasks succeeded; waiting for the notification to be delivered.
    Notifying,
}

/// Per-rule runtime state.
///
/// Semantics:
/// - A trigger while the rule is not idle (or is blocked by another rule
///   running one of its tasks) only sets `rerun_pending`. Any number of such
///   triggers coalesce into a single re-run.
/// - When the rule returns to idle and is unblocked, a pending re-run starts
///   immediately.
#[derive(Debug, Clone)]
pub struct RuleState {
    name: RuleName,
    tasks: Vec<TaskName>,
    notify: NotifyAction,
    phase: RulePhase,
    rerun_pending: bool,
}

impl RuleState {
    pub fn new(rule: &WatchRule) -> Self {
        Self {
            name: rule.name().to_string(),
            tasks: rule.tasks().to_vec(),
            notify: rule.notify(),
            phase: RulePhase::Idle,
            rerun_pending: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn notify(&self) -> NotifyAction {
        self.notify
    }

    pub fn phase(&self) -> RulePhase {
        self.phase
    }

    pub fn rerun_pending(&self) -> bool {
        self.rerun_pending
    }

    pub fn is_idle(&self) -> bool {
        self.phase == RulePhase::Idle
    }

    /// Remember a trigger that could not start a run right away.
    pub fn record_trigger(&mut self) {
        if !self.rerun_pending {
            debug!(rule = %self.name, phase = ?self.phase, "rule busy; re-run pending");
        }
        self.rerun_pending = true;
    }

    /// Start a run from idle and return the first task to dispatch.
    pub fn start(&mut self) -> Option<&str> {
        self.rerun_pending = false;
        if self.tasks.is_empty() {
            return None;
        }
        self.phase = RulePhase::Running { next: 0 };
        self.tasks.first().map(String::as_str)
    }

    /// Task currently in flight, if any.
    pub fn current_task(&self) -> Option<&str> {
        match self.phase {
            RulePhase::Running { next } => self.tasks.get(next).map(String::as_str),
            _ => None,
        }
    }

    /// The current task succeeded: return the next one to dispatch, or
    /// `None` once the run list is exhausted (the rule then moves to
    /// `Notifying` or back to `Idle`).
    pub fn advance(&mut self) -> Option<&str> {
        let RulePhase::Running { next } = self.phase else {
            return None;
        };
        let following = next + 1;
        if following < self.tasks.len() {
            self.phase = RulePhase::Running { next: following };
            return self.tasks.get(following).map(String::as_str);
        }
        self.phase = if self.notify == NotifyAction::None {
            RulePhase::Idle
        } else {
            RulePhase::Notifying
        };
        None
    }

    /// The task [`advance`](Self::advance) returned cannot be dispatched yet.
    pub fn wait(&mut self) {
        if let RulePhase::Running { next } = self.phase {
            debug!(rule = %self.name, task = %self.tasks[next], "task busy in another rule; waiting");
            self.phase = RulePhase::Waiting { next };
        }
    }

    /// Task this rule is waiting to dispatch.
    pub fn waiting_for(&self) -> Option<&str> {
        match self.phase {
            RulePhase::Waiting { next } => self.tasks.get(next).map(String::as_str),
            _ => None,
        }
    }

    /// Continue a waiting run and return the task to dispatch.
    pub fn resume(&mut self) -> Option<&str> {
        let RulePhase::Waiting { next } = self.phase else {
            return None;
        };
        self.phase = RulePhase::Running { next };
        self.tasks.get(next).map(String::as_str)
    }

    /// Leave the current run (failure or delivered notification).
    pub fn finish(&mut self) {
        self.phase = RulePhase::Idle;
    }
}
