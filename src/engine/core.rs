// src/engine/core.rs

//! Pure core runtime state machine of the watch loop.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - running dispatched tasks through a `TaskRunner`
//! - delivering notifications to preview clients
//! - handling Ctrl+C / shutdown
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::engine::rules::{RulePhase, RuleState};
use crate::engine::{RuleName, RuntimeEvent, TaskName, TaskOutcome};
use crate::types::NotifyAction;
use crate::watch::WatchRule;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run `task` on behalf of `rule`.
    Dispatch { rule: RuleName, task: TaskName },
    /// Tell preview clients to refresh; answer with `NotifyDelivered`.
    Notify { rule: RuleName, action: NotifyAction },
    /// A task failed fatally; stop the dev run with this error.
    Abort { task: TaskName, message: String },
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Pure core runtime state.
///
/// This owns:
/// - one [`RuleState`] per watch rule
/// - the set of tasks currently in flight (across all rules)
/// - which tasks may fail without ending the dev run
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    rules: BTreeMap<RuleName, RuleState>,
    /// Declaration order, used when looking for unblocked pending re-runs.
    order: Vec<RuleName>,
    /// Task → rule that dispatched it.
    in_flight: HashMap<TaskName, RuleName>,
    recoverable: HashSet<TaskName>,
}

impl CoreRuntime {
    /// `recoverable` names the tasks whose failure is logged and survived.
    pub fn new(rules: &[WatchRule], recoverable: impl IntoIterator<Item = TaskName>) -> Self {
        let order: Vec<RuleName> = rules.iter().map(|r| r.name().to_string()).collect();
        let rules = rules
            .iter()
            .map(|r| (r.name().to_string(), RuleState::new(r)))
            .collect();
        Self {
            rules,
            order,
            in_flight: HashMap::new(),
            recoverable: recoverable.into_iter().collect(),
        }
    }

    pub fn rule(&self, name: &str) -> Option<&RuleState> {
        self.rules.get(name)
    }

    /// True if no rule is running, notifying or waiting for a re-run.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
            && self
                .rules
                .values()
                .all(|r| r.is_idle() && !r.rerun_pending())
    }

    /// Tasks currently dispatched.
    pub fn in_flight(&self) -> impl Iterator<Item = &str> {
        self.in_flight.keys().map(String::as_str)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::RuleTriggered { rule } => self.handle_trigger(&rule),
            RuntimeEvent::TaskCompleted {
                rule,
                task,
                outcome,
            } => self.handle_completion(&rule, &task, outcome),
            RuntimeEvent::NotifyDelivered { rule } => self.handle_notified(&rule),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    fn is_blocked(&self, rule: &RuleState) -> bool {
        rule.tasks().iter().any(|t| self.in_flight.contains_key(t))
    }

    /// Start `name` if it is idle and unblocked; otherwise remember the
    /// trigger.
    fn try_start(&mut self, name: &str, commands: &mut Vec<CoreCommand>) {
        let Some(rule) = self.rules.get(name) else {
            return;
        };
        if !rule.is_idle() || self.is_blocked(rule) {
            if let Some(rule) = self.rules.get_mut(name) {
                rule.record_trigger();
            }
            return;
        }

        let Some(rule) = self.rules.get_mut(name) else {
            return;
        };
        if let Some(task) = rule.start().map(str::to_string) {
            info!(rule = %name, task = %task, "starting watch rule");
            self.in_flight.insert(task.clone(), name.to_string());
            commands.push(CoreCommand::Dispatch {
                rule: name.to_string(),
                task,
            });
        }
    }

    /// Dispatch the held task of every waiting rule whose task is free again.
    fn resume_waiting(&mut self, commands: &mut Vec<CoreCommand>) {
        for name in &self.order {
            let Some(rule) = self.rules.get_mut(name) else {
                continue;
            };
            let free = rule
                .waiting_for()
                .is_some_and(|task| !self.in_flight.contains_key(task));
            if !free {
                continue;
            }
            if let Some(task) = rule.resume().map(str::to_string) {
                debug!(rule = %name, task = %task, "resuming waiting rule");
                self.in_flight.insert(task.clone(), name.clone());
                commands.push(CoreCommand::Dispatch {
                    rule: name.clone(),
                    task,
                });
            }
        }
    }

    /// Resume waiting rules, then start every idle, unblocked rule that has a
    /// pending re-run. Waiting rules go first so a fresh trigger cannot take
    /// their task again.
    fn start_pending(&mut self, commands: &mut Vec<CoreCommand>) {
        self.resume_waiting(commands);
        let pending: Vec<RuleName> = self
            .order
            .iter()
            .filter(|name| {
                self.rules
                    .get(*name)
                    .is_some_and(|r| r.rerun_pending() && r.is_idle() && !self.is_blocked(r))
            })
            .cloned()
            .collect();
        for name in pending {
            debug!(rule = %name, "starting pending re-run");
            self.try_start(&name, commands);
        }
    }

    fn handle_trigger(&mut self, rule: &str) -> CoreStep {
        if !self.rules.contains_key(rule) {
            warn!(rule, "trigger for unknown watch rule ignored");
            return CoreStep::continue_with(Vec::new());
        }
        let mut commands = Vec::new();
        self.try_start(rule, &mut commands);
        CoreStep::continue_with(commands)
    }

    fn handle_completion(&mut self, rule_name: &str, task: &str, outcome: TaskOutcome) -> CoreStep {
        let mut commands = Vec::new();

        if self.in_flight.get(task).map(String::as_str) != Some(rule_name) {
            debug!(rule = %rule_name, task, "completion for a task not in flight; ignoring");
            return CoreStep::continue_with(commands);
        }
        self.in_flight.remove(task);

        let Some(rule) = self.rules.get_mut(rule_name) else {
            return CoreStep::continue_with(commands);
        };
        if rule.current_task() != Some(task) {
            debug!(rule = %rule_name, task, phase = ?rule.phase(), "stale completion ignored");
            return CoreStep::continue_with(commands);
        }

        match outcome {
            TaskOutcome::Success => {
                info!(rule = %rule_name, task, "task finished");
                if let Some(next) = rule.advance().map(str::to_string) {
                    if self.in_flight.contains_key(&next) {
                        rule.wait();
                    } else {
                        self.in_flight.insert(next.clone(), rule_name.to_string());
                        commands.push(CoreCommand::Dispatch {
                            rule: rule_name.to_string(),
                            task: next,
                        });
                    }
                } else if rule.phase() == RulePhase::Notifying {
                    commands.push(CoreCommand::Notify {
                        rule: rule_name.to_string(),
                        action: rule.notify(),
                    });
                }
            }
            TaskOutcome::Failed(message) => {
                rule.finish();
                if !self.recoverable.contains(task) {
                    return CoreStep {
                        commands: vec![CoreCommand::Abort {
                            task: task.to_string(),
                            message,
                        }],
                        keep_running: false,
                    };
                }
                warn!(rule = %rule_name, task, error = %message, "task failed; keeping previous output");
            }
        }

        self.start_pending(&mut commands);
        CoreStep::continue_with(commands)
    }

    fn handle_notified(&mut self, rule_name: &str) -> CoreStep {
        let mut commands = Vec::new();
        if let Some(rule) = self.rules.get_mut(rule_name) {
            if rule.phase() == RulePhase::Notifying {
                rule.finish();
            }
        }
        self.start_pending(&mut commands);
        CoreStep::continue_with(commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::WatchRuleConfig;

    fn rule(name: &str, run: &[&str], notify: NotifyAction) -> WatchRule {
        WatchRule::from_config(
            0,
            &WatchRuleConfig {
                name: Some(name.to_string()),
                paths: vec!["**".to_string()],
                run: run.iter().map(|s| s.to_string()).collect(),
                notify,
                use_hash: false,
            },
        )
        .unwrap()
    }

    fn trigger(rule: &str) -> RuntimeEvent {
        RuntimeEvent::RuleTriggered {
            rule: rule.to_string(),
        }
    }

    fn done(rule: &str, task: &str) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            rule: rule.to_string(),
            task: task.to_string(),
            outcome: TaskOutcome::Success,
        }
    }

    fn dispatch(rule: &str, task: &str) -> CoreCommand {
        CoreCommand::Dispatch {
            rule: rule.to_string(),
            task: task.to_string(),
        }
    }

    #[test]
    fn style_rule_runs_then_injects() {
        let mut core = CoreRuntime::new(&[rule("styles", &["styles"], NotifyAction::Inject)], []);

        assert_eq!(core.step(trigger("styles")).commands, vec![dispatch("styles", "styles")]);
        assert_eq!(
            core.step(done("styles", "styles")).commands,
            vec![CoreCommand::Notify {
                rule: "styles".to_string(),
                action: NotifyAction::Inject
            }]
        );
        assert!(core.step(RuntimeEvent::NotifyDelivered { rule: "styles".to_string() }).commands.is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn triggers_during_a_run_coalesce_into_one_rerun() {
        let mut core = CoreRuntime::new(&[rule("scripts", &["scripts"], NotifyAction::None)], []);

        core.step(trigger("scripts"));
        for _ in 0..5 {
            assert!(core.step(trigger("scripts")).commands.is_empty());
        }
        assert_eq!(core.step(done("scripts", "scripts")).commands, vec![dispatch("scripts", "scripts")]);
        assert!(core.step(done("scripts", "scripts")).commands.is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn rerun_waits_for_notification_delivery() {
        let mut core = CoreRuntime::new(&[rule("markup", &["html"], NotifyAction::Reload)], []);
        core.step(trigger("markup"));
        let step = core.step(done("markup", "html"));
        assert!(matches!(step.commands[0], CoreCommand::Notify { .. }));

        assert!(core.step(trigger("markup")).commands.is_empty());
        let step = core.step(RuntimeEvent::NotifyDelivered { rule: "markup".to_string() });
        assert_eq!(step.commands, vec![dispatch("markup", "html")]);
    }

    #[test]
    fn rules_sharing_a_task_do_not_run_it_concurrently() {
        let mut core = CoreRuntime::new(
            &[
                rule("a", &["shared"], NotifyAction::None),
                rule("b", &["shared", "other"], NotifyAction::None),
            ],
            [],
        );
        assert_eq!(core.step(trigger("a")).commands, vec![dispatch("a", "shared")]);
        assert!(core.step(trigger("b")).commands.is_empty());
        assert_eq!(core.step(done("a", "shared")).commands, vec![dispatch("b", "shared")]);
        assert_eq!(core.step(done("b", "shared")).commands, vec![dispatch("b", "other")]);
    }

    #[test]
    fn later_task_held_by_another_rule_waits_for_it() {
        let mut core = CoreRuntime::new(
            &[
                rule("a", &["x"], NotifyAction::None),
                rule("b", &["y", "x"], NotifyAction::None),
            ],
            [],
        );
        assert_eq!(core.step(trigger("b")).commands, vec![dispatch("b", "y")]);
        assert_eq!(core.step(trigger("a")).commands, vec![dispatch("a", "x")]);

        // x is still running for a: b must not start it a second time.
        assert!(core.step(done("b", "y")).commands.is_empty());
        assert_eq!(core.rule("b").unwrap().phase(), RulePhase::Waiting { next: 1 });
        assert_eq!(core.in_flight().collect::<Vec<_>>(), vec!["x"]);

        assert_eq!(core.step(done("a", "x")).commands, vec![dispatch("b", "x")]);
        assert!(core.step(done("b", "x")).commands.is_empty());
        assert!(core.is_idle());

        assert_eq!(core.step(trigger("a")).commands, vec![dispatch("a", "x")]);
    }

    #[test]
    fn waiting_rule_goes_before_a_pending_rerun_of_the_holder() {
        let mut core = CoreRuntime::new(
            &[
                rule("a", &["x"], NotifyAction::None),
                rule("b", &["y", "x"], NotifyAction::None),
            ],
            [],
        );
        core.step(trigger("b"));
        core.step(trigger("a"));
        core.step(done("b", "y"));
        assert!(core.step(trigger("a")).commands.is_empty());

        assert_eq!(core.step(done("a", "x")).commands, vec![dispatch("b", "x")]);
        assert_eq!(core.step(done("b", "x")).commands, vec![dispatch("a", "x")]);
        assert!(core.step(done("a", "x")).commands.is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn independent_rules_run_side_by_side() {
        let mut core = CoreRuntime::new(
            &[
                rule("styles", &["styles"], NotifyAction::Inject),
                rule("scripts", &["scripts"], NotifyAction::Reload),
            ],
            [],
        );
        assert_eq!(core.step(trigger("styles")).commands.len(), 1);
        assert_eq!(core.step(trigger("scripts")).commands.len(), 1);
        let mut running: Vec<&str> = core.in_flight().collect();
        running.sort();
        assert_eq!(running, vec!["scripts", "styles"]);
    }

    #[test]
    fn recoverable_failure_keeps_running_and_skips_notify() {
        let mut core = CoreRuntime::new(
            &[rule("styles", &["styles"], NotifyAction::Inject)],
            ["styles".to_string()],
        );
        core.step(trigger("styles"));
        let step = core.step(RuntimeEvent::TaskCompleted {
            rule: "styles".to_string(),
            task: "styles".to_string(),
            outcome: TaskOutcome::Failed("expected ;".to_string()),
        });
        assert!(step.keep_running);
        assert!(step.commands.is_empty());
        assert!(core.is_idle());
    }

    #[test]
    fn fatal_failure_aborts() {
        let mut core = CoreRuntime::new(&[rule("scripts", &["scripts"], NotifyAction::Reload)], []);
        core.step(trigger("scripts"));
        let step = core.step(RuntimeEvent::TaskCompleted {
            rule: "scripts".to_string(),
            task: "scripts".to_string(),
            outcome: TaskOutcome::Failed("boom".to_string()),
        });
        assert!(!step.keep_running);
        assert_eq!(
            step.commands,
            vec![CoreCommand::Abort {
                task: "scripts".to_string(),
                message: "boom".to_string()
            }]
        );
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = CoreRuntime::new(&[], []);
        assert!(!core.step(RuntimeEvent::ShutdownRequested).keep_running);
        assert!(core.step(trigger("nope")).keep_running);
    }
}
