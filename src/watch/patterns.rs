// src/watch/patterns.rs

use anyhow::{Context, Result};

use crate::config::model::{ConfigFile, WatchRuleConfig};
use crate::engine::{RuleName, TaskName};
use crate::patterns::PatternSet;
use crate::types::NotifyAction;

/// A compiled `[[watch]]` rule.
///
/// The patterns are relative to the source directory; the watcher passes
/// relative paths (e.g. `"sass/blocks/header.scss"`) into [`WatchRule::matches`].
#[derive(Debug, Clone)]
pub struct WatchRule {
    name: RuleName,
    paths: PatternSet,
    tasks: Vec<TaskName>,
    notify: NotifyAction,
    use_hash: bool,
}

impl WatchRule {
    pub fn from_config(index: usize, cfg: &WatchRuleConfig) -> Result<Self> {
        let name = cfg.label(index);
        let paths = PatternSet::new(&cfg.paths)
            .with_context(|| format!("compiling paths of watch rule {name}"))?;
        Ok(Self {
            name,
            paths,
            tasks: cfg.run.clone(),
            notify: cfg.notify,
            use_hash: cfg.use_hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks run, in order, when the rule fires.
    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    pub fn notify(&self) -> NotifyAction {
        self.notify
    }

    /// Whether unchanged file contents suppress the rule.
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    pub fn paths(&self) -> &PatternSet {
        &self.paths
    }

    /// Returns true if a change of `rel_path` (relative to the source dir)
    /// fires this rule.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.paths.is_match(rel_path)
    }
}

/// Compile every watch rule of a validated config, in declaration order.
pub fn build_rules_from_config(cfg: &ConfigFile) -> Result<Vec<WatchRule>> {
    cfg.watch_rules()
        .iter()
        .enumerate()
        .map(|(idx, rule)| WatchRule::from_config(idx, rule))
        .collect()
}
