#![allow(dead_code)]

use std::collections::BTreeMap;

use assetpipe::config::{
    ConfigFile, ConfigSection, RawConfigFile, ServerSection, TaskConfig, WatchRuleConfig,
};
use assetpipe::errors::Result;
use assetpipe::types::{Mode, NotifyAction, TaskKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                server: ServerSection::default(),
                task: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(mut self, rule: WatchRuleConfig) -> Self {
        self.config.watch.push(rule);
        self
    }

    pub fn source(mut self, dir: &str) -> Self {
        self.config.config.source = dir.to_string();
        self
    }

    pub fn build_dir(mut self, dir: &str) -> Self {
        self.config.config.build = dir.to_string();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    /// Validate, returning the error instead of panicking.
    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            task: TaskConfig {
                kind,
                src: vec![],
                base: None,
                dest: String::new(),
                rename: None,
                filter: None,
                outputs: None,
                after: vec![],
                modes: None,
                recover_in_dev: None,
            },
        }
    }

    /// A clean task.
    pub fn clean() -> Self {
        Self::new(TaskKind::Clean)
    }

    /// A copy task reading `src` into `dest`.
    pub fn copy(src: &str, dest: &str) -> Self {
        Self::new(TaskKind::Copy).src(src).dest(dest)
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.task.base = Some(base.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = dest.to_string();
        self
    }

    pub fn rename(mut self, name: &str) -> Self {
        self.task.rename = Some(name.to_string());
        self
    }

    pub fn filter(mut self, cmd: &str) -> Self {
        self.task.filter = Some(cmd.to_string());
        self
    }

    pub fn output(mut self, pattern: &str) -> Self {
        self.task
            .outputs
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn only_in(mut self, mode: Mode) -> Self {
        self.task.modes.get_or_insert_with(Vec::new).push(mode);
        self
    }

    pub fn recover_in_dev(mut self, val: bool) -> Self {
        self.task.recover_in_dev = Some(val);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for `[[watch]]` rules.
pub struct WatchRuleBuilder {
    rule: WatchRuleConfig,
}

impl WatchRuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            rule: WatchRuleConfig {
                name: Some(name.to_string()),
                paths: vec![],
                run: vec![],
                notify: NotifyAction::None,
                use_hash: false,
            },
        }
    }

    pub fn path(mut self, pattern: &str) -> Self {
        self.rule.paths.push(pattern.to_string());
        self
    }

    pub fn run(mut self, task: &str) -> Self {
        self.rule.run.push(task.to_string());
        self
    }

    pub fn notify(mut self, action: NotifyAction) -> Self {
        self.rule.notify = action;
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.rule.use_hash = val;
        self
    }

    pub fn build(self) -> WatchRuleConfig {
        self.rule
    }
}
