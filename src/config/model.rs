// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{Mode, NotifyAction, TaskKind};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// source = "source"
/// build = "build"
///
/// [task.styles]
/// kind = "style"
/// src = ["sass/style.scss"]
/// dest = "css"
/// rename = "style.min.css"
/// after = ["copy"]
///
/// [[watch]]
/// paths = ["sass/**/*.scss"]
/// run = ["styles"]
/// notify = "inject"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global paths and timing from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Live preview server from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Watch rules from `[[watch]]`, in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchRuleConfig>,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    server: ServerSection,
    task: BTreeMap<String, TaskConfig>,
    watch: Vec<WatchRuleConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        server: ServerSection,
        task: BTreeMap<String, TaskConfig>,
        watch: Vec<WatchRuleConfig>,
    ) -> Self {
        Self {
            config,
            server,
            task,
            watch,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn server_section(&self) -> &ServerSection {
        &self.server
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn watch_rules(&self) -> &[WatchRuleConfig] {
        &self.watch
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Source tree, relative to the project root.
    #[serde(default = "default_source")]
    pub source: String,

    /// Build output tree, relative to the project root. Fully owned by the
    /// pipeline: the clean stage removes it.
    #[serde(default = "default_build")]
    pub build: String,

    /// Window during which file events are batched before watch rules fire.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_source() -> String {
    "source".to_string()
}

fn default_build() -> String {
    "build".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            build: default_build(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Which transform this task runs.
    pub kind: TaskKind,

    /// Input globs relative to the source dir; `!` negates.
    #[serde(default)]
    pub src: Vec<String>,

    /// Part of the input path stripped before joining with `dest`.
    ///
    /// Defaults to the glob parent of the first `src` pattern.
    #[serde(default)]
    pub base: Option<String>,

    /// Output directory relative to the build dir.
    #[serde(default)]
    pub dest: String,

    /// Output file name replacing the input name (single-output tasks).
    #[serde(default)]
    pub rename: Option<String>,

    /// Shell command each input is piped through (stdin → stdout) before the
    /// transform, e.g. a Sass compiler or a script minifier.
    #[serde(default)]
    pub filter: Option<String>,

    /// Declared output globs relative to the build dir. Derived from
    /// `src`/`base`/`dest`/`rename` when omitted.
    #[serde(default)]
    pub outputs: Option<Vec<String>>,

    /// Tasks that must complete in an earlier stage.
    #[serde(default)]
    pub after: Vec<String>,

    /// Modes this task takes part in; both when omitted.
    #[serde(default)]
    pub modes: Option<Vec<Mode>>,

    /// Whether a failure of this task is logged instead of aborting a dev
    /// run. Defaults to `true` for `style`, `false` otherwise.
    #[serde(default)]
    pub recover_in_dev: Option<bool>,
}

impl TaskConfig {
    pub fn enabled_in(&self, mode: Mode) -> bool {
        self.modes.as_ref().is_none_or(|modes| modes.contains(&mode))
    }

    pub fn effective_recover_in_dev(&self) -> bool {
        self.recover_in_dev
            .unwrap_or(matches!(self.kind, TaskKind::Style))
    }
}

/// One `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchRuleConfig {
    /// Name used in logs; defaults to `watch[<index>]`.
    #[serde(default)]
    pub name: Option<String>,

    /// Source globs (relative to the source dir) that fire this rule.
    pub paths: Vec<String>,

    /// Tasks re-run, in order, when the rule fires.
    pub run: Vec<String>,

    /// Preview notification once all tasks succeeded.
    #[serde(default)]
    pub notify: NotifyAction,

    /// Ignore events whose file content hash did not change.
    #[serde(default)]
    pub use_hash: bool,
}

impl WatchRuleConfig {
    /// The rule's name, or `watch[<index>]` when unnamed.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("watch[{index}]"))
    }
}
