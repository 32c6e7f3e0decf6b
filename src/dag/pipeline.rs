// src/dag/pipeline.rs

//! The composed, immutable pipeline: tasks grouped into barrier stages.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::model::TaskConfig;
use crate::dag::outputs::{derive_outputs, join_rel, output_extension, strip_base, with_extension};
use crate::engine::TaskName;
use crate::patterns::PatternSet;
use crate::transform::style::SOURCE_MAP_SUFFIX;
use crate::types::{Mode, TaskKind};

/// What a task does to the build tree besides creating files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Creates or overwrites files inside its declared outputs.
    Write,
    /// Removes the whole build root.
    Clear,
}

/// A task descriptor: stateless, interpreted by a [`crate::exec::TaskRunner`].
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub kind: TaskKind,
    /// Inputs relative to the source dir; `None` for clean tasks.
    pub sources: Option<PatternSet>,
    /// Source-relative prefix stripped before placing an output.
    pub base: String,
    /// Build-relative output directory.
    pub dest: String,
    pub rename: Option<String>,
    pub filter: Option<String>,
    /// Declared outputs, relative to the build dir.
    pub outputs: PatternSet,
    pub recover_in_dev: bool,
}

impl Task {
    pub fn from_config(name: &str, cfg: &TaskConfig) -> Result<Self> {
        let sources = if cfg.kind == TaskKind::Clean {
            None
        } else {
            Some(
                PatternSet::new(&cfg.src)
                    .with_context(|| format!("compiling sources of task {name}"))?,
            )
        };

        let base = match (&cfg.base, &sources) {
            (Some(base), _) => base.trim_matches('/').to_string(),
            (None, Some(src)) => src.base(),
            (None, None) => String::new(),
        };

        let output_patterns = match (&cfg.outputs, &sources) {
            (Some(outputs), _) => outputs.clone(),
            (None, Some(src)) => {
                derive_outputs(cfg.kind, src, &base, &cfg.dest, cfg.rename.as_deref())
            }
            (None, None) => vec!["**".to_string()],
        };
        let outputs = PatternSet::new(&output_patterns)
            .with_context(|| format!("compiling outputs of task {name}"))?;

        Ok(Self {
            name: name.to_string(),
            kind: cfg.kind,
            sources,
            base,
            dest: cfg.dest.clone(),
            rename: cfg.rename.clone(),
            filter: cfg.filter.clone(),
            outputs,
            recover_in_dev: cfg.effective_recover_in_dev(),
        })
    }

    pub fn side_effect(&self) -> SideEffect {
        match self.kind {
            TaskKind::Clean => SideEffect::Clear,
            _ => SideEffect::Write,
        }
    }

    /// Whether a failure of this task aborts the run in `mode`.
    pub fn failure_is_fatal(&self, mode: Mode) -> bool {
        !(mode == Mode::Dev && self.recover_in_dev)
    }

    /// Where an input at source-relative `rel` lands, relative to the build
    /// dir, before `rename` (transforms that merge inputs name their output
    /// themselves).
    pub fn placed_input(&self, rel: &str) -> String {
        let rel = strip_base(rel, &self.base);
        match output_extension(self.kind) {
            Some(ext) => with_extension(rel, ext),
            None => rel.to_string(),
        }
    }

    /// Final build-relative path of an output produced at `rel` (relative
    /// to `dest`).
    ///
    /// `rename` also applies to a source map written next to the output:
    /// `style.css.map` becomes `<rename>.map`.
    pub fn output_path(&self, rel: &str) -> String {
        match (&self.rename, rel.ends_with(SOURCE_MAP_SUFFIX)) {
            (Some(rename), true) => join_rel(&self.dest, &format!("{rename}{SOURCE_MAP_SUFFIX}")),
            (Some(rename), false) => join_rel(&self.dest, rename),
            (None, _) => join_rel(&self.dest, rel),
        }
    }
}

/// How the tasks of a stage are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// A single task; nothing to interleave with.
    Sequential,
    /// Several tasks with disjoint outputs, started together.
    Parallel,
}

/// A barrier-synchronized group of tasks.
#[derive(Debug, Clone)]
pub struct Stage {
    pub index: usize,
    pub tasks: Vec<Arc<Task>>,
    pub execution: ExecutionMode,
}

impl Stage {
    pub fn new(index: usize, tasks: Vec<Arc<Task>>) -> Self {
        let execution = if tasks.len() > 1 {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        Self {
            index,
            tasks,
            execution,
        }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Ordered stages of one mode. Stage N+1 never starts before stage N
/// completed.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub mode: Mode,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.stages
            .iter()
            .flat_map(|s| s.tasks.iter())
            .find(|t| t.name == name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.stages.iter().flat_map(|s| s.tasks.iter())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} pipeline ({} stages):", self.mode, self.stages.len())?;
        for stage in self.stages.iter() {
            let mode = match stage.execution {
                ExecutionMode::Sequential => "sequential",
                ExecutionMode::Parallel => "parallel",
            };
            writeln!(f, "  stage {} [{mode}]", stage.index)?;
            for task in stage.tasks.iter() {
                writeln!(f, "    - {} ({})", task.name, task.kind)?;
                if let Some(src) = &task.sources {
                    writeln!(f, "        src: {:?} !{:?}", src.includes(), src.excludes())?;
                }
                writeln!(
                    f,
                    "        outputs: {:?} !{:?}",
                    task.outputs.includes(),
                    task.outputs.excludes()
                )?;
                if let Some(filter) = &task.filter {
                    writeln!(f, "        filter: {filter}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn vendor_css_lands_next_to_the_compiled_sheet() {
        let cfg = default_config().unwrap();
        let task = Task::from_config("vendor_css", &cfg.tasks()["vendor_css"]).unwrap();
        let placed = task.placed_input("css/vendor/normalize.css");
        assert_eq!(placed, "normalize.css");
        assert_eq!(task.output_path(&placed), "css/normalize.css");
        assert!(task.outputs.is_match("css/normalize.css"));
        assert!(!task.outputs.is_match("css/style.min.css"));
        assert!(!task.outputs.is_match("css/style.min.css.map"));

        let vendor_js = Task::from_config("vendor_js", &cfg.tasks()["vendor_js"]).unwrap();
        let placed = vendor_js.placed_input("js/vendor/jquery.js");
        assert_eq!(vendor_js.output_path(&placed), "js/vendor/jquery.js");
    }

    #[test]
    fn renamed_style_lands_on_its_declared_output() {
        let cfg = default_config().unwrap();
        let task = Task::from_config("styles", &cfg.tasks()["styles"]).unwrap();
        let placed = task.placed_input("sass/style.scss");
        assert_eq!(placed, "style.css");
        assert_eq!(task.output_path(&placed), "css/style.min.css");
        assert!(task.outputs.is_match("css/style.min.css"));
        assert_eq!(task.output_path("style.css.map"), "css/style.min.css.map");
        assert!(task.outputs.is_match("css/style.min.css.map"));
        assert!(task.recover_in_dev);
        assert!(!task.failure_is_fatal(Mode::Dev));
        assert!(task.failure_is_fatal(Mode::Build));
    }

    #[test]
    fn clean_declares_the_whole_build_root() {
        let cfg = default_config().unwrap();
        let task = Task::from_config("clean", &cfg.tasks()["clean"]).unwrap();
        assert_eq!(task.side_effect(), SideEffect::Clear);
        assert!(task.outputs.is_match("anything/at/all.txt"));
    }
}
