// src/config/validate.rs

use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{AssetpipeError, Result};
use crate::patterns::PatternSet;
use crate::types::{Mode, TaskKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetpipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.server,
            raw.task,
            raw.watch,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task_fields(name, task)?;
    }
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_watch_rules(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> AssetpipeError {
    AssetpipeError::ConfigError(msg.into())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(config_error(
            "config must contain at least one [task.<name>] section",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let source = Path::new(&cfg.config.source);
    let build = Path::new(&cfg.config.build);

    if cfg.config.source.trim().is_empty() || cfg.config.build.trim().is_empty() {
        return Err(config_error(
            "[config].source and [config].build must not be empty",
        ));
    }

    // The watcher observes `source`, so writing into it would retrigger itself;
    // the clean stage removes `build`, so it must not contain the sources.
    if build.starts_with(source) || source.starts_with(build) {
        return Err(config_error(format!(
            "[config].build ({}) and [config].source ({}) must not contain each other",
            cfg.config.build, cfg.config.source
        )));
    }

    Ok(())
}

/// A relative path without `..` components (empty means "the root").
fn is_contained_relative(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn validate_task_fields(name: &str, task: &TaskConfig) -> Result<()> {
    if task.kind == TaskKind::Clean {
        if !task.src.is_empty() || task.filter.is_some() || task.rename.is_some() {
            return Err(config_error(format!(
                "task '{name}' is a clean task and takes no `src`, `filter` or `rename`"
            )));
        }
    } else if !task.src.iter().any(|p| !p.trim_start().starts_with('!')) {
        return Err(config_error(format!(
            "task '{name}' needs at least one non-negated `src` pattern"
        )));
    }

    if !is_contained_relative(&task.dest) {
        return Err(config_error(format!(
            "task '{name}' has dest '{}' which escapes the build directory",
            task.dest
        )));
    }

    if let Some(base) = &task.base {
        if !is_contained_relative(base) {
            return Err(config_error(format!(
                "task '{name}' has base '{base}' which escapes the source directory"
            )));
        }
    }

    if let Some(rename) = &task.rename {
        if rename.is_empty() || rename.contains('/') || rename.contains('\\') {
            return Err(config_error(format!(
                "task '{name}' has rename '{rename}'; expected a plain file name"
            )));
        }
    }

    if let Some(modes) = &task.modes {
        if modes.is_empty() {
            return Err(config_error(format!(
                "task '{name}' has an empty `modes` list; omit it to enable all modes"
            )));
        }
    }

    PatternSet::new(&task.src)
        .map_err(|e| config_error(format!("task '{name}' has an invalid `src`: {e:#}")))?;

    if let Some(outputs) = &task.outputs {
        if outputs.is_empty() {
            return Err(config_error(format!(
                "task '{name}' declares an empty `outputs` list"
            )));
        }
        PatternSet::new(outputs).map_err(|e| {
            config_error(format!("task '{name}' has invalid `outputs`: {e:#}"))
        })?;
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(config_error(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(AssetpipeError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                node
            )))
        }
    }
}

fn validate_watch_rules(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for (idx, rule) in cfg.watch.iter().enumerate() {
        let label = rule.label(idx);
        if !seen.insert(label.clone()) {
            return Err(config_error(format!(
                "watch rule name '{label}' is used more than once"
            )));
        }

        if rule.paths.is_empty() {
            return Err(config_error(format!("watch rule '{label}' has no `paths`")));
        }
        PatternSet::new(&rule.paths).map_err(|e| {
            config_error(format!("watch rule '{label}' has invalid `paths`: {e:#}"))
        })?;

        if rule.run.is_empty() {
            return Err(config_error(format!(
                "watch rule '{label}' has an empty `run` list"
            )));
        }

        for task_name in rule.run.iter() {
            let task = cfg.task.get(task_name).ok_or_else(|| {
                config_error(format!(
                    "watch rule '{label}' runs unknown task '{task_name}'"
                ))
            })?;
            if task.kind == TaskKind::Clean {
                return Err(config_error(format!(
                    "watch rule '{label}' cannot run clean task '{task_name}'"
                )));
            }
            if !task.enabled_in(Mode::Dev) {
                return Err(config_error(format!(
                    "watch rule '{label}' runs task '{task_name}', which is disabled in dev mode"
                )));
            }
        }
    }
    Ok(())
}
