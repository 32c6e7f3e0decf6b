// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::errors::{AssetpipeError, Result};
use crate::types::Mode;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies that are enabled in this mode.
    deps: Vec<TaskName>,
    /// Direct dependents that are enabled in this mode.
    dependents: Vec<TaskName>,
}

/// Task dependency graph restricted to the tasks enabled in one mode.
///
/// An `after` edge pointing at a task that is disabled in this mode is
/// dropped for this mode only; `config::validate` has already checked that
/// every name exists and that the full graph is acyclic.
#[derive(Debug, Clone)]
pub struct DagGraph {
    mode: Mode,
    nodes: BTreeMap<TaskName, DagNode>,
    /// Topological order, ties broken by task name.
    order: Vec<TaskName>,
}

impl DagGraph {
    /// Build the graph of `mode` from a validated [`ConfigFile`].
    pub fn for_mode(cfg: &ConfigFile, mode: Mode) -> Result<Self> {
        let mut nodes: BTreeMap<TaskName, DagNode> = cfg
            .tasks()
            .iter()
            .filter(|(_, t)| t.enabled_in(mode))
            .map(|(name, _)| (name.clone(), DagNode::default()))
            .collect();

        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in nodes.keys() {
            graph.add_node(name.as_str());
        }

        let mut edges: Vec<(TaskName, TaskName)> = Vec::new();
        for (name, task) in cfg.tasks().iter() {
            if !nodes.contains_key(name) {
                continue;
            }
            for dep in task.after.iter() {
                if nodes.contains_key(dep) {
                    edges.push((dep.clone(), name.clone()));
                }
            }
        }

        for (dep, name) in edges.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }

        let order: Vec<TaskName> = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(str::to_string).collect(),
            Err(cycle) => {
                return Err(AssetpipeError::DagCycle(format!(
                    "cycle detected in {mode} task graph involving task '{}'",
                    cycle.node_id()
                )));
            }
        };

        for (dep, name) in edges {
            if let Some(node) = nodes.get_mut(&name) {
                node.deps.push(dep.clone());
            }
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.push(name);
            }
        }

        Ok(Self { mode, nodes, order })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Return all task names of this mode, in topological order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task (its `after` list, minus tasks
    /// disabled in this mode).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Longest-path depth of every task: roots are level 0, every other task
    /// sits one level below its deepest dependency.
    pub fn levels(&self) -> HashMap<TaskName, usize> {
        let mut levels: HashMap<TaskName, usize> = HashMap::with_capacity(self.order.len());
        for name in self.order.iter() {
            let level = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| levels.get(dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            levels.insert(name.clone(), level);
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn default_graph_levels_follow_after_chains() {
        let cfg = default_config().unwrap();
        let graph = DagGraph::for_mode(&cfg, Mode::Build).unwrap();
        let levels = graph.levels();

        assert_eq!(levels["clean"], 0);
        assert_eq!(levels["copy"], 1);
        assert_eq!(levels["styles"], 2);
        assert_eq!(levels["images"], 2);
        assert!(!graph.contains("copy_images"));
    }

    #[test]
    fn dev_graph_swaps_image_tasks() {
        let cfg = default_config().unwrap();
        let graph = DagGraph::for_mode(&cfg, Mode::Dev).unwrap();
        assert!(graph.contains("copy_images"));
        assert!(!graph.contains("images"));
        assert_eq!(graph.dependencies_of("copy_images"), &["copy".to_string()]);
        assert!(graph.dependents_of("clean").contains(&"copy".to_string()));
    }
}
