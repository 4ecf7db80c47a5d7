// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task::PipelineTask;
use crate::errors::{Result, RundagError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must be done before this one can run.
    prev: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    next: Vec<String>,
}

/// In-memory DAG keyed by task name.
///
/// Nodes live in a name-keyed table and refer to each other by name only;
/// all traversal goes through the table. Declaration order is kept for
/// deterministic iteration.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    order: Vec<String>,
}

impl DagGraph {
    /// Build the graph for a set of main tasks.
    ///
    /// Fails with:
    /// - `DuplicateName` if two declarations share a name,
    /// - `TaskNotFound` if a dependency is not part of `tasks`,
    /// - `DagCycle` if the dependency relation is not acyclic.
    pub fn build(tasks: &[PipelineTask]) -> Result<Self> {
        let mut graph = Self::with_nodes(tasks)?;

        for task in tasks {
            for dep in task.dependencies() {
                if !graph.nodes.contains_key(&dep) {
                    return Err(RundagError::TaskNotFound(format!(
                        "task '{}' depends on '{}' but '{}' is not part of the graph",
                        task.name, dep, dep
                    )));
                }
                graph.link(&dep, &task.name);
            }
        }

        graph.ensure_acyclic()?;
        Ok(graph)
    }

    /// Build a graph whose nodes carry no edges (the finally section).
    pub fn build_unlinked(tasks: &[PipelineTask]) -> Result<Self> {
        Self::with_nodes(tasks)
    }

    fn with_nodes(tasks: &[PipelineTask]) -> Result<Self> {
        let mut graph = Self::default();
        for task in tasks {
            if graph.nodes.contains_key(&task.name) {
                return Err(RundagError::DuplicateName(task.name.clone()));
            }
            graph.nodes.insert(task.name.clone(), DagNode::default());
            graph.order.push(task.name.clone());
        }
        Ok(graph)
    }

    fn link(&mut self, from: &str, to: &str) {
        if let Some(node) = self.nodes.get_mut(to) {
            node.prev.push(from.to_string());
        }
        if let Some(node) = self.nodes.get_mut(from) {
            node.next.push(to.to_string());
        }
    }

    fn ensure_acyclic(&self) -> Result<()> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in self.order.iter() {
            graph.add_node(name.as_str());
        }
        for (name, node) in self.nodes.iter() {
            for dep in node.prev.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        // A topological sort will fail if there is a cycle.
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(RundagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                cycle.node_id()
            ))),
        }
    }

    /// All task names, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.prev.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.next.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without dependencies, in declaration order.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.tasks()
            .filter(|name| self.dependencies_of(name).is_empty())
    }

    /// The next schedulable frontier: tasks that are not in `done` and whose
    /// dependencies are all in `done`.
    ///
    /// Every name in `done` must be reachable from a root through done tasks
    /// only; otherwise the caller reported a task as done before its
    /// ancestors and `InvalidDoneSet` is returned.
    pub fn get_schedulable<'a, I>(&self, done: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let done: HashSet<&str> = done.into_iter().collect();

        // Walk the done region starting from the roots.
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self.roots().filter(|r| done.contains(r)).collect();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            for next in self.dependents_of(name) {
                if done.contains(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }

        let mut not_visited: Vec<String> = done
            .iter()
            .filter(|name| !visited.contains(*name))
            .map(|name| name.to_string())
            .collect();
        if !not_visited.is_empty() {
            not_visited.sort();
            return Err(RundagError::InvalidDoneSet(not_visited));
        }

        let schedulable: BTreeSet<String> = self
            .tasks()
            .filter(|name| !done.contains(name))
            .filter(|name| {
                self.dependencies_of(name)
                    .iter()
                    .all(|dep| done.contains(dep.as_str()))
            })
            .map(|name| name.to_string())
            .collect();

        debug!(done = done.len(), schedulable = ?schedulable, "computed schedulable frontier");
        Ok(schedulable)
    }
}
