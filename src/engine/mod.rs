//! The task graph.
//!
//! Tasks are organized into a Directed Acyclic Graph (DAG). Each task has a
//! name, a list of prerequisites and an optional action. A task without an
//! action is a group: it completes as soon as all its prerequisites have
//! completed, which makes it a barrier joining several parallel tasks.
//!
//! Prerequisites have to be registered before the tasks depending on them, so
//! the graph can't contain cycles by construction.

mod runner;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::error::GraphError;

pub use runner::{Outcome, Report, TaskExecution};

/// Action executed by a task. Errors are recorded in the [`Report`] and never
/// stop the tasks depending on this one.
pub type Action<C> = Arc<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

pub(crate) struct Task<C> {
    name: &'static str,
    action: Option<Action<C>>,
}

impl<C> Task<C> {
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}

impl<C> Debug for Task<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.action {
            Some(_) => write!(f, "Task({})", self.name),
            None => write!(f, "Group({})", self.name),
        }
    }
}

/// A set of named tasks and the prerequisites between them, executed with a
/// shared context `C`.
pub struct TaskGraph<C> {
    graph: Graph<Task<C>, ()>,
    names: HashMap<&'static str, NodeIndex>,
}

impl<C> Default for TaskGraph<C> {
    fn default() -> Self {
        Self {
            graph: Graph::new(),
            names: HashMap::new(),
        }
    }
}

impl<C> TaskGraph<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task running `action` once all of `deps` have completed.
    pub fn add_task<F>(
        &mut self,
        name: &'static str,
        deps: &[&str],
        action: F,
    ) -> Result<NodeIndex, GraphError>
    where
        F: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.insert(name, deps, Some(Arc::new(action)))
    }

    /// Register a group which completes once all of `deps` have completed.
    pub fn add_group(&mut self, name: &'static str, deps: &[&str]) -> Result<NodeIndex, GraphError> {
        self.insert(name, deps, None)
    }

    fn insert(
        &mut self,
        name: &'static str,
        deps: &[&str],
        action: Option<Action<C>>,
    ) -> Result<NodeIndex, GraphError> {
        if self.names.contains_key(name) {
            return Err(GraphError::Duplicate(name));
        }

        let deps = deps
            .iter()
            .map(|dep| {
                self.names
                    .get(dep)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownDependency(name, dep.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let index = self.graph.add_node(Task { name, action });
        for dep in deps {
            self.graph.add_edge(dep, index, ());
        }

        self.names.insert(name, index);
        Ok(index)
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Direct prerequisites of a task, in registration order.
    #[cfg(test)]
    pub fn prerequisites(&self, name: &str) -> Result<Vec<&'static str>, GraphError> {
        let index = self.index(name)?;
        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .collect();
        deps.sort();

        Ok(deps.into_iter().map(|i| self.graph[i].name).collect())
    }

    pub(crate) fn index(&self, name: &str) -> Result<NodeIndex, GraphError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownTask(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_dependency() {
        let mut graph = TaskGraph::<()>::new();
        let err = graph.add_task("copy", &["clean"], |_| Ok(())).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency("copy", _)));
    }

    #[test]
    fn test_duplicate_task() {
        let mut graph = TaskGraph::<()>::new();
        graph.add_group("clean", &[]).unwrap();
        assert!(matches!(
            graph.add_group("clean", &[]),
            Err(GraphError::Duplicate("clean"))
        ));
    }

    #[test]
    fn test_prerequisites() {
        let mut graph = TaskGraph::<()>::new();
        graph.add_task("clean:css", &[], |_| Ok(())).unwrap();
        graph.add_task("clean:javascript", &[], |_| Ok(())).unwrap();
        graph.add_group("clean", &["clean:css", "clean:javascript"]).unwrap();

        assert_eq!(
            graph.prerequisites("clean").unwrap(),
            ["clean:css", "clean:javascript"]
        );
        assert!(graph.prerequisites("copy").is_err());
        assert!(graph.contains("clean"));
    }
}
