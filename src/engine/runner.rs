use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use console::style;
use indicatif::ProgressStyle;
use petgraph::graph::NodeIndex;
use petgraph::visit::{Dfs, Reversed};
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use super::{Task, TaskGraph};
use crate::error::GraphError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
    pub outcome: Outcome,
}

impl TaskExecution {
    pub fn end(&self) -> Instant {
        self.start + self.duration
    }
}

/// Outcome of every task executed in a single run.
#[derive(Debug, Default)]
pub struct Report {
    pub executions: HashMap<&'static str, TaskExecution>,
}

impl Report {
    pub fn get(&self, name: &str) -> Option<&TaskExecution> {
        self.executions.get(name)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.executions.iter().filter_map(|(name, exec)| match &exec.outcome {
            Outcome::Ok => None,
            Outcome::Failed(msg) => Some((*name, msg.as_str())),
        })
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

fn task_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Task panicked: {s}")
    } else {
        String::from("Task panicked with unknown payload")
    }
}

impl<C> Task<C> {
    fn execute(&self, ctx: &C, pb_style: &ProgressStyle) -> TaskExecution {
        let span = tracing::span!(Level::INFO, "task", name = self.name);
        span.pb_set_style(pb_style);
        span.pb_set_message(&format!("Running {}", self.name));
        let _enter = span.enter();

        let start = Instant::now();

        let outcome = match &self.action {
            None => Outcome::Ok,
            Some(action) => {
                tracing::info!("starting '{}'...", style(self.name).cyan());

                // actions only get a shared borrow of the context
                match catch_unwind(AssertUnwindSafe(|| action(ctx))) {
                    Ok(Ok(())) => Outcome::Ok,
                    Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
                    Err(panic) => Outcome::Failed(panic_message(panic)),
                }
            }
        };

        let duration = start.elapsed();

        match &outcome {
            Outcome::Ok if self.action.is_some() => tracing::info!(
                "finished '{}' after {}",
                style(self.name).cyan(),
                style(format!("{duration:.2?}")).magenta()
            ),
            Outcome::Ok => {}
            Outcome::Failed(msg) => {
                tracing::error!("'{}' failed: {}", style(self.name).cyan(), msg)
            }
        }

        TaskExecution {
            start,
            duration,
            outcome,
        }
    }
}

impl<C: Sync> TaskGraph<C> {
    /// Runs the `targets` together with all of their transitive prerequisites.
    pub fn run(&self, ctx: &C, targets: &[&str]) -> Result<Report, GraphError> {
        // The graph is acyclic by construction, toposort only guards it.
        petgraph::algo::toposort(&self.graph, None)
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].name()))?;

        let reversed = Reversed(&self.graph);
        let mut nodes = HashSet::new();

        for target in targets {
            let mut dfs = Dfs::new(reversed, self.index(target)?);
            while let Some(index) = dfs.next(reversed) {
                nodes.insert(index);
            }
        }

        Ok(self.run_nodes(ctx, &nodes))
    }

    /// Runs exactly the named tasks one after another, in the given order,
    /// without their prerequisites.
    pub fn run_sequence(&self, ctx: &C, names: &[&str]) -> Result<Report, GraphError> {
        let indices = names
            .iter()
            .map(|name| self.index(name))
            .collect::<Result<Vec<_>, _>>()?;

        let pb_style = task_style();
        let mut report = Report::default();

        for index in indices {
            let task = &self.graph[index];
            let execution = task.execute(ctx, &pb_style);
            report.executions.insert(task.name(), execution);
        }

        Ok(report)
    }

    /// This function executes a subset of the task graph on the rayon thread
    /// pool, starting every task as soon as its prerequisites are met.
    ///
    /// 1. The number of pending prerequisites is counted for each node to run.
    ///    A prerequisite only counts if it's also in the set of nodes to run.
    /// 2. The nodes without pending prerequisites are spawned.
    /// 3. The calling thread waits for results from the workers over a
    ///    channel. When a task completes, the counts of its dependents are
    ///    decremented, and those reaching zero are spawned.
    /// 4. The loop continues until all tasks have been completed.
    ///
    /// A failed task still counts as completed.
    fn run_nodes(&self, ctx: &C, nodes: &HashSet<NodeIndex>) -> Report {
        let mut report = Report::default();

        let total = nodes.len();
        if total == 0 {
            return report;
        }

        let mut dependents: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        for edge in self.graph.raw_edges() {
            dependents
                .entry(edge.source())
                .or_default()
                .push(edge.target());
        }

        let mut pending: HashMap<NodeIndex, usize> = nodes
            .iter()
            .map(|&i| {
                (
                    i,
                    self.graph
                        .neighbors_directed(i, petgraph::Direction::Incoming)
                        .filter(|dep| nodes.contains(dep))
                        .count(),
                )
            })
            .collect();

        let root_span = tracing::span!(Level::INFO, "running_tasks");
        root_span.pb_set_length(total as u64);
        root_span.pb_set_style(
            &ProgressStyle::with_template(
                "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
        );
        root_span.pb_set_message("Running tasks...");
        let _enter = root_span.enter();

        let pb_style = task_style();

        // The scheduler loop stays on the calling thread, so tasks get every
        // worker of the pool.
        rayon::in_place_scope(|s| {
            let (sender, receiver) = channel::<(NodeIndex, TaskExecution)>();

            let spawn_task = |index: NodeIndex| {
                let task = &self.graph[index];
                let sender = sender.clone();
                let pb_style = pb_style.clone();

                s.spawn(move |_| {
                    let execution = task.execute(ctx, &pb_style);
                    // The receiver outlives every spawned task.
                    let _ = sender.send((index, execution));
                });
            };

            for (&index, &count) in &pending {
                if count == 0 {
                    spawn_task(index);
                }
            }

            let mut completed = 0;
            while completed < total {
                let Ok((index, execution)) = receiver.recv() else {
                    break;
                };

                completed += 1;
                root_span.pb_inc(1);
                report.executions.insert(self.graph[index].name(), execution);

                for &next in dependents.get(&index).into_iter().flatten() {
                    if let Some(count) = pending.get_mut(&next) {
                        *count -= 1;
                        if *count == 0 {
                            spawn_task(next);
                        }
                    }
                }
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread::sleep;

    use super::*;

    /// Records which tasks ran.
    #[derive(Default)]
    struct Trace(Mutex<Vec<&'static str>>);

    impl Trace {
        fn push(&self, name: &'static str) {
            self.0.lock().unwrap().push(name);
        }

        fn names(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    fn step(name: &'static str, delay: u64) -> impl Fn(&Trace) -> anyhow::Result<()> {
        move |trace| {
            sleep(Duration::from_millis(delay));
            trace.push(name);
            Ok(())
        }
    }

    /// clean:* -> clean -> copy -> {sass, javascript, lint} -> build
    fn build_graph() -> TaskGraph<Trace> {
        let mut graph = TaskGraph::new();
        graph.add_task("clean:javascript", &[], step("clean:javascript", 30)).unwrap();
        graph.add_task("clean:css", &[], step("clean:css", 10)).unwrap();
        graph.add_group("clean", &["clean:javascript", "clean:css"]).unwrap();
        graph.add_task("copy", &["clean"], step("copy", 20)).unwrap();
        graph.add_task("sass", &["copy"], step("sass", 10)).unwrap();
        graph.add_task("javascript", &["copy"], step("javascript", 5)).unwrap();
        graph.add_task("lint", &["copy"], step("lint", 1)).unwrap();
        graph.add_group("build", &["sass", "javascript", "lint"]).unwrap();
        graph
    }

    #[test]
    fn test_stage_barriers() {
        let graph = build_graph();
        let trace = Trace::default();
        let report = graph.run(&trace, &["build"]).unwrap();

        assert_eq!(report.executions.len(), 8);
        assert!(report.is_success());

        let exec = |name| report.get(name).unwrap();
        let clean_done = exec("clean:javascript").end().max(exec("clean:css").end());

        assert!(exec("copy").start >= clean_done);
        for name in ["sass", "javascript", "lint"] {
            assert!(exec(name).start >= exec("copy").end());
            assert!(exec("build").start >= exec(name).end());
        }
    }

    #[test]
    fn test_run_only_prerequisites() {
        let graph = build_graph();
        let trace = Trace::default();
        let report = graph.run(&trace, &["copy"]).unwrap();

        let mut names = trace.names();
        names.sort();
        assert_eq!(names, ["clean:css", "clean:javascript", "copy"]);
        assert!(report.get("sass").is_none());
    }

    #[test]
    fn test_failure_does_not_block_dependents() {
        let mut graph = TaskGraph::new();
        graph
            .add_task("sass", &[], |_: &Trace| Err(anyhow::anyhow!("broken scss")))
            .unwrap();
        graph
            .add_task("javascript", &[], |_: &Trace| panic!("boom"))
            .unwrap();
        graph.add_group("build", &["sass", "javascript"]).unwrap();
        graph.add_task("package", &["build"], step("package", 0)).unwrap();

        let trace = Trace::default();
        let report = graph.run(&trace, &["package"]).unwrap();

        assert_eq!(trace.names(), ["package"]);
        assert_eq!(
            report.get("sass").unwrap().outcome,
            Outcome::Failed("broken scss".into())
        );
        assert_eq!(
            report.get("javascript").unwrap().outcome,
            Outcome::Failed("Task panicked: boom".into())
        );
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn test_run_sequence_in_order() {
        let graph = build_graph();
        let trace = Trace::default();
        let report = graph
            .run_sequence(&trace, &["clean:javascript", "javascript", "lint"])
            .unwrap();

        assert_eq!(trace.names(), ["clean:javascript", "javascript", "lint"]);
        assert_eq!(report.executions.len(), 3);
    }

    #[test]
    fn test_unknown_target() {
        let graph = build_graph();
        let trace = Trace::default();
        assert!(matches!(
            graph.run(&trace, &["deploy"]),
            Err(GraphError::UnknownTask(_))
        ));
    }
}
