//! Task graphs and the runner that executes them.
//!
//! A pipeline is a set of named tasks with explicit dependencies. Tasks
//! exchange tables through an [`Artifacts`] map: each task reads the
//! artifacts its dependencies produced and inserts its own. The runner
//! executes tasks one at a time in a deterministic topological order
//! (Kahn's algorithm, ties broken by declaration order), reports progress
//! after each task and checks for cancellation before each one.

use super::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::error::{EtlError, Result};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Named tables produced during a run.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    tables: BTreeMap<String, DataFrame>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: DataFrame) {
        self.tables.insert(name.into(), table);
    }

    /// Borrow an artifact; a missing one is a graph wiring error.
    pub fn get(&self, name: &str) -> Result<&DataFrame> {
        self.tables
            .get(name)
            .ok_or_else(|| EtlError::TaskGraph(format!("missing artifact '{name}'")))
    }

    /// Owned copy of an artifact, for transforms that consume their input.
    pub fn cloned(&self, name: &str) -> Result<DataFrame> {
        self.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataFrame)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }
}

type TaskFn = Box<dyn Fn(&mut Artifacts) -> Result<()> + Send + Sync>;

/// One step of a pipeline.
pub struct Task {
    name: String,
    stage: PipelineStage,
    depends_on: Vec<String>,
    run: TaskFn,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// A named DAG of tasks.
#[derive(Debug)]
pub struct TaskGraph {
    name: String,
    tasks: Vec<Task>,
}

static_assertions::assert_impl_all!(TaskGraph: Send, Sync);

impl TaskGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Add a task, builder style. Validation happens in [`execution_order`](Self::execution_order).
    pub fn task<F>(mut self, name: &str, stage: PipelineStage, depends_on: &[&str], run: F) -> Self
    where
        F: Fn(&mut Artifacts) -> Result<()> + Send + Sync + 'static,
    {
        self.tasks.push(Task {
            name: name.to_string(),
            stage,
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            run: Box::new(run),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task indices in execution order.
    ///
    /// Fails on duplicate task names, dependencies on unknown tasks and
    /// cycles.
    pub fn execution_order(&self) -> Result<Vec<usize>> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.tasks.len());
        for (i, task) in self.tasks.iter().enumerate() {
            if index.insert(task.name.as_str(), i).is_some() {
                return Err(EtlError::TaskGraph(format!(
                    "duplicate task '{}' in '{}'",
                    task.name, self.name
                )));
            }
        }

        let mut indegree = vec![0usize; self.tasks.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];
        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let &d = index.get(dep.as_str()).ok_or_else(|| {
                    EtlError::TaskGraph(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.name, dep
                    ))
                })?;
                indegree[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &next in &dependents[i] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.tasks.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .map(|(i, _)| self.tasks[i].name.as_str())
                .collect();
            return Err(EtlError::TaskGraph(format!(
                "cycle among tasks: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Task names in execution order.
    pub fn ordered_names(&self) -> Result<Vec<&str>> {
        Ok(self
            .execution_order()?
            .into_iter()
            .map(|i| self.tasks[i].name.as_str())
            .collect())
    }
}

/// Timing of one executed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub stage: PipelineStage,
    pub elapsed_ms: u64,
}

/// Shape of one artifact at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct TableShape {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
}

/// What a finished run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub tasks: Vec<TaskReport>,
    pub tables: Vec<TableShape>,
    pub elapsed_ms: u64,
}

/// Summary plus every artifact the run produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub summary: RunSummary,
    pub artifacts: Artifacts,
}

/// Executes task graphs.
///
/// Use [`PipelineRunner::builder()`] to attach progress reporting and a
/// cancellation token.
pub struct PipelineRunner {
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(PipelineRunner: Send);

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineRunner {
    /// Create a new runner builder.
    pub fn builder() -> PipelineRunnerBuilder {
        PipelineRunnerBuilder::default()
    }

    /// Run every task of `graph` in order.
    ///
    /// # Errors
    ///
    /// Returns `Err(EtlError::Cancelled)` if the token was cancelled before
    /// a task started, a [`EtlError::TaskGraph`] for a malformed graph, and
    /// otherwise the first task error with the task name as context.
    pub fn run(&self, graph: &TaskGraph) -> Result<PipelineRun> {
        match self.run_internal(graph) {
            Ok(run) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Pipeline '{}' completed successfully",
                    graph.name()
                )));
                Ok(run)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline '{}' error: {}", graph.name(), e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(EtlError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, graph: &TaskGraph) -> Result<PipelineRun> {
        let start = Instant::now();
        let order = graph.execution_order()?;
        let total = order.len();

        info!("Starting pipeline '{}' with {} tasks", graph.name(), total);
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            format!("Starting pipeline '{}'", graph.name()),
        ));

        let mut artifacts = Artifacts::new();
        let mut reports = Vec::with_capacity(total);
        for (done, i) in order.into_iter().enumerate() {
            self.check_cancelled()?;
            let task = &graph.tasks[i];
            debug!("Running task '{}'", task.name);

            let task_start = Instant::now();
            (task.run)(&mut artifacts).map_err(|e| {
                if e.is_cancelled() {
                    e
                } else {
                    e.with_context(format!("task '{}'", task.name))
                }
            })?;
            let elapsed_ms = task_start.elapsed().as_millis() as u64;

            info!("Task '{}' finished in {} ms", task.name, elapsed_ms);
            self.report_progress(ProgressUpdate::for_task(
                task.stage,
                &task.name,
                done + 1,
                total,
                format!("Finished {}", task.name),
            ));
            reports.push(TaskReport {
                name: task.name.clone(),
                stage: task.stage,
                elapsed_ms,
            });
        }

        let tables = artifacts
            .iter()
            .map(|(name, df)| TableShape {
                name: name.to_string(),
                rows: df.height(),
                columns: df.width(),
            })
            .collect();

        Ok(PipelineRun {
            summary: RunSummary {
                pipeline: graph.name().to_string(),
                tasks: reports,
                tables,
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
            artifacts,
        })
    }
}

/// Builder for [`PipelineRunner`].
#[derive(Default)]
pub struct PipelineRunnerBuilder {
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineRunnerBuilder: Send);

impl PipelineRunnerBuilder {
    /// Set a progress reporter for receiving updates.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a closure to receive progress updates.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the run between tasks.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> PipelineRunner {
        PipelineRunner {
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        }
    }
}
