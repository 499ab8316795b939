//! Pipeline module.
//!
//! Task graphs, the runner that executes them, and the seven workflows built
//! on top.

pub mod graph;
pub mod progress;
pub mod workflows;

pub use graph::{
    Artifacts, PipelineRun, PipelineRunner, PipelineRunnerBuilder, RunSummary, TableShape, Task,
    TaskGraph, TaskReport,
};
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
pub use workflows::{PipelineEnv, Workflow};
