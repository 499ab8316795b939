//! Progress reporting and cancellation support for pipeline runs.
//!
//! A run reports one update when it starts, one per finished task and one
//! terminal update (complete, cancelled or failed). Cancellation is
//! cooperative: the runner checks the token before every task, so a task
//! that has started always runs to completion.
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_etl::{CancellationToken, PipelineRunner};
//!
//! let token = CancellationToken::new();
//! let runner = PipelineRunner::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Role of a task in an ETL run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Run is starting
    Initializing,
    /// Listing and reading sources
    Extracting,
    /// Per-table cleaning with its schema gate
    Cleaning,
    /// Joins, aggregates and analytics
    Transforming,
    /// Standalone validation of finished tables
    Validating,
    /// Writing to storage, local files or the warehouse
    Loading,
    /// Run finished successfully
    Complete,
    /// Run was cancelled through its token
    Cancelled,
    /// Run stopped on an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Extracting => "Extracting Data",
            Self::Cleaning => "Cleaning Data",
            Self::Transforming => "Transforming Data",
            Self::Validating => "Validating Data",
            Self::Loading => "Loading Data",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Whether the run is over once this stage is reported.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }
}

/// Progress of a run, measured in finished tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Stage of the task just finished (or the terminal stage)
    pub stage: PipelineStage,

    /// Task the update refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Tasks finished so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_completed: Option<usize>,

    /// Tasks in the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates an update without task information.
    pub fn new(stage: PipelineStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            task: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            tasks_completed: None,
            tasks_total: None,
        }
    }

    /// Creates an update for a finished task.
    pub fn for_task(
        stage: PipelineStage,
        task: impl Into<String>,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let progress = if total > 0 {
            completed as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            task: Some(task.into()),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            tasks_completed: Some(completed),
            tasks_total: Some(total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    /// Creates a cancelled progress update.
    pub fn cancelled() -> Self {
        Self::new(PipelineStage::Cancelled, 0.0, "Pipeline cancelled")
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }
}

/// Receives progress updates from a run.
///
/// Implementations must be `Send + Sync` so a run can be driven from a
/// background thread while updates are consumed elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called once per update. Keep it cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline.
///
/// Clones share one atomic flag, so [`cancel()`](Self::cancel) may be called
/// from any thread. The runner returns
/// [`EtlError::Cancelled`](crate::error::EtlError::Cancelled) before the next
/// task once the flag is set.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or a clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can drive another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
