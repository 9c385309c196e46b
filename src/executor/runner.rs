// ABOUTME: Quantum runner invoking the task body under a restricted I/O context
// ABOUTME: Classifies task failure kinds into control decisions including process termination

use std::sync::Arc;

use tracing::{error, info, warn};

use super::config::ExecutionResources;
use super::context::QuantumContext;
use super::error::{ExecutionError, Result};
use crate::quantum::quantum::Quantum;
use crate::quantum::task::{QuantumTask, TaskFailure, TaskNode};
use crate::store::client::DatasetStore;

/// How the task body finished when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The task exited early with nothing to do. Not an error; metadata is
    /// still written as if the task ran.
    NoWork,
}

/// Control decision for a classified task failure.
#[derive(Debug, PartialEq, Eq)]
pub enum FailureAction {
    TreatAsNoWork,
    Terminate(i32),
    Propagate,
}

/// Map a task failure to its control decision.
///
/// Invalid-quantum failures always terminate the process: the inputs are
/// unsatisfiable and retrying can never help. Repeatable failures terminate
/// only when the runner is configured to exit on known failure kinds;
/// otherwise the surrounding scheduler owns the retry policy.
pub fn classify(failure: &TaskFailure, exit_on_known_error: bool) -> FailureAction {
    match failure {
        TaskFailure::NoWork(_) => FailureAction::TreatAsNoWork,
        TaskFailure::Repeatable(_) => {
            if exit_on_known_error {
                FailureAction::Terminate(failure.exit_code().unwrap_or(1))
            } else {
                FailureAction::Propagate
            }
        }
        TaskFailure::InvalidQuantum(_) => {
            FailureAction::Terminate(failure.exit_code().unwrap_or(1))
        }
        TaskFailure::Other(_) => FailureAction::Propagate,
    }
}

#[derive(Debug, Clone)]
pub struct QuantumRunner {
    exit_on_known_error: bool,
    resources: ExecutionResources,
}

impl QuantumRunner {
    pub fn new(exit_on_known_error: bool, resources: ExecutionResources) -> Self {
        Self {
            exit_on_known_error,
            resources,
        }
    }

    /// Execute the task body on a single quantum.
    ///
    /// The constructed context is the only channel the task may use for
    /// dataset I/O; call-level bindings are derived from the task's
    /// connections contract applied to the quantum.
    pub async fn run_quantum(
        &self,
        task: &dyn QuantumTask,
        quantum: &Quantum,
        task_node: &TaskNode,
        store: Arc<dyn DatasetStore>,
    ) -> Result<RunStatus> {
        let context = QuantumContext::new(store, quantum, self.resources.clone());
        let (input_refs, output_refs) = task_node.connections().build_dataset_refs(quantum);

        match task.run_quantum(&context, &input_refs, &output_refs).await {
            Ok(()) => Ok(RunStatus::Completed),
            Err(failure) => match classify(&failure, self.exit_on_known_error) {
                FailureAction::TreatAsNoWork => {
                    info!(
                        "Task '{}' on quantum {} exited early: {}",
                        task_node.label(),
                        quantum.describe(),
                        failure
                    );
                    Ok(RunStatus::NoWork)
                }
                FailureAction::Terminate(code) => {
                    match &failure {
                        TaskFailure::InvalidQuantum(_) => error!(
                            "Invalid quantum error for {} ({}): {}",
                            task_node.label(),
                            quantum.describe(),
                            failure
                        ),
                        _ => warn!(
                            "Caught {} quantum error for {} ({}): {}",
                            failure.kind(),
                            task_node.label(),
                            quantum.describe(),
                            failure
                        ),
                    }
                    std::process::exit(code);
                }
                FailureAction::Propagate => match failure {
                    TaskFailure::Repeatable(message) => Err(ExecutionError::Repeatable {
                        label: task_node.label().to_string(),
                        message,
                    }),
                    TaskFailure::Other(source) => Err(ExecutionError::TaskFailed {
                        label: task_node.label().to_string(),
                        quantum: quantum.describe(),
                        source,
                    }),
                    // classify() never routes the remaining kinds here.
                    other => Err(ExecutionError::TaskFailed {
                        label: task_node.label().to_string(),
                        quantum: quantum.describe(),
                        source: anyhow::Error::new(other),
                    }),
                },
            },
        }
    }
}
