// ABOUTME: Input reconciler validating declared inputs against store contents
// ABOUTME: Drops absent references and runs the task's adjustment hook on any reduction

use tracing::{debug, info};

use super::error::{ExecutionError, Result};
use crate::quantum::quantum::{ConnectionMap, Quantum};
use crate::quantum::task::{AdjustError, TaskNode};
use crate::store::client::DatasetStore;

/// Outcome of reconciling a quantum's declared inputs with store reality.
#[derive(Debug)]
pub enum ReconciledInputs {
    /// Execution proceeds with this (possibly reduced) quantum.
    Proceed(Quantum),

    /// The task signalled it has nothing to do given the remaining inputs.
    /// Carries the reduced quantum so the caller still sees store reality.
    NoWork { quantum: Quantum, reason: String },
}

/// Re-validate the quantum's declared inputs against the store.
///
/// References confirmed present are retained in order; absent references are
/// dropped without error, since an upstream producer may legitimately have
/// produced nothing for that branch. If any dataset type lost at least one
/// reference, the task's adjustment hook runs once with the reduced inputs
/// and the original outputs; its result becomes the new quantum's
/// connection maps. Identity fields and init-inputs carry over unchanged.
pub async fn updated_quantum_inputs(
    quantum: &Quantum,
    task_node: &TaskNode,
    store: &dyn DatasetStore,
) -> Result<ReconciledInputs> {
    let mut any_changes = false;
    let mut updated_inputs = ConnectionMap::new();

    for (dataset_type, references) in quantum.inputs() {
        debug!(
            "Checking existence of input '{}' for label={} dataId={}",
            dataset_type.name,
            task_node.label(),
            quantum.describe()
        );
        let existence = store.stored_many(references).await?;
        let mut retained = Vec::with_capacity(references.len());
        for reference in references {
            if existence.get(reference).copied().unwrap_or(false) {
                retained.push(reference.clone());
            } else {
                // Expected when a predicted intermediate was never actually
                // produced upstream; datastore misconfiguration also lands
                // here.
                info!("No dataset artifact found for {}", reference);
            }
        }
        if retained.len() != references.len() {
            any_changes = true;
        }
        updated_inputs.insert(dataset_type.clone(), retained);
    }

    if !any_changes {
        return Ok(ReconciledInputs::Proceed(
            quantum.with_connections(updated_inputs, quantum.outputs().clone()),
        ));
    }

    debug!(
        "Running adjustment hook for label={} dataId={}",
        task_node.label(),
        quantum.describe()
    );
    let data_id = quantum
        .data_id()
        .ok_or_else(|| ExecutionError::MissingDataId {
            label: task_node.label().to_string(),
        })?;
    match task_node.connections().adjust_quantum(
        updated_inputs.clone(),
        quantum.outputs().clone(),
        task_node.label(),
        data_id,
    ) {
        Ok(adjustment) => Ok(ReconciledInputs::Proceed(
            quantum.with_connections(adjustment.inputs, adjustment.outputs),
        )),
        Err(AdjustError::NoWork(reason)) => Ok(ReconciledInputs::NoWork {
            quantum: quantum.with_connections(updated_inputs, quantum.outputs().clone()),
            reason,
        }),
        Err(AdjustError::Invalid(message)) => Err(ExecutionError::InvalidQuantum { message }),
    }
}
