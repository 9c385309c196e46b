// ABOUTME: Output existence resolver deciding whether a quantum can be skipped
// ABOUTME: Reconciles complete and partial prior outputs against skip and clobber settings

use tracing::{debug, info};

use super::error::{ExecutionError, Result};
use crate::quantum::quantum::Quantum;
use crate::quantum::task::TaskNode;
use crate::store::client::{DatasetStore, PruneOptions};
use crate::store::reference::DatasetRef;

/// Decides, before running, whether a quantum's outputs already satisfy
/// completion criteria, reconciling partial or conflicting prior state.
#[derive(Debug, Clone, Copy)]
pub struct OutputResolver {
    skip_existing: bool,
    clobber_outputs: bool,
}

impl OutputResolver {
    pub fn new(skip_existing: bool, clobber_outputs: bool) -> Self {
        Self {
            skip_existing,
            clobber_outputs,
        }
    }

    /// Returns `true` when execution should be skipped entirely.
    ///
    /// Metadata presence is treated as proof of a previously successful run
    /// and checked first; it is a single cheap lookup compared to
    /// enumerating every output. Partial outputs are residue of a failed or
    /// interrupted run and are never an implicit retry signal: they are
    /// either clobbered or reported as an inconsistency.
    pub async fn check_existing_outputs(
        &self,
        quantum: &Quantum,
        task_node: &TaskNode,
        store: &dyn DatasetStore,
    ) -> Result<bool> {
        if self.skip_existing {
            debug!(
                "Checking existence of metadata from previous execution of label={} dataId={}",
                task_node.label(),
                quantum.describe()
            );
            let metadata_ref = single_metadata_ref(quantum, task_node)?;
            if store.stored(metadata_ref).await? {
                return Ok(true);
            }
        }

        debug!(
            "Looking for existing outputs in the way for label={} dataId={}",
            task_node.label(),
            quantum.describe()
        );
        let all_outputs: Vec<DatasetRef> = quantum.all_outputs().cloned().collect();
        let existence = store.stored_many(&all_outputs).await?;
        let existing: Vec<DatasetRef> = all_outputs
            .iter()
            .filter(|r| existence.get(*r).copied().unwrap_or(false))
            .cloned()
            .collect();
        let missing: Vec<DatasetRef> = all_outputs
            .iter()
            .filter(|r| !existence.get(*r).copied().unwrap_or(false))
            .cloned()
            .collect();

        if !existing.is_empty() {
            if missing.is_empty() {
                // Full outputs exist.
                if self.skip_existing {
                    return Ok(true);
                } else if self.clobber_outputs {
                    info!(
                        "Removing complete outputs for quantum {}: {}",
                        quantum.describe(),
                        describe_refs(&existing)
                    );
                    store.prune(&existing, PruneOptions::full_removal()).await?;
                } else {
                    return Err(ExecutionError::CompleteOutputsExist {
                        quantum: quantum.describe(),
                        existing: existing.iter().map(ToString::to_string).collect(),
                    });
                }
            } else {
                // Partial outputs from a failed quantum.
                debug!(
                    "Partial outputs exist for quantum {} existing={} missing={}",
                    quantum.describe(),
                    describe_refs(&existing),
                    describe_refs(&missing)
                );
                if self.clobber_outputs {
                    info!(
                        "Removing partial outputs for task {}: {}",
                        task_node.label(),
                        describe_refs(&existing)
                    );
                    store.prune(&existing, PruneOptions::full_removal()).await?;
                    return Ok(false);
                } else {
                    return Err(ExecutionError::OutputInconsistency {
                        quantum: quantum.describe(),
                        existing: existing.iter().map(ToString::to_string).collect(),
                        missing: missing.iter().map(ToString::to_string).collect(),
                    });
                }
            }
        }

        // By default always execute.
        Ok(false)
    }
}

/// The single designated metadata-output reference of a quantum. A
/// cardinality other than one is a configuration mismatch between graph
/// generation and execution.
pub fn single_metadata_ref<'q>(
    quantum: &'q Quantum,
    task_node: &TaskNode,
) -> Result<&'q DatasetRef> {
    match quantum.outputs_for(task_node.metadata_output()) {
        Some([single]) => Ok(single),
        _ => Err(ExecutionError::InvalidQuantum {
            message: format!(
                "quantum outputs is missing metadata dataset type '{}'; this could happen \
                 due to inconsistent options between graph generation and execution",
                task_node.metadata_output()
            ),
        }),
    }
}

fn describe_refs(references: &[DatasetRef]) -> String {
    references
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
