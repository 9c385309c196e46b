// ABOUTME: Restricted I/O context handed to the task body
// ABOUTME: Limits dataset reads and writes to exactly one quantum's declared references

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::config::ExecutionResources;
use crate::quantum::quantum::Quantum;
use crate::store::client::DatasetStore;
use crate::store::error::StoreError;
use crate::store::reference::DatasetRef;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Dataset '{reference}' is not among this quantum's declared inputs")]
    UndeclaredInput { reference: String },

    #[error("Dataset '{reference}' is not among this quantum's declared outputs")]
    UndeclaredOutput { reference: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// The only channel a task body may use to read inputs or write outputs.
///
/// Scoped to exactly one quantum's references: any access outside the
/// declared sets fails before reaching the store.
pub struct QuantumContext {
    store: Arc<dyn DatasetStore>,
    declared_inputs: HashSet<DatasetRef>,
    declared_outputs: HashSet<DatasetRef>,
    resources: ExecutionResources,
}

impl QuantumContext {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        quantum: &Quantum,
        resources: ExecutionResources,
    ) -> Self {
        let declared_inputs = quantum
            .all_inputs()
            .chain(quantum.init_inputs().values())
            .cloned()
            .collect();
        let declared_outputs = quantum.all_outputs().cloned().collect();
        Self {
            store,
            declared_inputs,
            declared_outputs,
            resources,
        }
    }

    pub fn resources(&self) -> &ExecutionResources {
        &self.resources
    }

    pub async fn get(&self, reference: &DatasetRef) -> Result<Value, ContextError> {
        if !self.declared_inputs.contains(reference) {
            return Err(ContextError::UndeclaredInput {
                reference: reference.to_string(),
            });
        }
        Ok(self.store.get(reference).await?)
    }

    pub async fn put(
        &self,
        payload: &Value,
        reference: &DatasetRef,
    ) -> Result<DatasetRef, ContextError> {
        if !self.declared_outputs.contains(reference) {
            return Err(ContextError::UndeclaredOutput {
                reference: reference.to_string(),
            });
        }
        Ok(self.store.put(payload, reference).await?)
    }

    /// Existence snapshot for a declared input, e.g. to branch on optional
    /// inputs without forcing a read.
    pub async fn stored(&self, reference: &DatasetRef) -> Result<bool, ContextError> {
        if !self.declared_inputs.contains(reference) && !self.declared_outputs.contains(reference) {
            return Err(ContextError::UndeclaredInput {
                reference: reference.to_string(),
            });
        }
        Ok(self.store.stored(reference).await?)
    }
}
