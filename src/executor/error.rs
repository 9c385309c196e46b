// ABOUTME: Error types for single-quantum execution
// ABOUTME: Defines the execution error taxonomy from configuration conflicts to task failures

use thiserror::Error;

use crate::store::error::StoreError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Quantum data ID is missing for task '{label}'")]
    MissingDataId { label: String },

    #[error(
        "Complete outputs exist for quantum {quantum} and neither clobber nor \
         skip-existing is set: existing={existing:?}"
    )]
    CompleteOutputsExist {
        quantum: String,
        existing: Vec<String>,
    },

    #[error(
        "Store inconsistency while checking for existing quantum outputs: \
         quantum={quantum} existing={existing:?} missing={missing:?}"
    )]
    OutputInconsistency {
        quantum: String,
        existing: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Invalid quantum: {message}")]
    InvalidQuantum { message: String },

    #[error(
        "Facility mismatch within one quantum: found both '{first}' and '{second}'; \
         a graph must use exactly one facility per execution unit"
    )]
    FacilityMismatch { first: String, second: String },

    #[error("Repeatable failure in task '{label}': {message}")]
    Repeatable { label: String, message: String },

    #[error("Failed to construct task '{label}': {source}")]
    TaskConstruction {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task '{label}' failed on quantum {quantum}: {source}")]
    TaskFailed {
        label: String,
        quantum: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
