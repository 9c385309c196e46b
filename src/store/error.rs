// ABOUTME: Error types for dataset store operations
// ABOUTME: Defines specific error types for artifact I/O, pruning, and collection queries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No artifact stored for dataset: {reference}")]
    ArtifactMissing { reference: String },

    #[error("Artifact already exists for dataset: {reference}")]
    Conflict { reference: String },

    #[error("Prune failed: {message}")]
    PruneFailed { message: String },

    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: String },

    #[error("Facility registration failed for '{facility}': {message}")]
    FacilityRegistration { facility: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Backend error: {message}")]
    BackendError { message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
