// ABOUTME: Main library module for the keystone single-quantum execution engine
// ABOUTME: Exports all core modules and provides the public API

pub mod capture;
pub mod executor;
pub mod quantum;
pub mod store;

// Re-export commonly used types
pub use capture::{CaptureLayer, CaptureSink, LogCapture};
pub use executor::{
    ExecutionError, ExecutionResources, ExecutorConfig, QuantumContext, SingleQuantumExecutor,
};
pub use quantum::{
    Connections, DefaultConnections, Quantum, QuantumReport, QuantumTask, TaskConfig, TaskFactory,
    TaskFailure, TaskMetadata, TaskNode,
};
pub use store::{
    DataId, DatasetRef, DatasetStore, DatasetType, FullStore, MemoryStore, PruneOptions,
    StoreAccess, StoreError,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
