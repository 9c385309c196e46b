// ABOUTME: Quantum data model module for units of work and task descriptions
// ABOUTME: Exports quanta, task nodes, connection contracts, metadata, and reports

pub mod metadata;
pub mod quantum;
pub mod report;
pub mod task;

pub use metadata::TaskMetadata;
pub use quantum::{ConnectionMap, Quantum, QuantumBuilder};
pub use report::QuantumReport;
pub use task::{
    conform_task_node, Adjustment, AdjustError, Connections, DefaultConnections, QuantumTask,
    TaskConfig, TaskDef, TaskDescriptor, TaskFactory, TaskFailure, TaskNode,
    INVALID_QUANTUM_EXIT_CODE, REPEATABLE_EXIT_CODE,
};
