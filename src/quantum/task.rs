// ABOUTME: Task description, connection contract, and task-side failure kinds
// ABOUTME: Defines task nodes, config freezing, the adjustment hook, and the task factory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use super::metadata::TaskMetadata;
use super::quantum::{ConnectionMap, Quantum};
use crate::executor::context::QuantumContext;
use crate::store::client::DatasetStore;
use crate::store::reference::{DataId, DatasetRef};

/// Exit code used when terminating the process on a repeatable failure.
pub const REPEATABLE_EXIT_CODE: i32 = 20;
/// Exit code used when terminating the process on an invalid-quantum failure.
pub const INVALID_QUANTUM_EXIT_CODE: i32 = 21;

#[derive(Debug, Error)]
#[error("Task configuration is frozen and can no longer be modified")]
pub struct FrozenConfigError;

/// Task configuration that can be frozen before execution so task code
/// cannot mutate shared settings.
#[derive(Debug, Default)]
pub struct TaskConfig {
    values: Map<String, Value>,
    frozen: AtomicBool,
}

impl TaskConfig {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            frozen: AtomicBool::new(false),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), FrozenConfigError> {
        if self.is_frozen() {
            return Err(FrozenConfigError);
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl Clone for TaskConfig {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            frozen: AtomicBool::new(self.is_frozen()),
        }
    }
}

/// Result of the task's adjustment hook: possibly reduced connection maps.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub inputs: ConnectionMap,
    pub outputs: ConnectionMap,
}

#[derive(Error, Debug)]
pub enum AdjustError {
    /// The task cannot proceed with the remaining inputs. A distinguished
    /// signal, not an error condition.
    #[error("No work remains for this quantum: {0}")]
    NoWork(String),

    #[error("Quantum cannot be adjusted: {0}")]
    Invalid(String),
}

/// The connections contract: which dataset types a task consumes and
/// produces, how quantum references map to call-level bindings, and how the
/// task reacts to inputs that went missing.
pub trait Connections: Send + Sync {
    /// React to a reduced input set. Called with the reduced inputs and the
    /// original outputs whenever reconciliation dropped at least one input
    /// reference; may further reduce either map or signal no-work.
    fn adjust_quantum(
        &self,
        inputs: ConnectionMap,
        outputs: ConnectionMap,
        label: &str,
        data_id: &DataId,
    ) -> Result<Adjustment, AdjustError>;

    /// Derive call-level input and output bindings from the quantum's
    /// declared references.
    fn build_dataset_refs(&self, quantum: &Quantum) -> (ConnectionMap, ConnectionMap) {
        (quantum.inputs().clone(), quantum.outputs().clone())
    }
}

/// Connections implementation that accepts any reduction, except that the
/// dataset types named in `required` must keep at least one reference.
#[derive(Debug, Clone, Default)]
pub struct DefaultConnections {
    required: Vec<String>,
}

impl DefaultConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required(mut self, type_name: &str) -> Self {
        self.required.push(type_name.to_string());
        self
    }
}

impl Connections for DefaultConnections {
    fn adjust_quantum(
        &self,
        inputs: ConnectionMap,
        outputs: ConnectionMap,
        label: &str,
        data_id: &DataId,
    ) -> Result<Adjustment, AdjustError> {
        for name in &self.required {
            let remaining = inputs
                .iter()
                .find(|(dtype, _)| &dtype.name == name)
                .map(|(_, refs)| refs.len())
                .unwrap_or(0);
            if remaining == 0 {
                return Err(AdjustError::NoWork(format!(
                    "required input '{}' has no datasets for task '{}' on {}",
                    name, label, data_id
                )));
            }
        }
        Ok(Adjustment { inputs, outputs })
    }
}

/// Static description of a task: label, configuration, connections contract,
/// and the names of its designated metadata and log outputs.
#[derive(Clone)]
pub struct TaskNode {
    label: String,
    task_name: String,
    config: Arc<TaskConfig>,
    connections: Arc<dyn Connections>,
    metadata_output: String,
    log_output: String,
}

impl TaskNode {
    pub fn new(
        label: &str,
        task_name: &str,
        config: TaskConfig,
        connections: Arc<dyn Connections>,
    ) -> Self {
        Self {
            label: label.to_string(),
            task_name: task_name.to_string(),
            config: Arc::new(config),
            connections,
            metadata_output: format!("{}_metadata", label),
            log_output: format!("{}_log", label),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn connections(&self) -> &dyn Connections {
        self.connections.as_ref()
    }

    /// Dataset type name of the designated metadata output.
    pub fn metadata_output(&self) -> &str {
        &self.metadata_output
    }

    /// Dataset type name of the captured-log output.
    pub fn log_output(&self) -> &str {
        &self.log_output
    }
}

impl std::fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskNode")
            .field("label", &self.label)
            .field("task_name", &self.task_name)
            .field("metadata_output", &self.metadata_output)
            .finish()
    }
}

/// Older task-descriptor shape, still accepted at the `execute` boundary.
#[derive(Clone)]
pub struct TaskDef {
    pub label: String,
    pub task_name: String,
    pub config: TaskConfig,
    pub connections: Arc<dyn Connections>,
}

/// Either task descriptor shape, conformed once per call at the boundary.
#[derive(Clone)]
pub enum TaskDescriptor {
    Node(TaskNode),
    Legacy(TaskDef),
}

impl From<TaskNode> for TaskDescriptor {
    fn from(node: TaskNode) -> Self {
        TaskDescriptor::Node(node)
    }
}

impl From<TaskDef> for TaskDescriptor {
    fn from(def: TaskDef) -> Self {
        TaskDescriptor::Legacy(def)
    }
}

/// Convert either descriptor shape into a `TaskNode`, warning when the
/// legacy shape is used. Invoked once per `execute` call, never threaded
/// through internal methods.
pub fn conform_task_node(descriptor: TaskDescriptor) -> TaskNode {
    match descriptor {
        TaskDescriptor::Node(node) => node,
        TaskDescriptor::Legacy(def) => {
            warn!(
                label = %def.label,
                "Passing a TaskDef to the executor is deprecated; construct a TaskNode instead"
            );
            TaskNode::new(&def.label, &def.task_name, def.config, def.connections)
        }
    }
}

/// Task-side failure kinds, classified by how the runner must react.
#[derive(Error, Debug)]
pub enum TaskFailure {
    /// The task determined there is nothing to do. Not an error; metadata is
    /// still written.
    #[error("No work to do: {0}")]
    NoWork(String),

    /// Transient condition; re-running with the same inputs might succeed.
    #[error("Repeatable failure: {0}")]
    Repeatable(String),

    /// The inputs are fundamentally wrong; retrying will never help.
    #[error("Invalid quantum: {0}")]
    InvalidQuantum(String),

    /// Anything else from the task body, re-raised unchanged to the caller.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskFailure {
    /// Process exit code designated for this failure kind, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskFailure::Repeatable(_) => Some(REPEATABLE_EXIT_CODE),
            TaskFailure::InvalidQuantum(_) => Some(INVALID_QUANTUM_EXIT_CODE),
            TaskFailure::NoWork(_) | TaskFailure::Other(_) => None,
        }
    }

    /// Short classification name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskFailure::NoWork(_) => "no_work",
            TaskFailure::Repeatable(_) => "repeatable",
            TaskFailure::InvalidQuantum(_) => "invalid_quantum",
            TaskFailure::Other(_) => "unclassified",
        }
    }
}

/// The task body contract: run against a restricted I/O context and report
/// structured metadata afterwards.
#[async_trait]
pub trait QuantumTask: Send + Sync {
    async fn run_quantum(
        &self,
        context: &QuantumContext,
        input_refs: &ConnectionMap,
        output_refs: &ConnectionMap,
    ) -> Result<(), TaskFailure>;

    /// Structured metadata accumulated by the task during execution.
    fn full_metadata(&self) -> TaskMetadata;
}

/// Constructs task instances from their static description, the restricted
/// store, and initialization-input references.
#[async_trait]
pub trait TaskFactory: Send + Sync {
    async fn make_task(
        &self,
        node: &TaskNode,
        store: Arc<dyn DatasetStore>,
        init_input_refs: &[DatasetRef],
    ) -> anyhow::Result<Box<dyn QuantumTask>>;
}
