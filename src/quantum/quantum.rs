// ABOUTME: The Quantum value object describing one unit of work
// ABOUTME: Immutable task invocation bound to declared input and output dataset references

use indexmap::IndexMap;

use crate::store::reference::{DataId, DatasetRef, DatasetType};

/// Ordered mapping from dataset type to the references declared for it.
pub type ConnectionMap = IndexMap<DatasetType, Vec<DatasetRef>>;

/// One task invocation bound to a fixed set of input and output dataset
/// references and a data-selection key.
///
/// Quanta are immutable value objects: reconciliation against the store
/// produces a new `Quantum` via [`Quantum::with_connections`], preserving
/// the original as an audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantum {
    task_name: String,
    data_id: Option<DataId>,
    inputs: ConnectionMap,
    outputs: ConnectionMap,
    init_inputs: IndexMap<DatasetType, DatasetRef>,
}

impl Quantum {
    pub fn builder(task_name: &str) -> QuantumBuilder {
        QuantumBuilder::new(task_name)
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn data_id(&self) -> Option<&DataId> {
        self.data_id.as_ref()
    }

    pub fn inputs(&self) -> &ConnectionMap {
        &self.inputs
    }

    pub fn outputs(&self) -> &ConnectionMap {
        &self.outputs
    }

    pub fn init_inputs(&self) -> &IndexMap<DatasetType, DatasetRef> {
        &self.init_inputs
    }

    /// Output references declared for the dataset type with the given name.
    pub fn outputs_for(&self, type_name: &str) -> Option<&[DatasetRef]> {
        self.outputs
            .iter()
            .find(|(dtype, _)| dtype.name == type_name)
            .map(|(_, refs)| refs.as_slice())
    }

    /// Input references declared for the dataset type with the given name.
    pub fn inputs_for(&self, type_name: &str) -> Option<&[DatasetRef]> {
        self.inputs
            .iter()
            .find(|(dtype, _)| dtype.name == type_name)
            .map(|(_, refs)| refs.as_slice())
    }

    pub fn all_inputs(&self) -> impl Iterator<Item = &DatasetRef> {
        self.inputs.values().flatten()
    }

    pub fn all_outputs(&self) -> impl Iterator<Item = &DatasetRef> {
        self.outputs.values().flatten()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.values().map(Vec::len).sum()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.values().map(Vec::len).sum()
    }

    /// New quantum with replaced connection maps; identity and init-inputs
    /// are carried over unchanged.
    pub fn with_connections(&self, inputs: ConnectionMap, outputs: ConnectionMap) -> Self {
        Self {
            task_name: self.task_name.clone(),
            data_id: self.data_id.clone(),
            inputs,
            outputs,
            init_inputs: self.init_inputs.clone(),
        }
    }

    /// Display form used in log lines; data-free quanta print their task name.
    pub fn describe(&self) -> String {
        match &self.data_id {
            Some(data_id) => format!("{} {}", self.task_name, data_id),
            None => self.task_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuantumBuilder {
    task_name: String,
    data_id: Option<DataId>,
    inputs: ConnectionMap,
    outputs: ConnectionMap,
    init_inputs: IndexMap<DatasetType, DatasetRef>,
}

impl QuantumBuilder {
    pub fn new(task_name: &str) -> Self {
        Self {
            task_name: task_name.to_string(),
            data_id: None,
            inputs: ConnectionMap::new(),
            outputs: ConnectionMap::new(),
            init_inputs: IndexMap::new(),
        }
    }

    pub fn data_id(mut self, data_id: DataId) -> Self {
        self.data_id = Some(data_id);
        self
    }

    pub fn input(mut self, dataset_type: DatasetType, references: Vec<DatasetRef>) -> Self {
        self.inputs.insert(dataset_type, references);
        self
    }

    pub fn output(mut self, dataset_type: DatasetType, references: Vec<DatasetRef>) -> Self {
        self.outputs.insert(dataset_type, references);
        self
    }

    pub fn init_input(mut self, dataset_type: DatasetType, reference: DatasetRef) -> Self {
        self.init_inputs.insert(dataset_type, reference);
        self
    }

    pub fn build(self) -> Quantum {
        Quantum {
            task_name: self.task_name,
            data_id: self.data_id,
            inputs: self.inputs,
            outputs: self.outputs,
            init_inputs: self.init_inputs,
        }
    }
}
