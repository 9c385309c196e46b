// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides quantum builders, scripted tasks, and task factories over the memory store

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use keystone::executor::QuantumContext;
use keystone::quantum::{
    ConnectionMap, DefaultConnections, Quantum, QuantumTask, TaskConfig, TaskFactory, TaskFailure,
    TaskNode,
};
use keystone::store::{DataId, DatasetRef, DatasetStore, DatasetType};

pub fn data_id(visit: i64) -> DataId {
    DataId::new().with("instrument", "cam_a").with("visit", visit)
}

pub fn make_ref(name: &str, visit: i64) -> DatasetRef {
    DatasetRef::new(DatasetType::new(name, "json"), data_id(visit))
}

pub fn metadata_ref(label: &str, visit: i64) -> DatasetRef {
    DatasetRef::new(
        DatasetType::new(&format!("{}_metadata", label), "metadata"),
        data_id(visit),
    )
}

pub fn log_ref(label: &str, visit: i64) -> DatasetRef {
    DatasetRef::new(
        DatasetType::new(&format!("{}_log", label), "log"),
        data_id(visit),
    )
}

/// Quantum with `raw` inputs, one data output, and the designated metadata
/// and log outputs every task node declares.
pub fn standard_quantum(label: &str, visit: i64, input_visits: &[i64]) -> Quantum {
    let raw_type = DatasetType::new("raw", "json");
    let inputs: Vec<DatasetRef> = input_visits.iter().map(|v| make_ref("raw", *v)).collect();
    Quantum::builder("MeasureTask")
        .data_id(data_id(visit))
        .input(raw_type, inputs)
        .output(
            DatasetType::new(&format!("{}_out", label), "json"),
            vec![make_ref(&format!("{}_out", label), visit)],
        )
        .output(
            DatasetType::new(&format!("{}_metadata", label), "metadata"),
            vec![metadata_ref(label, visit)],
        )
        .output(
            DatasetType::new(&format!("{}_log", label), "log"),
            vec![log_ref(label, visit)],
        )
        .build()
}

pub fn standard_node(label: &str) -> TaskNode {
    TaskNode::new(
        label,
        "MeasureTask",
        TaskConfig::default(),
        Arc::new(DefaultConnections::new()),
    )
}

pub fn node_requiring(label: &str, required_input: &str) -> TaskNode {
    TaskNode::new(
        label,
        "MeasureTask",
        TaskConfig::default(),
        Arc::new(DefaultConnections::new().with_required(required_input)),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBehavior {
    Succeed,
    SignalNoWork,
    FailRepeatable,
    FailUnclassified,
}

/// Task that reads every input, writes every data output, and finishes
/// according to the scripted behavior.
pub struct ScriptedTask {
    label: String,
    behavior: TaskBehavior,
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl QuantumTask for ScriptedTask {
    async fn run_quantum(
        &self,
        context: &QuantumContext,
        input_refs: &ConnectionMap,
        output_refs: &ConnectionMap,
    ) -> Result<(), TaskFailure> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            TaskBehavior::SignalNoWork => {
                return Err(TaskFailure::NoWork("nothing selected".to_string()))
            }
            TaskBehavior::FailRepeatable => {
                return Err(TaskFailure::Repeatable("transient backend".to_string()))
            }
            TaskBehavior::FailUnclassified => {
                return Err(TaskFailure::Other(anyhow::anyhow!("unexpected condition")))
            }
            TaskBehavior::Succeed => {}
        }

        let mut processed = 0usize;
        for references in input_refs.values() {
            for reference in references {
                context
                    .get(reference)
                    .await
                    .map_err(|e| TaskFailure::Other(e.into()))?;
                processed += 1;
            }
        }

        // Data outputs only; the metadata and log datasets belong to the
        // executor.
        for (dataset_type, references) in output_refs {
            if dataset_type.name.ends_with("_metadata") || dataset_type.name.ends_with("_log") {
                continue;
            }
            for reference in references {
                context
                    .put(&json!({ "processed": processed }), reference)
                    .await
                    .map_err(|e| TaskFailure::Other(e.into()))?;
            }
        }
        Ok(())
    }

    fn full_metadata(&self) -> keystone::TaskMetadata {
        let mut task_section = keystone::TaskMetadata::new();
        task_section.insert("numSources", 2);
        let mut full = keystone::TaskMetadata::new();
        full.insert_child(&self.label, task_section);
        full
    }
}

/// Factory producing `ScriptedTask` instances and counting constructions.
pub struct ScriptedFactory {
    pub behavior: TaskBehavior,
    pub task_invocations: Arc<AtomicUsize>,
    pub constructions: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(behavior: TaskBehavior) -> Self {
        Self {
            behavior,
            task_invocations: Arc::new(AtomicUsize::new(0)),
            constructions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TaskFactory for ScriptedFactory {
    async fn make_task(
        &self,
        node: &TaskNode,
        _store: Arc<dyn DatasetStore>,
        _init_input_refs: &[DatasetRef],
    ) -> anyhow::Result<Box<dyn QuantumTask>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedTask {
            label: node.label().to_string(),
            behavior: self.behavior,
            invocations: Arc::clone(&self.task_invocations),
        }))
    }
}
