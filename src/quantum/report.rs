// ABOUTME: Per-quantum execution report returned to the caller
// ABOUTME: Pairs the data-selection key and task label for aggregate reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::reference::DataId;

/// Record pairing a quantum's data-selection key and task label, produced
/// once per `execute` call (including the skip path) and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumReport {
    pub data_id: DataId,
    pub task_label: String,
    pub timestamp: DateTime<Utc>,
}

impl QuantumReport {
    pub fn new(data_id: DataId, task_label: &str) -> Self {
        Self {
            data_id,
            task_label: task_label.to_string(),
            timestamp: Utc::now(),
        }
    }
}
