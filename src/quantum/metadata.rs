// ABOUTME: Structured execution metadata records
// ABOUTME: Ordered string-to-JSON record with nested children for per-task sections

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered record of metadata fields, nestable per task section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata(IndexMap<String, Value>);

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Nest another record under the given key.
    pub fn insert_child(&mut self, key: &str, child: TaskMetadata) {
        self.0.insert(key.to_string(), child.to_value());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Child record previously nested under the given key.
    pub fn child(&self, key: &str) -> Option<TaskMetadata> {
        let value = self.0.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<TaskMetadata> for Value {
    fn from(metadata: TaskMetadata) -> Self {
        metadata.to_value()
    }
}
