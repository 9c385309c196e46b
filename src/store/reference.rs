// ABOUTME: Dataset reference value types identifying artifacts in the store
// ABOUTME: Defines coordinate values, data IDs, dataset types, and dataset references

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One coordinate of a data-selection key, e.g. a facility name or a visit
/// number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordValue {
    Str(String),
    Int(i64),
}

impl CoordValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CoordValue::Str(s) => Some(s),
            CoordValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CoordValue::Str(_) => None,
            CoordValue::Int(i) => Some(*i),
        }
    }
}

impl fmt::Display for CoordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordValue::Str(s) => write!(f, "{}", s),
            CoordValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for CoordValue {
    fn from(value: &str) -> Self {
        CoordValue::Str(value.to_string())
    }
}

impl From<String> for CoordValue {
    fn from(value: String) -> Self {
        CoordValue::Str(value)
    }
}

impl From<i64> for CoordValue {
    fn from(value: i64) -> Self {
        CoordValue::Int(value)
    }
}

/// Structured data-selection key: an ordered set of named coordinates
/// identifying which data a quantum operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataId(BTreeMap<String, CoordValue>);

impl DataId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<CoordValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&CoordValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(CoordValue::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CoordValue)> {
        self.0.iter()
    }
}

impl<const N: usize> From<[(&str, CoordValue); N]> for DataId {
    fn from(pairs: [(&str, CoordValue); N]) -> Self {
        DataId(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

/// Named schema classifying a dataset reference. Equality and hashing are by
/// name only; the storage class is descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetType {
    pub name: String,
    pub storage_class: String,
}

impl DatasetType {
    pub fn new(name: &str, storage_class: &str) -> Self {
        Self {
            name: name.to_string(),
            storage_class: storage_class.to_string(),
        }
    }
}

impl PartialEq for DatasetType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DatasetType {}

impl Hash for DatasetType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Reference to a single dataset artifact: type + data ID + an opaque
/// identity handle assigned once the artifact is materialized.
///
/// Equality and hashing cover the type and data ID only, never the handle,
/// so a predicted reference and its materialized counterpart compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset_type: DatasetType,
    pub data_id: DataId,
    pub id: Option<Uuid>,
}

impl DatasetRef {
    pub fn new(dataset_type: DatasetType, data_id: DataId) -> Self {
        Self {
            dataset_type,
            data_id,
            id: None,
        }
    }

    /// Copy of this reference carrying the given identity handle.
    pub fn with_id(&self, id: Uuid) -> Self {
        Self {
            dataset_type: self.dataset_type.clone(),
            data_id: self.data_id.clone(),
            id: Some(id),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.id.is_some()
    }

    pub fn type_name(&self) -> &str {
        &self.dataset_type.name
    }
}

impl PartialEq for DatasetRef {
    fn eq(&self, other: &Self) -> bool {
        self.dataset_type == other.dataset_type && self.data_id == other.data_id
    }
}

impl Eq for DatasetRef {}

impl Hash for DatasetRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dataset_type.hash(state);
        self.data_id.hash(state);
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dataset_type.name, self.data_id)
    }
}
