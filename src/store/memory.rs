// ABOUTME: In-memory dataset store implementing both capability flavors
// ABOUTME: Backs the test suites and serves as the reference store implementation

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::client::{CollectionKind, DatasetStore, FullStore, PruneOptions};
use super::error::{Result, StoreError};
use super::reference::DatasetRef;

#[derive(Debug, Clone)]
struct StoredArtifact {
    id: Uuid,
    payload: Value,
}

#[derive(Debug, Default)]
struct MemoryState {
    artifacts: HashMap<DatasetRef, StoredArtifact>,
    collections: HashSet<String>,
    registered_facilities: Vec<String>,
    refresh_count: usize,
}

/// In-memory store keyed by dataset reference (type + data ID).
///
/// Writes are conflict-checked and prunes are atomic under a single write
/// lock, matching the guarantees the executor expects from a real backend.
#[derive(Debug)]
pub struct MemoryStore {
    run: String,
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new(run: &str) -> Arc<Self> {
        let mut state = MemoryState::default();
        state.collections.insert(run.to_string());
        Arc::new(Self {
            run: run.to_string(),
            state: RwLock::new(state),
        })
    }

    /// Register an additional collection name for `query_collections`.
    pub async fn add_collection(&self, name: &str) {
        self.state.write().await.collections.insert(name.to_string());
    }

    /// Seed an artifact directly, bypassing conflict checks. Test helper.
    pub async fn insert(&self, reference: &DatasetRef, payload: Value) -> DatasetRef {
        let id = Uuid::new_v4();
        self.state
            .write()
            .await
            .artifacts
            .insert(reference.clone(), StoredArtifact { id, payload });
        reference.with_id(id)
    }

    pub async fn artifact_count(&self) -> usize {
        self.state.read().await.artifacts.len()
    }

    pub async fn facility_registrations(&self) -> Vec<String> {
        self.state.read().await.registered_facilities.clone()
    }

    pub async fn refresh_count(&self) -> usize {
        self.state.read().await.refresh_count
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn stored(&self, reference: &DatasetRef) -> Result<bool> {
        Ok(self.state.read().await.artifacts.contains_key(reference))
    }

    async fn get(&self, reference: &DatasetRef) -> Result<Value> {
        let state = self.state.read().await;
        state
            .artifacts
            .get(reference)
            .map(|artifact| artifact.payload.clone())
            .ok_or_else(|| StoreError::ArtifactMissing {
                reference: reference.to_string(),
            })
    }

    async fn put(&self, payload: &Value, reference: &DatasetRef) -> Result<DatasetRef> {
        let mut state = self.state.write().await;
        if state.artifacts.contains_key(reference) {
            return Err(StoreError::Conflict {
                reference: reference.to_string(),
            });
        }
        let id = Uuid::new_v4();
        state.artifacts.insert(
            reference.clone(),
            StoredArtifact {
                id,
                payload: payload.clone(),
            },
        );
        Ok(reference.with_id(id))
    }

    async fn prune(&self, references: &[DatasetRef], options: PruneOptions) -> Result<()> {
        if !options.unstore && !options.purge {
            return Err(StoreError::PruneFailed {
                message: "prune requested without unstore or purge".to_string(),
            });
        }
        // Single write lock keeps the removal atomic for the whole set.
        let mut state = self.state.write().await;
        for reference in references {
            if !state.artifacts.contains_key(reference) {
                return Err(StoreError::PruneFailed {
                    message: format!("cannot prune unknown dataset {}", reference),
                });
            }
        }
        for reference in references {
            state.artifacts.remove(reference);
        }
        Ok(())
    }
}

#[async_trait]
impl FullStore for MemoryStore {
    fn run_collection(&self) -> &str {
        &self.run
    }

    async fn refresh(&self) -> Result<()> {
        self.state.write().await.refresh_count += 1;
        Ok(())
    }

    async fn query_collections(
        &self,
        patterns: &[String],
        _kind: CollectionKind,
    ) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        let mut matched = HashSet::new();
        for pattern in patterns {
            if let Some(prefix) = pattern.strip_suffix('*') {
                matched.extend(
                    state
                        .collections
                        .iter()
                        .filter(|name| name.starts_with(prefix))
                        .cloned(),
                );
            } else if state.collections.contains(pattern) {
                matched.insert(pattern.clone());
            }
        }
        Ok(matched)
    }

    async fn register_facility(&self, facility: &str) -> Result<()> {
        self.state
            .write()
            .await
            .registered_facilities
            .push(facility.to_string());
        Ok(())
    }
}
