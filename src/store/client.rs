// ABOUTME: Capability traits for the dataset store consumed by the executor
// ABOUTME: Defines restricted and full store flavors plus construction-time flavor selection

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::Result;
use super::reference::DatasetRef;
use crate::quantum::Quantum;

/// Options controlling how thoroughly pruned artifacts are removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    pub disassociate: bool,
    pub unstore: bool,
    pub purge: bool,
}

impl PruneOptions {
    /// Disassociate, unstore, and purge: nothing of the artifact survives.
    pub fn full_removal() -> Self {
        Self {
            disassociate: true,
            unstore: true,
            purge: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Run,
    Chained,
    Tagged,
}

/// Restricted store flavor: direct artifact I/O for a fixed quantum.
///
/// Existence checks are unguarded snapshots; the store is expected to be
/// concurrently written by other executors, and `put` must fail with
/// `StoreError::Conflict` rather than overwrite an existing artifact.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Whether an artifact is materialized under the given reference.
    async fn stored(&self, reference: &DatasetRef) -> Result<bool>;

    /// Snapshot existence for many references at once.
    async fn stored_many(
        &self,
        references: &[DatasetRef],
    ) -> Result<HashMap<DatasetRef, bool>> {
        let mut results = HashMap::with_capacity(references.len());
        for reference in references {
            let exists = self.stored(reference).await?;
            results.insert(reference.clone(), exists);
        }
        Ok(results)
    }

    /// Read the payload stored under the given reference.
    async fn get(&self, reference: &DatasetRef) -> Result<Value>;

    /// Write a payload, returning the materialized reference carrying its
    /// identity handle. Fails with a conflict error if an artifact already
    /// exists under the reference.
    async fn put(&self, payload: &Value, reference: &DatasetRef) -> Result<DatasetRef>;

    /// Remove the given artifacts. Atomic for the whole set: either all are
    /// removed or the call fails without partial deletion.
    async fn prune(&self, references: &[DatasetRef], options: PruneOptions) -> Result<()>;
}

/// Full store flavor: adds collection-level queries, view refresh, and
/// facility registration on top of direct artifact I/O.
#[async_trait]
pub trait FullStore: DatasetStore {
    /// Name of the run collection this store writes into.
    fn run_collection(&self) -> &str;

    /// Refresh this client's view of collection state.
    async fn refresh(&self) -> Result<()>;

    /// Resolve collection name patterns to the set of matching collections
    /// of the given kind.
    async fn query_collections(
        &self,
        patterns: &[String],
        kind: CollectionKind,
    ) -> Result<HashSet<String>>;

    /// One-time facility-scoped initialization hook (calibration/filter
    /// registries and similar singleton state).
    async fn register_facility(&self, facility: &str) -> Result<()>;
}

/// Creates a restricted store scoped to one quantum.
pub trait RestrictedStoreFactory: Send + Sync {
    fn for_quantum(&self, quantum: &Quantum) -> Arc<dyn DatasetStore>;
}

impl<F> RestrictedStoreFactory for F
where
    F: Fn(&Quantum) -> Arc<dyn DatasetStore> + Send + Sync,
{
    fn for_quantum(&self, quantum: &Quantum) -> Arc<dyn DatasetStore> {
        self(quantum)
    }
}

/// Store flavor selected once at executor construction: either a full store
/// used for everything, or a factory producing a restricted store per
/// quantum.
#[derive(Clone)]
pub enum StoreAccess {
    Full {
        full: Arc<dyn FullStore>,
        limited: Arc<dyn DatasetStore>,
    },
    Restricted {
        factory: Arc<dyn RestrictedStoreFactory>,
    },
}

impl StoreAccess {
    pub fn full<S>(store: Arc<S>) -> Self
    where
        S: FullStore + 'static,
    {
        Self::Full {
            limited: store.clone(),
            full: store,
        }
    }

    pub fn restricted(factory: Arc<dyn RestrictedStoreFactory>) -> Self {
        Self::Restricted { factory }
    }

    /// The full store, when this access was built from one.
    pub fn as_full(&self) -> Option<&Arc<dyn FullStore>> {
        match self {
            Self::Full { full, .. } => Some(full),
            Self::Restricted { .. } => None,
        }
    }

    /// Resolve the store used for the given quantum's artifact I/O.
    pub fn resolve(&self, quantum: &Quantum) -> Arc<dyn DatasetStore> {
        match self {
            Self::Full { limited, .. } => Arc::clone(limited),
            Self::Restricted { factory } => factory.for_quantum(quantum),
        }
    }
}

impl std::fmt::Debug for StoreAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full { full, .. } => f
                .debug_struct("StoreAccess::Full")
                .field("run_collection", &full.run_collection())
                .finish(),
            Self::Restricted { .. } => f.debug_struct("StoreAccess::Restricted").finish(),
        }
    }
}
