// ABOUTME: Lazy once-per-facility initialization registry
// ABOUTME: Tracks which facilities have had their singleton state primed on the store

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::debug;

use super::client::FullStore;
use super::error::Result;

/// Tracks facility-scoped one-time initialization, keyed by facility name.
///
/// Some facility-scoped singleton state (calibration and filter registries)
/// must be primed before task construction; leaving that to the task body is
/// unsafe to rely on implicitly. The registry guarantees at most one
/// `register_facility` call per facility for its lifetime.
#[derive(Debug, Default)]
pub struct FacilityRegistry {
    initialized: Mutex<HashSet<String>>,
}

impl FacilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prime the given facility on the store unless already done.
    pub async fn ensure_initialized(&self, facility: &str, store: &dyn FullStore) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if initialized.contains(facility) {
            return Ok(());
        }
        debug!("Initializing facility-scoped state for '{}'", facility);
        store.register_facility(facility).await?;
        initialized.insert(facility.to_string());
        Ok(())
    }

    pub async fn is_initialized(&self, facility: &str) -> bool {
        self.initialized.lock().await.contains(facility)
    }
}
