// ABOUTME: Metadata writer and execution phase recording
// ABOUTME: Persists combined execution metadata to the quantum's designated metadata output

use chrono::Utc;
use tracing::debug;

use super::error::Result;
use super::outputs::single_metadata_ref;
use crate::quantum::metadata::TaskMetadata;
use crate::quantum::quantum::Quantum;
use crate::quantum::task::TaskNode;
use crate::store::client::DatasetStore;
use crate::store::reference::DatasetRef;

/// Execution phases stamped into the quantum metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Prep,
    Init,
    Start,
    End,
}

impl ExecutionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPhase::Prep => "prep",
            ExecutionPhase::Init => "init",
            ExecutionPhase::Start => "start",
            ExecutionPhase::End => "end",
        }
    }
}

/// Stamp timing and resource usage for one phase into the record.
pub fn record_phase(metadata: &mut TaskMetadata, phase: ExecutionPhase) {
    metadata.insert(
        &format!("{}Utc", phase.as_str()),
        Utc::now().to_rfc3339(),
    );
    if let Some(max_rss) = peak_rss_bytes() {
        metadata.insert(&format!("{}MaxResidentSetSize", phase.as_str()), max_rss);
    }
}

/// Peak resident set size of this process, when the platform exposes it.
fn peak_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|line| line.starts_with("VmHWM:"))?;
        let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kib * 1024)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Persist the combined execution metadata under the quantum's designated
/// metadata output reference.
///
/// This is the durability boundary: completion of a quantum is defined as
/// "metadata successfully stored", which is exactly what the skip check
/// inspects on a later run.
pub async fn write_metadata(
    quantum: &Quantum,
    metadata: &TaskMetadata,
    task_node: &TaskNode,
    store: &dyn DatasetStore,
) -> Result<DatasetRef> {
    let reference = single_metadata_ref(quantum, task_node)?;
    debug!(
        "Writing metadata for label={} to {}",
        task_node.label(),
        reference
    );
    let stored = store.put(&metadata.to_value(), reference).await?;
    Ok(stored)
}
