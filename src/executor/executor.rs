// ABOUTME: Single-quantum execution orchestrator tying all phases together
// ABOUTME: Runs skip checks, input reconciliation, global init, the task body, and metadata writes

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn, Instrument};

use super::config::ExecutorConfig;
use super::error::{ExecutionError, Result};
use super::inputs::{updated_quantum_inputs, ReconciledInputs};
use super::metadata::{record_phase, write_metadata, ExecutionPhase};
use super::outputs::OutputResolver;
use super::runner::QuantumRunner;
use crate::capture::{CaptureHandle, CaptureLayer, CaptureSink, LogCapture};
use crate::quantum::metadata::TaskMetadata;
use crate::quantum::quantum::Quantum;
use crate::quantum::report::QuantumReport;
use crate::quantum::task::{conform_task_node, TaskDescriptor, TaskFactory, TaskNode};
use crate::store::client::{CollectionKind, DatasetStore, StoreAccess};
use crate::store::facility::FacilityRegistry;
use crate::store::reference::DatasetRef;

/// Data-selection coordinate identifying the facility a dataset belongs to.
const FACILITY_KEY: &str = "instrument";

/// Executor running one quantum at a time.
///
/// The whole `execute` call may be invoked concurrently by an external
/// scheduler across many quanta; internally execution is strictly
/// sequential. The store is the single source of truth for races with other
/// workers.
pub struct SingleQuantumExecutor {
    store: StoreAccess,
    task_factory: Arc<dyn TaskFactory>,
    config: ExecutorConfig,
    skip_existing: bool,
    facilities: FacilityRegistry,
    capture_sink: CaptureSink,
}

impl SingleQuantumExecutor {
    /// Create an executor, resolving the effective skip-on-existing flag.
    ///
    /// With a full store, skipping is enabled when its run collection is
    /// named in `skip_existing_in`, checked against the explicit list first
    /// and then via one collection query. With only a restricted store the
    /// explicit `skip_existing` flag governs.
    pub async fn new(
        store: StoreAccess,
        task_factory: Arc<dyn TaskFactory>,
        config: ExecutorConfig,
    ) -> Result<Self> {
        let mut skip_existing = config.skip_existing;
        if !skip_existing && !config.skip_existing_in.is_empty() {
            if let Some(full) = store.as_full() {
                skip_existing = config
                    .skip_existing_in
                    .iter()
                    .any(|name| name == full.run_collection());
                if !skip_existing {
                    skip_existing = full
                        .query_collections(&config.skip_existing_in, CollectionKind::Run)
                        .await?
                        .contains(full.run_collection());
                }
            }
        }

        Ok(Self {
            store,
            task_factory,
            config,
            skip_existing,
            facilities: FacilityRegistry::new(),
            capture_sink: CaptureSink::new(),
        })
    }

    /// Effective skip-on-existing setting after collection resolution.
    pub fn skip_existing(&self) -> bool {
        self.skip_existing
    }

    /// Layer the embedding application composes into its subscriber so this
    /// executor's quantum logs can be captured and persisted.
    pub fn capture_layer(&self) -> CaptureLayer {
        self.capture_sink.layer()
    }

    /// Execute one quantum, returning the (possibly updated) quantum and a
    /// report for aggregate success/failure accounting. The report is
    /// produced on every path, including the skip path.
    pub async fn execute(
        &self,
        descriptor: impl Into<TaskDescriptor>,
        quantum: Quantum,
    ) -> Result<(Quantum, QuantumReport)> {
        let task_node = conform_task_node(descriptor.into());
        let data_id = quantum
            .data_id()
            .cloned()
            .ok_or_else(|| ExecutionError::MissingDataId {
                label: task_node.label().to_string(),
            })?;

        if let Some(full) = self.store.as_full() {
            full.refresh().await?;
        }

        let quantum = self.execute_quantum(&task_node, quantum).await?;
        let report = QuantumReport::new(data_id, task_node.label());
        Ok((quantum, report))
    }

    /// Run one quantum inside its log-capture scope, releasing the capture
    /// on every exit path.
    async fn execute_quantum(&self, task_node: &TaskNode, quantum: Quantum) -> Result<Quantum> {
        let store = self.store.resolve(&quantum);
        let log_capture = LogCapture::new(Arc::clone(&store), self.capture_sink.clone());
        let capture = log_capture.capture_logging(task_node, &quantum);
        let span = capture.span();

        let result = self
            .execute_captured(task_node, quantum, &capture, store)
            .instrument(span)
            .await;

        match result {
            Ok(quantum) => {
                capture.release().await?;
                Ok(quantum)
            }
            Err(err) => {
                if let Err(release_err) = capture.release().await {
                    warn!(
                        "Failed to persist captured log for '{}': {}",
                        task_node.label(),
                        release_err
                    );
                }
                Err(err)
            }
        }
    }

    async fn execute_captured(
        &self,
        task_node: &TaskNode,
        quantum: Quantum,
        capture: &CaptureHandle,
        store: Arc<dyn DatasetStore>,
    ) -> Result<Quantum> {
        let start_time = Instant::now();
        let mut quantum_metadata = TaskMetadata::new();
        record_phase(&mut quantum_metadata, ExecutionPhase::Prep);

        info!(
            "Preparing execution of quantum for label={} dataId={}",
            task_node.label(),
            quantum.describe()
        );

        // A skipped quantum's logs may already be in the store from the
        // successful run; do not store a second capture for it.
        capture.set_store(false);
        let resolver = OutputResolver::new(self.skip_existing, self.config.clobber_outputs);
        if resolver
            .check_existing_outputs(&quantum, task_node, store.as_ref())
            .await?
        {
            info!(
                "Skipping already-successful quantum for label={} dataId={}",
                task_node.label(),
                quantum.describe()
            );
            return Ok(quantum);
        }
        capture.set_store(true);

        let quantum = match updated_quantum_inputs(&quantum, task_node, store.as_ref()).await? {
            ReconciledInputs::Proceed(quantum) => quantum,
            ReconciledInputs::NoWork { quantum, reason } => {
                info!(
                    "Nothing to do for task '{}' on quantum {}; saving metadata and skipping: {}",
                    task_node.label(),
                    quantum.describe(),
                    reason
                );
                // Metadata shaped like a do-nothing task's output: an empty
                // record for the task label plus the phase timings.
                record_phase(&mut quantum_metadata, ExecutionPhase::End);
                let mut full_metadata = TaskMetadata::new();
                full_metadata.insert_child(task_node.label(), TaskMetadata::new());
                full_metadata.insert_child("quantum", quantum_metadata);
                write_metadata(&quantum, &full_metadata, task_node, store.as_ref()).await?;
                return Ok(quantum);
            }
        };

        self.init_globals(&quantum).await?;

        // The task must execute against a frozen configuration.
        task_node.config().freeze();
        record_phase(&mut quantum_metadata, ExecutionPhase::Init);
        let init_input_refs: Vec<DatasetRef> = quantum.init_inputs().values().cloned().collect();

        info!(
            "Constructing task and executing quantum for label={} dataId={}",
            task_node.label(),
            quantum.describe()
        );
        let task = self
            .task_factory
            .make_task(task_node, Arc::clone(&store), &init_input_refs)
            .await
            .map_err(|source| ExecutionError::TaskConstruction {
                label: task_node.label().to_string(),
                source,
            })?;

        record_phase(&mut quantum_metadata, ExecutionPhase::Start);
        let runner = QuantumRunner::new(
            self.config.exit_on_known_error,
            self.config.resources.clone(),
        );
        if let Err(err) = runner
            .run_quantum(task.as_ref(), &quantum, task_node, Arc::clone(&store))
            .await
        {
            error!(
                "Execution of task '{}' on quantum {} failed: {}",
                task_node.label(),
                quantum.describe(),
                err
            );
            return Err(err);
        }
        record_phase(&mut quantum_metadata, ExecutionPhase::End);

        let mut full_metadata = task.full_metadata();
        full_metadata.insert_child("quantum", quantum_metadata);
        write_metadata(&quantum, &full_metadata, task_node, store.as_ref()).await?;

        info!(
            "Execution of task '{}' on quantum {} took {:.3} seconds",
            task_node.label(),
            quantum.describe(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(quantum)
    }

    /// One-time facility-scoped initialization, active only with a full
    /// store. All facility coordinates across the quantum's references must
    /// agree; a mismatch is a programming-invariant violation.
    async fn init_globals(&self, quantum: &Quantum) -> Result<()> {
        let Some(full) = self.store.as_full() else {
            return Ok(());
        };

        let mut facility: Option<&str> = None;
        for reference in quantum.all_inputs().chain(quantum.all_outputs()) {
            if let Some(name) = reference.data_id.get_str(FACILITY_KEY) {
                match facility {
                    Some(existing) if existing != name => {
                        return Err(ExecutionError::FacilityMismatch {
                            first: existing.to_string(),
                            second: name.to_string(),
                        });
                    }
                    _ => facility = Some(name),
                }
            }
        }

        if let Some(name) = facility {
            self.facilities
                .ensure_initialized(name, full.as_ref())
                .await?;
        }
        Ok(())
    }
}
