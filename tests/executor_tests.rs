// ABOUTME: Integration tests for the single-quantum execution engine
// ABOUTME: Exercises skip, clobber, reconciliation, no-work, failure, and metadata paths

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;

use keystone::executor::{ExecutionError, ExecutorConfig, SingleQuantumExecutor};
use keystone::quantum::{Quantum, TaskDef};
use keystone::store::{DatasetStore, MemoryStore, StoreAccess};

mod common;
use common::{
    data_id, log_ref, make_ref, metadata_ref, node_requiring, standard_node, standard_quantum,
    ScriptedFactory, TaskBehavior,
};

async fn make_executor(
    store: Arc<MemoryStore>,
    factory: Arc<ScriptedFactory>,
    config: ExecutorConfig,
) -> SingleQuantumExecutor {
    SingleQuantumExecutor::new(StoreAccess::full(store), factory, config)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_successful_execution_writes_outputs_and_metadata() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!({"pixels": 4})).await;
    store.insert(&make_ref("raw", 2), json!({"pixels": 5})).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1, 2]);
    let (updated, report) = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap();

    assert_eq!(report.task_label, "measure");
    assert_eq!(report.data_id, data_id(1));
    assert_eq!(updated.input_count(), 2);
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);

    // Data output written by the task.
    assert_eq!(
        store.get(&make_ref("measure_out", 1)).await.unwrap(),
        json!({"processed": 2})
    );

    // Combined metadata: task-reported fields plus phase timings.
    let metadata = store.get(&metadata_ref("measure", 1)).await.unwrap();
    assert_eq!(metadata["measure"]["numSources"], 2);
    for phase in ["prepUtc", "initUtc", "startUtc", "endUtc"] {
        assert!(
            metadata["quantum"][phase].is_string(),
            "missing phase stamp {}",
            phase
        );
    }
}

#[tokio::test]
async fn test_missing_input_is_reconciled_before_execution() {
    let store = MemoryStore::new("run/1");
    // Only the first of two declared inputs was actually produced upstream.
    store.insert(&make_ref("raw", 1), json!({"pixels": 4})).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1, 2]);
    let (updated, _report) = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap();

    assert_eq!(updated.input_count(), 1);
    assert_eq!(updated.inputs_for("raw").unwrap()[0], make_ref("raw", 1));
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.get(&make_ref("measure_out", 1)).await.unwrap(),
        json!({"processed": 1})
    );
}

#[tokio::test]
async fn test_no_work_after_reconciliation_writes_terminal_metadata() {
    let store = MemoryStore::new("run/1");
    // No raw inputs exist at all; the required-input rule signals no-work.

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1, 2]);
    let (updated, report) = executor
        .execute(node_requiring("measure", "raw"), quantum)
        .await
        .unwrap();

    // The task body never ran, but a report and reduced quantum come back.
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 0);
    assert_eq!(factory.constructions.load(Ordering::SeqCst), 0);
    assert_eq!(report.task_label, "measure");
    assert_eq!(updated.input_count(), 0);

    // Terminal metadata: an empty record for the task label and phase
    // timings under the quantum key, with no init or start phases.
    let metadata = store.get(&metadata_ref("measure", 1)).await.unwrap();
    assert_eq!(metadata["measure"], json!({}));
    assert!(metadata["quantum"]["prepUtc"].is_string());
    assert!(metadata["quantum"]["endUtc"].is_string());
    assert!(metadata["quantum"].get("initUtc").is_none());
    assert!(metadata["quantum"].get("startUtc").is_none());

    // The data output was never produced.
    assert!(!store.stored(&make_ref("measure_out", 1)).await.unwrap());
}

#[tokio::test]
async fn test_stored_metadata_skips_execution_entirely() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;
    store
        .insert(&metadata_ref("measure", 1), json!({"quantum": {}}))
        .await;
    let artifacts_before = store.artifact_count().await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(
        store.clone(),
        factory.clone(),
        ExecutorConfig::new().with_skip_existing(true),
    )
    .await;

    let quantum = standard_quantum("measure", 1, &[1]);
    let (_updated, report) = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap();

    assert_eq!(report.task_label, "measure");
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 0);
    // The skip path writes nothing, not even a captured log.
    assert_eq!(store.artifact_count().await, artifacts_before);
}

#[tokio::test]
async fn test_complete_outputs_without_flags_is_a_conflict() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;
    for reference in [
        make_ref("measure_out", 1),
        metadata_ref("measure", 1),
        log_ref("measure", 1),
    ] {
        store.insert(&reference, json!(1)).await;
    }

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1]);
    let err = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::CompleteOutputsExist { .. }));
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_partial_outputs_with_clobber_rerun_cleanly() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;
    // Residue of an interrupted run: the data output exists, metadata does
    // not.
    store.insert(&make_ref("measure_out", 1), json!({"stale": true})).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(
        store.clone(),
        factory.clone(),
        ExecutorConfig::new().with_clobber_outputs(true),
    )
    .await;

    let quantum = standard_quantum("measure", 1, &[1]);
    executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap();

    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);
    // The stale artifact was replaced by this run's output.
    assert_eq!(
        store.get(&make_ref("measure_out", 1)).await.unwrap(),
        json!({"processed": 1})
    );
    assert!(store.stored(&metadata_ref("measure", 1)).await.unwrap());
}

#[tokio::test]
async fn test_repeatable_failure_propagates_for_external_retry() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::FailRepeatable));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1]);
    let err = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Repeatable { .. }));
    // No completion metadata: the quantum stays eligible for retry.
    assert!(!store.stored(&metadata_ref("measure", 1)).await.unwrap());
}

#[tokio::test]
async fn test_unclassified_failure_is_reraised_with_context() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::FailUnclassified));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1]);
    let err = executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap_err();
    match err {
        ExecutionError::TaskFailed { label, .. } => assert_eq!(label, "measure"),
        other => panic!("expected TaskFailed, got {:?}", other),
    }
    assert!(!store.stored(&metadata_ref("measure", 1)).await.unwrap());
}

#[tokio::test]
async fn test_task_no_work_signal_still_writes_metadata() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::SignalNoWork));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let quantum = standard_quantum("measure", 1, &[1]);
    executor
        .execute(standard_node("measure"), quantum)
        .await
        .unwrap();

    // The task ran, signalled no-work, and metadata was written as if it
    // had completed.
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);
    let metadata = store.get(&metadata_ref("measure", 1)).await.unwrap();
    assert!(metadata["quantum"]["endUtc"].is_string());
}

#[tokio::test]
async fn test_facility_registered_once_across_quanta() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;
    store.insert(&make_ref("raw", 2), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    executor
        .execute(standard_node("measure"), standard_quantum("measure", 1, &[1]))
        .await
        .unwrap();
    executor
        .execute(standard_node("other"), standard_quantum("other", 2, &[2]))
        .await
        .unwrap();

    assert_eq!(store.facility_registrations().await, vec!["cam_a".to_string()]);
    // Each execute call refreshed the store's collection view.
    assert_eq!(store.refresh_count().await, 2);
}

#[tokio::test]
async fn test_legacy_task_def_is_accepted_at_the_boundary() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(store.clone(), factory.clone(), ExecutorConfig::new()).await;

    let def = TaskDef {
        label: "measure".to_string(),
        task_name: "MeasureTask".to_string(),
        config: keystone::TaskConfig::default(),
        connections: Arc::new(keystone::DefaultConnections::new()),
    };
    let (_updated, report) = executor
        .execute(def, standard_quantum("measure", 1, &[1]))
        .await
        .unwrap();

    assert_eq!(report.task_label, "measure");
    assert!(store.stored(&metadata_ref("measure", 1)).await.unwrap());
}

#[tokio::test]
async fn test_restricted_store_factory_serves_quantum_io() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let backing = store.clone();
    let access = StoreAccess::restricted(Arc::new(move |_quantum: &Quantum| {
        backing.clone() as Arc<dyn DatasetStore>
    }));

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = SingleQuantumExecutor::new(access, factory.clone(), ExecutorConfig::new())
        .await
        .unwrap();

    executor
        .execute(standard_node("measure"), standard_quantum("measure", 1, &[1]))
        .await
        .unwrap();

    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);
    assert!(store.stored(&metadata_ref("measure", 1)).await.unwrap());
    // Without a full store there is no refresh and no facility priming.
    assert_eq!(store.refresh_count().await, 0);
    assert!(store.facility_registrations().await.is_empty());
}

#[tokio::test]
async fn test_idempotent_rerun_skips_after_first_completion() {
    let store = MemoryStore::new("run/1");
    store.insert(&make_ref("raw", 1), json!(1)).await;

    let factory = Arc::new(ScriptedFactory::new(TaskBehavior::Succeed));
    let executor = make_executor(
        store.clone(),
        factory.clone(),
        ExecutorConfig::new().with_skip_existing(true),
    )
    .await;

    executor
        .execute(standard_node("measure"), standard_quantum("measure", 1, &[1]))
        .await
        .unwrap();
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);

    // Second execution of the same quantum finds the stored metadata and
    // never invokes the task again.
    executor
        .execute(standard_node("measure"), standard_quantum("measure", 1, &[1]))
        .await
        .unwrap();
    assert_eq!(factory.task_invocations.load(Ordering::SeqCst), 1);
}
