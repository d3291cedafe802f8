//! Full sync cycle tests: ordering, gating and failure handling

use std::collections::HashMap;
use std::sync::Arc;

use trailmark_core::domain::{
    EntityId, EntityType, RemoteError, SyncError, SyncTask, TaskOperation, TaskPriority,
    TaskStatus,
};

use crate::common::{call_line, setup_engine, FakeRemote, MemoryStore};

fn task(entity_type: EntityType, operation: TaskOperation) -> SyncTask {
    SyncTask::new(
        entity_type,
        EntityId::new(),
        operation,
        TaskPriority::Normal,
        HashMap::new(),
        3,
    )
}

fn task_with_payload(
    entity_type: EntityType,
    operation: TaskOperation,
    payload: &[(&str, &str)],
) -> SyncTask {
    let payload = payload
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    SyncTask::new(
        entity_type,
        EntityId::new(),
        operation,
        TaskPriority::Normal,
        payload,
        3,
    )
}

#[tokio::test]
async fn test_cycle_requires_authentication() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::unauthenticated());
    let (engine, queue) = setup_engine(store, remote.clone());

    queue
        .enqueue(task(EntityType::Trip, TaskOperation::Create))
        .await
        .unwrap();

    let err = engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthenticationRequired));
    assert!(remote.calls().is_empty());
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn test_cycle_drains_in_dependency_order() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    // Enqueue in reverse dependency order on purpose
    let memory = task(EntityType::Memory, TaskOperation::Create);
    let trip = task(EntityType::Trip, TaskOperation::Create);
    let category = task(EntityType::Category, TaskOperation::Create);
    for t in [memory.clone(), trip.clone(), category.clone()] {
        queue.enqueue(t).await.unwrap();
    }

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);

    let calls = remote.calls();
    let pos = |line: &str| calls.iter().position(|c| c == line).unwrap();
    assert!(pos(&call_line("create", &category)) < pos(&call_line("create", &trip)));
    assert!(pos(&call_line("create", &trip)) < pos(&call_line("create", &memory)));
}

#[tokio::test]
async fn test_unmet_dependency_skips_dependent_types() {
    let store = Arc::new(MemoryStore::new());
    store.set_unsynced(EntityType::Trip, 2);
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    let memory = task(EntityType::Memory, TaskOperation::Create);
    queue.enqueue(memory.clone()).await.unwrap();

    let report = engine.run_cycle().await.unwrap();

    // Everything downstream of Trip sits out this cycle
    assert!(report.skipped_types.contains(&EntityType::Memory));
    assert!(report.skipped_types.contains(&EntityType::MediaItem));
    assert!(report.skipped_types.contains(&EntityType::Track));
    assert_eq!(report.completed, 0);
    assert!(remote.calls().is_empty());

    // The task stays pending for a later cycle
    let snapshot = queue.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].status(), TaskStatus::Pending);
}

#[tokio::test]
async fn test_retriable_failure_requeues_with_backoff() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    remote.fail_next(RemoteError::Server(503));
    queue
        .enqueue(task(EntityType::Trip, TaskOperation::Create))
        .await
        .unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.completed, 0);
    assert!(report.last_error.is_some());

    let snapshot = queue.snapshot().await;
    assert_eq!(snapshot[0].status(), TaskStatus::Pending);
    assert_eq!(snapshot[0].retry_count(), 1);
    assert!(snapshot[0].next_eligible_at().is_some());
}

#[tokio::test]
async fn test_unretriable_failure_is_terminal() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    remote.fail_next(RemoteError::Server(404));
    queue
        .enqueue(task(EntityType::Trip, TaskOperation::Create))
        .await
        .unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 0);

    let snapshot = queue.snapshot().await;
    assert_eq!(snapshot[0].status(), TaskStatus::Failed);
}

#[tokio::test]
async fn test_auth_loss_mid_cycle_aborts_and_requeues() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    remote.fail_next(RemoteError::Unauthorized);
    queue
        .enqueue(task(EntityType::Category, TaskOperation::Create))
        .await
        .unwrap();
    queue
        .enqueue(task(EntityType::Trip, TaskOperation::Create))
        .await
        .unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 0);
    assert!(report.last_error.is_some());

    // The interrupted task goes back untouched, no retry consumed
    for t in queue.snapshot().await {
        assert_eq!(t.status(), TaskStatus::Pending);
        assert_eq!(t.retry_count(), 0);
    }
}

#[tokio::test]
async fn test_small_files_upload_before_large_ones() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    let huge = task_with_payload(
        EntityType::MediaItem,
        TaskOperation::FileUpload,
        &[("file_size_bytes", "209715200")],
    );
    let small = task_with_payload(
        EntityType::MediaItem,
        TaskOperation::FileUpload,
        &[("file_size_bytes", "1024")],
    );
    // Large one enqueued first; prioritization must reorder
    queue.enqueue(huge.clone()).await.unwrap();
    queue.enqueue(small.clone()).await.unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 2);

    let uploads = remote.calls_matching("upload");
    assert_eq!(uploads[0], call_line("upload", &small));
    assert_eq!(uploads[1], call_line("upload", &huge));
}

#[tokio::test]
async fn test_download_persists_payload_locally() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    remote.set_download_body(b"gpx-track-data");
    let (engine, queue) = setup_engine(store.clone(), remote.clone());

    let download = task(EntityType::Track, TaskOperation::FileDownload);
    queue.enqueue(download.clone()).await.unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);

    let saved = store.saved_payloads();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, EntityType::Track);
    assert_eq!(saved[0].1, download.entity_id());
    assert_eq!(saved[0].2, b"gpx-track-data");
}

#[tokio::test]
async fn test_unchanged_update_skips_remote_call() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    let entity_id = EntityId::new();
    let fields = &[("title", "Dolomites 2025")];
    let make_update = |fields: &[(&str, &str)]| {
        SyncTask::new(
            EntityType::Trip,
            entity_id,
            TaskOperation::Update,
            TaskPriority::Normal,
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            3,
        )
    };

    queue.enqueue(make_update(fields)).await.unwrap();
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(remote.calls_matching("update").len(), 1);

    // Same field state again: completes without touching the remote
    queue.enqueue(make_update(fields)).await.unwrap();
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(remote.calls_matching("update").len(), 1);

    // Changed fields go through
    queue
        .enqueue(make_update(&[("title", "Dolomites, reworked")]))
        .await
        .unwrap();
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.completed, 1);
    assert_eq!(remote.calls_matching("update").len(), 2);
}

#[tokio::test]
async fn test_delete_invalidates_cached_state() {
    let store = Arc::new(MemoryStore::new());
    let remote = Arc::new(FakeRemote::new());
    let (engine, queue) = setup_engine(store, remote.clone());

    let entity_id = EntityId::new();
    let fields = &[("title", "Old trip")];
    let update = SyncTask::new(
        EntityType::Trip,
        entity_id,
        TaskOperation::Update,
        TaskPriority::Normal,
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        3,
    );
    queue.enqueue(update).await.unwrap();
    engine.run_cycle().await.unwrap();

    let delete = SyncTask::new(
        EntityType::Trip,
        entity_id,
        TaskOperation::Delete,
        TaskPriority::Normal,
        HashMap::new(),
        3,
    );
    queue.enqueue(delete).await.unwrap();
    engine.run_cycle().await.unwrap();

    // After the delete, an identical update is pushed again rather than
    // being skipped off stale cached state
    let update_again = SyncTask::new(
        EntityType::Trip,
        entity_id,
        TaskOperation::Update,
        TaskPriority::Normal,
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        3,
    );
    queue.enqueue(update_again).await.unwrap();
    engine.run_cycle().await.unwrap();

    assert_eq!(remote.calls_matching("update").len(), 2);
}
