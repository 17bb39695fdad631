use assert_matches::assert_matches;
use blockmesh_config::{MeshConfig, SyncConfig};
use blockmesh_interfaces::{
    storage::BlockStorage,
    test_utils::{test_block, TestNodeClient},
};
use blockmesh_mesh::Mesh;
use blockmesh_node::NodeHandle;
use blockmesh_primitives::{BlockMeta, Priority};
use blockmesh_storage::MemoryStorage;
use blockmesh_sync::{SyncEngine, SyncError, SyncEvent, SyncStage};
use std::{sync::Arc, time::Duration};
use tokio_stream::StreamExt;

/// A ready mesh of two handles backed by the same client.
async fn mesh(client: &Arc<TestNodeClient>) -> Mesh {
    let mesh = Mesh::new(
        vec![NodeHandle::new("a", Arc::clone(client)), NodeHandle::new("b", Arc::clone(client))],
        MeshConfig { min_active_nodes_required: 1, ..Default::default() },
    )
    .unwrap();
    assert!(mesh.ready_listener().wait().await);
    // let the initial version probes land
    tokio::time::sleep(Duration::from_millis(100)).await;
    mesh
}

async fn engine(
    client: &Arc<TestNodeClient>,
    config: SyncConfig,
) -> (SyncEngine<Arc<MemoryStorage>>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let engine = SyncEngine::new(config, mesh(client).await, Arc::clone(&storage)).unwrap();
    (engine, storage)
}

async fn next_failure<S>(events: &mut S) -> (u64, SyncError)
where
    S: tokio_stream::Stream<Item = SyncEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        if let SyncEvent::TaskFailed { height, error } = event {
            return (height, error)
        }
    }
    panic!("event stream ended")
}

#[tokio::test(start_paused = true)]
async fn failed_height_is_retried_until_stored() {
    blockmesh_tracing::init_test_tracing();

    let client = Arc::new(TestNodeClient::new(10));
    client.fail_block(1, 1);
    let config = SyncConfig { worker_count: 1, target_block_height: Some(3), ..Default::default() };
    let (engine, storage) = engine(&client, config).await;

    engine.start();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(storage.heights(), vec![0, 1, 2, 3]);
    // one failed request for height 1, one successful request per height
    assert_eq!(client.block_requests(), 5);
    assert_eq!(client.served(1), 1);
    // the counter is dropped once the height is stored
    assert_eq!(engine.retry_count(1), 0);
    assert_eq!(engine.write_pointer(), Some(3));
    assert_eq!(engine.pending_tasks(), 0);

    // provenance is recorded with every copy
    let stored = storage.copies(2);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].meta.source.is_some());
    assert_eq!(stored[0].meta.user_agent.as_deref(), Some("/test-node:1.0.0/"));

    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn write_pointer_moves_past_a_failing_height() {
    let client = Arc::new(TestNodeClient::new(10));
    client.fail_block(2, usize::MAX);
    let config = SyncConfig { worker_count: 1, target_block_height: Some(6), ..Default::default() };
    let (engine, storage) = engine(&client, config).await;

    engine.start();
    tokio::time::sleep(Duration::from_secs(5)).await;

    // the pointer tracks enqueued heights, not stored ones
    assert_eq!(engine.write_pointer(), Some(6));
    assert_eq!(storage.heights(), vec![0, 1, 3, 4, 5, 6]);
    let retries = engine.retry_count(2);
    assert!(retries >= 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(engine.retry_count(2) > retries);
    assert_eq!(engine.write_pointer(), Some(6));
    assert!(!storage.heights().contains(&2));
    engine.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_keep_the_highest_pointer() {
    const HEIGHTS: u64 = 64;

    let client = Arc::new(TestNodeClient::new(HEIGHTS));
    let (engine, _storage) = engine(&client, SyncConfig::default()).await;

    // the engine is idle, so nothing is dequeued while the calls race
    let handles = (0..HEIGHTS)
        .rev()
        .map(|height| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.enqueue_block(height, Priority::DEFAULT, false) })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.write_pointer(), Some(HEIGHTS - 1));
    assert_eq!(engine.pending_tasks(), HEIGHTS as usize);
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded_by_worker_count() {
    let client = Arc::new(TestNodeClient::new(50).with_delay(Duration::from_millis(100)));
    let config =
        SyncConfig { worker_count: 3, target_block_height: Some(30), ..Default::default() };
    let (engine, storage) = engine(&client, config).await;

    engine.start();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(storage.heights(), (0..=30).collect::<Vec<_>>());
    assert!(client.max_in_flight() <= 3);
    assert!(client.max_in_flight() > 1);
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn queue_stays_within_bound() {
    let client = Arc::new(TestNodeClient::new(1_000).with_delay(Duration::from_millis(500)));
    let config = SyncConfig {
        worker_count: 2,
        max_queue_length: 5,
        target_block_height: Some(1_000),
        ..Default::default()
    };
    let (engine, _storage) = engine(&client, config).await;

    engine.start();
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(engine.pending_tasks() <= 5);
        assert!(engine.in_flight_tasks() <= 2);
    }
    assert!(engine.write_pointer().unwrap() > 10);
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn stop_pauses_and_start_resumes() {
    let client = Arc::new(TestNodeClient::new(100).with_delay(Duration::from_millis(100)));
    let config =
        SyncConfig { worker_count: 2, target_block_height: Some(100), ..Default::default() };
    let (engine, storage) = engine(&client, config).await;

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    engine.stop();
    assert!(!engine.is_running());

    // let executing tasks drain
    tokio::time::sleep(Duration::from_secs(1)).await;
    let requests = client.block_requests();
    let stored = storage.heights().len();
    assert!(stored > 0);
    assert_eq!(engine.in_flight_tasks(), 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.block_requests(), requests);
    assert_eq!(storage.heights().len(), stored);

    engine.start();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(storage.heights(), (0..=100).collect::<Vec<_>>());
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn stored_height_is_skipped() {
    let client = Arc::new(TestNodeClient::new(10));
    let config = SyncConfig { worker_count: 1, target_block_height: Some(0), ..Default::default() };
    let (engine, storage) = engine(&client, config).await;
    storage
        .set_block(0, test_block(0), BlockMeta::default())
        .await
        .unwrap();
    let mut events = engine.events();

    engine.start();
    assert_eq!(events.next().await, Some(SyncEvent::BlockSkipped { height: 0, copies: 1 }));
    assert_eq!(client.block_requests(), 0);
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let client = Arc::new(TestNodeClient::new(10));
    client.hang_block(2);
    let config = SyncConfig {
        worker_count: 1,
        target_block_height: Some(2),
        fetch_timeout: Duration::from_secs(1),
        retry_delay: Duration::from_secs(600),
        ..Default::default()
    };
    let (engine, storage) = engine(&client, config).await;
    let mut events = engine.events();

    engine.start();
    let (height, error) = next_failure(&mut events).await;
    assert_eq!(height, 2);
    assert_eq!(error, SyncError::Timeout { height: 2, stage: SyncStage::Fetch });
    assert_eq!(events.next().await, Some(SyncEvent::RetryScheduled { height: 2, attempt: 1 }));
    assert_eq!(storage.heights(), vec![0, 1]);
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn heights_beyond_every_node_fail_fast() {
    let client = Arc::new(TestNodeClient::new(5));
    let config = SyncConfig {
        worker_count: 1,
        target_block_height: Some(20),
        retry_delay: Duration::from_secs(600),
        ..Default::default()
    };
    let (engine, storage) = engine(&client, config).await;
    let mut events = engine.events();

    engine.start();
    let (height, error) = next_failure(&mut events).await;
    assert_eq!(height, 6);
    assert_matches!(error, SyncError::NoNodeAvailable { height: 6 });
    assert_eq!(storage.heights(), (0..=5).collect::<Vec<_>>());
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn follows_the_highest_node() {
    let client = Arc::new(TestNodeClient::new(3));
    let (engine, storage) = engine(&client, SyncConfig::default()).await;
    assert_eq!(engine.target_height(), Some(3));

    engine.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(storage.heights(), vec![0, 1, 2, 3]);

    client.set_height(6);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(engine.target_height(), Some(6));
    assert_eq!(storage.heights(), (0..=6).collect::<Vec<_>>());
    engine.close().await;
}

#[tokio::test(start_paused = true)]
async fn manual_enqueue_is_serviced() {
    let client = Arc::new(TestNodeClient::new(10));
    let config = SyncConfig {
        worker_count: 1,
        start_block_index: 5,
        target_block_height: Some(5),
        ..Default::default()
    };
    let (engine, storage) = engine(&client, config).await;

    engine.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(storage.heights(), vec![5]);

    engine.enqueue_block(8, Priority::DEFAULT, false).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(storage.heights(), vec![5, 8]);
    assert_eq!(engine.write_pointer(), Some(8));
    engine.close().await;
}
