use blockmesh_config::MeshConfig;
use blockmesh_interfaces::test_utils::TestNodeClient;
use blockmesh_mesh::Mesh;
use blockmesh_node::NodeHandle;
use std::{sync::Arc, time::Duration};

fn node(endpoint: &str, client: &Arc<TestNodeClient>) -> NodeHandle {
    NodeHandle::new(endpoint, Arc::clone(client))
}

#[tokio::test(start_paused = true)]
async fn two_of_three_nodes_make_the_mesh_ready() {
    blockmesh_tracing::init_test_tracing();

    let one = Arc::new(TestNodeClient::new(100).with_delay(Duration::from_millis(10)));
    let two = Arc::new(TestNodeClient::new(105).with_delay(Duration::from_millis(30)));
    // never answers within the request timeout
    let three = Arc::new(TestNodeClient::new(110).with_delay(Duration::from_secs(3600)));

    let mesh = Mesh::new(
        vec![node("one", &one), node("two", &two), node("three", &three)],
        MeshConfig { min_active_nodes_required: 2, ..Default::default() },
    )
    .unwrap();

    let mut ready = mesh.ready_listener();
    assert!(ready.wait().await);
    assert!(mesh.is_ready());
    assert_eq!(mesh.active_node_count(), 2);
    assert_eq!(mesh.nodes()[2].is_active(), None);

    assert_eq!(mesh.highest_node().unwrap().endpoint(), "two");
    assert_eq!(mesh.optimal_node(102).unwrap().endpoint(), "two");
    assert_eq!(mesh.optimal_node(100).unwrap().endpoint(), "one");
    assert_eq!(mesh.fastest_node().unwrap().endpoint(), "one");
    assert!(mesh.optimal_node(106).is_none());

    // three is not active, so it never qualifies while only active nodes are considered
    assert!(mesh.optimal_node_from(108, true).is_none());

    mesh.close();
}

#[tokio::test(start_paused = true)]
async fn unresponsive_node_turns_inactive_after_timeout() {
    let slow = Arc::new(TestNodeClient::new(5).with_delay(Duration::from_secs(3600)));
    let mesh = Mesh::new(
        vec![NodeHandle::new("slow", Arc::clone(&slow)).with_timeout(Duration::from_secs(1))],
        MeshConfig { min_active_nodes_required: 1, ..Default::default() },
    )
    .unwrap();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(mesh.nodes()[0].is_active(), Some(false));
    assert!(!mesh.is_ready());
    assert!(mesh.random_node().is_none());
    assert!(mesh.random_node_from(false).is_some());
    mesh.close();
}

#[tokio::test(start_paused = true)]
async fn overloaded_pool_still_serves() {
    let a = Arc::new(TestNodeClient::new(50));
    let b = Arc::new(TestNodeClient::new(50));
    let mesh = Mesh::new(
        vec![node("a", &a), node("b", &b)],
        MeshConfig { pending_requests_threshold: 0, ..Default::default() },
    )
    .unwrap();
    assert!(mesh.ready_listener().wait().await);

    mesh.nodes().iter().for_each(|node| node.set_pending_requests(3));
    assert!(mesh.optimal_node(10).is_some());
    mesh.close();
}
