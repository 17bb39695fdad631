//! Selection heuristics over a node pool.
//!
//! All functions take the full pool and an `active_only` flag. With `active_only` set only nodes
//! whose last request succeeded are candidates.

use blockmesh_node::NodeHandle;
use blockmesh_primitives::BlockNumber;
use rand::seq::SliceRandom;
use std::sync::Arc;

fn candidates(nodes: &[Arc<NodeHandle>], active_only: bool) -> Vec<&Arc<NodeHandle>> {
    nodes.iter().filter(|node| !active_only || node.is_active() == Some(true)).collect()
}

/// The candidate with the lowest known latency.
pub fn fastest(nodes: &[Arc<NodeHandle>], active_only: bool) -> Option<Arc<NodeHandle>> {
    min_latency(candidates(nodes, active_only))
}

/// The candidate with the highest known block height.
pub fn highest(nodes: &[Arc<NodeHandle>], active_only: bool) -> Option<Arc<NodeHandle>> {
    candidates(nodes, active_only)
        .into_iter()
        .filter_map(|node| node.block_height().map(|height| (height, node)))
        .max_by_key(|(height, _)| *height)
        .map(|(_, node)| Arc::clone(node))
}

/// A uniformly random candidate.
pub fn random(nodes: &[Arc<NodeHandle>], active_only: bool) -> Option<Arc<NodeHandle>> {
    candidates(nodes, active_only).choose(&mut rand::thread_rng()).map(|node| Arc::clone(node))
}

/// The best candidate to serve block `height`.
///
/// Height correctness comes first, then load, then latency:
///
/// 1. only nodes that reported a height of at least `height` qualify, if none does there is no
///    answer,
/// 2. of those, nodes with at most `pending_threshold` requests in flight qualify by load,
/// 3. if none qualifies by load a random height-qualified node is returned,
/// 4. otherwise the load-qualified node with the lowest latency.
///
/// Step 4 requires a known latency. Load-qualified nodes without one only win if no node has a
/// known latency.
pub fn optimal(
    nodes: &[Arc<NodeHandle>],
    height: BlockNumber,
    pending_threshold: usize,
    active_only: bool,
) -> Option<Arc<NodeHandle>> {
    let by_height = candidates(nodes, active_only)
        .into_iter()
        .filter(|node| node.block_height().is_some_and(|h| h >= height))
        .collect::<Vec<_>>();
    if by_height.is_empty() {
        return None
    }

    let by_load = by_height
        .iter()
        .copied()
        .filter(|node| node.pending_requests() <= pending_threshold)
        .collect::<Vec<_>>();
    if by_load.is_empty() {
        return by_height.choose(&mut rand::thread_rng()).map(|node| Arc::clone(node))
    }

    let first = Arc::clone(by_load[0]);
    min_latency(by_load).or(Some(first))
}

/// The node that should be probed next.
///
/// Nodes with an outstanding probe are skipped. Never probed nodes come first, then the node
/// whose last probe is the oldest.
pub fn node_to_benchmark(nodes: &[Arc<NodeHandle>]) -> Option<Arc<NodeHandle>> {
    let idle = nodes.iter().filter(|node| !node.is_benchmarking());
    let mut oldest: Option<(&Arc<NodeHandle>, _)> = None;
    for node in idle {
        match node.last_ping() {
            None => return Some(Arc::clone(node)),
            Some(ping) => {
                if oldest.map_or(true, |(_, oldest_ping)| ping < oldest_ping) {
                    oldest = Some((node, ping));
                }
            }
        }
    }
    oldest.map(|(node, _)| Arc::clone(node))
}

fn min_latency(nodes: Vec<&Arc<NodeHandle>>) -> Option<Arc<NodeHandle>> {
    nodes
        .into_iter()
        .filter_map(|node| node.latency().map(|latency| (latency, node)))
        .min_by_key(|(latency, _)| *latency)
        .map(|(_, node)| Arc::clone(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockmesh_interfaces::test_utils::TestNodeClient;
    use blockmesh_node::NodeHealth;
    use std::time::Duration;
    use tokio::time::Instant;

    fn node(
        endpoint: &str,
        active: Option<bool>,
        latency_ms: Option<u64>,
        height: Option<BlockNumber>,
    ) -> Arc<NodeHandle> {
        let node = NodeHandle::new(endpoint, TestNodeClient::default());
        node.set_health(NodeHealth {
            is_active: active,
            latency: latency_ms.map(Duration::from_millis),
            block_height: height,
            ..Default::default()
        });
        Arc::new(node)
    }

    fn endpoint(node: Option<Arc<NodeHandle>>) -> Option<String> {
        node.map(|node| node.endpoint().to_string())
    }

    #[test]
    fn fastest_ignores_unknown_latency() {
        let nodes = vec![
            node("a", Some(true), None, Some(10)),
            node("b", Some(true), Some(80), Some(10)),
            node("c", Some(true), Some(20), Some(10)),
            node("d", Some(false), Some(5), Some(10)),
        ];
        assert_eq!(endpoint(fastest(&nodes, true)).as_deref(), Some("c"));
        assert_eq!(endpoint(fastest(&nodes, false)).as_deref(), Some("d"));
        assert!(fastest(&nodes[..1], true).is_none());
        assert!(fastest(&[], false).is_none());
    }

    #[test]
    fn highest_ranks_by_height() {
        let nodes = vec![
            node("a", Some(true), Some(10), Some(100)),
            node("b", Some(true), Some(10), Some(105)),
            node("c", None, None, None),
            node("d", Some(false), Some(10), Some(200)),
        ];
        assert_eq!(endpoint(highest(&nodes, true)).as_deref(), Some("b"));
        assert_eq!(endpoint(highest(&nodes, false)).as_deref(), Some("d"));
    }

    #[test]
    fn random_respects_pool() {
        let nodes = vec![node("a", Some(false), None, None), node("b", Some(true), None, None)];
        for _ in 0..20 {
            assert_eq!(endpoint(random(&nodes, true)).as_deref(), Some("b"));
        }
        assert!(random(&nodes[..1], true).is_none());
        assert!(random(&nodes[..1], false).is_some());
    }

    #[test]
    fn optimal_requires_height() {
        let nodes = vec![
            node("a", Some(true), Some(5), Some(100)),
            node("b", Some(true), Some(50), Some(105)),
            node("c", None, None, None),
        ];
        assert_eq!(endpoint(optimal(&nodes, 102, 5, true)).as_deref(), Some("b"));
        assert_eq!(endpoint(optimal(&nodes, 100, 5, true)).as_deref(), Some("a"));
        assert!(optimal(&nodes, 106, 5, true).is_none());
        assert!(optimal(&[], 0, 5, false).is_none());
    }

    #[test]
    fn optimal_prefers_unloaded_nodes() {
        let nodes = vec![
            node("a", Some(true), Some(5), Some(100)),
            node("b", Some(true), Some(50), Some(100)),
        ];
        nodes[0].set_pending_requests(6);
        nodes[1].set_pending_requests(5);
        assert_eq!(endpoint(optimal(&nodes, 100, 5, true)).as_deref(), Some("b"));
    }

    #[test]
    fn optimal_falls_back_when_everything_is_loaded() {
        let nodes = vec![
            node("a", Some(true), Some(5), Some(100)),
            node("b", Some(true), Some(50), Some(100)),
            node("c", Some(true), Some(1), Some(10)),
        ];
        nodes.iter().for_each(|node| node.set_pending_requests(10));
        for _ in 0..20 {
            let picked = optimal(&nodes, 50, 5, true).unwrap();
            assert_ne!(picked.endpoint(), "c");
        }
    }

    #[test]
    fn optimal_without_latency_still_answers() {
        let nodes = vec![node("a", Some(true), None, Some(100))];
        assert_eq!(endpoint(optimal(&nodes, 1, 5, true)).as_deref(), Some("a"));
    }

    #[test]
    fn benchmark_prefers_never_pinged_then_oldest() {
        let base = Instant::now();
        let nodes = vec![
            node("a", Some(true), None, None),
            node("b", Some(true), None, None),
            node("c", Some(true), None, None),
        ];
        for (node, offset) in nodes.iter().zip([4u64, 0, 8]) {
            node.set_health(NodeHealth {
                last_ping: Some(base + Duration::from_secs(offset)),
                ..Default::default()
            });
        }
        assert_eq!(endpoint(node_to_benchmark(&nodes)).as_deref(), Some("b"));

        nodes[1].set_benchmarking(true);
        assert_eq!(endpoint(node_to_benchmark(&nodes)).as_deref(), Some("a"));

        let mut with_fresh = nodes.clone();
        with_fresh.push(node("d", None, None, None));
        assert_eq!(endpoint(node_to_benchmark(&with_fresh)).as_deref(), Some("d"));

        nodes.iter().for_each(|node| node.set_benchmarking(true));
        assert!(node_to_benchmark(&nodes).is_none());
    }
}
