use std::time::Duration;

use log::LevelFilter;
use rand_core::OsRng;

use sbft_rs::{
    types::{
        batch::Batch,
        crypto_primitives::SigningKey,
        data_types::{ReplicaID, SeqNumber, ViewNumber},
        replica_set::ReplicaSet,
    },
    view_change::messages::{Preprepare, SeqView},
};

mod common;

use common::{
    logging::{log_with_context, setup_logger},
    network::mock_network,
    node::{wait_until, Node},
};

const TIMEOUT: Duration = Duration::from_secs(30);

fn keys_and_replica_set(n: u64) -> (Vec<SigningKey>, ReplicaSet) {
    let mut csprg = OsRng {};
    let keys: Vec<SigningKey> = (0..n).map(|_| SigningKey::generate(&mut csprg)).collect();
    let mut replica_set = ReplicaSet::new();
    for (id, key) in keys.iter().enumerate() {
        replica_set.put(ReplicaID::new(id as u64), key.verifying_key());
    }
    (keys, replica_set)
}

fn null_preprepare(view: ViewNumber) -> Preprepare {
    Preprepare {
        seq: SeqView {
            seq: SeqNumber::new(1),
            view,
        },
        batch: Batch::new_null(SeqNumber::new(1), Batch::genesis().hash()),
    }
}

/// Starts 4 replicas in view 0, has two of them request a view change, and checks that all 4 enter
/// view 1 with the same null proposal.
#[test]
fn four_replicas_change_view_test() {
    setup_logger(LevelFilter::Info);

    let (keys, replica_set) = keys_and_replica_set(4);
    let network_stubs = mock_network(replica_set.replicas());
    let nodes: Vec<Node> = keys
        .into_iter()
        .zip(network_stubs)
        .enumerate()
        .map(|(id, (key, network))| {
            Node::new(
                key,
                ReplicaID::new(id as u64),
                replica_set.clone(),
                network,
                true,
            )
        })
        .collect();

    // Two requests are enough: the other two replicas follow once they see f + 1 votes.
    nodes[0].request_view_change();
    nodes[1].request_view_change();

    log_with_context(None, "Waiting until every replica starts view 1.");
    wait_until(TIMEOUT, "every replica starts view 1", || {
        nodes
            .iter()
            .all(|node| node.started_views().contains(&ViewNumber::new(1)))
    });

    for node in &nodes {
        assert_eq!(node.voted_views(), vec![ViewNumber::new(1)]);
        assert_eq!(node.started_views(), vec![ViewNumber::new(1)]);
        assert_eq!(
            node.preprepares(),
            vec![null_preprepare(ViewNumber::new(1))],
            "replica {}",
            node.id()
        );
    }
}

/// Starts 3 of 4 replicas, so that the primary of view 1 never answers. Checks that the live replicas
/// get stuck in view 1, then enter view 2 once they request another view change.
#[test]
fn unresponsive_primary_is_skipped_test() {
    setup_logger(LevelFilter::Info);

    let (keys, replica_set) = keys_and_replica_set(4);
    let mut network_stubs = mock_network(replica_set.replicas());

    // Replica 1, the primary of view 1, is never started.
    let _silent_network = network_stubs.remove(1);
    let live_nodes: Vec<Node> = keys
        .into_iter()
        .enumerate()
        .filter(|(id, _)| *id != 1)
        .zip(network_stubs)
        .map(|((id, key), network)| {
            Node::new(
                key,
                ReplicaID::new(id as u64),
                replica_set.clone(),
                network,
                false,
            )
        })
        .collect();

    // live_nodes[1] is replica 2, the primary of view 2. It only ever moves by catching up.
    live_nodes[0].request_view_change();
    live_nodes[2].request_view_change();
    wait_until(TIMEOUT, "every live replica votes for view 1", || {
        live_nodes
            .iter()
            .all(|node| node.voted_views().contains(&ViewNumber::new(1)))
    });
    assert!(live_nodes.iter().all(|node| node.started_views().is_empty()));

    live_nodes[0].request_view_change();
    live_nodes[2].request_view_change();
    wait_until(TIMEOUT, "every live replica starts view 2", || {
        live_nodes
            .iter()
            .all(|node| node.started_views().contains(&ViewNumber::new(2)))
    });

    for node in &live_nodes {
        assert_eq!(
            node.voted_views(),
            vec![ViewNumber::new(1), ViewNumber::new(2)]
        );
        assert_eq!(node.preprepares(), vec![null_preprepare(ViewNumber::new(2))]);
    }
}
