use std::{
    collections::BTreeMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use sbft_rs::{
    networking::{messages::Message, network::Network},
    types::{data_types::ReplicaID, replica_set::ReplicaSet},
};

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_id: ReplicaID,
    all_peers: BTreeMap<ReplicaID, Sender<(ReplicaID, Message)>>,
    inbox: Arc<Mutex<Receiver<(ReplicaID, Message)>>>,
}

impl Network for NetworkStub {
    fn init_replica_set(&mut self, _: ReplicaSet) {}

    fn send(&mut self, peer: ReplicaID, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.my_id, message));
        }
    }

    fn broadcast(&mut self, message: Message) {
        for peer in self.all_peers.values() {
            let _ = peer.send((self.my_id, message.clone()));
        }
    }

    fn recv(&mut self) -> Option<(ReplicaID, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

/// Create one connected network stub per replica in `peers`, in the same order.
pub(crate) fn mock_network(peers: impl Iterator<Item = ReplicaID>) -> Vec<NetworkStub> {
    let mut all_peers = BTreeMap::new();
    let peer_and_inboxes: Vec<(ReplicaID, Receiver<(ReplicaID, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_id, inbox)| NetworkStub {
            my_id,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
