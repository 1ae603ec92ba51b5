/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use crate::types::{data_types::ReplicaID, replica_set::ReplicaSet};

use super::messages::Message;

pub trait Network: Clone + Send {
    /// Inform the network provider of the replica set on wake-up.
    fn init_replica_set(&mut self, replica_set: ReplicaSet);

    /// Send a message to all replicas (possibly including the sender itself) without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified replica without blocking.
    fn send(&mut self, peer: ReplicaID, message: Message);

    /// Receive a message from any replica. Returns immediately with a None if no message is available
    /// now.
    fn recv(&mut self) -> Option<(ReplicaID, Message)>;
}
