/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! View-change and new-view recovery for a simple Byzantine fault tolerant (SBFT) state-machine
//! replication engine.
//!
//! When the replicas of a replica set suspect that the primary of their current view is faulty, they
//! vote to move to a new view. The primary of the new view then has to prove to every replica, using
//! only signed evidence, that entering the new view loses no committed work, and that every replica
//! starts the new view with the same proposal. The [`view_change`] module implements this protocol.
//!
//! The crate is a library: the transport ([`Network`](networking::network::Network)), the
//! application-level batch validator ([`App`](app::App)), and the normal-case agreement protocol that
//! runs inside an active view ([`NormalCase`](normal_case::NormalCase)) are all pluggable. A replica is
//! put together and started through [`ReplicaSpec`](replica::ReplicaSpec).

pub mod app;

pub mod events;

pub mod logging;

pub mod networking;

pub mod normal_case;

pub mod replica;

pub mod types;

pub mod view_change;

pub(crate) mod algorithm;

pub(crate) mod event_bus;
