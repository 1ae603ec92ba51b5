/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable peer-to-peer (P2P) networking.
//!
//! The view-change protocol does not assume anything about how messages travel between replicas:
//! broadcasts are fire-and-forget, and messages may be lost, delayed, duplicated, or reordered. Library
//! users provide the transport by implementing the [`Network`](network::Network) trait.

pub mod network;

pub mod messages;

pub(crate) mod sending;
