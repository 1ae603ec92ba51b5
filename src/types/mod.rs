/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across the view-change protocol and its collaborators.
//!
//! Types that are specific to the view-change sub-protocol itself (votes, new-view certificates,
//! reinstatement decisions) live in [`crate::view_change`].

pub mod data_types;

pub mod crypto_primitives;

pub mod replica_set;

pub mod batch;

pub mod signed_messages;
