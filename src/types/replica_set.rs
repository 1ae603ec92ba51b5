/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The static set of replicas taking part in replication, and the quorum arithmetic derived from it.

use super::{
    crypto_primitives::VerifyingKey,
    data_types::{ReplicaID, ViewNumber},
};

/// Stores the identities of replicas and the keys that their signatures verify against.
///
/// ## Ordering of replicas
///
/// `ReplicaSet` internally maintains the list of replicas in ascending order of their
/// `ReplicaID`s. The primary of every view is selected from this ordering (see
/// [`primary_for`](Self::primary_for)), so every correct replica that was configured with the same
/// replica set selects the same primary for the same view.
///
/// ## Fault threshold
///
/// A replica set of size `n` tolerates `f = (n - 1) / 3` Byzantine replicas.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ReplicaSet {
    // Sorted by `ReplicaID`, no duplicates.
    replicas: Vec<(ReplicaID, VerifyingKey)>,
}

impl ReplicaSet {
    /// Create an empty replica set.
    pub fn new() -> ReplicaSet {
        Self {
            replicas: Vec::new(),
        }
    }

    /// Put a `replica` with the specified `verifying_key` into the replica set, placing it in a position that
    /// preserves the [ordering of replicas](Self#ordering-of-replicas).
    ///
    /// If `replica` already exists in the replica set, this function replaces its verifying key instead.
    pub fn put(&mut self, replica: ReplicaID, verifying_key: VerifyingKey) {
        match self.replicas.binary_search_by_key(&replica, |(id, _)| *id) {
            Ok(pos) => self.replicas[pos].1 = verifying_key,
            Err(pos) => self.replicas.insert(pos, (replica, verifying_key)),
        }
    }

    /// Check whether `replica` is a member of this replica set.
    pub fn contains(&self, replica: ReplicaID) -> bool {
        self.verifying_key(replica).is_some()
    }

    /// Get the verifying key of `replica`, if it is a member of this replica set.
    pub fn verifying_key(&self, replica: ReplicaID) -> Option<&VerifyingKey> {
        self.replicas
            .binary_search_by_key(&replica, |(id, _)| *id)
            .ok()
            .map(|pos| &self.replicas[pos].1)
    }

    /// Get the number of replicas in the replica set.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Check whether the replica set is empty.
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// Iterate through the `ReplicaID`s of the replica set in ascending order.
    pub fn replicas(&self) -> impl Iterator<Item = ReplicaID> + '_ {
        self.replicas.iter().map(|(id, _)| *id)
    }

    /// Get the maximum number of Byzantine replicas that this replica set tolerates.
    pub fn f(&self) -> usize {
        self.len().saturating_sub(1) / 3
    }

    /// Get the number of distinct, matching votes needed to trust a view change, or a prepared
    /// certificate, or a stable checkpoint.
    ///
    /// Any two sets of this size intersect in at least one correct replica.
    pub fn view_change_quorum(&self) -> usize {
        (self.len() + self.f()) / 2 + 1
    }

    /// Get the number of distinct votes needed to be sure that at least one of them comes from a
    /// correct replica.
    pub fn one_correct_quorum(&self) -> usize {
        self.f() + 1
    }

    /// Deterministically select the replica that is primary for `view`.
    ///
    /// # Panics
    ///
    /// Panics if the replica set is empty. A replica must never be configured with an empty
    /// replica set.
    pub fn primary_for(&self, view: ViewNumber) -> ReplicaID {
        assert!(
            !self.replicas.is_empty(),
            "Cannot select a primary: the replica set is empty."
        );
        let index = view.int() % (self.replicas.len() as u64);
        self.replicas[index as usize].0
    }
}
