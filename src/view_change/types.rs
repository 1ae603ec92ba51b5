/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of types specific to the view-change protocol.

use std::collections::BTreeMap;

use crate::types::{
    batch::BatchError,
    data_types::{CryptoHash, ReplicaID, SeqNumber, ViewNumber},
    replica_set::ReplicaSet,
    signed_messages::{Signed, SignedMessageError},
};

use super::messages::{NewView, Subject, ViewChange};

/// What a replica knows about one of its peers (or itself).
#[derive(Clone, Debug, Default)]
pub(crate) struct ReplicaState {
    /// The newest verified vote seen from the peer, together with its signed form.
    pub(crate) view_change: Option<(ViewChange, Signed)>,

    /// The newest new-view certificate accepted from the peer while it was primary.
    pub(crate) new_view: Option<NewView>,
}

/// The per-replica state table. Holds exactly one [`ReplicaState`] for every member of the replica
/// set, and nothing else.
pub(crate) struct ReplicaStates {
    states: BTreeMap<ReplicaID, ReplicaState>,
}

impl ReplicaStates {
    pub(crate) fn new(replica_set: &ReplicaSet) -> ReplicaStates {
        ReplicaStates {
            states: replica_set
                .replicas()
                .map(|replica| (replica, ReplicaState::default()))
                .collect(),
        }
    }

    pub(crate) fn view_change(&self, replica: ReplicaID) -> Option<&ViewChange> {
        self.states
            .get(&replica)
            .and_then(|state| state.view_change.as_ref())
            .map(|(view_change, _)| view_change)
    }

    pub(crate) fn new_view(&self, replica: ReplicaID) -> Option<&NewView> {
        self.states
            .get(&replica)
            .and_then(|state| state.new_view.as_ref())
    }

    /// Record `view_change` as the newest vote of `replica`. No-op if `replica` is not a member of the
    /// replica set.
    pub(crate) fn set_view_change(&mut self, replica: ReplicaID, view_change: ViewChange, signed: Signed) {
        if let Some(state) = self.states.get_mut(&replica) {
            state.view_change = Some((view_change, signed));
        }
    }

    /// Record `new_view` as the newest certificate accepted from `replica`. No-op if `replica` is not a
    /// member of the replica set.
    pub(crate) fn set_new_view(&mut self, replica: ReplicaID, new_view: NewView) {
        if let Some(state) = self.states.get_mut(&replica) {
            state.new_view = Some(new_view);
        }
    }

    /// Collect the votes for exactly `view`, in ascending order of voter.
    pub(crate) fn quorum_for(&self, view: ViewNumber) -> QuorumSet {
        let mut quorum_set = QuorumSet::new();
        for (replica, state) in &self.states {
            if let Some((view_change, signed)) = &state.view_change {
                if view_change.view == view {
                    quorum_set.vset.insert(*replica, signed.clone());
                    quorum_set.view_changes.push(view_change.clone());
                }
            }
        }
        quorum_set
    }

    /// Get the views of all recorded votes for views strictly higher than `view`, in ascending order.
    pub(crate) fn views_voted_above(&self, view: ViewNumber) -> Vec<ViewNumber> {
        let mut views: Vec<ViewNumber> = self
            .states
            .values()
            .filter_map(|state| state.view_change.as_ref())
            .map(|(view_change, _)| view_change.view)
            .filter(|voted| *voted > view)
            .collect();
        views.sort();
        views
    }
}

/// The votes held for a given view ("Vset"), both in signed form (for embedding into a certificate)
/// and in decoded form (for resolving). Both are ordered by voter.
#[derive(Clone, Debug)]
pub(crate) struct QuorumSet {
    pub(crate) vset: BTreeMap<ReplicaID, Signed>,
    pub(crate) view_changes: Vec<ViewChange>,
}

impl QuorumSet {
    fn new() -> QuorumSet {
        QuorumSet {
            vset: BTreeMap::new(),
            view_changes: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.vset.len()
    }
}

/// Enumerates the ways in which a view-change vote can fail verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidViewChange {
    /// The vote is not correctly signed by its claimed voter.
    Signature(SignedMessageError),

    /// The vote's checkpoint is not a stable checkpoint.
    CheckpointNotStable { seq: Option<SeqNumber> },

    /// One of the vote's prepared certificates does not carry a quorum of correct signatures.
    InvalidPreparedCertificate { subject: Subject },

    /// The vote is embedded in a certificate for a different view.
    ViewMismatch {
        certificate: ViewNumber,
        vote: ViewNumber,
    },
}

impl From<SignedMessageError> for InvalidViewChange {
    fn from(value: SignedMessageError) -> Self {
        InvalidViewChange::Signature(value)
    }
}

/// Enumerates the reasons for which a replica rejects a [`NewView`] certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNewView {
    /// The certificate was not sent by the primary of its view.
    NotFromPrimary {
        origin: ReplicaID,
        primary: ReplicaID,
    },

    /// A vote in the certificate's Vset failed verification.
    InvalidViewChange {
        voter: ReplicaID,
        reason: InvalidViewChange,
    },

    /// The certificate does not carry a batch.
    MissingBatch,

    /// The certificate's Vset does not contain enough votes to decide an Xset.
    InsufficientVset { votes: usize, quorum: usize },

    /// The certificate's Xset differs from the one derived from its Vset.
    XsetMismatch {
        received: Option<Subject>,
        derived: Option<Subject>,
    },

    /// The certificate's batch is not the batch that its Xset names (or, for a null Xset, not the
    /// null batch derived from its Vset).
    BatchMismatch {
        received: CryptoHash,
        expected: CryptoHash,
    },

    /// The certificate's batch is malformed, or rejected by the app.
    InvalidBatch(BatchError),
}

impl From<BatchError> for InvalidNewView {
    fn from(value: BatchError) -> Self {
        InvalidNewView::InvalidBatch(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::view_change::tests::Fixture;

    use super::*;

    #[test]
    fn quorum_for_collects_only_votes_for_that_view_test() {
        let fixture = Fixture::new(4);
        let mut states = ReplicaStates::new(&fixture.replica_set);

        for (voter, view) in [(0, 2), (1, 2), (2, 3)] {
            let view_change =
                fixture.view_change(ViewNumber::new(view), fixture.checkpoint(0), Vec::new());
            let signed = fixture.signed(voter, &view_change);
            states.set_view_change(ReplicaID::new(voter as u64), view_change, signed);
        }

        // Votes from outside the replica set are never recorded.
        let outsider = fixture.view_change(ViewNumber::new(2), fixture.checkpoint(0), Vec::new());
        let signed = fixture.signed(3, &outsider);
        states.set_view_change(ReplicaID::new(9), outsider, signed);

        let quorum_set = states.quorum_for(ViewNumber::new(2));
        assert_eq!(quorum_set.len(), 2);
        assert_eq!(
            quorum_set.vset.keys().copied().collect::<Vec<_>>(),
            vec![ReplicaID::new(0), ReplicaID::new(1)]
        );
        assert!(quorum_set
            .view_changes
            .iter()
            .all(|view_change| view_change.view == ViewNumber::new(2)));
        assert_eq!(states.quorum_for(ViewNumber::new(4)).len(), 0);

        assert_eq!(
            states.views_voted_above(ViewNumber::new(1)),
            vec![ViewNumber::new(2), ViewNumber::new(2), ViewNumber::new(3)]
        );
        assert_eq!(
            states.views_voted_above(ViewNumber::new(2)),
            vec![ViewNumber::new(3)]
        );
        assert!(states.view_change(ReplicaID::new(3)).is_none());
    }
}
