/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The function that reduces a quorum of view-change votes to a single reinstatement decision.
//!
//! [`make_xset`] is run by the primary of a view to decide what to put into its [`NewView`]
//! certificate, and by every replica that receives the certificate to check the primary's decision.
//! Both runs must agree, so the function depends only on the *set* of votes it is given: every choice
//! it makes is a maximum over a totally ordered key.
//!
//! [`NewView`]: super::messages::NewView

use crate::types::{
    batch::Batch,
    data_types::{CryptoHash, SeqNumber, ViewNumber},
    replica_set::ReplicaSet,
};

use super::messages::{SeqView, Subject, ViewChange};

/// The result of [`make_xset`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum XsetOutcome {
    /// Fewer than a view-change quorum of votes were given. More votes are needed.
    Insufficient,

    /// The request named by the subject must be carried forward into the new view.
    Reinstate(Subject),

    /// No request needs to be carried forward. The new view starts with this null batch.
    NullRequest(Batch),
}

impl XsetOutcome {
    /// Get the Xset that a certificate carrying this outcome must contain.
    pub(crate) fn xset(&self) -> Option<Subject> {
        match self {
            XsetOutcome::Reinstate(subject) => Some(*subject),
            XsetOutcome::Insufficient | XsetOutcome::NullRequest(_) => None,
        }
    }
}

/// Decide which request (if any) must be carried forward into `view`, given `view_changes`, a set of
/// already-verified votes for `view` from distinct replicas.
///
/// 1. The new view starts right after the highest checkpoint (by sequence number, then hash) among
///    the votes.
/// 2. If any vote carries a prepared certificate for that next sequence number, the request it names
///    is reinstated. Among competing certificates, the one prepared in the highest view (then the one
///    with the highest digest) wins.
/// 3. Otherwise, a null batch extending the highest checkpoint is synthesized.
pub(crate) fn make_xset(
    view: ViewNumber,
    view_changes: &[ViewChange],
    replica_set: &ReplicaSet,
) -> XsetOutcome {
    if view_changes.len() < replica_set.view_change_quorum() {
        return XsetOutcome::Insufficient;
    }
    debug_assert!(view_changes.iter().all(|vc| vc.view == view));

    let Some((checkpoint_seq, checkpoint_hash)) = view_changes
        .iter()
        .filter_map(|vc| {
            let header = vc.checkpoint.decode_header().ok()?;
            Some((header.seq, vc.checkpoint.hash()))
        })
        .max()
    else {
        return XsetOutcome::Insufficient;
    };
    let next = checkpoint_seq + 1;

    match highest_prepared_at(next, view_changes) {
        Some((_, digest)) => XsetOutcome::Reinstate(Subject {
            seq: SeqView { seq: next, view },
            digest,
        }),
        None => XsetOutcome::NullRequest(Batch::new_null(next, checkpoint_hash)),
    }
}

// (prepared view, digest) of the winning prepared certificate for `seq`, if any.
fn highest_prepared_at(seq: SeqNumber, view_changes: &[ViewChange]) -> Option<(ViewNumber, CryptoHash)> {
    view_changes
        .iter()
        .flat_map(|vc| vc.pset.iter())
        .filter(|cert| cert.subject.seq.seq == seq)
        .map(|cert| (cert.subject.seq.view, cert.subject.digest))
        .max()
}

#[cfg(test)]
mod tests {
    use crate::view_change::tests::Fixture;

    use super::*;

    fn permutations(votes: &[ViewChange]) -> Vec<Vec<ViewChange>> {
        if votes.len() <= 1 {
            return vec![votes.to_vec()];
        }
        let mut result = Vec::new();
        for i in 0..votes.len() {
            let mut rest = votes.to_vec();
            let first = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, first.clone());
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn insufficient_below_quorum_test() {
        let fixture = Fixture::new(4);
        let view = ViewNumber::new(2);
        let votes: Vec<ViewChange> = (0..2)
            .map(|_| fixture.view_change(view, Batch::genesis(), vec![]))
            .collect();

        assert_eq!(
            make_xset(view, &votes, &fixture.replica_set),
            XsetOutcome::Insufficient
        );
        assert_eq!(make_xset(view, &[], &fixture.replica_set), XsetOutcome::Insufficient);
    }

    #[test]
    fn null_request_extends_highest_checkpoint_test() {
        let fixture = Fixture::new(4);
        let view = ViewNumber::new(2);
        let genesis_votes: Vec<ViewChange> = (0..3)
            .map(|_| fixture.view_change(view, Batch::genesis(), vec![]))
            .collect();

        let outcome = make_xset(view, &genesis_votes, &fixture.replica_set);
        assert_eq!(
            outcome,
            XsetOutcome::NullRequest(Batch::new_null(SeqNumber::new(1), Batch::genesis().hash()))
        );
        assert_eq!(outcome.xset(), None);

        let checkpoint = fixture.checkpoint(4);
        let mut votes = genesis_votes.clone();
        votes[1] = fixture.view_change(view, checkpoint.clone(), vec![]);
        assert_eq!(
            make_xset(view, &votes, &fixture.replica_set),
            XsetOutcome::NullRequest(Batch::new_null(SeqNumber::new(5), checkpoint.hash()))
        );
    }

    #[test]
    fn single_vote_with_prepared_certificate_reinstates_test() {
        let fixture = Fixture::new(4);
        let view = ViewNumber::new(2);
        let checkpoint = fixture.checkpoint(4);
        let request = fixture.request(&checkpoint, b"R");
        let prepared = fixture.prepared(&request, ViewNumber::new(1));

        for holder in 0..3 {
            let votes: Vec<ViewChange> = (0..3)
                .map(|voter| {
                    let pset = if voter == holder {
                        vec![prepared.clone()]
                    } else {
                        vec![]
                    };
                    fixture.view_change(view, checkpoint.clone(), pset)
                })
                .collect();

            assert_eq!(
                make_xset(view, &votes, &fixture.replica_set),
                XsetOutcome::Reinstate(Subject {
                    seq: SeqView {
                        seq: SeqNumber::new(5),
                        view
                    },
                    digest: request.hash(),
                })
            );
        }
    }

    #[test]
    fn prepared_certificates_below_next_seq_are_ignored_test() {
        let fixture = Fixture::new(4);
        let view = ViewNumber::new(3);
        let old_checkpoint = fixture.checkpoint(4);
        let new_checkpoint = fixture.checkpoint(5);
        let stale = fixture.prepared(&fixture.request(&old_checkpoint, b"R"), ViewNumber::new(1));

        let votes = vec![
            fixture.view_change(view, old_checkpoint.clone(), vec![stale]),
            fixture.view_change(view, new_checkpoint.clone(), vec![]),
            fixture.view_change(view, old_checkpoint, vec![]),
        ];

        assert_eq!(
            make_xset(view, &votes, &fixture.replica_set),
            XsetOutcome::NullRequest(Batch::new_null(SeqNumber::new(6), new_checkpoint.hash()))
        );
    }

    #[test]
    fn outcome_does_not_depend_on_vote_order_test() {
        let fixture = Fixture::new(4);
        let view = ViewNumber::new(6);
        let checkpoint = fixture.checkpoint(4);
        let first = fixture.request(&checkpoint, b"first");
        let second = fixture.request(&checkpoint, b"second");
        let third = fixture.request(&checkpoint, b"third");

        let votes = vec![
            fixture.view_change(view, checkpoint.clone(), vec![fixture.prepared(&first, ViewNumber::new(2))]),
            fixture.view_change(view, checkpoint.clone(), vec![fixture.prepared(&second, ViewNumber::new(4))]),
            fixture.view_change(view, checkpoint.clone(), vec![fixture.prepared(&third, ViewNumber::new(4))]),
            fixture.view_change(view, Batch::genesis(), vec![]),
        ];

        let expected_digest = std::cmp::max(second.hash(), third.hash());
        for permutation in permutations(&votes) {
            assert_eq!(
                make_xset(view, &permutation, &fixture.replica_set),
                XsetOutcome::Reinstate(Subject {
                    seq: SeqView {
                        seq: SeqNumber::new(5),
                        view
                    },
                    digest: expected_digest,
                })
            );
        }
    }
}
