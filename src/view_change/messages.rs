/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for structured messages that are sent between replicas as part of the view-change
//! protocol, and for the evidence they carry.
//!
//! ## Messages
//!
//! The view-change protocol involves two types of messages:
//! 1. [`ViewChange`] votes, which a replica sends (wrapped in a [`Signed`]) to signal to others that it
//!    wants to move to a new view.
//! 2. [`NewView`] certificates, which the primary of a view sends to prove to others that it is safe
//!    to enter that view, and to tell them which batch to process first in it.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::SigningKey;

use crate::types::{
    batch::Batch,
    crypto_primitives::{verify, Keypair},
    data_types::{CryptoHash, ReplicaID, SeqNumber, SignatureBytes, ViewNumber},
    replica_set::ReplicaSet,
    signed_messages::{encode, Signed},
};

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ViewChangeMessage {
    ViewChange(Signed),
    NewView(NewView),
}

/// A position in the replicated log as proposed in a given view.
///
/// Ordered by `seq` first, then by `view`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct SeqView {
    pub seq: SeqNumber,
    pub view: ViewNumber,
}

/// Names a specific batch (by `digest`) proposed at a specific [`SeqView`].
///
/// This is what prepare votes are cast over, and also what a [`NewView`] certificate's reinstatement
/// decision (its "Xset") consists of.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct Subject {
    pub seq: SeqView,
    pub digest: CryptoHash,
}

/// Proof that a [`view_change_quorum`](ReplicaSet::view_change_quorum) of replicas prepared the batch
/// named by `subject`. Every signature is over the Borsh encoding of the subject.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreparedCertificate {
    pub subject: Subject,
    pub signatures: BTreeMap<ReplicaID, SignatureBytes>,
}

impl PreparedCertificate {
    /// Create a prepared certificate for `subject` with no signatures yet.
    pub fn new(subject: Subject) -> PreparedCertificate {
        PreparedCertificate {
            subject,
            signatures: BTreeMap::new(),
        }
    }

    /// Add a prepare signature by `replica` over the certificate's subject.
    pub fn sign(&mut self, replica: ReplicaID, signing_key: &SigningKey) {
        let signature = Keypair::new(signing_key.clone()).sign(&encode(&self.subject));
        self.signatures.insert(replica, signature);
    }

    /// Check whether the certificate carries correct signatures from at least a
    /// [`view_change_quorum`](ReplicaSet::view_change_quorum) of distinct members of `replica_set`.
    pub fn is_correct(&self, replica_set: &ReplicaSet) -> bool {
        let message = encode(&self.subject);
        let correct_signatures = self
            .signatures
            .iter()
            .filter(|(signer, signature)| {
                replica_set
                    .verifying_key(**signer)
                    .is_some_and(|key| verify(&message, signature, key))
            })
            .count();

        correct_signatures >= replica_set.view_change_quorum()
    }
}

/// A replica's vote for moving to `view`.
///
/// Sent over the network only as the payload of a [`Signed`] value, so that the vote can later be
/// embedded into a [`NewView`] certificate and re-verified by every replica that receives it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ViewChange {
    /// The view the voter wants to move to.
    pub view: ViewNumber,

    /// Certificates for the batches that the voter had prepared but not yet checkpointed.
    pub pset: Vec<PreparedCertificate>,

    /// The voter's last stable checkpoint.
    pub checkpoint: Batch,
}

/// Certificate that justifies entering `view`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct NewView {
    pub view: ViewNumber,

    /// Signed [`ViewChange`] votes for `view`, keyed by voter ("Vset").
    pub vset: BTreeMap<ReplicaID, Signed>,

    /// The request that must be carried forward into `view`, or `None` if no request needs to be
    /// carried forward ("Xset").
    pub xset: Option<Subject>,

    /// The batch to process first in `view`. Always present in certificates sent by correct primaries.
    pub batch: Option<Batch>,
}

/// The binding of a batch to a specific position, as consumed by the normal-case protocol.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Preprepare {
    pub seq: SeqView,
    pub batch: Batch,
}
