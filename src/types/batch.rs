/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'batch' type and its associated methods.
//!
//! A [`Batch`] is an ordered, content-addressed group of client requests. Its identity is the
//! [`hash`](Batch::hash) of its encoded [`BatchHeader`]: two batches with equal hashes have equal
//! headers, and a header commits to the batch's payloads through its `data_hash`.
//!
//! Batches serve two purposes in the view-change protocol:
//! 1. As the content of the first proposal of a new view (possibly a synthesized
//!    [null batch](Batch::new_null)).
//! 2. As **checkpoints**: a batch carrying signatures over its hash from a
//!    [quorum](ReplicaSet::view_change_quorum) of replicas proves that the replicated log is stable up
//!    to and including the batch's sequence number.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::SigningKey;

use super::{
    crypto_primitives::{hash, verify, CryptoHasher, Digest, Keypair},
    data_types::{CryptoHash, ReplicaID, SeqNumber, SignatureBytes},
    replica_set::ReplicaSet,
    signed_messages::encode,
};

/// The part of a [`Batch`] that its hash is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BatchHeader {
    /// Position of the batch in the replicated log.
    pub seq: SeqNumber,

    /// Hash of the batch at `seq - 1`. All zeroes for the genesis batch.
    pub prev_hash: CryptoHash,

    /// Hash over the batch's payloads. See [`Batch::data_hash`].
    pub data_hash: CryptoHash,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Batch {
    /// Borsh encoding of a [`BatchHeader`].
    pub header: Vec<u8>,

    /// The client requests in this batch, in order.
    pub payloads: Vec<Vec<u8>>,

    /// Checkpoint signatures over [`hash`](Self::hash), keyed by signer.
    pub signatures: BTreeMap<ReplicaID, SignatureBytes>,
}

impl Batch {
    /// Create an unsigned batch at `seq` that extends the batch with hash `prev_hash`.
    pub fn new(seq: SeqNumber, prev_hash: CryptoHash, payloads: Vec<Vec<u8>>) -> Batch {
        let header = BatchHeader {
            seq,
            prev_hash,
            data_hash: Batch::data_hash(&payloads),
        };
        Batch {
            header: encode(&header),
            payloads,
            signatures: BTreeMap::new(),
        }
    }

    /// Synthesize the batch that carries no requests ("null request") at `seq`.
    pub fn new_null(seq: SeqNumber, prev_hash: CryptoHash) -> Batch {
        Batch::new(seq, prev_hash, Vec::new())
    }

    /// The first batch of every replicated log. It is a stable checkpoint without signatures.
    pub fn genesis() -> Batch {
        Batch::new_null(SeqNumber::new(0), CryptoHash::zero())
    }

    /// Get the hash of the batch's header, which identifies the batch.
    pub fn hash(&self) -> CryptoHash {
        hash(&self.header)
    }

    /// Compute the hash that a header must carry for `payloads`.
    pub fn data_hash(payloads: &[Vec<u8>]) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        for payload in payloads {
            hasher.update(hash(payload).bytes());
        }
        CryptoHash::new(hasher.finalize().into())
    }

    /// Decode the batch's header.
    pub fn decode_header(&self) -> Result<BatchHeader, BatchError> {
        BatchHeader::try_from_slice(&self.header).map_err(|_| BatchError::MalformedHeader)
    }

    /// Add a checkpoint signature by `replica` over this batch's hash.
    pub fn sign_as_checkpoint(&mut self, replica: ReplicaID, signing_key: &SigningKey) {
        let keypair = Keypair::new(signing_key.clone());
        self.signatures
            .insert(replica, keypair.sign(&self.hash().bytes()));
    }

    /// Check whether this batch is a legitimate stable checkpoint, i.e., whether it is either the
    /// [genesis](Self::genesis) batch, or it carries correct checkpoint signatures from at least a
    /// [`view_change_quorum`](ReplicaSet::view_change_quorum) of distinct members of `replica_set`.
    pub fn is_stable_checkpoint(&self, replica_set: &ReplicaSet) -> bool {
        let hash = self.hash();
        if hash == Batch::genesis().hash() {
            return self.payloads.is_empty();
        }

        let correct_signatures = self
            .signatures
            .iter()
            .filter(|(signer, signature)| {
                replica_set
                    .verifying_key(**signer)
                    .is_some_and(|key| verify(&hash.bytes(), signature, key))
            })
            .count();

        correct_signatures >= replica_set.view_change_quorum()
    }

    /// Check that the batch is structurally well-formed, returning its decoded header.
    ///
    /// The header must always decode. If `check_data`, the header's `data_hash` must additionally match
    /// the batch's payloads.
    pub(crate) fn check_structure(&self, check_data: bool) -> Result<BatchHeader, BatchError> {
        let header = self.decode_header()?;
        if check_data {
            let actual = Batch::data_hash(&self.payloads);
            if header.data_hash != actual {
                return Err(BatchError::DataHashMismatch {
                    expected: header.data_hash,
                    actual,
                });
            }
        }
        Ok(header)
    }
}

/// Enumerates the ways in which a batch can fail validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// The batch's header bytes do not decode into a [`BatchHeader`].
    MalformedHeader,

    /// The batch's payloads do not hash to the `data_hash` in its header.
    DataHashMismatch {
        expected: CryptoHash,
        actual: CryptoHash,
    },

    /// The batch is used as a checkpoint, but it is not a stable checkpoint.
    NotStableCheckpoint { seq: SeqNumber },

    /// The [`App`](crate::app::App) deemed the batch invalid.
    RejectedByApp,
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;

    fn keys_and_replica_set(n: u64) -> (Vec<SigningKey>, ReplicaSet) {
        let mut csprg = OsRng {};
        let keys: Vec<SigningKey> = (0..n).map(|_| SigningKey::generate(&mut csprg)).collect();
        let mut replica_set = ReplicaSet::new();
        keys.iter()
            .enumerate()
            .for_each(|(id, key)| replica_set.put(ReplicaID::new(id as u64), key.verifying_key()));
        (keys, replica_set)
    }

    #[test]
    fn hash_covers_header_only_test() {
        let batch = Batch::new(SeqNumber::new(3), CryptoHash::zero(), vec![b"tx".to_vec()]);
        let mut signed = batch.clone();
        signed.signatures.insert(ReplicaID::new(0), SignatureBytes::new([1; 64]));
        assert_eq!(batch.hash(), signed.hash());

        let other = Batch::new(SeqNumber::new(3), CryptoHash::zero(), vec![b"tx2".to_vec()]);
        assert_ne!(batch.hash(), other.hash());
    }

    #[test]
    fn null_batch_is_deterministic_test() {
        let prev_hash = Batch::genesis().hash();
        let a = Batch::new_null(SeqNumber::new(1), prev_hash);
        let b = Batch::new_null(SeqNumber::new(1), prev_hash);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.decode_header().unwrap().seq, SeqNumber::new(1));
        assert_ne!(a.hash(), Batch::new_null(SeqNumber::new(2), prev_hash).hash());
    }

    #[test]
    fn check_structure_detects_tampered_payloads_test() {
        let mut batch = Batch::new(SeqNumber::new(1), CryptoHash::zero(), vec![b"a".to_vec()]);
        assert!(batch.check_structure(true).is_ok());

        batch.payloads.push(b"smuggled".to_vec());
        assert!(batch.check_structure(false).is_ok());
        assert!(matches!(
            batch.check_structure(true),
            Err(BatchError::DataHashMismatch { .. })
        ));

        batch.header = vec![0xff];
        assert_eq!(batch.check_structure(false), Err(BatchError::MalformedHeader));
    }

    #[test]
    fn stable_checkpoint_needs_quorum_signatures_test() {
        let (keys, replica_set) = keys_and_replica_set(4);
        assert!(Batch::genesis().is_stable_checkpoint(&replica_set));

        let mut checkpoint = Batch::new(
            SeqNumber::new(4),
            CryptoHash::new([7; 32]),
            vec![b"x".to_vec()],
        );
        assert!(!checkpoint.is_stable_checkpoint(&replica_set));

        checkpoint.sign_as_checkpoint(ReplicaID::new(0), &keys[0]);
        checkpoint.sign_as_checkpoint(ReplicaID::new(1), &keys[1]);
        assert!(!checkpoint.is_stable_checkpoint(&replica_set));

        // A signature filed under the wrong signer does not count.
        let forged = Keypair::new(keys[3].clone()).sign(&checkpoint.hash().bytes());
        checkpoint.signatures.insert(ReplicaID::new(2), forged);
        assert!(!checkpoint.is_stable_checkpoint(&replica_set));

        checkpoint.sign_as_checkpoint(ReplicaID::new(2), &keys[2]);
        assert!(checkpoint.is_stable_checkpoint(&replica_set));
    }
}
