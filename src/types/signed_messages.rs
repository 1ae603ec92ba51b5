/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signed messages, and the signature-checking that every authenticated input goes through.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::{verify, Keypair, VerifyingKey},
    data_types::{ReplicaID, SignatureBytes},
    replica_set::ReplicaSet,
};

/// Data types that contain: 1. A message, and 2. A digital signature over said message whose
/// correctness can be verified against a `VerifyingKey`.
pub(crate) trait SignedMessage {
    /// Get the bytes that are passed as input into the signing function to form the signature
    /// of the `SignedMessage`.
    fn message_bytes(&self) -> Vec<u8>;

    /// Get the signature of the `SignedMessage`.
    fn signature_bytes(&self) -> SignatureBytes;

    /// Verify that `signature_bytes` is a signature created by `verifying_key` over `message_bytes`.
    fn is_correct(&self, verifying_key: &VerifyingKey) -> bool {
        verify(&self.message_bytes(), &self.signature_bytes(), verifying_key)
    }
}

/// A Borsh-encoded payload together with a signature over the encoded bytes.
///
/// The payload stays encoded until it is [`verify`](Self::verify)-ed: a receiver never looks at the
/// contents of a `Signed` value before knowing who signed it.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Signed {
    /// Borsh encoding of the payload.
    pub data: Vec<u8>,

    /// Signature over `data`.
    pub signature: SignatureBytes,
}

impl Signed {
    /// Encode `payload` and sign the encoding with `keypair`.
    pub(crate) fn sign<T: BorshSerialize>(keypair: &Keypair, payload: &T) -> Signed {
        let data = encode(payload);
        let signature = keypair.sign(&data);
        Signed { data, signature }
    }

    /// Check that this value was signed by `signer` (a member of `replica_set`) and decode the payload.
    pub fn verify<T: BorshDeserialize>(
        &self,
        signer: ReplicaID,
        replica_set: &ReplicaSet,
    ) -> Result<T, SignedMessageError> {
        let verifying_key = replica_set
            .verifying_key(signer)
            .ok_or(SignedMessageError::UnknownSigner { signer })?;

        if !self.is_correct(verifying_key) {
            return Err(SignedMessageError::IncorrectSignature { signer });
        }

        T::try_from_slice(&self.data).map_err(|_| SignedMessageError::MalformedPayload { signer })
    }
}

impl SignedMessage for Signed {
    fn message_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    fn signature_bytes(&self) -> SignatureBytes {
        self.signature
    }
}

/// Enumerates the ways in which [`Signed::verify`] can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedMessageError {
    /// The claimed signer is not a member of the replica set.
    UnknownSigner { signer: ReplicaID },

    /// The signature does not verify against the claimed signer's key.
    IncorrectSignature { signer: ReplicaID },

    /// The signature is correct, but the signed bytes do not decode into the expected payload type.
    MalformedPayload { signer: ReplicaID },
}

/// Borsh-encode a value that lives in memory.
pub(crate) fn encode<T: BorshSerialize>(value: &T) -> Vec<u8> {
    value
        .try_to_vec()
        .expect("Borsh serialization into an in-memory buffer cannot fail.")
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn verify_checks_signer_and_payload_test() {
        let mut csprg = OsRng {};
        let alice = Keypair::new(SigningKey::generate(&mut csprg));
        let bob = Keypair::new(SigningKey::generate(&mut csprg));
        let mut replica_set = ReplicaSet::new();
        replica_set.put(ReplicaID::new(0), alice.public());
        replica_set.put(ReplicaID::new(1), bob.public());

        let signed = Signed::sign(&alice, &(7u64, 11u64));

        assert_eq!(
            signed.verify::<(u64, u64)>(ReplicaID::new(0), &replica_set),
            Ok((7, 11))
        );
        assert_eq!(
            signed.verify::<(u64, u64)>(ReplicaID::new(1), &replica_set),
            Err(SignedMessageError::IncorrectSignature {
                signer: ReplicaID::new(1)
            })
        );
        assert_eq!(
            signed.verify::<(u64, u64)>(ReplicaID::new(9), &replica_set),
            Err(SignedMessageError::UnknownSigner {
                signer: ReplicaID::new(9)
            })
        );
        assert_eq!(
            signed.verify::<(u64, u64, u64)>(ReplicaID::new(0), &replica_set),
            Err(SignedMessageError::MalformedPayload {
                signer: ReplicaID::new(0)
            })
        );
    }
}
