/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or integers, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Add,
};

use borsh::{BorshDeserialize, BorshSerialize};

/// View number. Starts at 0 and increases by 1 every time a replica files a
/// [`ViewChange`](crate::view_change::messages::ViewChange) vote for the next view.
///
/// The view of a given replica never decreases.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ViewNumber(u64);

impl ViewNumber {
    /// Create a new `ViewNumber` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the initial `ViewNumber`, which is 0.
    pub const fn init() -> Self {
        Self(0)
    }

    /// Get the inner `u64` of this `ViewNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ViewNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for ViewNumber {
    type Output = ViewNumber;
    fn add(self, rhs: u64) -> Self::Output {
        ViewNumber::new(self.0 + rhs)
    }
}

/// Sequence number of a [`Batch`](super::batch::Batch) in the replicated log.
///
/// The genesis batch has sequence number 0.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct SeqNumber(u64);

impl SeqNumber {
    /// Create a new `SeqNumber` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` of this `SeqNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for SeqNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for SeqNumber {
    type Output = SeqNumber;
    fn add(self, rhs: u64) -> Self::Output {
        SeqNumber::new(self.0 + rhs)
    }
}

/// Number that identifies a replica in the static [`ReplicaSet`](super::replica_set::ReplicaSet).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ReplicaID(u64);

impl ReplicaID {
    /// Create a new `ReplicaID` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` of this `ReplicaID`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ReplicaID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// 32-byte cryptographic hash.
///
/// Within this crate, `CryptoHash`-es are always SHA256 hashes produced with
/// [`CryptoHasher`](super::crypto_primitives::CryptoHasher).
///
/// `CryptoHash` is totally ordered (byte-wise) so that choices between competing digests can be
/// made deterministically.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BorshDeserialize, BorshSerialize,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the all-zeroes `CryptoHash`, used as the `prev_hash` of the genesis batch.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Ed25519 digital signature.
///
/// Within this crate, these are produced using the [`ed25519_dalek`] crate, whose main definitions
/// are re-exported from the [`crypto_primitives`](super::crypto_primitives) module.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes(")?;
        self.0[..4]
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))?;
        write!(f, "..)")
    }
}
