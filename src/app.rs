/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for pluggable, application-level validation of batches.
//!
//! The view-change protocol checks the structure of every batch it handles itself (see
//! [`Batch::check_structure`](crate::types::batch::Batch)). Whether the *contents* of a batch form
//! an executable batch, however, is something only the application knows. Before a replica adopts a
//! batch attached to a [`NewView`](crate::view_change::messages::NewView) certificate received from
//! another replica, it asks its `App` to [`validate_batch`](App::validate_batch).
//!
//! ## Determinism requirements
//!
//! `validate_batch` must be a pure function of the batch: two correct replicas asked to validate the
//! same batch must give the same answer. Otherwise correct replicas may disagree on whether a new-view
//! certificate is valid, and file votes for further view changes needlessly.

use crate::types::batch::{Batch, BatchHeader};

pub trait App: Send {
    /// Decide whether the batch in `request` is a properly formed, executable batch.
    fn validate_batch(&mut self, request: ValidateBatchRequest) -> ValidateBatchResponse;
}

/// Request for an app to validate a batch.
pub struct ValidateBatchRequest<'a> {
    batch: &'a Batch,
    header: BatchHeader,
}

impl<'a> ValidateBatchRequest<'a> {
    pub(crate) fn new(batch: &'a Batch, header: BatchHeader) -> Self {
        Self { batch, header }
    }

    /// Get the batch that is to be validated.
    pub fn batch(&self) -> &Batch {
        self.batch
    }

    /// Get the already-decoded header of the batch.
    pub fn header(&self) -> &BatchHeader {
        &self.header
    }
}

/// Response from an app to a [`ValidateBatchRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateBatchResponse {
    /// The batch may be executed.
    Valid,

    /// The batch must not be executed.
    Invalid,
}
