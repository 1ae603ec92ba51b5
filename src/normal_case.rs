/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for the pluggable normal-case agreement protocol that runs once a view is active.
//!
//! The view-change protocol does not order requests by itself. It hands over to, and draws evidence
//! from, the three-phase (pre-prepare, prepare, commit) agreement protocol through the [`NormalCase`]
//! trait:
//! - When filing a [`ViewChange`](crate::view_change::messages::ViewChange) vote, it asks for the last
//!   stable checkpoint and for the batch currently in flight.
//! - When issuing a [`NewView`](crate::view_change::messages::NewView) certificate as the primary, it
//!   reuses the batch currently in flight if the reinstatement decision names it.
//! - When activating a view, it feeds the first proposal of the view into
//!   [`on_checked_preprepare`](NormalCase::on_checked_preprepare), and triggers the discarding and
//!   replaying of buffered (backlogged) messages.

use crate::{
    types::{batch::Batch, data_types::ReplicaID},
    view_change::messages::{PreparedCertificate, Preprepare},
};

pub trait NormalCase: Send {
    /// Get the most recent stable checkpoint.
    ///
    /// The returned batch must pass [`Batch::is_stable_checkpoint`], otherwise other replicas will
    /// ignore the votes that carry it.
    fn last_checkpoint(&self) -> Batch;

    /// Get the batch that is currently in flight (pre-prepared but not yet checkpointed), if any.
    fn in_flight(&self) -> Option<InFlight>;

    /// Process a proposal whose validity has already been established by the view-change protocol.
    ///
    /// This is called exactly once per activated view, with the first proposal of that view, as if it
    /// had arrived directly from the view's primary.
    fn on_checked_preprepare(&mut self, preprepare: Preprepare);

    /// Drop all buffered messages that were sent by, or addressed to, `replica`.
    fn discard_backlog(&mut self, replica: ReplicaID);

    /// Re-process the buffered messages that may have become valid in the newly activated view.
    fn process_backlog(&mut self);
}

/// The batch currently in flight in the normal-case protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlight {
    /// The proposal that put the batch in flight.
    pub preprepare: Preprepare,

    /// Proof that a quorum prepared the batch, if one has been collected.
    pub prepared: Option<PreparedCertificate>,
}
