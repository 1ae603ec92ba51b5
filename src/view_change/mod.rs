/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Subprotocol for moving all replicas from a suspected-faulty primary to the next one without
//! losing any committed work.
//!
//! # Overview
//!
//! A replica that suspects the primary of its current view (the decision to suspect is made outside
//! this module, typically by a timer) files a signed [`ViewChange`](messages::ViewChange) vote for the
//! next view and stops processing normal-case proposals. The vote carries the evidence needed to avoid
//! losing committed work:
//! 1. The replica's last **stable checkpoint**, a batch signed by a quorum of replicas.
//! 2. A [`PreparedCertificate`](messages::PreparedCertificate) for the batch the replica had in
//!    flight, if it collected one.
//!
//! Once the primary of the target view holds votes for that view from a
//! [view-change quorum](crate::types::replica_set::ReplicaSet::view_change_quorum) of replicas (its
//! **Vset**), it deterministically derives the **Xset** from them: the request that must be carried
//! forward into the new view, or the decision that no request needs to be carried forward (in which
//! case a null batch is synthesized instead). It broadcasts a [`NewView`](messages::NewView)
//! certificate containing the Vset, the Xset, and the batch to re-propose.
//!
//! Every replica that receives the certificate re-verifies every vote in the Vset, re-derives the
//! Xset from them, and checks that the attached batch matches it. If everything checks out, the replica
//! enters the new view and feeds the attached batch to the normal-case protocol as the view's first
//! proposal. If anything does not, the replica files a vote for a still-later view.
//!
//! # Leaving and entering views
//!
//! Every replica is, at any time, in one of two states with respect to its current view:
//! - **Changing**: the replica has filed (or learned of) a vote for its current view, but has not yet
//!   accepted a new-view certificate for it. It does not process normal-case proposals.
//! - **Active**: the replica accepted the new-view certificate for its current view and processes
//!   normal-case proposals.
//!
//! Only filing a vote moves a replica from active to changing. Only accepting a certificate for
//! exactly the current view moves it back.
//!
//! # Determinism of the Xset
//!
//! The safety of the whole subprotocol rests on every correct replica computing the same Xset from
//! the same Vset. [`xset::make_xset`] only ever takes maxima over totally ordered keys, so it does not
//! depend on the order in which votes are stored or iterated.
//!
//! # Catching up
//!
//! A replica that receives votes for views higher than its own from at least `f + 1` replicas knows
//! that at least one correct replica wants to leave its view, and joins the lowest such view right
//! away, instead of waiting for its own timer.

pub mod messages;

pub mod types;

pub(crate) mod xset;

pub(crate) mod implementation;
