/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that a replica publishes while running the view-change protocol.
//!
//! Every event type carries the time it was emitted. An event for a given action indicates that the
//! action has been completed. Handlers for these events can be registered through the
//! [`ReplicaSpec`](crate::replica::ReplicaSpec) builder, and default handlers that
//! [log](crate::logging) them can be enabled through the replica's
//! [configuration](crate::replica::Configuration).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::data_types::{ReplicaID, ViewNumber};
use crate::view_change::{
    messages::{NewView, Subject, ViewChange},
    types::InvalidNewView,
};

/// Enumerates all events defined for this crate.
pub enum Event {
    // Events that involve sending a view-change message.
    SendViewChange(SendViewChangeEvent),
    SendNewView(SendNewViewEvent),
    // Events that involve receiving a view-change message.
    ReceiveViewChange(ReceiveViewChangeEvent),
    ReceiveNewView(ReceiveNewViewEvent),
    // Events that involve the outcome of processing view-change messages.
    CollectViewChangeQuorum(CollectViewChangeQuorumEvent),
    ForfeitPrimary(ForfeitPrimaryEvent),
    RejectNewView(RejectNewViewEvent),
    AcceptNewView(AcceptNewViewEvent),
    StartView(StartViewEvent),
}

impl Event {
    /// Send the event through `event_publisher`, if the replica has one.
    ///
    /// Events are dropped if the receiving event bus has already shut down.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// The replica filed a vote to move to `view_change.view`.
pub struct SendViewChangeEvent {
    pub timestamp: SystemTime,
    pub view_change: ViewChange,
}

/// As the primary of `new_view.view`, the replica broadcasted a certificate for that view.
pub struct SendNewViewEvent {
    pub timestamp: SystemTime,
    pub new_view: NewView,
}

/// The replica received and recorded a verified vote from `origin`.
pub struct ReceiveViewChangeEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub view_change: ViewChange,
}

/// The replica received a certificate from `origin`. Whether it was accepted is indicated by a
/// subsequent [`AcceptNewViewEvent`] or [`RejectNewViewEvent`].
pub struct ReceiveNewViewEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub new_view: NewView,
}

/// The replica holds votes for `view` from exactly a view-change quorum of replicas.
///
/// This is the point at which an external timer should start waiting for `view` to become active.
pub struct CollectViewChangeQuorumEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
}

/// As the primary of `view`, the replica could not issue a certificate, because it does not have the
/// batch named by the reinstatement decision `xset`.
pub struct ForfeitPrimaryEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
    pub xset: Subject,
}

pub struct RejectNewViewEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub view: ViewNumber,
    pub reason: InvalidNewView,
}

pub struct AcceptNewViewEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub view: ViewNumber,
    pub xset: Option<Subject>,
}

/// The replica activated `view`, and handed its first proposal to the normal-case protocol.
pub struct StartViewEvent {
    pub timestamp: SystemTime,
    pub view: ViewNumber,
    pub primary: ReplicaID,
}
