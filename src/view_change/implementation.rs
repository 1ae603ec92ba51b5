/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Event-driven implementation of the view-change subprotocol.
//!
//! Main type: [`ViewChangeProtocol`].

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    app::{App, ValidateBatchRequest, ValidateBatchResponse},
    events::{
        AcceptNewViewEvent, CollectViewChangeQuorumEvent, Event, ForfeitPrimaryEvent,
        ReceiveNewViewEvent, ReceiveViewChangeEvent, RejectNewViewEvent, SendNewViewEvent,
        SendViewChangeEvent, StartViewEvent,
    },
    networking::{network::Network, sending::SenderHandle},
    normal_case::NormalCase,
    types::{
        batch::{Batch, BatchError, BatchHeader},
        crypto_primitives::Keypair,
        data_types::{ReplicaID, ViewNumber},
        replica_set::ReplicaSet,
        signed_messages::Signed,
    },
};

use super::{
    messages::{NewView, Preprepare, SeqView, ViewChange, ViewChangeMessage},
    types::{InvalidNewView, InvalidViewChange, ReplicaStates},
    xset::{make_xset, XsetOutcome},
};

/// Immutable parameters that determine the behavior of the view-change protocol.
#[derive(Clone)]
pub(crate) struct ViewChangeConfiguration {
    pub(crate) my_id: ReplicaID,
    pub(crate) keypair: Keypair,
    pub(crate) replica_set: ReplicaSet,
}

/// A single participant in the view-change subprotocol.
///
/// # Usage
///
/// After creating an instance of `ViewChangeProtocol` using [`new`](Self::new), the caller should
/// interact with it by calling two methods:
/// 1. [`on_receive_msg`](Self::on_receive_msg): whenever a [`ViewChangeMessage`] is received.
/// 2. [`send_view_change`](Self::send_view_change): whenever the replica decides that the primary of
///    its current view is faulty.
///
/// Both methods may call into the [`NormalCase`] collaborator (to activate a view) and into the
/// [`Network`] (to send votes and certificates). Neither returns errors: invalid inputs are logged,
/// published as events, and otherwise ignored or answered with a vote for a later view.
pub(crate) struct ViewChangeProtocol<N: Network, A: App, C: NormalCase> {
    config: ViewChangeConfiguration,
    view: ViewNumber,
    active: bool,
    // The last view that was active before `view`.
    last_active_view: ViewNumber,
    replica_states: ReplicaStates,
    // The last certificate that this replica issued as a primary.
    last_new_view_sent: Option<NewView>,
    // The last view for which a quorum of votes was reported.
    quorum_collected: Option<ViewNumber>,
    sender: SenderHandle<N>,
    app: A,
    normal_case: C,
    event_publisher: Option<Sender<Event>>,
}

impl<N: Network, A: App, C: NormalCase> ViewChangeProtocol<N, A, C> {
    /// Create a new `ViewChangeProtocol` that is active in `init_view`.
    pub(crate) fn new(
        config: ViewChangeConfiguration,
        init_view: ViewNumber,
        sender: SenderHandle<N>,
        app: A,
        normal_case: C,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let replica_states = ReplicaStates::new(&config.replica_set);
        Self {
            config,
            view: init_view,
            active: true,
            last_active_view: init_view,
            replica_states,
            last_new_view_sent: None,
            quorum_collected: None,
            sender,
            app,
            normal_case,
            event_publisher,
        }
    }

    /// Get the current view.
    pub(crate) fn view(&self) -> ViewNumber {
        self.view
    }

    /// Check whether the current view is active, i.e., whether the normal-case protocol may process
    /// proposals in it.
    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    #[cfg(test)]
    pub(crate) fn normal_case(&self) -> &C {
        &self.normal_case
    }

    fn is_primary(&self) -> bool {
        self.config.replica_set.primary_for(self.view) == self.config.my_id
    }

    /// Execute the required steps in the view-change subprotocol upon receiving a `ViewChangeMessage`
    /// from the replica identified by `origin`.
    pub(crate) fn on_receive_msg(&mut self, msg: ViewChangeMessage, origin: ReplicaID) {
        match msg {
            ViewChangeMessage::ViewChange(signed) => self.on_receive_view_change(signed, origin),
            ViewChangeMessage::NewView(new_view) => self.on_receive_new_view(new_view, origin),
        }
    }

    /// Leave the current view and vote for moving to the next one.
    pub(crate) fn send_view_change(&mut self) {
        if self.active {
            self.last_active_view = self.view;
        }
        self.view = self.view + 1;
        self.active = false;

        let view_change = ViewChange {
            view: self.view,
            pset: self
                .normal_case
                .in_flight()
                .and_then(|in_flight| in_flight.prepared)
                .into_iter()
                .collect(),
            checkpoint: self.normal_case.last_checkpoint(),
        };
        let signed = Signed::sign(&self.config.keypair, &view_change);

        log::info!("{}: sending view change for view {}", self.config.my_id, self.view);
        self.sender
            .broadcast(ViewChangeMessage::ViewChange(signed.clone()));
        Event::SendViewChange(SendViewChangeEvent {
            timestamp: SystemTime::now(),
            view_change: view_change.clone(),
        })
        .publish(&self.event_publisher);

        self.replica_states
            .set_view_change(self.config.my_id, view_change, signed);
        self.on_view_change_recorded();
    }

    /// Execute the required steps upon receiving a signed `ViewChange` vote from `origin`.
    fn on_receive_view_change(&mut self, signed: Signed, origin: ReplicaID) {
        let view_change = match self.verify_view_change(&signed, origin) {
            Ok(view_change) => view_change,
            Err(err) => {
                log::info!(
                    "{}: ignoring invalid view change from {}: {:?}",
                    self.config.my_id,
                    origin,
                    err
                );
                return;
            }
        };

        if view_change.view < self.view {
            log::debug!(
                "{}: ignoring view change for old view {} from {}",
                self.config.my_id,
                view_change.view,
                origin
            );
            return;
        }
        if self
            .replica_states
            .view_change(origin)
            .is_some_and(|recorded| view_change.view <= recorded.view)
        {
            log::debug!(
                "{}: ignoring view change for view {} from {}, a newer one is recorded",
                self.config.my_id,
                view_change.view,
                origin
            );
            return;
        }

        Event::ReceiveViewChange(ReceiveViewChangeEvent {
            timestamp: SystemTime::now(),
            origin,
            view_change: view_change.clone(),
        })
        .publish(&self.event_publisher);
        self.replica_states.set_view_change(origin, view_change, signed);

        // If enough replicas want to leave our view that at least one of them is correct, join the
        // lowest view they want to move to.
        let views_above = self.replica_states.views_voted_above(self.view);
        if views_above.len() >= self.config.replica_set.one_correct_quorum() {
            let target = views_above[0];
            log::info!(
                "{}: {} replicas voted for views above {}, catching up to view {}",
                self.config.my_id,
                views_above.len(),
                self.view,
                target
            );
            if self.active {
                self.last_active_view = self.view;
                self.active = false;
            }
            self.view = ViewNumber::new(target.int() - 1);
            self.send_view_change();
            return;
        }

        self.on_view_change_recorded();
    }

    // Checks that must run after any vote (including our own) was recorded.
    fn on_view_change_recorded(&mut self) {
        let quorum_set = self.replica_states.quorum_for(self.view);
        if quorum_set.len() >= self.config.replica_set.view_change_quorum()
            && self.quorum_collected.map_or(true, |view| view < self.view)
        {
            self.quorum_collected = Some(self.view);
            log::info!(
                "{}: collected a quorum of view changes for view {}",
                self.config.my_id,
                self.view
            );
            Event::CollectViewChangeQuorum(CollectViewChangeQuorumEvent {
                timestamp: SystemTime::now(),
                view: self.view,
            })
            .publish(&self.event_publisher);
        }

        self.process_new_view();
        if self.is_primary() {
            self.maybe_send_new_view();
        }
    }

    /// As the primary of the current view, issue a `NewView` certificate for it if the votes collected so
    /// far make it possible, and if no certificate has been issued for it yet.
    fn maybe_send_new_view(&mut self) {
        if self
            .last_new_view_sent
            .as_ref()
            .is_some_and(|sent| sent.view == self.view)
        {
            return;
        }

        let quorum_set = self.replica_states.quorum_for(self.view);
        let (xset, batch) = match make_xset(
            self.view,
            &quorum_set.view_changes,
            &self.config.replica_set,
        ) {
            XsetOutcome::Insufficient => {
                log::debug!(
                    "{}: {} view changes for view {}, not enough to make an xset yet",
                    self.config.my_id,
                    quorum_set.len(),
                    self.view
                );
                return;
            }
            XsetOutcome::NullRequest(batch) => (None, batch),
            XsetOutcome::Reinstate(subject) => match self.normal_case.in_flight() {
                Some(in_flight) if in_flight.preprepare.batch.hash() == subject.digest => {
                    (Some(subject), in_flight.preprepare.batch)
                }
                _ => {
                    log::warn!(
                        "{}: forfeiting primary for view {}, request {} at seq {} is not in store",
                        self.config.my_id,
                        self.view,
                        subject.digest,
                        subject.seq.seq
                    );
                    Event::ForfeitPrimary(ForfeitPrimaryEvent {
                        timestamp: SystemTime::now(),
                        view: self.view,
                        xset: subject,
                    })
                    .publish(&self.event_publisher);
                    return;
                }
            },
        };

        if let Err(err) = self.check_batch(&batch, false) {
            log::warn!(
                "{}: not sending new view for view {}, own batch is malformed: {:?}",
                self.config.my_id,
                self.view,
                err
            );
            return;
        }

        let new_view = NewView {
            view: self.view,
            vset: quorum_set.vset,
            xset,
            batch: Some(batch),
        };
        log::info!("{}: sending new view for view {}", self.config.my_id, self.view);
        self.last_new_view_sent = Some(new_view.clone());
        self.sender.broadcast(new_view.clone());
        Event::SendNewView(SendNewViewEvent {
            timestamp: SystemTime::now(),
            new_view: new_view.clone(),
        })
        .publish(&self.event_publisher);

        // The primary accepts its own certificate through the same checks as everyone else.
        self.on_receive_new_view(new_view, self.config.my_id);
    }

    /// Execute the required steps upon receiving a `NewView` certificate from `origin`.
    fn on_receive_new_view(&mut self, new_view: NewView, origin: ReplicaID) {
        Event::ReceiveNewView(ReceiveNewViewEvent {
            timestamp: SystemTime::now(),
            origin,
            new_view: new_view.clone(),
        })
        .publish(&self.event_publisher);

        let primary = self.config.replica_set.primary_for(new_view.view);
        if origin != primary {
            self.reject_new_view(
                &new_view,
                origin,
                InvalidNewView::NotFromPrimary { origin, primary },
            );
            return;
        }

        if self
            .replica_states
            .new_view(primary)
            .is_some_and(|accepted| accepted.view >= new_view.view)
        {
            log::debug!(
                "{}: ignoring stale new view for view {} from {}",
                self.config.my_id,
                new_view.view,
                origin
            );
            return;
        }

        if let Err(reason) = self.check_new_view(&new_view) {
            self.reject_new_view(&new_view, origin, reason);
            // A primary does not vote against its own certificate. The other replicas do, or the timer
            // moves it on.
            if origin != self.config.my_id {
                self.send_view_change();
            }
            return;
        }

        log::info!(
            "{}: accepted new view for view {} from {}",
            self.config.my_id,
            new_view.view,
            origin
        );
        Event::AcceptNewView(AcceptNewViewEvent {
            timestamp: SystemTime::now(),
            origin,
            view: new_view.view,
            xset: new_view.xset,
        })
        .publish(&self.event_publisher);

        let view = new_view.view;
        self.replica_states.set_new_view(primary, new_view);
        if view > self.view {
            if self.active {
                self.last_active_view = self.view;
            }
            self.view = view;
            self.active = false;
        }
        self.process_new_view();
    }

    fn reject_new_view(&self, new_view: &NewView, origin: ReplicaID, reason: InvalidNewView) {
        log::warn!(
            "{}: rejecting new view for view {} from {}: {:?}",
            self.config.my_id,
            new_view.view,
            origin,
            reason
        );
        Event::RejectNewView(RejectNewViewEvent {
            timestamp: SystemTime::now(),
            origin,
            view: new_view.view,
            reason,
        })
        .publish(&self.event_publisher);
    }

    /// Check that `new_view`'s Vset is authentic and that its Xset and batch are the ones that the Vset
    /// implies.
    fn check_new_view(&mut self, new_view: &NewView) -> Result<(), InvalidNewView> {
        let mut view_changes = Vec::with_capacity(new_view.vset.len());
        for (voter, signed) in &new_view.vset {
            let view_change = self
                .verify_view_change(signed, *voter)
                .and_then(|view_change| {
                    if view_change.view == new_view.view {
                        Ok(view_change)
                    } else {
                        Err(InvalidViewChange::ViewMismatch {
                            certificate: new_view.view,
                            vote: view_change.view,
                        })
                    }
                })
                .map_err(|reason| InvalidNewView::InvalidViewChange {
                    voter: *voter,
                    reason,
                })?;
            view_changes.push(view_change);
        }

        let batch = new_view.batch.as_ref().ok_or(InvalidNewView::MissingBatch)?;

        let outcome = make_xset(new_view.view, &view_changes, &self.config.replica_set);
        let expected = match &outcome {
            XsetOutcome::Insufficient => {
                return Err(InvalidNewView::InsufficientVset {
                    votes: view_changes.len(),
                    quorum: self.config.replica_set.view_change_quorum(),
                })
            }
            XsetOutcome::Reinstate(subject) => subject.digest,
            XsetOutcome::NullRequest(null_batch) => null_batch.hash(),
        };
        if new_view.xset != outcome.xset() {
            return Err(InvalidNewView::XsetMismatch {
                received: new_view.xset,
                derived: outcome.xset(),
            });
        }

        if batch.hash() != expected {
            return Err(InvalidNewView::BatchMismatch {
                received: batch.hash(),
                expected,
            });
        }

        self.check_batch(batch, true)?;
        Ok(())
    }

    /// Check that `signed` is a vote by `voter` carrying a stable checkpoint and correct prepared
    /// certificates.
    fn verify_view_change(
        &self,
        signed: &Signed,
        voter: ReplicaID,
    ) -> Result<ViewChange, InvalidViewChange> {
        let view_change: ViewChange = signed.verify(voter, &self.config.replica_set)?;

        let checkpoint_seq = view_change
            .checkpoint
            .decode_header()
            .ok()
            .map(|header| header.seq);
        if checkpoint_seq.is_none()
            || !view_change
                .checkpoint
                .is_stable_checkpoint(&self.config.replica_set)
        {
            return Err(InvalidViewChange::CheckpointNotStable {
                seq: checkpoint_seq,
            });
        }

        if let Some(cert) = view_change
            .pset
            .iter()
            .find(|cert| !cert.is_correct(&self.config.replica_set))
        {
            return Err(InvalidViewChange::InvalidPreparedCertificate {
                subject: cert.subject,
            });
        }

        Ok(view_change)
    }

    /// Check that `batch` is well-formed. In `strict` mode, also check its payloads and ask the app.
    fn check_batch(&mut self, batch: &Batch, strict: bool) -> Result<BatchHeader, BatchError> {
        let header = batch.check_structure(strict)?;
        if strict {
            let request = ValidateBatchRequest::new(batch, header);
            if self.app.validate_batch(request) == ValidateBatchResponse::Invalid {
                return Err(BatchError::RejectedByApp);
            }
        }
        Ok(header)
    }

    /// Activate the current view if it is not active yet and a certificate for exactly this view has
    /// been accepted from its primary.
    fn process_new_view(&mut self) {
        if self.active {
            return;
        }

        let primary = self.config.replica_set.primary_for(self.view);
        let batch = match self.replica_states.new_view(primary) {
            Some(NewView {
                view,
                batch: Some(batch),
                ..
            }) if *view == self.view => batch.clone(),
            _ => return,
        };
        let header = batch
            .decode_header()
            .expect("batches of accepted new views have been checked to be well-formed");

        self.active = true;
        let superseded = self.config.replica_set.primary_for(self.last_active_view);
        if superseded != primary {
            self.normal_case.discard_backlog(superseded);
        }
        self.last_active_view = self.view;

        log::info!(
            "{}: starting view {} with primary {}",
            self.config.my_id,
            self.view,
            primary
        );
        Event::StartView(StartViewEvent {
            timestamp: SystemTime::now(),
            view: self.view,
            primary,
        })
        .publish(&self.event_publisher);

        self.normal_case.on_checked_preprepare(Preprepare {
            seq: SeqView {
                seq: header.seq,
                view: self.view,
            },
            batch,
        });
        self.normal_case.process_backlog();
    }
}
