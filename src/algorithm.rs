/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that drives the view-change protocol.
//!
//! The algorithm thread is the only owner of a replica's [`ViewChangeProtocol`] state. It loops over
//! two sources of input, handling them one at a time:
//! 1. Requests to leave the current view, sent by the [`Replica`](crate::replica::Replica) handle
//!    (typically on behalf of an external timer).
//! 2. Messages received from the [`Network`].
//!
//! Because no other thread ever touches the protocol state, the handlers in
//! [`view_change`](crate::view_change) never run concurrently.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::app::App;
use crate::networking::{messages::Message, network::Network};
use crate::normal_case::NormalCase;
use crate::view_change::implementation::ViewChangeProtocol;

pub(crate) struct Algorithm<N: Network + 'static, A: App + 'static, C: NormalCase + 'static> {
    network: N,
    view_change: ViewChangeProtocol<N, A, C>,
    view_change_requests: Receiver<()>,
    shutdown_signal: Receiver<()>,
}

impl<N: Network + 'static, A: App + 'static, C: NormalCase + 'static> Algorithm<N, A, C> {
    pub(crate) fn new(
        network: N,
        view_change: ViewChangeProtocol<N, A, C>,
        view_change_requests: Receiver<()>,
        shutdown_signal: Receiver<()>,
    ) -> Self {
        Self {
            network,
            view_change,
            view_change_requests,
            shutdown_signal,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    panic!("Algorithm thread disconnected from main thread")
                }
            }

            // 1. Leave the current view if asked to.
            if let Ok(()) = self.view_change_requests.try_recv() {
                log::debug!(
                    "view change requested in view {} (active: {})",
                    self.view_change.view(),
                    self.view_change.is_active()
                );
                self.view_change.send_view_change();
            }

            // 2. Handle the next message from the network.
            match self.network.recv() {
                Some((origin, Message::ViewChangeMessage(msg))) => {
                    self.view_change.on_receive_msg(msg, origin)
                }
                None => thread::yield_now(),
            }
        })
    }
}
