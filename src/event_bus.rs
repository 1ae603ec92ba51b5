/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that receives [events](crate::events) from the algorithm thread and fires the handlers
//! registered for them.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::events::*;
use crate::logging::Logger;

/// Pointer to a handler closure, parameterised by the argument of the closure, i.e., the event type.
pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Stores the handlers registered for each event type. A handler list contains the default logging
/// handler (if logging is enabled) followed by the user-defined handler (if one was registered).
pub(crate) struct EventHandlers {
    pub(crate) send_view_change_handlers: Vec<HandlerPtr<SendViewChangeEvent>>,
    pub(crate) send_new_view_handlers: Vec<HandlerPtr<SendNewViewEvent>>,
    pub(crate) receive_view_change_handlers: Vec<HandlerPtr<ReceiveViewChangeEvent>>,
    pub(crate) receive_new_view_handlers: Vec<HandlerPtr<ReceiveNewViewEvent>>,
    pub(crate) collect_view_change_quorum_handlers: Vec<HandlerPtr<CollectViewChangeQuorumEvent>>,
    pub(crate) forfeit_primary_handlers: Vec<HandlerPtr<ForfeitPrimaryEvent>>,
    pub(crate) reject_new_view_handlers: Vec<HandlerPtr<RejectNewViewEvent>>,
    pub(crate) accept_new_view_handlers: Vec<HandlerPtr<AcceptNewViewEvent>>,
    pub(crate) start_view_handlers: Vec<HandlerPtr<StartViewEvent>>,
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        on_send_view_change: Option<HandlerPtr<SendViewChangeEvent>>,
        on_send_new_view: Option<HandlerPtr<SendNewViewEvent>>,
        on_receive_view_change: Option<HandlerPtr<ReceiveViewChangeEvent>>,
        on_receive_new_view: Option<HandlerPtr<ReceiveNewViewEvent>>,
        on_collect_view_change_quorum: Option<HandlerPtr<CollectViewChangeQuorumEvent>>,
        on_forfeit_primary: Option<HandlerPtr<ForfeitPrimaryEvent>>,
        on_reject_new_view: Option<HandlerPtr<RejectNewViewEvent>>,
        on_accept_new_view: Option<HandlerPtr<AcceptNewViewEvent>>,
        on_start_view: Option<HandlerPtr<StartViewEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            send_view_change_handlers: handlers(log_events, on_send_view_change),
            send_new_view_handlers: handlers(log_events, on_send_new_view),
            receive_view_change_handlers: handlers(log_events, on_receive_view_change),
            receive_new_view_handlers: handlers(log_events, on_receive_new_view),
            collect_view_change_quorum_handlers: handlers(log_events, on_collect_view_change_quorum),
            forfeit_primary_handlers: handlers(log_events, on_forfeit_primary),
            reject_new_view_handlers: handlers(log_events, on_reject_new_view),
            accept_new_view_handlers: handlers(log_events, on_accept_new_view),
            start_view_handlers: handlers(log_events, on_start_view),
        }
    }

    /// Check whether no handler at all is registered, in which case no event bus needs to run.
    pub(crate) fn is_empty(&self) -> bool {
        self.send_view_change_handlers.is_empty()
            && self.send_new_view_handlers.is_empty()
            && self.receive_view_change_handlers.is_empty()
            && self.receive_new_view_handlers.is_empty()
            && self.collect_view_change_quorum_handlers.is_empty()
            && self.forfeit_primary_handlers.is_empty()
            && self.reject_new_view_handlers.is_empty()
            && self.accept_new_view_handlers.is_empty()
            && self.start_view_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::SendViewChange(send_view_change_event) => self
                .send_view_change_handlers
                .iter()
                .for_each(|handler| handler(&send_view_change_event)),

            Event::SendNewView(send_new_view_event) => self
                .send_new_view_handlers
                .iter()
                .for_each(|handler| handler(&send_new_view_event)),

            Event::ReceiveViewChange(receive_view_change_event) => self
                .receive_view_change_handlers
                .iter()
                .for_each(|handler| handler(&receive_view_change_event)),

            Event::ReceiveNewView(receive_new_view_event) => self
                .receive_new_view_handlers
                .iter()
                .for_each(|handler| handler(&receive_new_view_event)),

            Event::CollectViewChangeQuorum(collect_view_change_quorum_event) => self
                .collect_view_change_quorum_handlers
                .iter()
                .for_each(|handler| handler(&collect_view_change_quorum_event)),

            Event::ForfeitPrimary(forfeit_primary_event) => self
                .forfeit_primary_handlers
                .iter()
                .for_each(|handler| handler(&forfeit_primary_event)),

            Event::RejectNewView(reject_new_view_event) => self
                .reject_new_view_handlers
                .iter()
                .for_each(|handler| handler(&reject_new_view_event)),

            Event::AcceptNewView(accept_new_view_event) => self
                .accept_new_view_handlers
                .iter()
                .for_each(|handler| handler(&accept_new_view_event)),

            Event::StartView(start_view_event) => self
                .start_view_handlers
                .iter()
                .for_each(|handler| handler(&start_view_event)),
        }
    }
}

fn handlers<E: Logger>(log_events: bool, user_handler: Option<HandlerPtr<E>>) -> Vec<HandlerPtr<E>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(E::get_logger());
    }
    handlers.extend(user_handler);
    handlers
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.try_recv() {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(TryRecvError::Empty) => thread::yield_now(),
            // The algorithm thread has exited. Wait for the shutdown signal.
            Err(TryRecvError::Disconnected) => thread::yield_now(),
        }
    })
}
