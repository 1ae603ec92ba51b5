/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica.
//!
//! A replica is one of the processes that together replicate a state machine. Each replica is
//! uniquely identified by a [`ReplicaID`], and signs its messages with an
//! [Ed25519 signing key](ed25519_dalek::SigningKey) whose verifying key every other replica knows
//! through the static [`ReplicaSet`].
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [`ReplicaSpec`],
//! - The function to [start](ReplicaSpec::start) a [`Replica`] given its specification,
//! - [The type](Replica) which keeps the replica alive.
//!
//! ## Starting a replica
//!
//! Here is an example that demonstrates how to build and start running a replica using the builder
//! pattern:
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .app(app)
//!     .normal_case(normal_case)
//!     .network(network)
//!     .configuration(configuration)
//!     .on_start_view(start_view_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! The required setters are for providing the trait implementations required to run a replica:
//! - `.app(...)`
//! - `.normal_case(...)`
//! - `.network(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [`crate::events`]:
//! - `.on_send_view_change(...)`
//! - `.on_send_new_view(...)`
//! - `.on_receive_view_change(...)`
//! - `.on_receive_new_view(...)`
//! - `.on_collect_view_change_quorum(...)`
//! - `.on_forfeit_primary(...)`
//! - `.on_reject_new_view(...)`
//! - `.on_accept_new_view(...)`
//! - `.on_start_view(...)`
//!
//! The replica's [configuration](Configuration) can also be defined using the builder pattern, for
//! example:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(signing_key)
//!     .my_id(ReplicaID::new(0))
//!     .replica_set(replica_set)
//!     .initial_view(ViewNumber::init())
//!     .log_events(true)
//!     .build();
//! ```
//!
//! ## Leaving a view
//!
//! This crate does not decide by itself when the primary of a view is faulty. Whatever does (usually a
//! timer that is reset on progress) should call [`Replica::request_view_change`].

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use ed25519_dalek::SigningKey;
use typed_builder::TypedBuilder;

use crate::algorithm::Algorithm;
use crate::app::App;
use crate::event_bus::*;
use crate::events::*;
use crate::networking::{network::Network, sending::SenderHandle};
use crate::normal_case::NormalCase;
use crate::types::{
    crypto_primitives::Keypair,
    data_types::{ReplicaID, ViewNumber},
    replica_set::ReplicaSet,
};
use crate::view_change::implementation::{ViewChangeConfiguration, ViewChangeProtocol};

/// Stores the user-defined parameters required to start a replica.
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.my_id(...)`
    - `.replica_set(...)`
    - `.initial_view(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the replica's signing key, used to sign votes. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Set the replica's identity in the replica set. Required."))]
    pub my_id: ReplicaID,
    #[builder(setter(doc = "Set the static replica set, which must contain `my_id` with the verifying key of `me`. Required."))]
    pub replica_set: ReplicaSet,
    #[builder(setter(doc = "Set the view that the replica starts in. The replica starts with this view active. Required."))]
    pub initial_view: ViewNumber,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl From<Configuration> for ViewChangeConfiguration {
    fn from(value: Configuration) -> Self {
        ViewChangeConfiguration {
            my_id: value.my_id,
            keypair: Keypair::new(value.me),
            replica_set: value.replica_set,
        }
    }
}

#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.app(...)`
    - `.normal_case(...)`
    - `.network(...)`
    - `.configuration(...)`

    Optional:
    - `.on_send_view_change(...)`
    - `.on_send_new_view(...)`
    - `.on_receive_view_change(...)`
    - `.on_receive_new_view(...)`
    - `.on_collect_view_change_quorum(...)`
    - `.on_forfeit_primary(...)`
    - `.on_reject_new_view(...)`
    - `.on_accept_new_view(...)`
    - `.on_start_view(...)`
"))]
pub struct ReplicaSpec<N: Network + 'static, A: App + 'static, C: NormalCase + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the application-level batch validator. The argument must implement the [App](crate::app::App) trait. Required."))]
    app: A,
    #[builder(setter(doc = "Set the normal-case agreement protocol that runs in active views. The argument must implement the [NormalCase](crate::normal_case::NormalCase) trait. Required."))]
    normal_case: C,
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::network::Network) trait. Required."))]
    network: N,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&SendViewChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SendViewChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica files a view-change vote. Optional."))]
    on_send_view_change: Option<HandlerPtr<SendViewChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SendNewViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SendNewViewEvent>),
    doc = "Register a handler closure to be invoked after the replica, as a primary, broadcasts a new-view certificate. Optional."))]
    on_send_new_view: Option<HandlerPtr<SendNewViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveViewChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveViewChangeEvent>),
    doc = "Register a handler closure to be invoked after the replica records a view-change vote from a peer. Optional."))]
    on_receive_view_change: Option<HandlerPtr<ReceiveViewChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveNewViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveNewViewEvent>),
    doc = "Register a handler closure to be invoked after the replica receives a new-view certificate. Optional."))]
    on_receive_new_view: Option<HandlerPtr<ReceiveNewViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectViewChangeQuorumEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectViewChangeQuorumEvent>),
    doc = "Register a handler closure to be invoked after the replica collects a quorum of view-change votes for its view. Optional."))]
    on_collect_view_change_quorum: Option<HandlerPtr<CollectViewChangeQuorumEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ForfeitPrimaryEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ForfeitPrimaryEvent>),
    doc = "Register a handler closure to be invoked after the replica gives up issuing a new-view certificate. Optional."))]
    on_forfeit_primary: Option<HandlerPtr<ForfeitPrimaryEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectNewViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectNewViewEvent>),
    doc = "Register a handler closure to be invoked after the replica rejects a new-view certificate. Optional."))]
    on_reject_new_view: Option<HandlerPtr<RejectNewViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AcceptNewViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AcceptNewViewEvent>),
    doc = "Register a handler closure to be invoked after the replica accepts a new-view certificate. Optional."))]
    on_accept_new_view: Option<HandlerPtr<AcceptNewViewEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartViewEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartViewEvent>),
    doc = "Register a handler closure to be invoked after the replica activates a view. Optional."))]
    on_start_view: Option<HandlerPtr<StartViewEvent>>,
}

impl<N: Network + 'static, A: App + 'static, C: NormalCase + 'static> ReplicaSpec<N, A, C> {
    /// Start the replica's algorithm thread and, if any event handler is registered or logging is
    /// enabled, its event bus thread.
    pub fn start(mut self) -> Replica {
        self.network
            .init_replica_set(self.configuration.replica_set.clone());

        let initial_view = self.configuration.initial_view;
        let log_events = self.configuration.log_events;

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_send_view_change,
            self.on_send_new_view,
            self.on_receive_view_change,
            self.on_receive_new_view,
            self.on_collect_view_change_quorum,
            self.on_forfeit_primary,
            self.on_reject_new_view,
            self.on_accept_new_view,
            self.on_start_view,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let view_change = ViewChangeProtocol::new(
            self.configuration.into(),
            initial_view,
            SenderHandle::new(self.network.clone()),
            self.app,
            self.normal_case,
            event_publisher,
        );

        let (view_change_requests, view_change_requests_receiver) = mpsc::channel();
        let (algorithm_shutdown, algorithm_shutdown_receiver) = mpsc::channel();
        let algorithm = Algorithm::new(
            self.network,
            view_change,
            view_change_requests_receiver,
            algorithm_shutdown_receiver,
        )
        .start();

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus =
                    start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        Replica {
            view_change_requests,
            algorithm: Some(algorithm),
            algorithm_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to a running replica. Dropping it shuts the replica's threads down.
pub struct Replica {
    view_change_requests: Sender<()>,
    algorithm: Option<JoinHandle<()>>,
    algorithm_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Replica {
    /// Ask the replica to leave its current view and vote for the next one.
    ///
    /// Requests are handled in order by the algorithm thread. Each request moves the replica one view
    /// further.
    pub fn request_view_change(&self) {
        let _ = self.view_change_requests.send(());
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        // Event bus first, then the algorithm thread that publishes to it.
        if let Some(shutdown) = &self.event_bus_shutdown {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }

        let _ = self.algorithm_shutdown.send(());
        if let Some(algorithm) = self.algorithm.take() {
            let _ = algorithm.join();
        }
    }
}
