use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use sbft_rs::{
    events::{SendViewChangeEvent, StartViewEvent},
    replica::{Configuration, Replica, ReplicaSpec},
    types::{
        batch::Batch,
        crypto_primitives::SigningKey,
        data_types::{ReplicaID, ViewNumber},
        replica_set::ReplicaSet,
    },
    view_change::messages::Preprepare,
};

use crate::common::{
    logging::log_with_context,
    network::NetworkStub,
    normal_case::{BoundedBatchApp, RecordingNormalCase},
};

/// A running replica, plus what it reported through its event handlers and its normal-case protocol.
pub(crate) struct Node {
    id: ReplicaID,
    replica: Replica,
    started_views: Arc<Mutex<Vec<ViewNumber>>>,
    voted_views: Arc<Mutex<Vec<ViewNumber>>>,
    preprepares: Arc<Mutex<Vec<Preprepare>>>,
}

impl Node {
    pub(crate) fn new(
        signing_key: SigningKey,
        id: ReplicaID,
        replica_set: ReplicaSet,
        network: NetworkStub,
        log_events: bool,
    ) -> Node {
        let started_views = Arc::new(Mutex::new(Vec::new()));
        let voted_views = Arc::new(Mutex::new(Vec::new()));
        let preprepares = Arc::new(Mutex::new(Vec::new()));

        let configuration = Configuration::builder()
            .me(signing_key)
            .my_id(id)
            .replica_set(replica_set)
            .initial_view(ViewNumber::init())
            .log_events(log_events)
            .build();

        let replica = ReplicaSpec::builder()
            .app(BoundedBatchApp::new(16))
            .normal_case(RecordingNormalCase::new(
                Batch::genesis(),
                None,
                preprepares.clone(),
            ))
            .network(network)
            .configuration(configuration)
            .on_start_view(start_view_handler(id, started_views.clone()))
            .on_send_view_change(send_view_change_handler(voted_views.clone()))
            .build()
            .start();

        Node {
            id,
            replica,
            started_views,
            voted_views,
            preprepares,
        }
    }

    pub(crate) fn id(&self) -> ReplicaID {
        self.id
    }

    pub(crate) fn request_view_change(&self) {
        log_with_context(Some(self.id), "Requesting a view change.");
        self.replica.request_view_change()
    }

    pub(crate) fn started_views(&self) -> Vec<ViewNumber> {
        self.started_views.lock().unwrap().clone()
    }

    pub(crate) fn voted_views(&self) -> Vec<ViewNumber> {
        self.voted_views.lock().unwrap().clone()
    }

    pub(crate) fn preprepares(&self) -> Vec<Preprepare> {
        self.preprepares.lock().unwrap().clone()
    }
}

fn start_view_handler(
    id: ReplicaID,
    started_views: Arc<Mutex<Vec<ViewNumber>>>,
) -> impl Fn(&StartViewEvent) + Send + 'static {
    move |event: &StartViewEvent| {
        log_with_context(
            Some(id),
            &format!("Started view {} with primary {}.", event.view, event.primary),
        );
        started_views.lock().unwrap().push(event.view)
    }
}

fn send_view_change_handler(
    voted_views: Arc<Mutex<Vec<ViewNumber>>>,
) -> impl Fn(&SendViewChangeEvent) + Send + 'static {
    move |event: &SendViewChangeEvent| voted_views.lock().unwrap().push(event.view_change.view)
}

/// Poll `condition` until it holds, panicking if it does not hold within `timeout`.
pub(crate) fn wait_until(timeout: Duration, description: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() > deadline {
            panic!("Timed out waiting until {}", description);
        }
        thread::sleep(Duration::from_millis(50));
    }
}
