use std::sync::{Arc, Mutex};

use sbft_rs::{
    app::{App, ValidateBatchRequest, ValidateBatchResponse},
    normal_case::{InFlight, NormalCase},
    types::{batch::Batch, data_types::ReplicaID},
    view_change::messages::Preprepare,
};

/// A normal-case protocol that never makes progress by itself: it stays at a fixed checkpoint, and
/// records the proposals handed to it by the view-change protocol.
pub(crate) struct RecordingNormalCase {
    checkpoint: Batch,
    in_flight: Option<InFlight>,
    preprepares: Arc<Mutex<Vec<Preprepare>>>,
}

impl RecordingNormalCase {
    pub(crate) fn new(
        checkpoint: Batch,
        in_flight: Option<InFlight>,
        preprepares: Arc<Mutex<Vec<Preprepare>>>,
    ) -> Self {
        Self {
            checkpoint,
            in_flight,
            preprepares,
        }
    }
}

impl NormalCase for RecordingNormalCase {
    fn last_checkpoint(&self) -> Batch {
        self.checkpoint.clone()
    }

    fn in_flight(&self) -> Option<InFlight> {
        self.in_flight.clone()
    }

    fn on_checked_preprepare(&mut self, preprepare: Preprepare) {
        self.preprepares.lock().unwrap().push(preprepare);
    }

    fn discard_backlog(&mut self, _replica: ReplicaID) {}

    fn process_backlog(&mut self) {}
}

/// Accepts every batch with at most `max_payloads` payloads.
pub(crate) struct BoundedBatchApp {
    max_payloads: usize,
}

impl BoundedBatchApp {
    pub(crate) fn new(max_payloads: usize) -> Self {
        Self { max_payloads }
    }
}

impl App for BoundedBatchApp {
    fn validate_batch(&mut self, request: ValidateBatchRequest) -> ValidateBatchResponse {
        if request.batch().payloads.len() <= self.max_payloads {
            ValidateBatchResponse::Valid
        } else {
            ValidateBatchResponse::Invalid
        }
    }
}
