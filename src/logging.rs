/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via replica's
//! [config](crate::replica::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [SendNewView](crate::events::SendNewViewEvent) is printed:
//!
//! ```text
//! SendNewView, 1701329264, 2, 3, fNGCJyk
//! ```
//!
//! In the snippet:
//! - The third value is the view that the certificate is for.
//! - The fourth value is the number of votes in the certificate's Vset.
//! - The fifth value is the first seven characters of the Base64 encoding of the hash of the batch
//!   attached to the certificate.
//!
//! Rejections of certificates and forfeits of the primary role are logged at the `warn` level. All
//! other events are logged at the `info` level.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;
use crate::types::batch::Batch;
use crate::view_change::messages::{NewView, Subject};

// Names of each event in PascalCase for printing:
pub const SEND_VIEW_CHANGE: &str = "SendViewChange";
pub const SEND_NEW_VIEW: &str = "SendNewView";

pub const RECEIVE_VIEW_CHANGE: &str = "ReceiveViewChange";
pub const RECEIVE_NEW_VIEW: &str = "ReceiveNewView";

pub const COLLECT_VIEW_CHANGE_QUORUM: &str = "CollectViewChangeQuorum";
pub const FORFEIT_PRIMARY: &str = "ForfeitPrimary";
pub const REJECT_NEW_VIEW: &str = "RejectNewView";
pub const ACCEPT_NEW_VIEW: &str = "AcceptNewView";
pub const START_VIEW: &str = "StartView";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for SendViewChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_view_change_event: &SendViewChangeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SEND_VIEW_CHANGE,
                secs_since_unix_epoch(send_view_change_event.timestamp),
                send_view_change_event.view_change.view,
                checkpoint_info(&send_view_change_event.view_change.checkpoint),
                send_view_change_event.view_change.pset.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendNewViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_new_view_event: &SendNewViewEvent| {
            log::info!(
                "{}, {}, {}",
                SEND_NEW_VIEW,
                secs_since_unix_epoch(send_new_view_event.timestamp),
                new_view_info(&send_new_view_event.new_view)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveViewChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_view_change_event: &ReceiveViewChangeEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_VIEW_CHANGE,
                secs_since_unix_epoch(receive_view_change_event.timestamp),
                receive_view_change_event.origin,
                receive_view_change_event.view_change.view,
                checkpoint_info(&receive_view_change_event.view_change.checkpoint),
                receive_view_change_event.view_change.pset.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveNewViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_new_view_event: &ReceiveNewViewEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_NEW_VIEW,
                secs_since_unix_epoch(receive_new_view_event.timestamp),
                receive_new_view_event.origin,
                new_view_info(&receive_new_view_event.new_view)
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectViewChangeQuorumEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_view_change_quorum_event: &CollectViewChangeQuorumEvent| {
            log::info!(
                "{}, {}, {}",
                COLLECT_VIEW_CHANGE_QUORUM,
                secs_since_unix_epoch(collect_view_change_quorum_event.timestamp),
                collect_view_change_quorum_event.view
            )
        };
        Box::new(logger)
    }
}

impl Logger for ForfeitPrimaryEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |forfeit_primary_event: &ForfeitPrimaryEvent| {
            log::warn!(
                "{}, {}, {}, {}",
                FORFEIT_PRIMARY,
                secs_since_unix_epoch(forfeit_primary_event.timestamp),
                forfeit_primary_event.view,
                subject_info(&Some(forfeit_primary_event.xset))
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectNewViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_new_view_event: &RejectNewViewEvent| {
            log::warn!(
                "{}, {}, {}, {}, {:?}",
                REJECT_NEW_VIEW,
                secs_since_unix_epoch(reject_new_view_event.timestamp),
                reject_new_view_event.origin,
                reject_new_view_event.view,
                reject_new_view_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for AcceptNewViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |accept_new_view_event: &AcceptNewViewEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ACCEPT_NEW_VIEW,
                secs_since_unix_epoch(accept_new_view_event.timestamp),
                accept_new_view_event.origin,
                accept_new_view_event.view,
                subject_info(&accept_new_view_event.xset)
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartViewEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_view_event: &StartViewEvent| {
            log::info!(
                "{}, {}, {}, {}",
                START_VIEW,
                secs_since_unix_epoch(start_view_event.timestamp),
                start_view_event.view,
                start_view_event.primary
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}

fn checkpoint_info(checkpoint: &Batch) -> String {
    match checkpoint.decode_header() {
        Ok(header) => format!(
            "checkpoint: {} at seq {}",
            first_seven_base64_chars(&checkpoint.hash().bytes()),
            header.seq
        ),
        Err(_) => String::from("checkpoint: malformed"),
    }
}

fn subject_info(subject: &Option<Subject>) -> String {
    match subject {
        Some(subject) => format!(
            "{} at seq {}",
            first_seven_base64_chars(&subject.digest.bytes()),
            subject.seq.seq
        ),
        None => String::from("null"),
    }
}

fn new_view_info(new_view: &NewView) -> String {
    let batch = match &new_view.batch {
        Some(batch) => first_seven_base64_chars(&batch.hash().bytes()),
        None => String::from("none"),
    };
    format!("{}, {}, {}", new_view.view, new_view.vset.len(), batch)
}
