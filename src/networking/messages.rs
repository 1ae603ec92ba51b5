/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumeration of the messages that replicas exchange through the [`Network`].
//!
//! [`Network`]: super::network::Network

use borsh::{BorshDeserialize, BorshSerialize};

use crate::view_change::messages::{NewView, ViewChangeMessage};

/// All message variants sent and received by a replica.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// See: [`ViewChangeMessage`].
    ViewChangeMessage(ViewChangeMessage),
}

impl From<ViewChangeMessage> for Message {
    fn from(value: ViewChangeMessage) -> Self {
        Message::ViewChangeMessage(value)
    }
}

impl From<NewView> for Message {
    fn from(value: NewView) -> Self {
        Message::ViewChangeMessage(ViewChangeMessage::NewView(value))
    }
}
