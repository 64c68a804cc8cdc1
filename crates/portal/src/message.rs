//! The message value carried across a portal.
//!
//! The core never inspects a [`Message`]: `send` borrows one and `receive`
//! hands ownership of a new one to the caller. Backends may look at the kind
//! and name to make delivery decisions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Name;

/// What a [`Message`] represents on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A request for content under a name.
    Interest,
    /// Named content, typically answering an interest.
    ContentObject,
    /// Stack-level control traffic; not addressed by name.
    Control,
}

/// A message exchanged between a client and its backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    kind: MessageKind,
    name: Option<Name>,
    payload: Bytes,
}

impl Message {
    /// An interest in `name` with no payload.
    pub fn interest(name: Name) -> Self {
        Self {
            kind: MessageKind::Interest,
            name: Some(name),
            payload: Bytes::new(),
        }
    }

    /// A content object published under `name`.
    pub fn content_object(name: Name, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::ContentObject,
            name: Some(name),
            payload: payload.into(),
        }
    }

    /// An unnamed control message.
    pub fn control(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Control,
            name: None,
            payload: payload.into(),
        }
    }

    /// The message kind.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The name this message is addressed by. `None` for control messages.
    pub fn name(&self) -> Option<&Name> {
        self.name.as_ref()
    }

    /// The payload bytes. Cloning the returned [`Bytes`] does not copy.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns `true` if this message is named and the name falls under `prefix`.
    pub fn is_under(&self, prefix: &Name) -> bool {
        self.name.as_ref().is_some_and(|n| n.has_prefix(prefix))
    }
}
