//! The backend interface every portal is bound to.
//!
//! One implementation exists per transport variant (a forwarder connection, a
//! direct socket, the in-process loopback, a test double). The variant is
//! chosen by the factory and injected when the portal is created; it is never
//! swapped afterwards. Private backend state lives inside the implementing
//! type and its teardown is that type's `Drop`, which runs exactly once when
//! the last portal reference is released.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Attributes, ErrorCode, FileId, Message, Name, Timeout};

/// The nine operations a backend supplies.
///
/// All calls run synchronously on the caller's thread. The portal forwards
/// every call regardless of whether the stack was started; rejecting calls
/// made in the wrong state is the backend's job. Unless an implementation
/// documents otherwise, callers may have at most one `send` and one `receive`
/// in flight at a time.
pub trait PortalStack: Send + Sync + 'static {
    /// Begins operation. Repeated starts are the backend's to accept or reject.
    fn start(&self) -> Result<(), ErrorCode>;

    /// Ends operation. Should wake any `receive` blocked on this backend.
    fn stop(&self) -> Result<(), ErrorCode>;

    /// Blocks until a message arrives, `timeout` elapses, or the backend is
    /// stopped. Ownership of the returned message passes to the caller.
    fn receive(&self, timeout: Timeout) -> Result<Message, ErrorCode>;

    /// Sends `message`, blocking at most `timeout`. The message stays owned by
    /// the caller whatever the outcome.
    fn send(&self, message: &Message, timeout: Timeout) -> Result<(), ErrorCode>;

    /// Registers interest in messages under `name`. `timeout` bounds the
    /// registration itself, not the life of the subscription.
    fn listen(&self, name: &Name, timeout: Timeout) -> Result<(), ErrorCode>;

    /// Withdraws a registration made by [`PortalStack::listen`]. `timeout`
    /// bounds the withdrawal round-trip only.
    fn ignore(&self, name: &Name, timeout: Timeout) -> Result<(), ErrorCode>;

    /// Descriptor for readiness integration, or [`FileId::NOT_APPLICABLE`].
    fn file_id(&self) -> FileId;

    /// Offered the caller's new attributes before the portal swaps them in.
    /// Returning an error vetoes the swap.
    fn set_attributes(&self, attributes: &Attributes) -> Result<(), ErrorCode>;

    /// The backend's view of the attributes. `Some` replaces the portal's held
    /// value, `None` leaves it as it is.
    fn attributes(&self) -> Option<Attributes>;
}

/// Names the nine [`PortalStack`] operations, for logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// [`PortalStack::start`]
    Start,
    /// [`PortalStack::stop`]
    Stop,
    /// [`PortalStack::receive`]
    Receive,
    /// [`PortalStack::send`]
    Send,
    /// [`PortalStack::listen`]
    Listen,
    /// [`PortalStack::ignore`]
    Ignore,
    /// [`PortalStack::file_id`]
    GetFileId,
    /// [`PortalStack::set_attributes`]
    SetAttributes,
    /// [`PortalStack::attributes`]
    GetAttributes,
}

impl Operation {
    /// Every operation, in canonical order.
    pub const ALL: [Operation; 9] = [
        Self::Start,
        Self::Stop,
        Self::Receive,
        Self::Send,
        Self::Listen,
        Self::Ignore,
        Self::GetFileId,
        Self::SetAttributes,
        Self::GetAttributes,
    ];

    /// Position of this operation in [`Operation::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Receive => "receive",
            Self::Send => "send",
            Self::Listen => "listen",
            Self::Ignore => "ignore",
            Self::GetFileId => "get_file_id",
            Self::SetAttributes => "set_attributes",
            Self::GetAttributes => "get_attributes",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
