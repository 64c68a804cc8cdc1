//! In-process loopback backend.
//!
//! Implements [`portal::PortalStack`] without any transport: whatever a
//! portal sends is queued and handed back by its own `receive`. Useful for
//! local development and for exercising client code against real blocking
//! behaviour.
//!
//! ## Delivery rules
//!
//! - Content objects and control messages are always looped back.
//! - Interests are looped back only when a name registered with `listen`
//!   covers them; otherwise they are accepted and dropped, as an interest with
//!   no producer would be.
//! - The queue holds at most `portal.loopback.queue_capacity` messages
//!   (default 128). A `send` into a full queue waits for room up to its
//!   timeout.
//!
//! ## Run state
//!
//! `send`, `receive`, `listen` and `ignore` fail with `ENOTCONN` unless the
//! stack is started. `stop` wakes every blocked caller, which then fails with
//! `ENOTCONN`. Queued messages and registrations survive a stop and are
//! available again after the next `start`.

mod error;

pub use error::LoopbackError;

use std::collections::{BTreeSet, VecDeque};
use std::num::NonZeroUsize;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use portal::factory::property;
use portal::{
    Attributes, ErrorCode, FileId, Message, MessageKind, Name, Portal, PortalFactory, PortalStack,
    Properties, Timeout,
};
use tracing::{debug, trace};

/// Default queue capacity when the property is absent.
pub const DEFAULT_QUEUE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

/// Settings for a [`LoopbackStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackConfig {
    /// Messages queued before `send` has to wait.
    pub queue_capacity: NonZeroUsize,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LoopbackConfig {
    /// Reads settings from a factory's property store.
    ///
    /// # Errors
    ///
    /// [`LoopbackError::InvalidProperty`] if the capacity is present but is
    /// not a positive integer.
    pub fn from_properties(properties: &Properties) -> Result<Self, LoopbackError> {
        let name = property::LOOPBACK_QUEUE_CAPACITY;
        let queue_capacity = match properties.get_parsed::<NonZeroUsize>(name) {
            None => DEFAULT_QUEUE_CAPACITY,
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                return Err(LoopbackError::InvalidProperty {
                    name,
                    value: properties.get_or(name, "").to_string(),
                    reason: e.to_string(),
                })
            }
        };
        Ok(Self { queue_capacity })
    }
}

/// Creates a portal backed by a fresh loopback stack configured from the
/// factory's properties.
///
/// # Errors
///
/// See [`LoopbackConfig::from_properties`].
pub fn loopback_portal(factory: &PortalFactory) -> Result<Portal, LoopbackError> {
    factory.create_portal_with(LoopbackStack::from_properties)
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// A backend that delivers sent messages back to its own receive side.
pub struct LoopbackStack {
    capacity: usize,
    state: Mutex<LoopbackState>,
    readable: Condvar,
    writable: Condvar,
}

#[derive(Default)]
struct LoopbackState {
    running: bool,
    // Bumped by every stop so waiters can tell they were interrupted.
    epoch: u64,
    queue: VecDeque<Message>,
    prefixes: BTreeSet<Name>,
    dropped: u64,
    logging: bool,
}

impl LoopbackStack {
    /// A stopped stack with the given settings.
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            capacity: config.queue_capacity.get(),
            state: Mutex::new(LoopbackState::default()),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    /// A stopped stack configured from `properties`.
    ///
    /// # Errors
    ///
    /// See [`LoopbackConfig::from_properties`].
    pub fn from_properties(properties: &Properties) -> Result<Self, LoopbackError> {
        LoopbackConfig::from_properties(properties).map(Self::new)
    }

    /// Messages waiting to be received.
    pub fn queued(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Interests dropped because no listened name covered them.
    pub fn dropped_interests(&self) -> u64 {
        self.state.lock().dropped
    }

    fn running(&self) -> Result<MutexGuard<'_, LoopbackState>, ErrorCode> {
        let state = self.state.lock();
        if state.running {
            Ok(state)
        } else {
            Err(ErrorCode::NOT_CONNECTED)
        }
    }

    /// Waits on `condvar` until woken or `deadline`. Returns `false` once the
    /// deadline has passed.
    fn wait(
        condvar: &Condvar,
        state: &mut MutexGuard<'_, LoopbackState>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => !condvar.wait_until(state, deadline).timed_out(),
            None => {
                condvar.wait(state);
                true
            }
        }
    }
}

impl Default for LoopbackStack {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl Drop for LoopbackStack {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        debug!(
            discarded = state.queue.len(),
            dropped_interests = state.dropped,
            "loopback stack torn down"
        );
    }
}

impl PortalStack for LoopbackStack {
    fn start(&self) -> Result<(), ErrorCode> {
        let mut state = self.state.lock();
        if state.running {
            trace!("loopback stack already started");
        }
        state.running = true;
        Ok(())
    }

    fn stop(&self) -> Result<(), ErrorCode> {
        let mut state = self.state.lock();
        state.running = false;
        state.epoch += 1;
        drop(state);
        self.readable.notify_all();
        self.writable.notify_all();
        Ok(())
    }

    fn receive(&self, timeout: Timeout) -> Result<Message, ErrorCode> {
        let mut state = self.running()?;
        let epoch = state.epoch;
        let deadline = timeout.deadline();
        loop {
            if state.epoch != epoch {
                return Err(ErrorCode::NOT_CONNECTED);
            }
            if let Some(message) = state.queue.pop_front() {
                if state.logging {
                    debug!(kind = ?message.kind(), name = ?message.name(), "loopback delivered");
                }
                drop(state);
                self.writable.notify_one();
                return Ok(message);
            }
            if !Self::wait(&self.readable, &mut state, deadline) && state.queue.is_empty() {
                return Err(ErrorCode::TIMED_OUT);
            }
        }
    }

    fn send(&self, message: &Message, timeout: Timeout) -> Result<(), ErrorCode> {
        let mut state = self.running()?;

        if message.kind() == MessageKind::Interest
            && !state.prefixes.iter().any(|prefix| message.is_under(prefix))
        {
            state.dropped += 1;
            trace!(name = ?message.name(), "no listener for interest; dropped");
            return Ok(());
        }

        let epoch = state.epoch;
        let deadline = timeout.deadline();
        loop {
            if state.epoch != epoch {
                return Err(ErrorCode::NOT_CONNECTED);
            }
            if state.queue.len() < self.capacity {
                break;
            }
            if !Self::wait(&self.writable, &mut state, deadline)
                && state.queue.len() >= self.capacity
            {
                return Err(ErrorCode::TIMED_OUT);
            }
        }

        if state.logging {
            debug!(kind = ?message.kind(), name = ?message.name(), "loopback queued");
        }
        state.queue.push_back(message.clone());
        drop(state);
        self.readable.notify_one();
        Ok(())
    }

    fn listen(&self, name: &Name, _timeout: Timeout) -> Result<(), ErrorCode> {
        let mut state = self.running()?;
        if !state.prefixes.insert(name.clone()) {
            trace!(%name, "already listening");
        }
        Ok(())
    }

    fn ignore(&self, name: &Name, _timeout: Timeout) -> Result<(), ErrorCode> {
        let mut state = self.running()?;
        if state.prefixes.remove(name) {
            Ok(())
        } else {
            Err(ErrorCode::NOT_FOUND)
        }
    }

    fn file_id(&self) -> FileId {
        FileId::NOT_APPLICABLE
    }

    fn set_attributes(&self, attributes: &Attributes) -> Result<(), ErrorCode> {
        self.state.lock().logging = attributes.logging;
        Ok(())
    }

    fn attributes(&self) -> Option<Attributes> {
        None
    }
}
