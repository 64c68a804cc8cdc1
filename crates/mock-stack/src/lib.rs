//! Scriptable test double for the portal's backend interface.
//!
//! [`mock_stack`] returns the backend, to be moved into a portal, and a
//! [`MockControl`] the test keeps. Through the control the test primes the
//! receive inbox, scripts failures per operation, and observes every call the
//! portal forwarded, including how many times the backend was torn down.
//!
//! ## Behaviour
//!
//! - Every operation is counted before anything else happens.
//! - A scripted failure for an operation is returned on every call until
//!   cleared.
//! - `receive` blocks until a message is pushed, the timeout elapses
//!   (`ETIMEDOUT`), or `stop` is called from another thread (`ENOTCONN`).
//! - `send` records a clone of the message on success only.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use portal::{Attributes, ErrorCode, FileId, Message, Name, Operation, PortalStack, Timeout};
use tracing::trace;

/// Creates a connected backend/control pair.
pub fn mock_stack() -> (MockStack, MockControl) {
    let shared = Arc::new(Shared::default());
    (
        MockStack {
            shared: Arc::clone(&shared),
        },
        MockControl { shared },
    )
}

#[derive(Default)]
struct Shared {
    calls: [AtomicUsize; 9],
    teardowns: AtomicUsize,
    state: Mutex<MockState>,
    arrived: Condvar,
}

struct MockState {
    failures: BTreeMap<Operation, ErrorCode>,
    inbox: VecDeque<Message>,
    sent: Vec<Message>,
    listening: Vec<Name>,
    accepted: Vec<Attributes>,
    refreshed: Option<Attributes>,
    file_id: FileId,
    stops: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            failures: BTreeMap::new(),
            inbox: VecDeque::new(),
            sent: Vec::new(),
            listening: Vec::new(),
            accepted: Vec::new(),
            refreshed: None,
            file_id: FileId::NOT_APPLICABLE,
            stops: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// The backend half. Move it into a portal.
pub struct MockStack {
    shared: Arc<Shared>,
}

impl MockStack {
    fn enter(&self, operation: Operation) -> Result<(), ErrorCode> {
        self.shared.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
        trace!(%operation, "mock stack call");
        match self.shared.state.lock().failures.get(&operation) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }
}

impl Drop for MockStack {
    fn drop(&mut self) {
        self.shared.teardowns.fetch_add(1, Ordering::SeqCst);
        trace!("mock stack torn down");
    }
}

impl PortalStack for MockStack {
    fn start(&self) -> Result<(), ErrorCode> {
        self.enter(Operation::Start)
    }

    fn stop(&self) -> Result<(), ErrorCode> {
        self.enter(Operation::Stop)?;
        self.shared.state.lock().stops += 1;
        self.shared.arrived.notify_all();
        Ok(())
    }

    fn receive(&self, timeout: Timeout) -> Result<Message, ErrorCode> {
        self.enter(Operation::Receive)?;
        let deadline = timeout.deadline();
        let mut state = self.shared.state.lock();
        let stops = state.stops;
        loop {
            if let Some(message) = state.inbox.pop_front() {
                return Ok(message);
            }
            if state.stops != stops {
                return Err(ErrorCode::NOT_CONNECTED);
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .arrived
                        .wait_until(&mut state, deadline)
                        .timed_out()
                        && state.inbox.is_empty()
                    {
                        return Err(ErrorCode::TIMED_OUT);
                    }
                }
                None => self.shared.arrived.wait(&mut state),
            }
        }
    }

    fn send(&self, message: &Message, _timeout: Timeout) -> Result<(), ErrorCode> {
        self.enter(Operation::Send)?;
        self.shared.state.lock().sent.push(message.clone());
        Ok(())
    }

    fn listen(&self, name: &Name, _timeout: Timeout) -> Result<(), ErrorCode> {
        self.enter(Operation::Listen)?;
        self.shared.state.lock().listening.push(name.clone());
        Ok(())
    }

    fn ignore(&self, name: &Name, _timeout: Timeout) -> Result<(), ErrorCode> {
        self.enter(Operation::Ignore)?;
        self.shared.state.lock().listening.retain(|n| n != name);
        Ok(())
    }

    fn file_id(&self) -> FileId {
        // A scripted failure has no channel here; the call is still counted.
        let _ = self.enter(Operation::GetFileId);
        self.shared.state.lock().file_id
    }

    fn set_attributes(&self, attributes: &Attributes) -> Result<(), ErrorCode> {
        self.enter(Operation::SetAttributes)?;
        self.shared.state.lock().accepted.push(attributes.clone());
        Ok(())
    }

    fn attributes(&self) -> Option<Attributes> {
        let _ = self.enter(Operation::GetAttributes);
        self.shared.state.lock().refreshed.clone()
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// The test's half: scripts behaviour and observes calls.
#[derive(Clone)]
pub struct MockControl {
    shared: Arc<Shared>,
}

impl MockControl {
    /// How many times `operation` was dispatched to the backend.
    pub fn calls(&self, operation: Operation) -> usize {
        self.shared.calls[operation.index()].load(Ordering::SeqCst)
    }

    /// How many times the backend was torn down. Never more than one.
    pub fn teardowns(&self) -> usize {
        self.shared.teardowns.load(Ordering::SeqCst)
    }

    /// Makes every later call to `operation` fail with `code`.
    pub fn fail(&self, operation: Operation, code: ErrorCode) {
        self.shared.state.lock().failures.insert(operation, code);
    }

    /// Removes a scripted failure.
    pub fn succeed(&self, operation: Operation) {
        self.shared.state.lock().failures.remove(&operation);
    }

    /// Queues `message` for the next `receive` and wakes a blocked receiver.
    pub fn push_message(&self, message: Message) {
        self.shared.state.lock().inbox.push_back(message);
        self.shared.arrived.notify_all();
    }

    /// Messages accepted by `send`, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.shared.state.lock().sent.clone()
    }

    /// Names currently registered through `listen` and not yet ignored.
    pub fn listening(&self) -> Vec<Name> {
        self.shared.state.lock().listening.clone()
    }

    /// Attributes values offered through `set_attributes` and accepted.
    pub fn accepted_attributes(&self) -> Vec<Attributes> {
        self.shared.state.lock().accepted.clone()
    }

    /// Sets what the backend hands back from its own attributes accessor.
    pub fn refresh_attributes(&self, attributes: Option<Attributes>) {
        self.shared.state.lock().refreshed = attributes;
    }

    /// Sets the descriptor the backend reports.
    pub fn set_file_id(&self, file_id: FileId) {
        self.shared.state.lock().file_id = file_id;
    }
}
