//! The portal handle: a shared, reference-counted front for one backend.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::{
    Attributes, BindingBuilder, ErrorCode, FileId, KeyId, Message, Name, Operation, PortalError,
    PortalStack, Properties, Result, StackId, Timeout,
};

/// A client's point of contact with a backend stack.
///
/// Every reference to the same portal is an owner of it. [`Portal::acquire`]
/// (or `clone`) adds an owner; [`Portal::release`] (or dropping) removes one.
/// When the last owner goes away the backend is torn down exactly once, then
/// the held attributes are dropped.
///
/// Calls are forwarded to the backend without any state checks: the portal
/// does not track whether it was started. Failures come back as
/// [`PortalError::Stack`] carrying the backend's code, which is also recorded
/// as the last error and readable through [`Portal::error_code`].
pub struct Portal {
    inner: Arc<PortalInner>,
}

// Field order is drop order: the backend is torn down before the attributes
// it may still reference are released.
struct PortalInner {
    id: StackId,
    stack: Box<dyn PortalStack>,
    attributes: RwLock<Arc<Attributes>>,
    properties: Arc<Properties>,
    // Held across an attributes offer and the swap that follows it.
    exchange: Mutex<()>,
}

impl Drop for PortalInner {
    fn drop(&mut self) {
        debug!(stack = %self.id, "tearing down portal stack");
    }
}

impl Portal {
    /// Binds `stack` into a new portal with a single owner.
    ///
    /// No backend operation runs here; the first call the backend sees is
    /// whatever the caller issues next, normally [`Portal::start`].
    pub fn new(
        stack: impl PortalStack,
        attributes: Attributes,
        properties: Arc<Properties>,
    ) -> Self {
        let id = StackId::new_random();
        debug!(stack = %id, key_id = ?attributes.key_id, "created portal stack");
        Self {
            inner: Arc::new(PortalInner {
                id,
                stack: Box::new(stack),
                attributes: RwLock::new(Arc::new(attributes)),
                properties,
                exchange: Mutex::new(()),
            }),
        }
    }

    /// Validates a slot-table binding and wraps it in a new portal.
    ///
    /// # Errors
    ///
    /// [`PortalError::MissingOperation`] if any of the nine slots is empty.
    pub fn create<S: Send + Sync + 'static>(
        binding: BindingBuilder<S>,
        attributes: Attributes,
        properties: Arc<Properties>,
    ) -> Result<Self> {
        let binding = binding.build()?;
        Ok(Self::new(binding, attributes, properties))
    }

    /// Adds an owner and returns the new reference.
    #[must_use]
    pub fn acquire(&self) -> Self {
        let portal = Self {
            inner: Arc::clone(&self.inner),
        };
        debug!(stack = %self.inner.id, refs = portal.reference_count(), "acquired portal");
        portal
    }

    /// Gives up this reference. Tears the backend down if it was the last.
    pub fn release(self) {
        let id = self.inner.id;
        match Arc::into_inner(self.inner) {
            Some(inner) => {
                drop(inner);
                debug!(stack = %id, "released last portal reference");
            }
            None => trace!(stack = %id, "released portal reference"),
        }
    }

    /// Number of live references. Only a snapshot while other threads hold
    /// references.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns `true` if both references point at the same portal.
    pub fn same_portal(&self, other: &Portal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Identifier attached to this portal's log events.
    pub fn id(&self) -> StackId {
        self.inner.id
    }

    // -----------------------------------------------------------------------
    // Run control and I/O
    // -----------------------------------------------------------------------

    /// Starts the backend. Each call is dispatched; repeated starts are not
    /// suppressed here.
    pub fn start(&self) -> Result<()> {
        self.dispatch(Operation::Start, |stack| stack.start())?;
        debug!(stack = %self.inner.id, "portal stack started");
        Ok(())
    }

    /// Stops the backend. Backends use this to wake a blocked [`Portal::receive`].
    pub fn stop(&self) -> Result<()> {
        self.dispatch(Operation::Stop, |stack| stack.stop())?;
        debug!(stack = %self.inner.id, "portal stack stopped");
        Ok(())
    }

    /// Sends `message`, blocking for at most `timeout`.
    ///
    /// `message` is only borrowed, so it is still the caller's on both success
    /// and failure.
    pub fn send(&self, message: &Message, timeout: Timeout) -> Result<()> {
        self.dispatch(Operation::Send, |stack| stack.send(message, timeout))
    }

    /// Blocks until a message arrives, `timeout` elapses, or the backend is
    /// stopped from another thread.
    ///
    /// There is no other way to cancel a pending receive. Check
    /// [`PortalError::is_timeout`] (or [`Portal::error_code`]) to tell an
    /// expired wait from a real failure.
    pub fn receive(&self, timeout: Timeout) -> Result<Message> {
        self.dispatch(Operation::Receive, |stack| stack.receive(timeout))
    }

    /// Registers interest in messages under `name`.
    ///
    /// `timeout` bounds only how long this registration call may block. The
    /// lifetime of the subscription is up to the backend and lasts until a
    /// matching [`Portal::ignore`] or teardown.
    pub fn listen(&self, name: &Name, timeout: Timeout) -> Result<()> {
        self.dispatch(Operation::Listen, |stack| stack.listen(name, timeout))
    }

    /// Withdraws interest in `name`. `timeout` bounds the withdrawal call.
    pub fn ignore(&self, name: &Name, timeout: Timeout) -> Result<()> {
        self.dispatch(Operation::Ignore, |stack| stack.ignore(name, timeout))
    }

    /// The backend's readiness descriptor, or [`FileId::NOT_APPLICABLE`].
    pub fn file_id(&self) -> FileId {
        trace!(stack = %self.inner.id, operation = %Operation::GetFileId, "dispatch");
        self.inner.stack.file_id()
    }

    // -----------------------------------------------------------------------
    // Attributes and properties
    // -----------------------------------------------------------------------

    /// Offers `attributes` to the backend and, if accepted, makes them the
    /// held value. The previously held value is dropped once no caller still
    /// holds it. The last error code carries over into the new value.
    ///
    /// Concurrent exchanges are serialised, so the value the backend last
    /// accepted is always the value the portal holds.
    ///
    /// # Errors
    ///
    /// The backend's veto as [`PortalError::Stack`]; the held value is then
    /// left untouched.
    pub fn set_attributes(&self, attributes: Attributes) -> Result<()> {
        let _exchange = self.inner.exchange.lock();
        self.dispatch(Operation::SetAttributes, |stack| stack.set_attributes(&attributes))?;
        self.install(attributes);
        Ok(())
    }

    /// The held attributes, refreshed from the backend first if it offers a
    /// newer value. A refreshed value keeps the last error code.
    ///
    /// The returned `Arc` is a live reference: its error code follows later
    /// failures until the value is replaced.
    pub fn attributes(&self) -> Arc<Attributes> {
        let _exchange = self.inner.exchange.lock();
        trace!(stack = %self.inner.id, operation = %Operation::GetAttributes, "dispatch");
        match self.inner.stack.attributes() {
            Some(fresh) => self.install(fresh),
            None => Arc::clone(&self.inner.attributes.read()),
        }
    }

    /// Key identity from the held attributes.
    pub fn key_id(&self) -> Option<KeyId> {
        self.inner.attributes.read().key_id.clone()
    }

    /// The last error any call on this portal recorded. Not cleared by a
    /// later success.
    pub fn error_code(&self) -> ErrorCode {
        self.inner.attributes.read().error_code()
    }

    /// The factory's property store.
    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    /// Looks up `name` in the property store, returning `default` exactly
    /// when it is absent.
    pub fn property<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.inner.properties.get_or(name, default)
    }

    fn install(&self, attributes: Attributes) -> Arc<Attributes> {
        let mut held = self.inner.attributes.write();
        attributes.record_error(held.error_code());
        let installed = Arc::new(attributes);
        let previous = std::mem::replace(&mut *held, Arc::clone(&installed));
        drop(held);
        drop(previous);
        installed
    }

    fn dispatch<T>(
        &self,
        operation: Operation,
        call: impl FnOnce(&dyn PortalStack) -> std::result::Result<T, ErrorCode>,
    ) -> Result<T> {
        trace!(stack = %self.inner.id, %operation, "dispatch");
        call(self.inner.stack.as_ref()).map_err(|code| {
            self.inner.attributes.read().record_error(code);
            if code == ErrorCode::TIMED_OUT {
                debug!(stack = %self.inner.id, %operation, %code, "stack call timed out");
            } else {
                warn!(stack = %self.inner.id, %operation, %code, "stack reported failure");
            }
            PortalError::Stack { operation, code }
        })
    }
}

impl Clone for Portal {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portal")
            .field("id", &self.inner.id)
            .field("references", &self.reference_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    struct Counters {
        starts: AtomicUsize,
        teardowns: Arc<AtomicUsize>,
    }

    fn counting_portal(teardowns: Arc<AtomicUsize>) -> Portal {
        let state = Counters {
            starts: AtomicUsize::new(0),
            teardowns,
        };
        let binding = BindingBuilder::new(state)
            .start(|s| {
                s.starts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .stop(|_| Ok(()))
            .receive(|_, _| Err(ErrorCode::TIMED_OUT))
            .send(|_, _, _| Err(ErrorCode::BROKEN_PIPE))
            .listen(|_, _, _| Ok(()))
            .ignore(|_, _, _| Ok(()))
            .file_id(|_| FileId::NOT_APPLICABLE)
            .set_attributes(|_, a| {
                if a.logging {
                    Err(ErrorCode::NOT_SUPPORTED)
                } else {
                    Ok(())
                }
            })
            .get_attributes(|_| None)
            .teardown(|s| {
                s.teardowns.fetch_add(1, Ordering::SeqCst);
            });
        Portal::create(binding, Attributes::default(), Arc::new(Properties::new())).unwrap()
    }

    #[test]
    fn acquire_shares_identity_and_count() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let portal = counting_portal(Arc::clone(&teardowns));
        assert_eq!(portal.reference_count(), 1);

        let alias = portal.acquire();
        assert!(alias.same_portal(&portal));
        assert_eq!(alias.id(), portal.id());
        assert_eq!(portal.reference_count(), 2);

        alias.release();
        assert_eq!(portal.reference_count(), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);

        portal.release();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_recorded_as_last_error() {
        let portal = counting_portal(Arc::new(AtomicUsize::new(0)));
        assert_eq!(portal.error_code(), ErrorCode::NONE);

        let err = portal
            .send(&Message::control(&b"x"[..]), Timeout::Never)
            .unwrap_err();
        assert_eq!(
            err,
            PortalError::Stack {
                operation: Operation::Send,
                code: ErrorCode::BROKEN_PIPE
            }
        );
        assert_eq!(portal.error_code(), ErrorCode::BROKEN_PIPE);

        portal.start().unwrap();
        assert_eq!(portal.error_code(), ErrorCode::BROKEN_PIPE);
    }

    #[test]
    fn receive_timeout_is_distinguishable() {
        let portal = counting_portal(Arc::new(AtomicUsize::new(0)));
        let err = portal.receive(Timeout::IMMEDIATE).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(portal.error_code(), ErrorCode::TIMED_OUT);
    }

    #[test]
    fn vetoed_attributes_are_not_swapped() {
        let portal = counting_portal(Arc::new(AtomicUsize::new(0)));
        let before = portal.attributes();

        let rejected = Attributes::default().with_logging(true);
        assert!(portal.set_attributes(rejected).is_err());
        assert!(Arc::ptr_eq(&before, &portal.attributes()));
        assert_eq!(before.error_code(), ErrorCode::NOT_SUPPORTED);
    }

    #[test]
    fn concurrent_attribute_exchanges_agree_with_backend() {
        // Offers with logging on are slow to accept.
        let binding = BindingBuilder::new(Mutex::new(None::<KeyId>))
            .start(|_| Ok(()))
            .stop(|_| Ok(()))
            .receive(|_, _| Err(ErrorCode::TIMED_OUT))
            .send(|_, _, _| Ok(()))
            .listen(|_, _, _| Ok(()))
            .ignore(|_, _, _| Ok(()))
            .file_id(|_| FileId::NOT_APPLICABLE)
            .set_attributes(|accepted, a| {
                if a.logging {
                    std::thread::sleep(Duration::from_millis(200));
                }
                *accepted.lock() = a.key_id.clone();
                Ok(())
            })
            .get_attributes(|_| None);
        let accepted = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&accepted);
        let portal = Portal::create(
            binding.teardown(move |state| *seen.lock() = state.get_mut().clone()),
            Attributes::default(),
            Arc::new(Properties::new()),
        )
        .unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                let slow = Attributes::with_key_id(KeyId::from_hex("aa")).with_logging(true);
                portal.set_attributes(slow).unwrap();
            });
            std::thread::sleep(Duration::from_millis(50));
            s.spawn(|| {
                let fast = Attributes::with_key_id(KeyId::from_hex("bb"));
                portal.set_attributes(fast).unwrap();
            });
        });

        let held = portal.key_id();
        portal.release();
        assert_eq!(*accepted.lock(), held);
    }

    #[test]
    fn file_id_is_forwarded() {
        let portal = counting_portal(Arc::new(AtomicUsize::new(0)));
        assert_eq!(portal.file_id(), FileId::NOT_APPLICABLE);
    }

    #[test]
    fn dropping_clones_tears_down_once() {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let portal = counting_portal(Arc::clone(&teardowns));
        let clones: Vec<Portal> = (0..4).map(|_| portal.clone()).collect();
        drop(portal);
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);
        drop(clones);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }
}
