//! Slot-table construction of a backend.
//!
//! Some backends are easier to express as a piece of private state plus a
//! closure per operation than as a dedicated type. [`BindingBuilder`] collects
//! those closures, checks that all nine are present, and yields a [`Binding`]
//! that implements [`PortalStack`] like any other variant. The table is fixed
//! once built.

use tracing::debug;

use crate::{
    Attributes, ErrorCode, FileId, Message, Name, Operation, PortalError, PortalStack, Result,
    Timeout,
};

type Control<S> = Box<dyn Fn(&S) -> std::result::Result<(), ErrorCode> + Send + Sync>;
type Receive<S> = Box<dyn Fn(&S, Timeout) -> std::result::Result<Message, ErrorCode> + Send + Sync>;
type Transmit<S> =
    Box<dyn Fn(&S, &Message, Timeout) -> std::result::Result<(), ErrorCode> + Send + Sync>;
type Register<S> =
    Box<dyn Fn(&S, &Name, Timeout) -> std::result::Result<(), ErrorCode> + Send + Sync>;
type GetFileId<S> = Box<dyn Fn(&S) -> FileId + Send + Sync>;
type SetAttributes<S> =
    Box<dyn Fn(&S, &Attributes) -> std::result::Result<(), ErrorCode> + Send + Sync>;
type GetAttributes<S> = Box<dyn Fn(&S) -> Option<Attributes> + Send + Sync>;
type Teardown<S> = Box<dyn FnOnce(&mut S) + Send + Sync>;

/// Collects private state, operation slots and a teardown hook.
pub struct BindingBuilder<S> {
    state: S,
    start: Option<Control<S>>,
    stop: Option<Control<S>>,
    receive: Option<Receive<S>>,
    send: Option<Transmit<S>>,
    listen: Option<Register<S>>,
    ignore: Option<Register<S>>,
    file_id: Option<GetFileId<S>>,
    set_attributes: Option<SetAttributes<S>>,
    get_attributes: Option<GetAttributes<S>>,
    teardown: Option<Teardown<S>>,
}

impl<S: Send + Sync + 'static> BindingBuilder<S> {
    /// Starts a binding around `state`. Every slot is empty.
    pub fn new(state: S) -> Self {
        Self {
            state,
            start: None,
            stop: None,
            receive: None,
            send: None,
            listen: None,
            ignore: None,
            file_id: None,
            set_attributes: None,
            get_attributes: None,
            teardown: None,
        }
    }

    /// Fills the `start` slot.
    #[must_use]
    pub fn start(
        mut self,
        f: impl Fn(&S) -> std::result::Result<(), ErrorCode> + Send + Sync + 'static,
    ) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    /// Fills the `stop` slot.
    #[must_use]
    pub fn stop(
        mut self,
        f: impl Fn(&S) -> std::result::Result<(), ErrorCode> + Send + Sync + 'static,
    ) -> Self {
        self.stop = Some(Box::new(f));
        self
    }

    /// Fills the `receive` slot.
    #[must_use]
    pub fn receive(
        mut self,
        f: impl Fn(&S, Timeout) -> std::result::Result<Message, ErrorCode> + Send + Sync + 'static,
    ) -> Self {
        self.receive = Some(Box::new(f));
        self
    }

    /// Fills the `send` slot.
    #[must_use]
    pub fn send(
        mut self,
        f: impl Fn(&S, &Message, Timeout) -> std::result::Result<(), ErrorCode>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.send = Some(Box::new(f));
        self
    }

    /// Fills the `listen` slot.
    #[must_use]
    pub fn listen(
        mut self,
        f: impl Fn(&S, &Name, Timeout) -> std::result::Result<(), ErrorCode>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.listen = Some(Box::new(f));
        self
    }

    /// Fills the `ignore` slot.
    #[must_use]
    pub fn ignore(
        mut self,
        f: impl Fn(&S, &Name, Timeout) -> std::result::Result<(), ErrorCode>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.ignore = Some(Box::new(f));
        self
    }

    /// Fills the `file_id` slot.
    #[must_use]
    pub fn file_id(mut self, f: impl Fn(&S) -> FileId + Send + Sync + 'static) -> Self {
        self.file_id = Some(Box::new(f));
        self
    }

    /// Fills the `set_attributes` slot.
    #[must_use]
    pub fn set_attributes(
        mut self,
        f: impl Fn(&S, &Attributes) -> std::result::Result<(), ErrorCode> + Send + Sync + 'static,
    ) -> Self {
        self.set_attributes = Some(Box::new(f));
        self
    }

    /// Fills the `attributes` slot.
    #[must_use]
    pub fn get_attributes(
        mut self,
        f: impl Fn(&S) -> Option<Attributes> + Send + Sync + 'static,
    ) -> Self {
        self.get_attributes = Some(Box::new(f));
        self
    }

    /// Hook run exactly once, with the private state, when the binding is
    /// dropped. Optional: without it the state is simply dropped.
    #[must_use]
    pub fn teardown(mut self, f: impl FnOnce(&mut S) + Send + Sync + 'static) -> Self {
        self.teardown = Some(Box::new(f));
        self
    }

    /// Validates the slot table.
    ///
    /// # Errors
    ///
    /// [`PortalError::MissingOperation`] naming the first empty slot in
    /// [`Operation::ALL`] order. The state is dropped without running the
    /// teardown hook, since the backend never came into service.
    pub fn build(self) -> Result<Binding<S>> {
        let missing = |operation: Operation| {
            debug!(%operation, "rejecting binding with empty slot");
            PortalError::MissingOperation { operation }
        };

        let Some(start) = self.start else {
            return Err(missing(Operation::Start));
        };
        let Some(stop) = self.stop else {
            return Err(missing(Operation::Stop));
        };
        let Some(receive) = self.receive else {
            return Err(missing(Operation::Receive));
        };
        let Some(send) = self.send else {
            return Err(missing(Operation::Send));
        };
        let Some(listen) = self.listen else {
            return Err(missing(Operation::Listen));
        };
        let Some(ignore) = self.ignore else {
            return Err(missing(Operation::Ignore));
        };
        let Some(file_id) = self.file_id else {
            return Err(missing(Operation::GetFileId));
        };
        let Some(set_attributes) = self.set_attributes else {
            return Err(missing(Operation::SetAttributes));
        };
        let Some(get_attributes) = self.get_attributes else {
            return Err(missing(Operation::GetAttributes));
        };

        Ok(Binding {
            state: self.state,
            table: DispatchTable {
                start,
                stop,
                receive,
                send,
                listen,
                ignore,
                file_id,
                set_attributes,
                get_attributes,
            },
            teardown: self.teardown,
        })
    }
}

struct DispatchTable<S> {
    start: Control<S>,
    stop: Control<S>,
    receive: Receive<S>,
    send: Transmit<S>,
    listen: Register<S>,
    ignore: Register<S>,
    file_id: GetFileId<S>,
    set_attributes: SetAttributes<S>,
    get_attributes: GetAttributes<S>,
}

/// A validated slot table bound to its private state.
pub struct Binding<S> {
    state: S,
    table: DispatchTable<S>,
    teardown: Option<Teardown<S>>,
}

impl<S> Drop for Binding<S> {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown(&mut self.state);
        }
    }
}

impl<S: Send + Sync + 'static> PortalStack for Binding<S> {
    fn start(&self) -> std::result::Result<(), ErrorCode> {
        (self.table.start)(&self.state)
    }

    fn stop(&self) -> std::result::Result<(), ErrorCode> {
        (self.table.stop)(&self.state)
    }

    fn receive(&self, timeout: Timeout) -> std::result::Result<Message, ErrorCode> {
        (self.table.receive)(&self.state, timeout)
    }

    fn send(&self, message: &Message, timeout: Timeout) -> std::result::Result<(), ErrorCode> {
        (self.table.send)(&self.state, message, timeout)
    }

    fn listen(&self, name: &Name, timeout: Timeout) -> std::result::Result<(), ErrorCode> {
        (self.table.listen)(&self.state, name, timeout)
    }

    fn ignore(&self, name: &Name, timeout: Timeout) -> std::result::Result<(), ErrorCode> {
        (self.table.ignore)(&self.state, name, timeout)
    }

    fn file_id(&self) -> FileId {
        (self.table.file_id)(&self.state)
    }

    fn set_attributes(&self, attributes: &Attributes) -> std::result::Result<(), ErrorCode> {
        (self.table.set_attributes)(&self.state, attributes)
    }

    fn attributes(&self) -> Option<Attributes> {
        (self.table.get_attributes)(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn complete(state: Arc<AtomicUsize>) -> BindingBuilder<Arc<AtomicUsize>> {
        BindingBuilder::new(state)
            .start(|s| {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .stop(|_| Ok(()))
            .receive(|_, _| Err(ErrorCode::TIMED_OUT))
            .send(|_, _, _| Err(ErrorCode::BROKEN_PIPE))
            .listen(|_, _, _| Ok(()))
            .ignore(|_, _, _| Err(ErrorCode::NOT_FOUND))
            .file_id(|_| FileId::from_raw(7))
            .set_attributes(|_, _| Ok(()))
            .get_attributes(|_| None)
    }

    #[test]
    fn complete_table_dispatches_to_slots() {
        let counter = Arc::new(AtomicUsize::new(0));
        let binding = complete(Arc::clone(&counter)).build().unwrap();

        binding.start().unwrap();
        binding.start().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(binding.receive(Timeout::IMMEDIATE), Err(ErrorCode::TIMED_OUT));
        assert_eq!(binding.file_id(), FileId::from_raw(7));
        assert_eq!(
            binding.ignore(&Name::root(), Timeout::Never),
            Err(ErrorCode::NOT_FOUND)
        );
    }

    #[test]
    fn first_missing_slot_is_reported() {
        let err = BindingBuilder::new(())
            .start(|_| Ok(()))
            .stop(|_| Ok(()))
            .receive(|_, _| Err(ErrorCode::TIMED_OUT))
            .listen(|_, _, _| Ok(()))
            .build()
            .err()
            .unwrap();

        assert_eq!(
            err,
            PortalError::MissingOperation {
                operation: Operation::Send
            }
        );
        assert_eq!(err.code(), ErrorCode::INVALID_ARGUMENT);
    }

    #[test]
    fn empty_builder_reports_start() {
        let err = BindingBuilder::new(()).build().err().unwrap();
        assert_eq!(
            err,
            PortalError::MissingOperation {
                operation: Operation::Start
            }
        );
    }

    #[test]
    fn teardown_runs_once_on_drop() {
        let torn_down = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&torn_down);
        let binding = complete(Arc::new(AtomicUsize::new(0)))
            .teardown(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        assert_eq!(torn_down.load(Ordering::SeqCst), 0);
        drop(binding);
        assert_eq!(torn_down.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_builder_skips_teardown() {
        let torn_down = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&torn_down);
        let result = BindingBuilder::new(())
            .teardown(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert!(result.is_err());
        assert_eq!(torn_down.load(Ordering::SeqCst), 0);
    }
}
