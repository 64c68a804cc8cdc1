//! Portal stack core.
//!
//! A [`Portal`] is a uniform, reference-counted handle over "a network stack".
//! The caller sees one call surface (start, stop, send, receive, listen,
//! ignore, attribute and property access) while the factory decides, at
//! construction time, which backend sits behind it: a forwarder connection, a
//! direct socket, the in-process loopback, or a test double.
//!
//! ## Architectural Layer
//!
//! **Dispatch + lifecycle.** This crate has no transport code. It defines the
//! [`PortalStack`] interface backends implement, the values exchanged through
//! it, and the handle that shares one backend between owners and tears it
//! down exactly once.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`handle`] | The [`Portal`] handle |
//! | [`stack`] | The [`PortalStack`] backend interface and [`Operation`] names |
//! | [`binding`] | Slot-table backends built from closures |
//! | [`factory`] | [`PortalFactory`] and well-known property names |
//! | [`config`] | TOML factory configuration |
//! | [`attributes`] | The [`Attributes`] value each portal owns |
//! | [`identifiers`] | [`StackId`], [`KeyId`], [`Name`] |
//! | [`types`] | [`ErrorCode`], [`FileId`], [`Timeout`] |
//! | [`message`] | [`Message`] and [`MessageKind`] |
//! | [`properties`] | The [`Properties`] store |
//! | [`error`] | [`PortalError`] |

pub mod attributes;
pub mod binding;
pub mod config;
pub mod error;
pub mod factory;
pub mod handle;
pub mod identifiers;
pub mod message;
pub mod properties;
pub mod stack;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by backend crates.
pub use attributes::Attributes;
pub use binding::{Binding, BindingBuilder};
pub use config::PortalConfig;
pub use error::{PortalError, Result};
pub use factory::PortalFactory;
pub use handle::Portal;
pub use identifiers::{KeyId, Name, StackId};
pub use message::{Message, MessageKind};
pub use properties::Properties;
pub use stack::{Operation, PortalStack};
pub use types::{ErrorCode, FileId, Timeout};
