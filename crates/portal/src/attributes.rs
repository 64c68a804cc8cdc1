//! The attributes value a portal owns and exchanges wholesale with callers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ErrorCode, FileId, KeyId};

/// Identity, last error and descriptor data for one portal.
///
/// A portal holds its attributes behind an `Arc`; `Portal::attributes` hands
/// out that live reference, so failures recorded after the call are still
/// visible through it. Cloning takes a snapshot of the error code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Identity of the key the portal acts under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<KeyId>,

    /// Descriptor advertised for readiness integration.
    #[serde(default)]
    pub file_id: FileId,

    /// Whether the backend should emit per-message logging.
    #[serde(default)]
    pub logging: bool,

    /// Backend-defined extension fields. The core carries these untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    error_code: ErrorSlot,
}

impl Attributes {
    /// Attributes carrying `key_id` and defaults for everything else.
    pub fn with_key_id(key_id: Option<KeyId>) -> Self {
        Self {
            key_id,
            ..Self::default()
        }
    }

    /// Sets whether the backend should log each message.
    #[must_use]
    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// The last error recorded against this value, or [`ErrorCode::NONE`].
    pub fn error_code(&self) -> ErrorCode {
        self.error_code.load()
    }

    /// Records `code` as the last error. Takes `&self` so a shared value can
    /// be updated in place.
    pub fn record_error(&self, code: ErrorCode) {
        self.error_code.store(code);
    }

    /// Looks up an extension field.
    pub fn extension(&self, name: &str) -> Option<&serde_json::Value> {
        self.extensions.get(name)
    }
}

// ---------------------------------------------------------------------------
// Error slot
// ---------------------------------------------------------------------------

/// Atomically updated errno value.
#[derive(Debug, Default)]
struct ErrorSlot(AtomicI32);

impl ErrorSlot {
    fn load(&self) -> ErrorCode {
        ErrorCode::from_raw(self.0.load(Ordering::Acquire))
    }

    fn store(&self, code: ErrorCode) {
        self.0.store(code.as_raw(), Ordering::Release);
    }
}

impl Clone for ErrorSlot {
    fn clone(&self) -> Self {
        Self(AtomicI32::new(self.load().as_raw()))
    }
}

impl PartialEq for ErrorSlot {
    fn eq(&self, other: &Self) -> bool {
        self.load() == other.load()
    }
}

impl Serialize for ErrorSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.load().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ErrorSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = ErrorCode::deserialize(deserializer)?;
        Ok(Self(AtomicI32::new(code.as_raw())))
    }
}
