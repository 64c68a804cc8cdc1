//! Shared value types threaded through every portal call.
//!
//! Unlike the identifiers in [`crate::identifiers`], these carry values the
//! core acts on: the error code it records, the descriptor sentinel it forwards,
//! and the timeout that bounds every potentially blocking operation.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// A code from the host platform's errno domain.
///
/// Backends report failures with these codes and the portal records them
/// verbatim; there is no taxonomy beyond the number itself. The named
/// constants are the codes backends commonly report. Any other value a backend
/// chooses is passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(i32);

impl ErrorCode {
    /// No error has been recorded.
    pub const NONE: Self = Self(0);
    /// `EINVAL`: a caller-supplied value or a binding was unusable.
    pub const INVALID_ARGUMENT: Self = Self(libc::EINVAL);
    /// `ENOENT`: the named registration does not exist.
    pub const NOT_FOUND: Self = Self(libc::ENOENT);
    /// `EIO`: generic transport failure.
    pub const IO: Self = Self(libc::EIO);
    /// `EPIPE`: the peer side has gone away.
    pub const BROKEN_PIPE: Self = Self(libc::EPIPE);
    /// `ENOTSUP`: the backend does not implement this operation.
    pub const NOT_SUPPORTED: Self = Self(libc::ENOTSUP);
    /// `ENOTCONN`: the stack is not started, or was stopped during the call.
    pub const NOT_CONNECTED: Self = Self(libc::ENOTCONN);
    /// `ETIMEDOUT`: the supplied timeout elapsed before the operation completed.
    pub const TIMED_OUT: Self = Self(libc::ETIMEDOUT);

    /// Wraps a raw errno value.
    pub const fn from_raw(code: i32) -> Self {
        Self(code)
    }

    /// Returns the raw errno value.
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Returns `true` for [`ErrorCode::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("no error");
        }
        write!(
            f,
            "{} (errno {})",
            std::io::Error::from_raw_os_error(self.0),
            self.0
        )
    }
}

impl From<&std::io::Error> for ErrorCode {
    /// Uses the OS code when there is one, otherwise `EIO`.
    fn from(err: &std::io::Error) -> Self {
        err.raw_os_error().map_or(Self::IO, Self)
    }
}

impl From<std::io::Error> for ErrorCode {
    fn from(err: std::io::Error) -> Self {
        Self::from(&err)
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Descriptor a backend exposes for integration with an external readiness
/// mechanism (`poll`, `epoll`, an event loop).
///
/// Backends without a descriptor report [`FileId::NOT_APPLICABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i32);

impl FileId {
    /// Sentinel for "this backend has no descriptor".
    pub const NOT_APPLICABLE: Self = Self(-1);

    /// Wraps a raw descriptor. Negative values all mean not applicable.
    pub const fn from_raw(fd: i32) -> Self {
        Self(fd)
    }

    /// Returns the raw descriptor value.
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Returns `true` if this is a usable (non-negative) descriptor.
    pub const fn is_applicable(self) -> bool {
        self.0 >= 0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::NOT_APPLICABLE
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_applicable() {
            write!(f, "fd {}", self.0)
        } else {
            f.write_str("n/a")
        }
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// How long a potentially blocking operation may wait.
///
/// Passed by value into `send`, `receive`, `listen` and `ignore`. For
/// `listen`/`ignore` it bounds only the registration round-trip, never how long
/// the resulting subscription stays active; backends decide whether they wait
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Wait until the operation completes or the backend is stopped.
    Never,
    /// Wait at most this long.
    After(Duration),
}

impl Timeout {
    /// Do not wait: fail at once if the operation cannot complete now.
    pub const IMMEDIATE: Self = Self::After(Duration::ZERO);

    /// A bounded timeout in microseconds.
    pub const fn from_micros(micros: u64) -> Self {
        Self::After(Duration::from_micros(micros))
    }

    /// A bounded timeout in milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self::After(Duration::from_millis(millis))
    }

    /// Returns `true` for the unbounded sentinel.
    pub const fn is_never(self) -> bool {
        matches!(self, Self::Never)
    }

    /// Returns the bounded duration, or `None` for [`Timeout::Never`].
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::After(d) => Some(d),
        }
    }

    /// Converts the timeout into an absolute deadline measured from now.
    ///
    /// `None` means wait without a deadline. A duration too large to represent
    /// as an [`Instant`] is treated as unbounded.
    pub fn deadline(self) -> Option<Instant> {
        self.duration().and_then(|d| Instant::now().checked_add(d))
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    /// `None` maps to [`Timeout::Never`].
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Self::Never, Self::After)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::After(d) => write!(f, "{}us", d.as_micros()),
        }
    }
}
