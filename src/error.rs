//! Error types for peer socket I/O and configuration.

use std::{error, fmt, io, result};

/// Creates a [`crate::Error::Io`] with a custom message prefixed to the current
/// `errno` value.
macro_rules! errno {
    ($($arg:tt)+) => {{
        let errno = ::std::io::Error::last_os_error();
        let prefix = format!($($arg)+);
        let msg = format!("{prefix}: {errno}");
        $crate::Error::Io(::std::io::Error::new(errno.kind(), msg))
    }};
}
pub(crate) use errno;

/// A convenience wrapper around `Result` for [crate::Error].
pub type Result<T> = result::Result<T, Error>;

/// Represents errors that can occur while moving bytes through a peer socket
/// or configuring one.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The transport reported a failure.
    ///
    /// Errors originating from the OS or the uTP library keep their raw error
    /// code, see [io::Error::raw_os_error].
    Io(io::Error),
    /// Invalid socket configuration.
    Config(ConfigError),
}

impl Error {
    /// Returns the raw platform error code carried by this error, if any.
    pub fn code(&self) -> Option<i32> {
        match *self {
            Error::Io(ref e) => e.raw_os_error(),
            Error::Config(_) => None,
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Error {
        Error::Config(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref e) => fmt::Display::fmt(e, f),
            Error::Config(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

/// Represents errors that can occur when building a [crate::NetConfig].
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// The type-of-service value is neither a known name nor a number in the
    /// range `0..=255`.
    InvalidTos(String),
    /// The congestion control algorithm name is empty.
    EmptyCongestionAlgorithm,
    /// The congestion control algorithm name contains a null (`\0`) byte.
    NulInCongestionAlgorithm,
    /// The congestion control algorithm name does not fit `TCP_CA_NAME_MAX`.
    CongestionAlgorithmTooLong {
        /// The length of the name provided.
        provided: usize,
        /// The maximum length allowed by the kernel.
        max: usize,
    },
}

impl error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConfigError::InvalidTos(ref value) => {
                write!(
                    f,
                    "invalid type-of-service: {value:?} (expected a name or a value in 0..=255)"
                )
            }
            ConfigError::EmptyCongestionAlgorithm => {
                write!(f, "invalid congestion control algorithm: name is empty")
            }
            ConfigError::NulInCongestionAlgorithm => {
                write!(
                    f,
                    "invalid congestion control algorithm: name contains a null byte"
                )
            }
            ConfigError::CongestionAlgorithmTooLong { provided, max } => {
                write!(
                    f,
                    "invalid congestion control algorithm: {provided} bytes (exceeds maximum allowed {max} bytes)"
                )
            }
        }
    }
}

/// Resets the calling thread's `errno` to zero.
///
/// The uTP library reports failures through `errno` without a distinct
/// return value, so it must be cleared before each call that is inspected.
pub(crate) fn clear_errno() {
    set_errno(0);
}

/// Sets the calling thread's `errno`.
pub(crate) fn set_errno(code: i32) {
    // SAFETY: `__errno_location` always returns a valid pointer to the
    // thread-local `errno`.
    unsafe { *libc::__errno_location() = code };
}

/// Returns the calling thread's current `errno`.
pub(crate) fn last_errno() -> i32 {
    // SAFETY: see `set_errno`.
    unsafe { *libc::__errno_location() }
}
