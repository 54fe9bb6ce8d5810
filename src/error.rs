//! Error types for the co-simulation core.
//!
//! Recoverable conditions (bootstrap I/O, configuration validation) flow through
//! [`SimError`]. Precondition violations — an exhausted fixed-size table, an
//! out-of-range index, a malformed scratch buffer — are programmer errors and
//! remain `panic!`, consistent with how the simulator must halt every peer the
//! instant one domain's invariants break rather than let it limp along on bad
//! state.

use thiserror::Error;

/// Result type alias for fallible core operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by the co-simulation core's recoverable paths.
#[derive(Error, Debug)]
pub enum SimError {
    /// I/O failure while opening, truncating, or mapping a shared-memory region.
    #[error("shared memory I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A client role gave up waiting for the master to create a shared region.
    #[error("timed out waiting for shared memory region {name:?} after {elapsed_millis} ms")]
    BootstrapTimeout {
        /// Name of the region the client was polling for.
        name: String,
        /// How long the client waited before giving up.
        elapsed_millis: u64,
    },

    /// A configuration value failed validation before a domain, channel, or
    /// sink was constructed.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of which value was rejected and why.
        message: String,
    },
}

impl SimError {
    /// Build an [`SimError::InvalidConfig`] from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Build an [`SimError::BootstrapTimeout`].
    pub fn bootstrap_timeout(name: impl Into<String>, elapsed_millis: u64) -> Self {
        Self::BootstrapTimeout { name: name.into(), elapsed_millis }
    }

    /// True if retrying the operation that produced this error might succeed
    /// without any change in caller behavior (currently only I/O errors).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Convenience macro for building [`SimError::InvalidConfig`] with a format string.
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::SimError::config(format!($($arg)*))
    };
}
