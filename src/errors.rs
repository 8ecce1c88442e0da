//! Error types.
//!
//! The scheduler is a panic-on-violation subsystem: contract breaches
//! (blocking in interrupt context, unblocking a runnable thread, a
//! corrupted control block) abort with a diagnostic. Only resource
//! exhaustion is reported to the caller, and only from thread creation.

use core::fmt;

/// Result alias for thread creation.
pub type SpawnResult<T> = Result<T, SpawnError>;

/// Why a thread could not be created. The caller's state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The stack page allocator is exhausted.
    OutOfMemory,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::OutOfMemory => write!(f, "out of memory for thread stack"),
        }
    }
}
