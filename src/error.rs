//! Error type shared by the scheduler and the pollable-operation adapter.

use std::io;

use thiserror::Error;

/// Errors reported by the runtime.
///
/// Only [`Error::ContextSwitch`] is fatal to a run: once the context-transfer
/// primitive fails, the ring's notion of the current task can no longer be
/// trusted. Everything else is local to the spawn attempt or task that hit it.
#[derive(Debug, Error)]
pub enum Error {
    /// A task stack or destination buffer could not be allocated.
    #[error("failed to allocate {size} bytes")]
    Allocation {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// `getcontext` or `swapcontext` reported failure.
    #[error("context switch failed")]
    ContextSwitch(#[source] io::Error),

    /// A pollable operation completed with a non-success status.
    #[error("pollable operation failed with code {code}")]
    OperationFailed { code: i32 },

    /// Setup of a pollable operation failed (size query, submission).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true when the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ContextSwitch(_))
    }

    pub(crate) fn allocation(size: usize, source: io::Error) -> Self {
        Error::Allocation { size, source }
    }

    pub(crate) fn last_context_switch() -> Self {
        Error::ContextSwitch(io::Error::last_os_error())
    }
}
