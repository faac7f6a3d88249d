//! Pollable operations.
//!
//! A pollable operation is started once and then asked for its status until
//! it settles. Nothing is pushed back to the runtime: the task that owns the
//! operation discovers completion by polling between cooperative yields (see
//! [`read_polled`]).
//!
//! - [`ReadFacility`]: starts reads and hands back a [`PendingOperation`]
//! - [`OpStatus`]: what a poll reports

pub mod read;

pub use read::{ReadRequest, read_polled};

use crate::error::Error;

use std::os::fd::RawFd;

/// Progress of a pollable operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpStatus {
    InProgress,
    /// Settled successfully, transferring this many bytes.
    Done(usize),
    /// Settled with an OS error code.
    Failed(i32),
}

impl OpStatus {
    pub fn is_in_progress(self) -> bool {
        matches!(self, OpStatus::InProgress)
    }
}

/// An operation in flight. Owns the buffer it transfers into.
pub trait PendingOperation {
    /// Reports progress. Once the operation has settled, every later call
    /// returns the same status.
    fn status(&mut self) -> OpStatus;

    /// Gives the buffer back, waiting for the operation to settle first if
    /// it hasn't yet.
    fn into_buffer(self) -> Vec<u8>;
}

/// Something that can start non-blocking reads.
pub trait ReadFacility {
    type Pending: PendingOperation;

    /// Starts reading `buffer.len()` bytes from `fd` at `offset`.
    fn begin(&self, fd: RawFd, buffer: Vec<u8>, offset: u64) -> Result<Self::Pending, Error>;
}
