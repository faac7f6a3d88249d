//! Reading through a pollable facility from inside a task.
//!
//! [`read_polled`] is meant to be the tail of a task body: it gives sibling
//! tasks a turn at each setup step, spins on the operation's status with a
//! yield between polls, and ends the calling task once the read settles.

use crate::error::Error;
use crate::fs::file::file_size;
use crate::poll::{OpStatus, PendingOperation, ReadFacility};
use crate::runtime::Scheduler;

use std::io;
use std::os::fd::RawFd;

/// What to read.
#[derive(Clone, Copy, Debug)]
pub struct ReadRequest {
    pub fd: RawFd,
    pub offset: u64,
    /// Bytes to read. `None` reads from `offset` to the end of the file, as
    /// reported by `fstat` when the request starts.
    pub len: Option<usize>,
}

impl ReadRequest {
    pub fn new(fd: RawFd, offset: u64, len: usize) -> Self {
        Self {
            fd,
            offset,
            len: Some(len),
        }
    }

    /// Reads everything from `offset` to the end of the file.
    pub fn to_end(fd: RawFd, offset: u64) -> Self {
        Self {
            fd,
            offset,
            len: None,
        }
    }
}

/// Reads `request` through `facility`, yielding cooperatively while the
/// operation is in flight.
///
/// Setup failures (the size can't be determined, the buffer can't be
/// allocated, the read can't be submitted) return early without yielding
/// again and leave the task running; the runtime ends it when the body
/// returns. Once the read settles the task is ended here, before the result
/// is returned, so the caller should return promptly afterwards.
///
/// # Errors
/// - [`Error::Io`] when the size query or submission fails.
/// - [`Error::Allocation`] when the destination buffer can't be allocated.
/// - [`Error::OperationFailed`] when the read itself reports an error.
/// - [`Error::ContextSwitch`] when a yield fails.
///
/// # Example
/// ```ignore
/// rt.spawn(move |scheduler| {
///     let bytes = read_polled(scheduler, &PosixAio, ReadRequest::new(fd, 0, 1024))?;
///     println!("read {} bytes", bytes.len());
///     Ok(())
/// })?;
/// ```
pub fn read_polled<F>(
    scheduler: &Scheduler,
    facility: &F,
    request: ReadRequest,
) -> Result<Vec<u8>, Error>
where
    F: ReadFacility + ?Sized,
{
    let len = match request.len {
        Some(len) => len,
        None => remaining_len(request.fd, request.offset)?,
    };

    scheduler.yield_now()?;

    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| {
        Error::allocation(len, io::Error::from(io::ErrorKind::OutOfMemory))
    })?;
    buffer.resize(len, 0);

    scheduler.yield_now()?;

    let mut pending = facility.begin(request.fd, buffer, request.offset)?;

    scheduler.yield_now()?;

    let mut polls = 1usize;
    let status = loop {
        let status = pending.status();
        if !status.is_in_progress() {
            break status;
        }

        tracing::trace!(fd = request.fd, polls, "read in progress");

        scheduler.yield_now()?;
        polls += 1;
    };

    scheduler.end_task();

    match status {
        OpStatus::Done(read) => {
            tracing::debug!(fd = request.fd, offset = request.offset, read, polls, "read settled");

            let mut buffer = pending.into_buffer();
            buffer.truncate(read);
            Ok(buffer)
        }
        OpStatus::Failed(code) => {
            tracing::debug!(fd = request.fd, offset = request.offset, code, polls, "read failed");

            Err(Error::OperationFailed { code })
        }
        OpStatus::InProgress => unreachable!("poll loop exits only once the read settles"),
    }
}

fn remaining_len(fd: RawFd, offset: u64) -> Result<usize, Error> {
    let size = file_size(fd)?;
    let remaining = size.saturating_sub(offset);

    usize::try_from(remaining).map_err(|_| {
        Error::allocation(
            usize::MAX,
            io::Error::new(io::ErrorKind::InvalidInput, "file too large for one buffer"),
        )
    })
}
