//! Deterministic stand-in for an asynchronous read facility.
//!
//! The read happens synchronously with `pread` when it is started; the
//! operation then reports `InProgress` for a fixed number of polls before
//! revealing the outcome. Useful wherever the number of yields a read costs
//! has to be predictable.

use crate::error::Error;
use crate::poll::{OpStatus, PendingOperation, ReadFacility};

use libc::{off_t, pread};
use std::io;
use std::os::fd::RawFd;

#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedReads {
    latency: usize,
    fail_with: Option<i32>,
}

impl SimulatedReads {
    /// Reads that report `InProgress` for `latency` polls.
    pub fn new(latency: usize) -> Self {
        Self {
            latency,
            fail_with: None,
        }
    }

    /// Reads that settle with `Failed(code)` after `latency` polls.
    pub fn failing(latency: usize, code: i32) -> Self {
        Self {
            latency,
            fail_with: Some(code),
        }
    }
}

impl ReadFacility for SimulatedReads {
    type Pending = SimulatedRead;

    fn begin(&self, fd: RawFd, mut buffer: Vec<u8>, offset: u64) -> Result<SimulatedRead, Error> {
        let offset = off_t::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;

        let outcome = match self.fail_with {
            Some(code) => OpStatus::Failed(code),
            None => {
                let read = unsafe { pread(fd, buffer.as_mut_ptr().cast(), buffer.len(), offset) };

                if read < 0 {
                    OpStatus::Failed(io::Error::last_os_error().raw_os_error().unwrap_or(0))
                } else {
                    OpStatus::Done(read as usize)
                }
            }
        };

        Ok(SimulatedRead {
            buffer,
            remaining: self.latency,
            outcome,
        })
    }
}

/// A simulated read counting down to its outcome.
pub struct SimulatedRead {
    buffer: Vec<u8>,
    remaining: usize,
    outcome: OpStatus,
}

impl PendingOperation for SimulatedRead {
    fn status(&mut self) -> OpStatus {
        if self.remaining > 0 {
            self.remaining -= 1;
            return OpStatus::InProgress;
        }

        self.outcome
    }

    fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}
