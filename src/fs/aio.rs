//! POSIX asynchronous reads.
//!
//! Each read owns its control block and destination buffer. The control block
//! is boxed because the AIO implementation keeps referring to it by address
//! until the request settles, and the buffer's heap allocation must likewise
//! outlive the request. An unsettled read is cancelled and waited for on drop.

use crate::error::Error;
use crate::poll::{OpStatus, PendingOperation, ReadFacility};

use libc::{
    ECANCELED, EINPROGRESS, SIGEV_NONE, aio_cancel, aio_error, aio_read, aio_return,
    aio_suspend, aiocb, off_t,
};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;

/// Reads through `aio_read`, polled with `aio_error`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PosixAio;

impl ReadFacility for PosixAio {
    type Pending = AioRead;

    fn begin(&self, fd: RawFd, mut buffer: Vec<u8>, offset: u64) -> Result<AioRead, Error> {
        let offset = off_t::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;

        let mut control: Box<aiocb> = Box::new(unsafe { mem::zeroed() });
        control.aio_fildes = fd;
        control.aio_buf = buffer.as_mut_ptr().cast();
        control.aio_nbytes = buffer.len();
        control.aio_offset = offset;
        control.aio_sigevent.sigev_notify = SIGEV_NONE;

        if unsafe { aio_read(&mut *control) } == -1 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        tracing::trace!(fd, offset, len = buffer.len(), "aio_read submitted");

        Ok(AioRead {
            control,
            buffer,
            settled: None,
        })
    }
}

/// An `aio_read` in flight.
pub struct AioRead {
    control: Box<aiocb>,
    buffer: Vec<u8>,
    settled: Option<OpStatus>,
}

impl AioRead {
    // aio_return may only be called once per request, so the outcome is cached.
    fn collect(&mut self, code: i32) -> OpStatus {
        let returned = unsafe { aio_return(&mut *self.control) };

        let status = match code {
            0 if returned >= 0 => OpStatus::Done(returned as usize),
            0 => OpStatus::Failed(io::Error::last_os_error().raw_os_error().unwrap_or(0)),
            code => OpStatus::Failed(code),
        };

        self.settled = Some(status);
        status
    }

    // Blocks until the request settles, cancelling it first.
    fn settle(&mut self) {
        if self.settled.is_some() {
            return;
        }

        unsafe {
            aio_cancel(self.control.aio_fildes, &mut *self.control);
        }

        let list = [&*self.control as *const aiocb];

        loop {
            let code = unsafe { aio_error(&*self.control) };
            if code != EINPROGRESS {
                self.collect(code);
                return;
            }

            unsafe {
                aio_suspend(list.as_ptr(), 1, ptr::null());
            }
        }
    }
}

impl PendingOperation for AioRead {
    fn status(&mut self) -> OpStatus {
        if let Some(status) = self.settled {
            return status;
        }

        match unsafe { aio_error(&*self.control) } {
            EINPROGRESS => OpStatus::InProgress,
            -1 => {
                let code = io::Error::last_os_error()
                    .raw_os_error()
                    .unwrap_or(ECANCELED);
                self.settled = Some(OpStatus::Failed(code));
                OpStatus::Failed(code)
            }
            code => self.collect(code),
        }
    }

    fn into_buffer(mut self) -> Vec<u8> {
        self.settle();
        mem::take(&mut self.buffer)
    }
}

impl Drop for AioRead {
    fn drop(&mut self) {
        self.settle();
    }
}
