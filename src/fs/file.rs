//! Read-only file handle for pollable reads.
//!
//! `File` only owns the descriptor. Reads go through a
//! [`ReadFacility`](crate::poll::ReadFacility) from inside a task, so the
//! handle itself never blocks on data.

use libc::{O_CLOEXEC, O_RDONLY, close, fstat, open};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// An open, read-only file descriptor, closed on drop.
#[derive(Debug)]
pub struct File {
    file_descriptor: RawFd,
}

impl File {
    /// Opens a file for reading.
    ///
    /// Equivalent to `open(path, O_RDONLY | O_CLOEXEC)`.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file_descriptor = open_fd(path.as_ref(), O_RDONLY | O_CLOEXEC)?;

        Ok(Self { file_descriptor })
    }

    /// Size of the file in bytes, as reported by `fstat`.
    pub fn len(&self) -> io::Result<u64> {
        file_size(self.file_descriptor)
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl AsRawFd for File {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for File {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}

/// Size of whatever `fd` refers to, from `fstat`.
pub(crate) fn file_size(fd: RawFd) -> io::Result<u64> {
    let mut stat: libc::stat = unsafe { mem::zeroed() };

    if unsafe { fstat(fd, &mut stat) } == -1 {
        return Err(io::Error::last_os_error());
    }

    u64::try_from(stat.st_size)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative file size"))
}

fn open_fd(path: &Path, flags: i32) -> io::Result<RawFd> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains null byte"))?;

    let file_descriptor = unsafe { open(c_path.as_ptr(), flags) };

    if file_descriptor < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(file_descriptor)
}
