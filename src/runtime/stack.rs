//! Owned task stacks.
//!
//! Stacks are anonymous private mappings. The lowest page can be made
//! inaccessible so an overflowing task faults instead of silently scribbling
//! over a neighbouring allocation. The mapping is released in `Drop`, which is
//! the only place a stack is ever freed.

use crate::error::Error;

use libc::{
    MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, MAP_STACK, PROT_NONE, PROT_READ, PROT_WRITE,
    _SC_PAGESIZE, c_void, mmap, mprotect, munmap, sysconf,
};
use std::io;
use std::ptr::{self, NonNull};

/// Size used when the builder is not told otherwise.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Smallest stack the runtime hands to a task.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

const FALLBACK_PAGE_SIZE: usize = 4096;

pub(crate) struct Stack {
    mapping: NonNull<u8>,
    mapping_len: usize,
    guard_len: usize,
}

impl Stack {
    /// Maps at least `size` usable bytes, plus one guard page when requested.
    pub(crate) fn allocate(size: usize, guard_page: bool) -> Result<Self, Error> {
        let page = page_size();
        let guard_len = if guard_page { page } else { 0 };

        let mapping_len = size
            .checked_next_multiple_of(page)
            .and_then(|usable| usable.checked_add(guard_len))
            .ok_or_else(|| {
                Error::allocation(
                    size,
                    io::Error::new(io::ErrorKind::InvalidInput, "stack size overflows"),
                )
            })?;

        let base = unsafe {
            mmap(
                ptr::null_mut(),
                mapping_len,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_STACK,
                -1,
                0,
            )
        };

        if base == MAP_FAILED {
            return Err(Error::allocation(size, io::Error::last_os_error()));
        }

        let mapping = NonNull::new(base.cast::<u8>())
            .ok_or_else(|| Error::allocation(size, io::Error::other("mmap returned null")))?;

        let stack = Self {
            mapping,
            mapping_len,
            guard_len,
        };

        // Stacks grow down, so the guard sits at the lowest address.
        if guard_len > 0 && unsafe { mprotect(base, guard_len, PROT_NONE) } == -1 {
            return Err(Error::allocation(size, io::Error::last_os_error()));
        }

        Ok(stack)
    }

    /// Lowest usable address, above the guard page.
    pub(crate) fn bottom(&self) -> *mut c_void {
        unsafe { self.mapping.as_ptr().add(self.guard_len).cast() }
    }

    pub(crate) fn usable_size(&self) -> usize {
        self.mapping_len - self.guard_len
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            munmap(self.mapping.as_ptr().cast(), self.mapping_len);
        }
    }
}

fn page_size() -> usize {
    let page = unsafe { sysconf(_SC_PAGESIZE) };

    if page > 0 {
        page as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}
