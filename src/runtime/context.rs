//! Saved execution contexts.
//!
//! An [`ExecutionContext`] pairs a saved machine state with the stack it runs
//! on. Task contexts start in a single trampoline and carry a link to the
//! root context, which glibc resumes once the trampoline returns. The root
//! context owns no stack: it is the thread's own stack, captured by the first
//! switch out of [`Runtime::run`](crate::Runtime::run).
//!
//! Saved states live in their own heap allocation. glibc's `ucontext_t`
//! points into itself (the floating point save area), so it must never move
//! after `getcontext` has filled it in.

use crate::error::Error;
use crate::runtime::stack::Stack;

use libc::{c_uint, getcontext, makecontext, swapcontext, ucontext_t};
use std::mem;

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("spindle requires glibc's ucontext family (linux-gnu targets)");

/// Entry point every task context starts in. Receives one pointer split
/// into its high and low 32 bits.
pub(crate) type Trampoline = extern "C" fn(c_uint, c_uint);

pub(crate) struct ExecutionContext {
    state: Box<ucontext_t>,
    stack: Option<Stack>,
}

impl ExecutionContext {
    /// Creates the context the driver saves itself into.
    pub(crate) fn root() -> Self {
        Self {
            state: Box::new(unsafe { mem::zeroed() }),
            stack: None,
        }
    }

    /// Prepares a context that starts `entry(argument)` on `stack` and
    /// resumes `link` when `entry` returns.
    pub(crate) fn new(
        entry: Trampoline,
        argument: usize,
        stack: Stack,
        link: *mut ucontext_t,
    ) -> Result<Self, Error> {
        let mut state: Box<ucontext_t> = Box::new(unsafe { mem::zeroed() });

        if unsafe { getcontext(&mut *state) } == -1 {
            return Err(Error::last_context_switch());
        }

        state.uc_stack.ss_sp = stack.bottom();
        state.uc_stack.ss_size = stack.usable_size();
        state.uc_stack.ss_flags = 0;
        state.uc_link = link;

        let (high, low) = split_argument(argument);

        unsafe {
            let entry: extern "C" fn() = mem::transmute::<Trampoline, extern "C" fn()>(entry);
            makecontext(&mut *state, entry, 2, high, low);
        }

        Ok(Self {
            state,
            stack: Some(stack),
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ucontext_t {
        &mut *self.state
    }

    pub(crate) fn stack_size(&self) -> usize {
        self.stack.as_ref().map_or(0, Stack::usable_size)
    }

    /// Saves the running state into `from` and resumes `to`.
    ///
    /// Returns once some other context switches back into `from`.
    ///
    /// # Safety
    /// Both pointers must come from live contexts, and `to` must hold either a
    /// state prepared by [`ExecutionContext::new`] or one saved by an earlier
    /// switch. No borrow of the ring may be held across this call.
    pub(crate) unsafe fn switch(from: *mut ucontext_t, to: *const ucontext_t) -> Result<(), Error> {
        if unsafe { swapcontext(from, to) } == -1 {
            return Err(Error::last_context_switch());
        }

        Ok(())
    }
}

fn split_argument(argument: usize) -> (c_uint, c_uint) {
    let wide = argument as u64;

    ((wide >> 32) as c_uint, wide as c_uint)
}

/// Reassembles an argument split by [`ExecutionContext::new`].
pub(crate) fn join_argument(high: c_uint, low: c_uint) -> usize {
    (((high as u64) << 32) | low as u64) as usize
}
