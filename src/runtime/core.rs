//! Driver that seeds the ring and runs tasks until none are left.
//!
//! The driver runs on the caller's own stack, saved into the ring's root
//! context whenever a task is resumed. Control comes back to it only when a
//! task body returns (through the context link) or when an ended task yields
//! with nothing left to hand over to. Finished tasks are reclaimed there,
//! between hand-offs, because a task's stack can't be released while that
//! task is still executing on it.

use crate::builder::RuntimeBuilder;
use crate::error::Error;
use crate::runtime::context::ExecutionContext;
use crate::runtime::ring::RuntimeStats;
use crate::runtime::scheduler::Scheduler;
use crate::task::TaskId;

use std::panic;

/// Cooperative runtime owning a ring of tasks.
///
/// Dropping a runtime releases every remaining stack. Tasks that were
/// suspended mid-body at that point never resume, so values living on their
/// stacks are leaked rather than dropped.
pub struct Runtime {
    scheduler: Box<Scheduler>,
}

impl Runtime {
    /// Creates a runtime with default settings.
    ///
    /// # Example
    /// ```ignore
    /// let mut rt = Runtime::new();
    /// ```
    pub fn new() -> Self {
        RuntimeBuilder::new().build()
    }

    pub(crate) fn with_config(stack_size: usize, guard_page: bool) -> Self {
        Self {
            scheduler: Box::new(Scheduler::new(stack_size, guard_page)),
        }
    }

    /// Spawns a task. See [`Scheduler::spawn`].
    ///
    /// # Example
    /// ```ignore
    /// rt.spawn(|scheduler| {
    ///     scheduler.yield_now()?;
    ///     println!("second step");
    ///     Ok(())
    /// })?;
    /// ```
    pub fn spawn<F>(&self, body: F) -> Result<TaskId, Error>
    where
        F: FnOnce(&Scheduler) -> Result<(), Error> + 'static,
    {
        self.scheduler.spawn(body)
    }

    /// Runs tasks until the active list is empty.
    ///
    /// The most recently spawned task runs first. Each time control returns
    /// here the reclamation queue is drained, then the ring's current task is
    /// resumed. When this returns `Ok`, every stack has been released.
    ///
    /// # Errors
    /// Returns [`Error::ContextSwitch`] if a switch fails, either here or
    /// inside a task that propagated it.
    ///
    /// # Panics
    /// Re-raises, on the caller's stack, a panic that escaped a task body.
    pub fn run(&mut self) -> Result<(), Error> {
        let scheduler = &*self.scheduler;

        {
            let mut ring = scheduler.ring.borrow_mut();
            let tail = ring.tail();
            ring.set_current(tail);

            tracing::debug!(active = ring.count(), "run started");
        }

        loop {
            let (root, target) = {
                let mut ring = scheduler.ring.borrow_mut();

                if ring.count() == 0 {
                    break;
                }

                let Some(current) = ring.current() else {
                    break;
                };

                tracing::trace!(to = %ring.id_of(current), "resume from driver");

                ring.set_running(Some(current));
                (ring.root_ptr(), ring.context_ptr(current))
            };

            let switched = unsafe { ExecutionContext::switch(root, target) };

            let released = {
                let mut ring = scheduler.ring.borrow_mut();
                ring.set_running(None);
                ring.reclaim_all()
            };

            if released > 0 {
                tracing::debug!(released, "reclaimed finished tasks");
            }

            switched?;

            if let Some(payload) = scheduler.take_panic() {
                panic::resume_unwind(payload);
            }

            if let Some(fault) = scheduler.take_fault() {
                return Err(fault);
            }
        }

        let released = scheduler.ring.borrow_mut().reclaim_all();
        if released > 0 {
            tracing::debug!(released, "reclaimed finished tasks");
        }

        tracing::debug!(stats = ?scheduler.stats(), "run finished");

        Ok(())
    }

    /// Handle shared with task bodies.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Snapshot of the ring's task counts.
    pub fn stats(&self) -> RuntimeStats {
        self.scheduler.stats()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
