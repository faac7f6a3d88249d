//! Scheduling operations available to running tasks.
//!
//! A [`Scheduler`] is handed to every task body. It is the only way a task
//! reaches the ring: there is no thread-local or global runtime. All ring
//! mutations happen inside short `RefCell` borrows that are released before
//! any context switch, because the task switched to may immediately inspect
//! the ring itself.

use crate::error::Error;
use crate::runtime::context::{ExecutionContext, join_argument};
use crate::runtime::ring::{RuntimeStats, TaskRing};
use crate::runtime::stack::Stack;
use crate::task::{Task, TaskBody, TaskId, TaskState};

use libc::c_uint;
use std::any::Any;
use std::cell::RefCell;
use std::io;
use std::panic::{self, AssertUnwindSafe};

pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Handle through which tasks spawn siblings, yield and end.
pub struct Scheduler {
    pub(crate) ring: RefCell<TaskRing>,
    stack_size: usize,
    guard_page: bool,
    fault: RefCell<Option<Error>>,
    panic: RefCell<Option<PanicPayload>>,
}

impl Scheduler {
    pub(crate) fn new(stack_size: usize, guard_page: bool) -> Self {
        Self {
            ring: RefCell::new(TaskRing::new()),
            stack_size,
            guard_page,
            fault: RefCell::new(None),
            panic: RefCell::new(None),
        }
    }

    /// Spawns `body` as a new task at the tail of the ring.
    ///
    /// The task's context returns to the driver's root context when `body`
    /// finishes. On failure the ring is left untouched.
    ///
    /// The scheduler must not move while tasks exist; [`Runtime`](crate::Runtime)
    /// keeps it boxed for that reason.
    pub fn spawn<F>(&self, body: F) -> Result<TaskId, Error>
    where
        F: FnOnce(&Scheduler) -> Result<(), Error> + 'static,
    {
        self.spawn_boxed(Box::new(body))
    }

    fn spawn_boxed(&self, body: TaskBody) -> Result<TaskId, Error> {
        let stack = Stack::allocate(self.stack_size, self.guard_page)?;

        let mut ring = self.ring.borrow_mut();
        let root = ring.root_ptr();
        let argument = self as *const Scheduler as usize;
        let context = ExecutionContext::new(task_entry, argument, stack, root)?;

        let id = ring.next_id();
        ring.insert(Task::new(id, context, body));

        tracing::debug!(task = %id, active = ring.count(), "spawned task");

        Ok(id)
    }

    /// Yields to the ring predecessor of the running task.
    ///
    /// Returns once a peer, or the driver, switches back to this task. Called
    /// from a task that has already ended, control goes to the ring's current
    /// task instead (or back to the driver when the ring is empty), and the
    /// ended task is never resumed. Called from outside any task, or when the
    /// running task is the only one in the ring, this is a no-op.
    pub fn yield_now(&self) -> Result<(), Error> {
        let (from, to, rollback) = {
            let mut ring = self.ring.borrow_mut();

            let Some(running) = ring.running() else {
                return Ok(());
            };

            let rollback = ring.current();

            let target = if ring.is_active(running) {
                let predecessor = ring.predecessor(running);
                ring.set_current(Some(predecessor));
                Some(predecessor)
            } else {
                ring.current()
            };

            if target == Some(running) {
                return Ok(());
            }

            let from = ring.context_ptr(running);
            let to = match target {
                Some(key) => {
                    tracing::trace!(from = %ring.id_of(running), to = %ring.id_of(key), "yield");
                    ring.context_ptr(key)
                }
                None => {
                    tracing::trace!(from = %ring.id_of(running), "yield to driver");
                    ring.root_ptr()
                }
            };

            ring.set_running(target);

            (from, to, (running, rollback))
        };

        match unsafe { ExecutionContext::switch(from, to) } {
            Ok(()) => Ok(()),
            Err(error) => Err(self.switch_failed(rollback, error)),
        }
    }

    // Restores the ring to its state before the failed switch and records the
    // failure as the runtime fault, whatever the task does with its copy.
    fn switch_failed(&self, rollback: (usize, Option<usize>), error: Error) -> Error {
        let (running, current) = rollback;

        {
            let mut ring = self.ring.borrow_mut();
            ring.set_running(Some(running));
            ring.set_current(current);
        }

        let code = match &error {
            Error::ContextSwitch(source) => source.raw_os_error(),
            _ => None,
        };

        tracing::error!(%error, "context switch failed");

        self.fault.borrow_mut().get_or_insert_with(|| {
            Error::ContextSwitch(match code {
                Some(code) => io::Error::from_raw_os_error(code),
                None => io::Error::other("context switch failed"),
            })
        });

        error
    }

    /// Ends the running task without switching away from it.
    ///
    /// The task moves to the reclamation queue and the ring's current task
    /// becomes its predecessor. The caller should return (or yield) right
    /// after. Calling it again from the same task, or from outside any task,
    /// does nothing.
    pub fn end_task(&self) {
        let mut ring = self.ring.borrow_mut();

        let Some(running) = ring.running() else {
            return;
        };

        if !ring.is_active(running) {
            return;
        }

        let id = ring.id_of(running);
        let next = ring.end(running);

        tracing::debug!(
            task = %id,
            next = ?next.map(|key| ring.id_of(key)),
            active = ring.count(),
            "ended task"
        );
    }

    /// Number of tasks in the active list.
    pub fn task_count(&self) -> usize {
        self.ring.borrow().count()
    }

    /// Identifier of the task currently executing, if any.
    pub fn current_task(&self) -> Option<TaskId> {
        let ring = self.ring.borrow();
        ring.running().map(|key| ring.id_of(key))
    }

    /// State of a task that has not been reclaimed yet.
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.ring.borrow().state_of(id)
    }

    /// Snapshot of the ring's task counts.
    pub fn stats(&self) -> RuntimeStats {
        self.ring.borrow().stats()
    }

    pub(crate) fn take_fault(&self) -> Option<Error> {
        self.fault.borrow_mut().take()
    }

    pub(crate) fn take_panic(&self) -> Option<PanicPayload> {
        self.panic.borrow_mut().take()
    }

    // Runs on the task's own stack, called from the trampoline.
    fn run_current(&self) {
        let (key, body) = {
            let mut ring = self.ring.borrow_mut();
            let key = ring
                .running()
                .expect("task context started without a running task");
            let body = ring.task_mut(key).body.take();
            (key, body)
        };

        if let Some(body) = body {
            match panic::catch_unwind(AssertUnwindSafe(|| body(self))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) if error.is_fatal() => {
                    tracing::error!(%error, "task hit a fatal runtime error");
                    self.fault.borrow_mut().get_or_insert(error);
                }
                Ok(Err(error)) => {
                    tracing::warn!(%error, "task finished with an error");
                }
                Err(payload) => {
                    self.panic.borrow_mut().get_or_insert(payload);
                }
            }
        }

        // Completion continuation: a body that returned without calling
        // `end_task` is ended here, before control flows back to the root.
        let still_active = {
            let ring = self.ring.borrow();
            ring.running() == Some(key) && ring.is_active(key)
        };

        if still_active {
            self.end_task();
        }
    }
}

extern "C" fn task_entry(high: c_uint, low: c_uint) {
    let scheduler = join_argument(high, low) as *const Scheduler;

    unsafe { &*scheduler }.run_current();
}
