//! Task records scheduled by the ring.
//!
//! A task owns its execution context (and through it, its stack) and the body
//! it will run. The `next`/`prev` keys are ring links only: the ring decides
//! traversal, the arena decides lifetime.
//!
//! # Lifecycle
//!
//! ```text
//! Ready --spawn--> Running --end_task--> Ended --reclaim--> (freed)
//! ```
//!
//! `Ready` exists for completeness; a spawned task is immediately eligible to
//! run and is marked `Running` before it is linked into the ring.

use crate::error::Error;
use crate::runtime::Scheduler;
use crate::runtime::context::ExecutionContext;

use std::fmt;

/// Body of a task. Whatever the closure captures is the task's argument
/// payload; the runtime never looks at it.
pub(crate) type TaskBody = Box<dyn FnOnce(&Scheduler) -> Result<(), Error>>;

/// Stable identifier handed out by `spawn`.
///
/// Identifiers are never reused within a runtime, unlike arena slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(serial: u64) -> Self {
        Self(serial)
    }

    /// Spawn order of the task, starting at zero.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Constructed but not yet eligible. Never observed outside `spawn`.
    Ready,
    /// Linked into the ring; may be current or resumed by a peer.
    Running,
    /// Unlinked and waiting in the reclamation queue.
    Ended,
}

pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) state: TaskState,
    pub(crate) context: ExecutionContext,
    pub(crate) body: Option<TaskBody>,
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
}

impl Task {
    pub(crate) fn new(id: TaskId, context: ExecutionContext, body: TaskBody) -> Self {
        Self {
            id,
            state: TaskState::Ready,
            context,
            body: Some(body),
            next: None,
            prev: None,
        }
    }

    pub(crate) fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }
}
