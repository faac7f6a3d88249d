//! The task ring: active list, reclamation queue and root context.
//!
//! Active tasks form a doubly linked list threaded through the arena by key.
//! Storage is linear (`head.prev` and `tail.next` are always `None`), but
//! traversal wraps: the predecessor of `head` is `tail`. Ended tasks move to a
//! singly linked reclamation queue in the same step that unlinks them, so no
//! task is ever reachable from both.
//!
//! `current` is the scheduling cursor. `running` is the task whose context is
//! actually executing, or `None` while the driver's root context runs. The
//! two only disagree between a task's `end_task` and the moment it gives up
//! control.

use crate::runtime::context::ExecutionContext;
use crate::task::{Task, TaskId, TaskState};
use crate::utils::slab::Slab;

use libc::ucontext_t;

const INITIAL_CAPACITY: usize = 16;

/// Snapshot of the ring's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Tasks linked into the active list.
    pub active: usize,
    /// Ended tasks whose stacks have not been released yet.
    pub pending_reclaim: usize,
    /// Tasks successfully spawned over the runtime's lifetime.
    pub spawned: u64,
    /// Tasks whose stacks have been released.
    pub reclaimed: u64,
}

pub(crate) struct TaskRing {
    tasks: Slab<Task>,
    head: Option<usize>,
    tail: Option<usize>,
    current: Option<usize>,
    running: Option<usize>,
    finished: Option<usize>,
    count: usize,
    pending: usize,
    root: ExecutionContext,
    next_serial: u64,
    spawned: u64,
    reclaimed: u64,
}

impl TaskRing {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Slab::with_capacity(INITIAL_CAPACITY),
            head: None,
            tail: None,
            current: None,
            running: None,
            finished: None,
            count: 0,
            pending: 0,
            root: ExecutionContext::root(),
            next_serial: 0,
            spawned: 0,
            reclaimed: 0,
        }
    }

    pub(crate) fn next_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_serial);
        self.next_serial += 1;
        id
    }

    pub(crate) fn root_ptr(&mut self) -> *mut ucontext_t {
        self.root.as_mut_ptr()
    }

    pub(crate) fn context_ptr(&mut self, key: usize) -> *mut ucontext_t {
        self.task_mut(key).context.as_mut_ptr()
    }

    /// Stores a new task, marks it runnable and links it as the new tail.
    pub(crate) fn insert(&mut self, mut task: Task) -> usize {
        task.state = TaskState::Running;

        let key = self.tasks.insert(task);
        self.spawned += 1;
        self.push_back(key);

        key
    }

    /// Links `key` after the current tail.
    pub(crate) fn push_back(&mut self, key: usize) {
        let old_tail = self.tail;

        let task = self.task_mut(key);
        assert!(task.is_unlinked(), "{} is already linked", task.id);
        task.prev = old_tail;
        task.next = None;

        match old_tail {
            Some(tail) => self.task_mut(tail).next = Some(key),
            None => self.head = Some(key),
        }

        self.tail = Some(key);
        self.count += 1;

        self.debug_validate();
    }

    /// Removes `key` from the active list, patching its neighbours.
    pub(crate) fn unlink(&mut self, key: usize) {
        let (prev, next) = {
            let task = self.task(key);
            (task.prev, task.next)
        };

        match prev {
            Some(prev) => self.task_mut(prev).next = next,
            None => {
                assert_eq!(self.head, Some(key), "unlinking a task outside the ring");
                self.head = next;
            }
        }

        match next {
            Some(next) => self.task_mut(next).prev = prev,
            None => {
                assert_eq!(self.tail, Some(key), "unlinking a task outside the ring");
                self.tail = prev;
            }
        }

        let task = self.task_mut(key);
        task.prev = None;
        task.next = None;

        self.count -= 1;
    }

    /// Ring predecessor of `key`, wrapping from head to tail.
    pub(crate) fn predecessor(&self, key: usize) -> usize {
        if self.head == Some(key) {
            self.tail.unwrap_or(key)
        } else {
            self.task(key).prev.unwrap_or(key)
        }
    }

    /// Ends `key`: moves it from the active list to the reclamation queue and
    /// advances `current` to its predecessor. Returns the new current task.
    pub(crate) fn end(&mut self, key: usize) -> Option<usize> {
        assert_eq!(
            self.task(key).state,
            TaskState::Running,
            "ending a task that is not running"
        );

        let predecessor = self.predecessor(key);
        let next_current = (predecessor != key).then_some(predecessor);

        self.unlink(key);

        let finished = self.finished;
        let task = self.task_mut(key);
        task.state = TaskState::Ended;
        task.next = finished;
        self.finished = Some(key);
        self.pending += 1;

        self.current = next_current;

        self.debug_validate();

        next_current
    }

    /// Releases every task in the reclamation queue.
    ///
    /// Must run on the root context: a task's stack can't be freed while the
    /// task is still executing on it.
    pub(crate) fn reclaim_all(&mut self) -> usize {
        assert!(
            self.running.is_none(),
            "reclaim_all called while a task context is running"
        );

        let mut released = 0;

        while let Some(key) = self.finished {
            let task = self
                .tasks
                .remove(key)
                .expect("reclamation queue points at a freed slot");

            assert_eq!(
                task.state,
                TaskState::Ended,
                "{} reclaimed while still active",
                task.id
            );
            assert!(task.prev.is_none(), "{} still linked on reclaim", task.id);

            self.finished = task.next;
            self.pending -= 1;

            tracing::trace!(task = %task.id, stack = task.context.stack_size(), "released task");

            drop(task);
            released += 1;
        }

        self.reclaimed += released as u64;

        self.debug_validate();

        released
    }

    pub(crate) fn is_active(&self, key: usize) -> bool {
        self.task(key).state == TaskState::Running
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub(crate) fn current(&self) -> Option<usize> {
        self.current
    }

    pub(crate) fn set_current(&mut self, key: Option<usize>) {
        self.current = key;
    }

    pub(crate) fn running(&self) -> Option<usize> {
        self.running
    }

    pub(crate) fn set_running(&mut self, key: Option<usize>) {
        self.running = key;
    }

    pub(crate) fn id_of(&self, key: usize) -> TaskId {
        self.task(key).id
    }

    pub(crate) fn task_mut(&mut self, key: usize) -> &mut Task {
        self.tasks
            .get_mut(key)
            .expect("ring link points at a freed slot")
    }

    pub(crate) fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.tasks
            .iter()
            .find(|(_, task)| task.id == id)
            .map(|(_, task)| task.state)
    }

    pub(crate) fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            active: self.count,
            pending_reclaim: self.pending,
            spawned: self.spawned,
            reclaimed: self.reclaimed,
        }
    }

    fn task(&self, key: usize) -> &Task {
        self.tasks.get(key).expect("ring link points at a freed slot")
    }

    fn active_keys(&self) -> Vec<usize> {
        let mut keys = Vec::with_capacity(self.count);
        let mut cursor = self.head;

        while let Some(key) = cursor {
            keys.push(key);
            cursor = self.task(key).next;
        }

        keys
    }

    fn finished_keys(&self) -> Vec<usize> {
        let mut keys = Vec::new();
        let mut cursor = self.finished;

        while let Some(key) = cursor {
            keys.push(key);
            cursor = self.task(key).next;
        }

        keys
    }

    fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            self.validate();
        }
    }

    /// Panics if any structural invariant of the ring is broken.
    pub(crate) fn validate(&self) {
        let active = self.active_keys();

        assert_eq!(active.len(), self.count, "active count out of sync");
        assert_eq!(active.last().copied(), self.tail, "tail is not the last node");

        if let Some(head) = self.head {
            assert!(self.task(head).prev.is_none(), "head has a predecessor link");
        }

        let mut previous = None;
        for &key in &active {
            let task = self.task(key);
            assert_eq!(task.prev, previous, "{} has a stale prev link", task.id);
            assert_eq!(task.state, TaskState::Running, "{} is linked but not running", task.id);
            previous = Some(key);
        }

        let finished = self.finished_keys();
        assert_eq!(finished.len(), self.pending, "pending count out of sync");
        for &key in &finished {
            let task = self.task(key);
            assert_eq!(task.state, TaskState::Ended, "{} queued but not ended", task.id);
            assert!(!active.contains(&key), "{} is in both lists", task.id);
        }

        assert_eq!(
            active.len() + finished.len(),
            self.tasks.len(),
            "task record reachable from neither list"
        );

        if let Some(current) = self.current {
            assert!(active.contains(&current), "current task is not active");
        }
    }
}
