//! Runtime subsystem modules.

pub(crate) mod context;
mod core;
pub(crate) mod ring;
mod scheduler;
pub(crate) mod stack;

pub use core::Runtime;
pub use ring::RuntimeStats;
pub use scheduler::Scheduler;
pub use stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
