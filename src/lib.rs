//! Cooperative fibers scheduled on a single thread.
//!
//! Each task runs on its own stack with its own saved CPU state. Tasks give up
//! control only at explicit yields or when their body returns, and a yield
//! always hands control directly to the task's ring predecessor, so a given
//! sequence of spawns and yields always produces the same schedule.
//!
//! # Architecture
//!
//! - **Runtime**: Driver that seeds the ring, resumes tasks and reclaims finished ones
//! - **Scheduler**: Handle passed to every task body: spawn, yield, end
//! - **TaskRing**: Active list, reclamation queue and the driver's root context
//! - **ExecutionContext**: Saved machine state plus an owned, guard-paged stack
//! - **read_polled**: Task body pattern that spins on a pollable read between yields
//! - **RuntimeBuilder**: Fluent builder for stack configuration
//!
//! # Example
//!
//! ```ignore
//! use spindle::Runtime;
//!
//! let mut rt = Runtime::new();
//! for n in 0..3 {
//!     rt.spawn(move |scheduler| {
//!         println!("step one; id = {n}");
//!         scheduler.yield_now()?;
//!         println!("step two; id = {n}");
//!         Ok(())
//!     })?;
//! }
//! rt.run()?;
//! ```

mod builder;
mod error;
pub mod fs;
pub mod poll;
mod runtime;
mod task;
mod utils;

pub use builder::RuntimeBuilder;
pub use error::Error;
pub use poll::{OpStatus, PendingOperation, ReadFacility, ReadRequest, read_polled};
pub use runtime::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE, Runtime, RuntimeStats, Scheduler};
pub use task::{TaskId, TaskState};
