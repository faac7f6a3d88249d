//! Fluent builder for Runtime construction.
//!
//! Provides a builder pattern interface for creating and configuring Runtime instances.

use crate::runtime::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE, Runtime};

/// Builder for constructing Runtime instances with fluent API.
///
/// # Example
/// ```ignore
/// let rt = RuntimeBuilder::new().stack_size(128 * 1024).build();
/// ```
#[derive(Clone, Debug)]
pub struct RuntimeBuilder {
    stack_size: usize,
    guard_page: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    /// Creates a builder with 64 KiB stacks and guard pages enabled.
    pub fn new() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            guard_page: true,
        }
    }

    /// Sets the usable stack size of every task spawned on the runtime.
    ///
    /// Sizes below [`MIN_STACK_SIZE`] are raised to it. Sizes are rounded up
    /// to whole pages when the stack is mapped.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    /// Enables or disables the inaccessible page below each task stack.
    pub fn guard_page(mut self, enabled: bool) -> Self {
        self.guard_page = enabled;
        self
    }

    /// Builds and returns a configured Runtime instance.
    pub fn build(self) -> Runtime {
        let stack_size = if self.stack_size < MIN_STACK_SIZE {
            tracing::warn!(
                requested = self.stack_size,
                minimum = MIN_STACK_SIZE,
                "stack size raised to minimum"
            );
            MIN_STACK_SIZE
        } else {
            self.stack_size
        };

        Runtime::with_config(stack_size, self.guard_page)
    }
}
