//! File access for pollable reads.
//!
//! - [`File`]: read-only descriptor handle
//! - [`PosixAio`]: read facility backed by POSIX AIO
//! - [`SimulatedReads`]: deterministic facility with configurable latency

pub mod aio;
pub mod file;
pub mod simulated;

pub use aio::PosixAio;
pub use file::File;
pub use simulated::SimulatedReads;
