//! External process management
//!
//! This module provides the pieces shared by the capture and mux programs:
//! - ProcessSpawner trait for launching programs (injectable for tests)
//! - ProcessHandle with an explicit start/wait state machine
//! - Command line, exit and error types

pub mod handle;
pub mod spawner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use handle::ProcessHandle;
pub use spawner::{ChildProcess, Invocation, ProcessSpawner, SystemSpawner};
pub use types::{CommandLine, ProcessError, ProcessExit, ProcessStatus};
