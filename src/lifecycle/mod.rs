//! Pipeline supervision and shutdown
//!
//! - Pipeline drives mux start, capture start, capture wait, mux wait
//! - Shutdown signal fans any number of producers into one reason
//! - LifecycleCoordinator runs teardown exactly once

pub mod coordinator;
pub mod pipeline;
pub mod signal;

pub use coordinator::{LifecycleCoordinator, StreamTeardown, Teardown, SHUTDOWN_DEADLINE};
pub use pipeline::Pipeline;
pub use signal::{shutdown_channel, shutdown_signal, ShutdownListener, ShutdownReason, ShutdownTrigger};
