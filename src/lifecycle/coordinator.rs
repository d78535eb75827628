//! Lifecycle coordinator
//!
//! Fans the interrupt listener, the server and the pipeline into one
//! shutdown signal and runs teardown exactly once, whichever fires first.

use super::signal::{shutdown_channel, ShutdownReason, ShutdownTrigger};
use crate::process::ProcessError;
use crate::server::{ServerClosed, ServerError, StaticFileServer};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long open HTTP connections get to finish during teardown
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// The shutdown sequence
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn teardown(&self);
}

/// Stops the camera, then the server
pub struct StreamTeardown {
    capture_stop: CancellationToken,
    server: StaticFileServer,
    deadline: Duration,
}

impl StreamTeardown {
    pub fn new(capture_stop: CancellationToken, server: StaticFileServer) -> Self {
        Self {
            capture_stop,
            server,
            deadline: SHUTDOWN_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

#[async_trait]
impl Teardown for StreamTeardown {
    async fn teardown(&self) {
        self.capture_stop.cancel();
        match self.server.shutdown(self.deadline).await {
            Ok(()) => tracing::info!("Static file server stopped"),
            Err(e) => tracing::warn!("Static file server: {}", e),
        }
    }
}

fn spawn_producer<F, T>(
    trigger: &ShutdownTrigger,
    future: F,
    reason: fn(T) -> ShutdownReason,
) -> JoinHandle<()>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let trigger = trigger.clone();
    tokio::spawn(async move {
        let output = future.await;
        trigger.trigger(reason(output));
    })
}

#[derive(Debug, Default)]
pub struct LifecycleCoordinator;

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Run the three producers until the first one fires, then tear down
    ///
    /// Teardown must make the server and pipeline futures return; both are
    /// awaited before this resolves. The interrupt listener is aborted.
    pub async fn run<I, S, P>(
        self,
        interrupt: I,
        server: S,
        pipeline: P,
        teardown: &dyn Teardown,
    ) -> ShutdownReason
    where
        I: Future<Output = ()> + Send + 'static,
        S: Future<Output = Result<ServerClosed, ServerError>> + Send + 'static,
        P: Future<Output = Result<(), ProcessError>> + Send + 'static,
    {
        let (trigger, listener) = shutdown_channel();

        let interrupt_task = spawn_producer(&trigger, interrupt, |()| ShutdownReason::Interrupt);
        let server_task = spawn_producer(&trigger, server, ShutdownReason::Server);
        let pipeline_task = spawn_producer(&trigger, pipeline, ShutdownReason::Pipeline);
        drop(trigger);

        let reason = listener
            .recv()
            .await
            .unwrap_or(ShutdownReason::ProducersLost);
        tracing::info!(%reason, "Shutting down");

        teardown.teardown().await;

        interrupt_task.abort();
        for (name, task) in [("server", server_task), ("pipeline", pipeline_task)] {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("{} task panicked", name);
                }
            }
        }

        reason
    }
}
