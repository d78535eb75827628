//! Shutdown signal
//!
//! A single-slot channel that any number of producers may fire. The first
//! reason sent is the one the coordinator acts on; later ones are dropped
//! without blocking the sender.

use crate::process::ProcessError;
use crate::server::{ServerClosed, ServerError};
use crate::utils::error::{AppError, AppResult};
use tokio::sync::mpsc;

/// Why the stream is shutting down
#[derive(Debug)]
pub enum ShutdownReason {
    /// Ctrl-C or SIGTERM
    Interrupt,
    /// The static file server returned
    Server(Result<ServerClosed, ServerError>),
    /// The capture/mux pipeline returned
    Pipeline(Result<(), ProcessError>),
    /// Every producer went away without reporting
    ProducersLost,
}

impl ShutdownReason {
    /// Only an interrupt counts as a clean shutdown
    pub fn into_result(self) -> AppResult<()> {
        match self {
            ShutdownReason::Interrupt => Ok(()),
            ShutdownReason::Server(Err(e)) => Err(e.into()),
            ShutdownReason::Server(Ok(ServerClosed)) => {
                Err(AppError::Stopped("static file server closed".to_string()))
            }
            ShutdownReason::Pipeline(Err(e)) => Err(e.into()),
            ShutdownReason::Pipeline(Ok(())) => {
                Err(AppError::Stopped("video stream ended".to_string()))
            }
            ShutdownReason::ProducersLost => {
                Err(AppError::Stopped("shutdown producers exited".to_string()))
            }
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Server(Ok(_)) => write!(f, "server closed"),
            ShutdownReason::Server(Err(e)) => write!(f, "server failed: {}", e),
            ShutdownReason::Pipeline(Ok(())) => write!(f, "stream ended"),
            ShutdownReason::Pipeline(Err(e)) => write!(f, "stream failed: {}", e),
            ShutdownReason::ProducersLost => write!(f, "producers lost"),
        }
    }
}

/// Sending half, cloned into every producer
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownReason>,
}

impl ShutdownTrigger {
    /// Fire the signal. Never blocks; returns whether this call was recorded.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Shutdown already signaled, ignoring {}", e.into_inner());
                false
            }
        }
    }
}

/// Receiving half, read once
#[derive(Debug)]
pub struct ShutdownListener {
    rx: mpsc::Receiver<ShutdownReason>,
}

impl ShutdownListener {
    /// Wait for the first reason. Consumes the listener so later triggers
    /// fail fast instead of queueing.
    pub async fn recv(mut self) -> Option<ShutdownReason> {
        self.rx.recv().await
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownTrigger { tx }, ShutdownListener { rx })
}

/// Resolve on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let (trigger, listener) = shutdown_channel();
        assert!(trigger.trigger(ShutdownReason::Interrupt));
        assert!(!trigger.clone().trigger(ShutdownReason::Pipeline(Ok(()))));

        let reason = listener.recv().await.unwrap();
        assert!(matches!(reason, ShutdownReason::Interrupt));

        // Listener is gone, later producers still return immediately
        assert!(!trigger.trigger(ShutdownReason::ProducersLost));
    }

    #[tokio::test]
    async fn test_all_triggers_dropped() {
        let (trigger, listener) = shutdown_channel();
        drop(trigger);
        assert!(listener.recv().await.is_none());
    }

    #[test]
    fn test_into_result() {
        assert!(ShutdownReason::Interrupt.into_result().is_ok());

        let err = ShutdownReason::Server(Ok(ServerClosed)).into_result().unwrap_err();
        assert_eq!(err.code(), "STOPPED");

        let err = ShutdownReason::Pipeline(Err(ProcessError::NotStarted {
            program: "ffmpeg".to_string(),
        }))
        .into_result()
        .unwrap_err();
        assert_eq!(err.code(), "RUNTIME_ERROR");
    }
}
