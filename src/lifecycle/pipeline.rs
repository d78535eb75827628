//! Capture-to-mux pipeline
//!
//! Starts ffmpeg before the camera so no opening bytes are lost, then waits
//! for the camera and ffmpeg in that order. ffmpeg finishes flushing once it
//! sees the end of the stream.

use crate::capture::CaptureProcess;
use crate::mux::MuxProcess;
use crate::process::ProcessError;
use tokio_util::sync::CancellationToken;

pub struct Pipeline {
    capture: CaptureProcess,
    mux: MuxProcess,
}

impl Pipeline {
    pub fn new(capture: CaptureProcess, mux: MuxProcess) -> Self {
        Self { capture, mux }
    }

    /// Run both processes to completion
    ///
    /// Cancelling `stop` terminates the camera; ffmpeg is then left to drain
    /// the rest of the stream and exit on its own.
    pub async fn run(mut self, stop: CancellationToken) -> Result<(), ProcessError> {
        let input = self.capture.take_output().ok_or_else(|| ProcessError::Pipe {
            program: self.capture.command().program.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "video stream already taken",
            ),
        })?;
        tracing::info!(
            format = %self.mux.format(),
            camera = %self.capture.command().program,
            "Starting pipeline"
        );
        self.mux.start(input)?;

        // A failed spawn drops the write end, so ffmpeg sees EOF
        if let Err(e) = self.capture.start() {
            tracing::error!("Failed to start camera: {}", e);
            if let Err(e) = self.mux.terminate() {
                tracing::warn!("Failed to stop ffmpeg: {}", e);
            }
            if let Err(e) = self.mux.wait().await {
                tracing::debug!("ffmpeg after failed camera start: {}", e);
            }
            return Err(e);
        }

        let outcome = tokio::select! {
            result = self.capture.wait() => Some(result),
            _ = stop.cancelled() => None,
        };
        let captured = match outcome {
            Some(result) => result,
            None => {
                if let Err(e) = self.capture.terminate() {
                    tracing::warn!("Failed to stop camera: {}", e);
                }
                self.capture.wait().await
            }
        };

        let muxed = self.mux.wait().await;
        match (captured, muxed) {
            (Err(e), muxed) => {
                if let Err(mux_err) = muxed {
                    tracing::warn!("ffmpeg also failed: {}", mux_err);
                }
                Err(e)
            }
            (Ok(_), muxed) => muxed.map(|_| ()),
        }
    }
}
