//! Camera capture process
//!
//! Wraps the Raspberry Pi camera programs (`raspivid`, `libcamera-vid`) that
//! write an H.264 elementary stream to standard output.

use crate::process::{CommandLine, ProcessError, ProcessExit, ProcessHandle, ProcessSpawner, ProcessStatus};
use serde::{Deserialize, Serialize};
use std::io::PipeReader;
use std::sync::Arc;

/// Camera program used for capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    /// Legacy camera stack
    #[default]
    Raspivid,
    /// libcamera stack
    LibcameraVid,
}

impl CameraBackend {
    /// Executable name for this backend
    pub fn program(&self) -> &'static str {
        match self {
            CameraBackend::Raspivid => "raspivid",
            CameraBackend::LibcameraVid => "libcamera-vid",
        }
    }
}

/// Capture configuration
///
/// Zero dimensions or framerate leave the choice to the camera program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: u32,
    /// Mirror the image horizontally
    pub horizontal_flip: bool,
    /// Mirror the image vertically
    pub vertical_flip: bool,
}

/// Build the camera program arguments
pub fn capture_args(options: &CaptureOptions) -> Vec<String> {
    // stdout output, run until killed
    let mut args: Vec<String> = ["-o", "-", "-t", "0"].iter().map(|s| s.to_string()).collect();

    if options.width != 0 {
        args.extend(["--width".to_string(), options.width.to_string()]);
    }

    if options.height != 0 {
        args.extend(["--height".to_string(), options.height.to_string()]);
    }

    if options.fps != 0 {
        args.extend(["--framerate".to_string(), options.fps.to_string()]);
    }

    if options.horizontal_flip {
        args.push("--hflip".to_string());
    }

    if options.vertical_flip {
        args.push("--vflip".to_string());
    }

    args
}

/// The camera program with its stdout bound to a pipe
pub struct CaptureProcess {
    process: ProcessHandle,
    output: Option<PipeReader>,
}

impl CaptureProcess {
    /// Prepare the camera program without spawning it
    ///
    /// Creates the pipe that carries the video stream; its read end is
    /// available through [`CaptureProcess::take_output`].
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        backend: CameraBackend,
        options: &CaptureOptions,
    ) -> Result<Self, ProcessError> {
        let command = CommandLine::new(backend.program(), capture_args(options));
        let (reader, writer) = std::io::pipe().map_err(|source| ProcessError::Pipe {
            program: command.program.clone(),
            source,
        })?;

        let mut process = ProcessHandle::new(spawner, command);
        process.set_stdout(writer.into())?;

        Ok(Self {
            process,
            output: Some(reader),
        })
    }

    /// Read end of the video stream, handed out once
    pub fn take_output(&mut self) -> Option<PipeReader> {
        self.output.take()
    }

    pub fn command(&self) -> &CommandLine {
        self.process.command()
    }

    pub fn status(&self) -> ProcessStatus {
        self.process.status()
    }

    /// Spawn the camera program
    pub fn start(&mut self) -> Result<(), ProcessError> {
        self.process.start()
    }

    /// Wait for the camera program to exit
    pub async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        self.process.wait().await
    }

    /// Kill the camera program, closing the write end of the stream
    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        self.process.terminate()
    }
}
