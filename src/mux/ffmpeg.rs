//! FFmpeg muxer process
//!
//! Repackages the camera's H.264 stream read from stdin into HLS or DASH
//! segments and playlists without re-encoding.

use crate::mux::types::{MuxFormat, MuxOptions, SegmentType};
use crate::process::{CommandLine, ProcessError, ProcessExit, ProcessHandle, ProcessSpawner, ProcessStatus};
use crate::utils::error::ConfigError;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

/// Flags shared by both formats: read stdin in real time, copy the stream
fn input_args(format: MuxFormat) -> Vec<String> {
    let format = format.to_string();
    ["-re", "-i", "pipe:0", "-codec", "copy", "-f", format.as_str(), "-an"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn path_arg(directory: &Path, file: &str) -> String {
    directory.join(file).to_string_lossy().to_string()
}

/// Build the ffmpeg arguments for HLS output
pub fn hls_args(directory: &Path, segment_type: SegmentType, options: &MuxOptions) -> Vec<String> {
    let mut args = input_args(MuxFormat::Hls);
    let mut hls_flags = vec!["second_level_segment_index"];

    // %s is expanded by strftime, %%d then becomes the segment index
    let segment_pattern = format!("%s-%%d.{}", segment_type.hls_extension());
    args.extend([
        "-strftime".to_string(),
        "1".to_string(),
        "-hls_segment_type".to_string(),
        segment_type.as_str().to_string(),
        "-hls_segment_filename".to_string(),
        path_arg(directory, &segment_pattern),
    ]);

    if options.fps != 0 {
        args.extend(["-r".to_string(), options.fps.to_string()]);
    }

    if options.segment_time != 0 {
        args.extend(["-hls_time".to_string(), options.segment_time.to_string()]);
        hls_flags.push("split_by_time");
    }

    if options.playlist_size != 0 {
        args.extend(["-hls_list_size".to_string(), options.playlist_size.to_string()]);
    }

    if options.storage_size != 0 {
        args.extend([
            "-hls_delete_threshold".to_string(),
            options.storage_size.to_string(),
        ]);
        hls_flags.push("delete_segments");
    }

    args.extend(["-hls_flags".to_string(), hls_flags.join("+")]);
    args.push(path_arg(directory, MuxFormat::Hls.playlist_name()));
    args
}

/// Build the ffmpeg arguments for DASH output
pub fn dash_args(directory: &Path, segment_type: SegmentType, options: &MuxOptions) -> Vec<String> {
    let mut args = input_args(MuxFormat::Dash);
    args.extend([
        "-init_seg_name".to_string(),
        "init.$ext$".to_string(),
        "-media_seg_name".to_string(),
        "$Time$-$Number$.$ext$".to_string(),
        "-dash_segment_type".to_string(),
        segment_type.as_str().to_string(),
    ]);

    if options.fps != 0 {
        args.extend(["-r".to_string(), options.fps.to_string()]);
    }

    if options.segment_time != 0 {
        args.extend(["-seg_duration".to_string(), options.segment_time.to_string()]);
    }

    if options.playlist_size != 0 {
        args.extend(["-window_size".to_string(), options.playlist_size.to_string()]);
    }

    if options.storage_size != 0 {
        args.extend([
            "-extra_window_size".to_string(),
            options.storage_size.to_string(),
        ]);
    }

    args.push(path_arg(directory, MuxFormat::Dash.playlist_name()));
    args
}

/// The ffmpeg muxer reading the video stream from stdin
pub struct MuxProcess {
    format: MuxFormat,
    process: ProcessHandle,
}

impl MuxProcess {
    /// Prepare the muxer without spawning it
    ///
    /// Fails on an unknown segment type before anything is launched.
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        format: MuxFormat,
        directory: &Path,
        options: &MuxOptions,
    ) -> Result<Self, ConfigError> {
        let segment_type = format.parse_segment_type(&options.segment_type)?;
        let args = match format {
            MuxFormat::Hls => hls_args(directory, segment_type, options),
            MuxFormat::Dash => dash_args(directory, segment_type, options),
        };

        Ok(Self {
            format,
            process: ProcessHandle::new(spawner, CommandLine::new("ffmpeg", args)),
        })
    }

    pub fn format(&self) -> MuxFormat {
        self.format
    }

    pub fn command(&self) -> &CommandLine {
        self.process.command()
    }

    pub fn status(&self) -> ProcessStatus {
        self.process.status()
    }

    /// Bind the video stream as stdin and spawn ffmpeg
    ///
    /// Must succeed before the camera starts writing so no opening bytes are
    /// lost.
    pub fn start(&mut self, input: impl Into<Stdio>) -> Result<(), ProcessError> {
        self.process.set_stdin(input.into())?;
        self.process.start()
    }

    /// Wait for ffmpeg to flush and exit
    pub async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        self.process.wait().await
    }

    pub fn terminate(&mut self) -> Result<(), ProcessError> {
        self.process.terminate()
    }
}
