//! Command line configuration
//!
//! Every flag can also be set through a `CAMCAST_*` environment variable.

use crate::capture::{CameraBackend, CaptureOptions};
use crate::mux::{MuxFormat, MuxOptions};
use crate::server::ServerConfig;
use crate::utils::error::ConfigError;
use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Stream a Raspberry Pi camera as HLS or DASH over HTTP(S)
#[derive(Parser, Debug)]
#[command(name = "camcast", version)]
#[command(about = "Stream a Raspberry Pi camera as HLS or DASH", long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true, env = "CAMCAST_VERBOSE")]
    pub verbose: bool,

    /// Print the camera and ffmpeg command lines as JSON and exit
    #[arg(long, global = true, env = "CAMCAST_DRY_RUN")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: StreamCommand,
}

#[derive(Subcommand, Debug)]
pub enum StreamCommand {
    /// HTTP Live Streaming
    Hls {
        #[command(flatten)]
        video: VideoArgs,
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        segments: HlsSegmentArgs,
    },
    /// MPEG-DASH
    Dash {
        #[command(flatten)]
        video: VideoArgs,
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        segments: DashSegmentArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct VideoArgs {
    /// Camera program
    #[arg(long, env = "CAMCAST_CAMERA", value_enum, default_value_t = CameraBackend::Raspivid)]
    pub camera: CameraBackend,

    /// Frame width, 0 for the camera default
    #[arg(long, env = "CAMCAST_WIDTH", default_value_t = 1920)]
    pub width: u32,

    /// Frame height, 0 for the camera default
    #[arg(long, env = "CAMCAST_HEIGHT", default_value_t = 1080)]
    pub height: u32,

    /// Frames per second, 0 for the camera default
    #[arg(long, env = "CAMCAST_FPS", default_value_t = 30)]
    pub fps: u32,

    #[arg(long, env = "CAMCAST_HORIZONTAL_FLIP")]
    pub horizontal_flip: bool,

    #[arg(long, env = "CAMCAST_VERTICAL_FLIP")]
    pub vertical_flip: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Listening port, 0 for an ephemeral port
    #[arg(short, long, env = "CAMCAST_PORT")]
    pub port: u16,

    /// Directory the segments and playlist are written to and served from
    #[arg(short, long, env = "CAMCAST_DIRECTORY")]
    pub directory: PathBuf,

    /// Listening address
    #[arg(long, env = "CAMCAST_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// PEM certificate chain; HTTPS needs both this and --tls-key
    #[arg(long, env = "CAMCAST_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "CAMCAST_TLS_KEY")]
    pub tls_key: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct HlsSegmentArgs {
    /// mpegts or fmp4
    #[arg(long, env = "CAMCAST_SEGMENT_TYPE", default_value = "")]
    pub segment_type: String,

    /// Target segment duration in seconds
    #[arg(long, env = "CAMCAST_SEGMENT_TIME", default_value_t = 2)]
    pub segment_time: u32,

    /// Segments listed in the playlist
    #[arg(long, env = "CAMCAST_PLAYLIST_SIZE", default_value_t = 10)]
    pub playlist_size: u32,

    /// Unreferenced segments kept on disk
    #[arg(long, env = "CAMCAST_STORAGE_SIZE", default_value_t = 1)]
    pub storage_size: u32,
}

#[derive(Args, Debug, Clone)]
pub struct DashSegmentArgs {
    /// auto, mp4 or webm
    #[arg(long, env = "CAMCAST_SEGMENT_TYPE", default_value = "")]
    pub segment_type: String,

    /// Target segment duration in seconds, 0 for the ffmpeg default
    #[arg(long, env = "CAMCAST_SEGMENT_TIME", default_value_t = 0)]
    pub segment_time: u32,

    /// Segments listed in the manifest, 0 for the ffmpeg default
    #[arg(long, env = "CAMCAST_PLAYLIST_SIZE", default_value_t = 0)]
    pub playlist_size: u32,

    /// Segments kept outside the manifest window, 0 for the ffmpeg default
    #[arg(long, env = "CAMCAST_STORAGE_SIZE", default_value_t = 0)]
    pub storage_size: u32,
}

/// Resolved settings for one run
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub format: MuxFormat,
    pub camera: CameraBackend,
    pub capture: CaptureOptions,
    pub mux: MuxOptions,
    pub server: ServerConfig,
}

impl VideoArgs {
    fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            width: self.width,
            height: self.height,
            fps: self.fps,
            horizontal_flip: self.horizontal_flip,
            vertical_flip: self.vertical_flip,
        }
    }
}

impl ServerArgs {
    fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.port, self.directory.clone())
            .with_host(self.host)
            .with_tls(self.tls_cert.clone(), self.tls_key.clone())
    }
}

impl StreamCommand {
    /// Validate the arguments and build the per-component options
    ///
    /// Runs before anything is spawned or bound.
    pub fn settings(&self) -> Result<StreamSettings, ConfigError> {
        let (format, video, server, mux) = match self {
            StreamCommand::Hls {
                video,
                server,
                segments,
            } => (
                MuxFormat::Hls,
                video,
                server,
                MuxOptions {
                    fps: video.fps,
                    segment_type: segments.segment_type.clone(),
                    segment_time: segments.segment_time,
                    playlist_size: segments.playlist_size,
                    storage_size: segments.storage_size,
                },
            ),
            StreamCommand::Dash {
                video,
                server,
                segments,
            } => (
                MuxFormat::Dash,
                video,
                server,
                MuxOptions {
                    fps: video.fps,
                    segment_type: segments.segment_type.clone(),
                    segment_time: segments.segment_time,
                    playlist_size: segments.playlist_size,
                    storage_size: segments.storage_size,
                },
            ),
        };

        format.parse_segment_type(&mux.segment_type)?;
        if !server.directory.is_dir() {
            return Err(ConfigError::InvalidDirectory(server.directory.clone()));
        }

        Ok(StreamSettings {
            format,
            camera: video.camera,
            capture: video.capture_options(),
            mux,
            server: server.server_config(),
        })
    }
}
