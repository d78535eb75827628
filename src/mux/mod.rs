//! Stream muxing into HLS or DASH

pub mod ffmpeg;
pub mod types;

pub use ffmpeg::{dash_args, hls_args, MuxProcess};
pub use types::{MuxFormat, MuxOptions, SegmentType};
