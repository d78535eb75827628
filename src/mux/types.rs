//! Mux types and configuration
//!
//! Output formats, segment container kinds and the options that tune the
//! ffmpeg muxer.

use crate::utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playlist-based delivery format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuxFormat {
    Hls,
    Dash,
}

impl MuxFormat {
    /// Segment container kinds this format accepts; the first is the default
    pub fn segment_types(&self) -> &'static [SegmentType] {
        match self {
            MuxFormat::Hls => &[SegmentType::MpegTs, SegmentType::Fmp4],
            MuxFormat::Dash => &[SegmentType::Auto, SegmentType::Mp4, SegmentType::Webm],
        }
    }

    /// Playlist written into the output directory
    pub fn playlist_name(&self) -> &'static str {
        match self {
            MuxFormat::Hls => "livestream.m3u8",
            MuxFormat::Dash => "livestream.mpd",
        }
    }

    /// Resolve a user-supplied segment type, case-insensitively
    ///
    /// An empty value selects the format's default.
    pub fn parse_segment_type(&self, value: &str) -> Result<SegmentType, ConfigError> {
        let supported = self.segment_types();
        let value = value.trim();
        if value.is_empty() {
            return Ok(supported[0]);
        }

        supported
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ConfigError::InvalidSegmentType {
                format: *self,
                value: value.to_string(),
            })
    }
}

impl fmt::Display for MuxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxFormat::Hls => f.write_str("hls"),
            MuxFormat::Dash => f.write_str("dash"),
        }
    }
}

/// Segment container kind, as ffmpeg spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    MpegTs,
    Fmp4,
    Auto,
    Mp4,
    Webm,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::MpegTs => "mpegts",
            SegmentType::Fmp4 => "fmp4",
            SegmentType::Auto => "auto",
            SegmentType::Mp4 => "mp4",
            SegmentType::Webm => "webm",
        }
    }

    /// File extension of HLS media segments of this kind
    pub fn hls_extension(&self) -> &'static str {
        match self {
            SegmentType::Fmp4 => "m4s",
            _ => "ts",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Muxer configuration
///
/// ffmpeg steps in with its own defaults for any zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxOptions {
    /// Framerate of the output video
    pub fps: u32,
    /// Segment container kind, empty for the format default
    pub segment_type: String,
    /// Segment length target duration in seconds
    pub segment_time: u32,
    /// Maximum number of playlist entries
    pub playlist_size: u32,
    /// Maximum number of unreferenced segments kept on disk before removal
    pub storage_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_segment_types() {
        let dash = MuxFormat::Dash;
        assert_eq!(dash.parse_segment_type("").unwrap(), SegmentType::Auto);
        assert_eq!(dash.parse_segment_type("AuTo").unwrap(), SegmentType::Auto);
        assert_eq!(dash.parse_segment_type("MP4").unwrap(), SegmentType::Mp4);
        assert_eq!(dash.parse_segment_type("mp4").unwrap(), SegmentType::Mp4);
        assert_eq!(dash.parse_segment_type("WeBm").unwrap(), SegmentType::Webm);
        assert!(dash.parse_segment_type("mpegts").is_err());
    }

    #[test]
    fn test_hls_segment_types() {
        let hls = MuxFormat::Hls;
        assert_eq!(hls.parse_segment_type("").unwrap(), SegmentType::MpegTs);
        assert_eq!(hls.parse_segment_type("MpegTS").unwrap(), SegmentType::MpegTs);
        assert_eq!(hls.parse_segment_type("FMP4").unwrap(), SegmentType::Fmp4);
        assert!(hls.parse_segment_type("webm").is_err());
    }

    #[test]
    fn test_invalid_segment_type_error() {
        let err = MuxFormat::Dash.parse_segment_type("badtype").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSegmentType { format: MuxFormat::Dash, ref value } if value == "badtype"
        ));
    }

    #[test]
    fn test_hls_extension() {
        assert_eq!(SegmentType::MpegTs.hls_extension(), "ts");
        assert_eq!(SegmentType::Fmp4.hls_extension(), "m4s");
    }
}
