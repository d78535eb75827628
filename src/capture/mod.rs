//! Camera capture
//!
//! Spawns the camera program and exposes its video stream.

pub mod camera;

pub use camera::{capture_args, CameraBackend, CaptureOptions, CaptureProcess};
