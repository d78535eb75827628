//! HTTP(S) server for the generated playlists and segments

pub mod error;
pub mod static_files;
pub mod tls;

pub use error::ServerError;
pub use static_files::{ServerClosed, ServerConfig, ServerState, StaticFileServer, ROUTE_PREFIX};
