use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("directory does not exist: {}", .0.display())]
    InvalidDirectory(PathBuf),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read TLS file {}: {source}", .path.display())]
    TlsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {}", .0.display())]
    NoCertificate(PathBuf),

    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("connections still open after {0:?} shutdown deadline")]
    ShutdownTimeout(Duration),
}
