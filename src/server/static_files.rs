//! Static file server
//!
//! Serves the muxer's output directory under `/camera/` over HTTP or HTTPS.
//! Shutdown stops accepting, lets open connections finish until a deadline,
//! then closes whatever is left.

use super::error::ServerError;
use super::tls;
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// URL prefix the stream directory is mounted under
pub const ROUTE_PREFIX: &str = "/camera";

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub directory: PathBuf,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(port: u16, directory: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            directory: directory.into(),
            tls_cert: None,
            tls_key: None,
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_tls(mut self, cert: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        self.tls_cert = cert;
        self.tls_key = key;
        self
    }

    /// Certificate and key, only when both are set
    fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            (None, None) => None,
            _ => {
                tracing::warn!("Both a TLS certificate and key are needed, serving plain HTTP");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    /// `listen_and_serve` is running but has not bound yet
    Starting,
    Listening(SocketAddr),
    Closed { forced: bool },
}

/// Returned by `listen_and_serve` after a requested shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerClosed;

struct Inner {
    config: ServerConfig,
    shutdown: CancellationToken,
    deadline: Mutex<Duration>,
    state: watch::Sender<ServerState>,
}

/// Cloneable handle; one clone serves while another shuts it down
#[derive(Clone)]
pub struct StaticFileServer {
    inner: Arc<Inner>,
}

impl StaticFileServer {
    pub fn new(config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                shutdown: CancellationToken::new(),
                deadline: Mutex::new(Duration::ZERO),
                state,
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Wait for the listener to be bound and return its address
    ///
    /// Returns `None` if the server closed or failed before listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.inner.state.subscribe();
        let state = match rx
            .wait_for(|state| !matches!(state, ServerState::Idle | ServerState::Starting))
            .await
        {
            Ok(state) => *state,
            Err(_) => return None,
        };
        match state {
            ServerState::Listening(addr) => Some(addr),
            _ => None,
        }
    }

    /// Bind and serve until `shutdown` is called
    ///
    /// Resolves to `ServerClosed` after a requested shutdown, or to an error
    /// if the directory is missing or the listener cannot be set up.
    pub async fn listen_and_serve(&self) -> Result<ServerClosed, ServerError> {
        self.inner.state.send_replace(ServerState::Starting);
        if self.inner.shutdown.is_cancelled() {
            tracing::debug!("Shutdown requested before listening");
            self.inner
                .state
                .send_replace(ServerState::Closed { forced: false });
            return Ok(ServerClosed);
        }

        let result = self.bind_and_serve().await;
        if result.is_err() {
            self.inner
                .state
                .send_replace(ServerState::Closed { forced: false });
        }
        result
    }

    async fn bind_and_serve(&self) -> Result<ServerClosed, ServerError> {
        let config = &self.inner.config;
        if !config.directory.is_dir() {
            return Err(ServerError::InvalidDirectory(config.directory.clone()));
        }

        let acceptor = match config.tls_files() {
            Some((cert, key)) => Some(TlsAcceptor::from(tls::load_server_config(cert, key)?)),
            None => None,
        };

        let addr = SocketAddr::new(config.host, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(
            addr = %local,
            tls = acceptor.is_some(),
            directory = %config.directory.display(),
            "Serving {}/",
            ROUTE_PREFIX
        );
        self.inner.state.send_replace(ServerState::Listening(local));

        let app = router(&config.directory);
        let forced = self.serve(listener, acceptor, app).await;
        self.inner.state.send_replace(ServerState::Closed { forced });

        Ok(ServerClosed)
    }

    /// Accept until shutdown, then drain. Returns whether connections had to
    /// be cut off at the deadline.
    async fn serve(&self, listener: TcpListener, acceptor: Option<TlsAcceptor>, app: Router) -> bool {
        let mut connections = JoinSet::new();
        let drain = CancellationToken::new();

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        if !is_connection_error(&e) {
                            tracing::error!("Failed to accept connection: {}", e);
                            tokio::select! {
                                _ = self.inner.shutdown.cancelled() => break,
                                _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                            }
                        }
                        continue;
                    }
                },
            };

            while connections.try_join_next().is_some() {}

            let app = app.clone();
            let acceptor = acceptor.clone();
            let drain = drain.clone();
            connections.spawn(async move {
                match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => serve_connection(stream, peer, app, drain).await,
                        Err(e) => tracing::debug!(%peer, "TLS handshake failed: {}", e),
                    },
                    None => serve_connection(stream, peer, app, drain).await,
                }
            });
        }

        // Release the port before draining
        drop(listener);

        let deadline = *self.inner.deadline.lock();
        tracing::info!(
            open = connections.len(),
            deadline = ?deadline,
            "Static file server shutting down"
        );
        drain.cancel();

        let drained = tokio::time::timeout(deadline, async {
            while connections.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                remaining = connections.len(),
                "Shutdown deadline reached, closing connections"
            );
            connections.shutdown().await;
        }

        !drained
    }

    /// Stop accepting and wait for open connections up to `deadline`
    ///
    /// Once this returns the port is released. Returns `ShutdownTimeout` when
    /// connections had to be closed forcibly. On a server that was never
    /// started this returns at once, and a later `listen_and_serve` does not
    /// bind.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ServerError> {
        *self.inner.deadline.lock() = deadline;
        self.inner.shutdown.cancel();

        let mut rx = self.inner.state.subscribe();
        let state = match rx
            .wait_for(|state| !matches!(state, ServerState::Starting | ServerState::Listening(_)))
            .await
        {
            Ok(state) => *state,
            Err(_) => return Ok(()),
        };

        match state {
            ServerState::Closed { forced: true } => Err(ServerError::ShutdownTimeout(deadline)),
            _ => Ok(()),
        }
    }
}

fn router(directory: &Path) -> Router {
    Router::new()
        .nest_service(ROUTE_PREFIX, ServeDir::new(directory))
        .layer(TraceLayer::new_for_http())
}

async fn serve_connection<S>(stream: S, peer: SocketAddr, app: Router, drain: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = TowerToHyperService::new(app);
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(%peer, "Connection closed with error: {}", e);
                }
                break;
            }
            _ = drain.cancelled(), if !draining => {
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}

fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
