//! camcast - stream a Raspberry Pi camera as HLS or DASH.
//!
//! Pipes the camera program's H.264 output into ffmpeg, serves the segments
//! and playlist over HTTP(S), and shuts everything down together when any
//! part stops.

pub mod capture;
pub mod config;
pub mod lifecycle;
pub mod mux;
pub mod process;
pub mod server;
pub mod utils;

use capture::CaptureProcess;
use config::Cli;
use lifecycle::{shutdown_signal, LifecycleCoordinator, Pipeline, StreamTeardown};
use mux::MuxProcess;
use process::{CommandLine, ProcessSpawner, SystemSpawner};
use serde::Serialize;
use server::StaticFileServer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utils::AppResult;

/// Command lines printed by `--dry-run`
#[derive(Debug, Serialize)]
pub struct DryRun<'a> {
    pub capture: &'a CommandLine,
    pub mux: &'a CommandLine,
}

/// Install the global subscriber; `RUST_LOG` overrides the level
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "camcast=debug,tower_http=debug"
    } else {
        "camcast=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the stream until interrupted or until a component fails
pub async fn run(cli: Cli) -> AppResult<()> {
    let settings = cli.command.settings()?;
    let spawner: Arc<dyn ProcessSpawner> = Arc::new(SystemSpawner);

    let capture = CaptureProcess::new(spawner.clone(), settings.camera, &settings.capture)?;
    let mux = MuxProcess::new(
        spawner,
        settings.format,
        &settings.server.directory,
        &settings.mux,
    )?;

    if cli.dry_run {
        let plan = DryRun {
            capture: capture.command(),
            mux: mux.command(),
        };
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    tracing::info!(
        "Starting camcast v{} ({}, {})",
        env!("CARGO_PKG_VERSION"),
        settings.format,
        settings.camera.program()
    );

    let server = StaticFileServer::new(settings.server);
    let capture_stop = CancellationToken::new();
    let teardown = StreamTeardown::new(capture_stop.clone(), server.clone());

    let serving = {
        let server = server.clone();
        async move { server.listen_and_serve().await }
    };
    let pipeline = Pipeline::new(capture, mux).run(capture_stop);

    let reason = LifecycleCoordinator::new()
        .run(shutdown_signal(), serving, pipeline, &teardown)
        .await;

    tracing::info!(%reason, "Stopped");
    reason.into_result()
}
