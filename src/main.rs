use camcast::config::Cli;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    camcast::init_tracing(cli.verbose);

    match camcast::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code(), "{}", e);
            e.exit_code()
        }
    }
}
