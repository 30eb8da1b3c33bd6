//! runplane CLI

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use runplane_cli::cli::{Cli, Commands};
use runplane_cli::{logging, start, StartContext};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                cancel.cancel();
            }
        }
    });

    let result = match cli.command {
        Commands::Start(args) => match StartContext::from_env() {
            Ok(context) => start(args, context, cancel).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "runplane start failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
