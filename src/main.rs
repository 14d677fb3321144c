use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use infofi_engine::app::{Config, Supervisor};

#[derive(Parser)]
#[command(name = "infofi-engine", about = "Raffle + prediction-market coordination engine")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to load config: {error}");
            std::process::exit(1);
        }
    };
    config.init_logging();

    info!("infofi-engine starting");
    let grace = Duration::from_millis(config.shutdown_grace_ms) + Duration::from_secs(5);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut engine = tokio::spawn(Supervisor::run(config, shutdown_rx));

    tokio::select! {
        result = &mut engine => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    error!(error = %error, "Fatal error");
                    std::process::exit(1);
                }
                Err(join_error) => {
                    error!(error = %join_error, "Engine task panicked");
                    std::process::exit(1);
                }
            }
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(grace, &mut engine).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(error))) => error!(error = %error, "Shutdown finished with error"),
                Ok(Err(join_error)) => error!(error = %join_error, "Engine task panicked"),
                Err(_) => error!("Shutdown grace elapsed; exiting anyway"),
            }
        }
    }

    info!("infofi-engine stopped");
}
