use std::path::PathBuf;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::watch;

use killfeed::configuration::config::{Config, CONFIG_ENV};
use killfeed::controller::controller_handler::Controller;

#[derive(Parser, Debug)]
#[command(name = "killfeed")]
#[command(version)]
#[command(about = "Incremental kill feed and server log ingestion for remote game servers")]
struct Args {
    /// Configuration file (TOML)
    #[arg(env = CONFIG_ENV)]
    config_file: PathBuf,

    /// Run a single tick over every source, then exit
    #[arg(long)]
    once: bool,

    /// Serve the operator API on this port, whatever the configuration says
    #[arg(long)]
    web_port: Option<u16>,
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "Unable to import configuration from {}: {}",
                args.config_file.display(),
                e
            );
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let controller = Controller::new(config).with_web_port(args.web_port);

    if args.once {
        match controller.run_once().await {
            Ok(summary) => {
                for report in &summary.reports {
                    if let Some(err) = &report.error {
                        warn!("{}: {}", report.source_id, err);
                    }
                }
            }
            Err(e) => {
                error!("Single pass failed: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = controller.run(shutdown_rx).await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
