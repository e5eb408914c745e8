//! `sector-server`: runs the Arcane Sector world server.

use std::path::PathBuf;

use sector::prelude::*;
use tracing::{error, info};

fn usage_and_exit() -> ! {
    eprintln!(
        "sector-server

USAGE:
  sector-server [--config <path>] [--bind <addr>]

ENV:
  SECTOR_CONFIG   config file, overridden by --config
  SECTOR_BIND     TCP listen address, overridden by --bind
  RUST_LOG        log filter, default info
"
    );
    std::process::exit(2);
}

struct Args {
    config: Option<PathBuf>,
    bind: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: std::env::var_os("SECTOR_CONFIG").map(PathBuf::from),
        bind: std::env::var("SECTOR_BIND").ok().filter(|s| !s.trim().is_empty()),
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().unwrap_or_else(|| usage_and_exit()).into()),
            "--bind" => args.bind = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            _ => usage_and_exit(),
        }
    }
    args
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run(parse_args()).await {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), SectorError> {
    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            ServerConfig::load(path)?
        }
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if config.password_hashes.is_empty() {
        info!("no password hashes configured, every player slot is locked");
    }

    let auth = config.authenticator()?;
    let server = SectorServer::builder().config(config).build(auth).await?;
    info!(addr = ?server.local_addr().ok(), "listening");

    let stop = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            stop.shutdown();
        }
    });

    server.run().await
}
