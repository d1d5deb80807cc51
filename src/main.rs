//! labgate - experiment access control service

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use labgate::{logging, Config, Server};

/// Experiment access control decision service
#[derive(Parser, Debug)]
#[command(name = "labgate", version, about = "Serve experiment access decisions over HTTP")]
struct Args {
    /// TOML configuration file (defaults to ./labgate.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    logging::init_tracing(config.log_format, logging::DEFAULT_FILTER);

    let server = Arc::new(Server::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received ctrl-c, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
