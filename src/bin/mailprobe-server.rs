use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mailprobe::Verifier;
use mailprobe::server::{self, AppState, LogConfig, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "mailprobe-server", version, about = "HTTP e-mail validation service")]
struct Cli {
    /// TOML configuration file (default: $MAILPROBE_CONFIG)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// listen address, overrides the configuration
    #[arg(long)]
    listen: Option<String>,
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log.level.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if log.is_json() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("load configuration")?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
        config.validate().context("invalid --listen")?;
    }
    init_tracing(&config.log);

    let verifier =
        Verifier::from_system_conf(config.verify.clone()).context("initialise DNS resolver")?;
    let state = Arc::new(AppState { verifier });

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(
        origins = ?config.allowed_origins,
        mail_from = %config.verify.probe.mail_from,
        "starting mailprobe-server"
    );
    server::serve(listener, state, &config).await?;
    Ok(())
}
