use anyhow::Result;
use clap::Parser;
use log::info;

use vms_proxy::cli::{Cli, Commands};
use vms_proxy::commands::{check_command, serve_command, servers_command};
use vms_proxy::config::ProxyConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ProxyConfig::load(cli.config.as_deref())?;
    info!("Starting vms-proxy");

    match cli.command {
        Commands::Serve { bind } => serve_command(config, bind).await,
        Commands::Servers(command) => servers_command(config, command).await,
        Commands::Check { server } => check_command(config, server).await,
    }
}
