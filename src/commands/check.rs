use anyhow::Result;
use colored::Colorize;
use log::{error, info};

use crate::config::ProxyConfig;

pub async fn check_command(config: ProxyConfig, server: Option<String>) -> Result<()> {
    info!("Executing check command");

    let service = super::serve::build_service(&config).await?;

    println!("VMS Proxy Connectivity Check");
    println!("============================");

    match service.authorize(server.as_deref()).await {
        Ok((credential, grant)) => {
            println!("Server:    {}", credential.url);
            println!("Username:  {}", credential.username);
            println!("Answered:  {}", grant.base_url);
            if grant.base_url.as_str() != credential.url.trim_end_matches('/') {
                println!("{}", "  (reached through the fallback address)".yellow());
            }
            println!("{}", "✓ Authentication successful".green());
            Ok(())
        }
        Err(e) => {
            error!("Connectivity check failed: {}", e);
            println!("{} {}", "✗ Check failed:".red(), e);
            anyhow::bail!("check failed ({:?})", e.kind())
        }
    }
}
