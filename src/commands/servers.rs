use anyhow::Result;
use colored::Colorize;
use log::info;

use crate::cli::{AddServerArgs, ServerCommands};
use crate::config::ProxyConfig;
use crate::config::repository::{ServerRecord, servers};

pub async fn servers_command(config: ProxyConfig, command: ServerCommands) -> Result<()> {
    let directory = super::require_directory(&config).await?;
    let pool = directory.pool();

    match command {
        ServerCommands::List => {
            info!("Listing servers");
            let records = servers::list(pool).await?;
            if records.is_empty() {
                println!("No servers configured.");
                println!("Run 'vms-proxy servers add' to create one.");
                return Ok(());
            }

            println!("Configured servers:");
            for record in records {
                let marker = if record.is_default { "●" } else { "○" };
                let state = if record.is_active { "".normal() } else { " (inactive)".dimmed() };
                let default = if record.is_default { " (default)".green() } else { "".normal() };
                println!(
                    "  {} {} - {} [{}]{}{}",
                    marker, record.id, record.name, record.url, default, state
                );
            }
        }
        ServerCommands::Add(args) => {
            let record = record_from_args(args);
            servers::upsert(pool, &record).await?;
            println!("{} Saved server '{}'", "✓".green(), record.id);
        }
        ServerCommands::Remove { id } => {
            servers::delete(pool, &id).await?;
            println!("{} Removed server '{}'", "✓".green(), id);
        }
        ServerCommands::Default { id } => {
            servers::set_default(pool, &id).await?;
            println!("{} '{}' is now the default server", "✓".green(), id);
        }
    }

    Ok(())
}

fn record_from_args(args: AddServerArgs) -> ServerRecord {
    ServerRecord {
        name: args.name.unwrap_or_else(|| args.id.clone()),
        id: args.id,
        url: args.url.trim_end_matches('/').to_string(),
        username: args.username,
        password: args.password,
        is_default: args.default,
        is_active: !args.inactive,
    }
}
