use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vms-proxy")]
#[command(about = "Authenticating gateway in front of a video-management server")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Address to listen on (overrides configuration)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage the server directory
    #[command(subcommand)]
    Servers(ServerCommands),
    /// Resolve credentials and obtain a token, reporting which address answered
    Check {
        /// Server id from the directory (default: directory default, then environment)
        #[arg(long)]
        server: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ServerCommands {
    /// List configured servers
    List,
    /// Add or update a server
    Add(AddServerArgs),
    /// Remove a server
    Remove {
        /// Server id
        id: String,
    },
    /// Make a server the default
    Default {
        /// Server id
        id: String,
    },
}

#[derive(Args)]
pub struct AddServerArgs {
    /// Unique server id
    #[arg(long)]
    pub id: String,
    /// Display name (defaults to the id)
    #[arg(long)]
    pub name: Option<String>,
    /// Base URL of the server
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub password: String,
    /// Use this server when a request names none
    #[arg(long)]
    pub default: bool,
    /// Store the server as inactive
    #[arg(long)]
    pub inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_servers_add() {
        let cli = Cli::try_parse_from([
            "vms-proxy",
            "servers",
            "add",
            "--id",
            "site-a",
            "--url",
            "https://a.vms.local",
            "--username",
            "operator",
            "--password",
            "secret",
            "--default",
        ])
        .unwrap();

        match cli.command {
            Commands::Servers(ServerCommands::Add(args)) => {
                assert_eq!(args.id, "site-a");
                assert!(args.default);
                assert!(!args.inactive);
            }
            _ => panic!("expected servers add"),
        }
    }
}
