pub mod check;
pub mod serve;
pub mod servers;

use anyhow::{Context, Result};
use log::debug;

use crate::config::ProxyConfig;
use crate::config::db;
use crate::config::repository::SqliteDirectory;

pub use check::check_command;
pub use serve::serve_command;
pub use servers::servers_command;

/// Open the directory store, if one is configured
pub async fn open_directory(config: &ProxyConfig) -> Result<Option<SqliteDirectory>> {
    let Some(path) = &config.directory.database else {
        debug!("No directory database configured");
        return Ok(None);
    };

    let pool = db::open(path)
        .await
        .with_context(|| format!("Failed to open server directory at {}", path.display()))?;
    Ok(Some(SqliteDirectory::new(pool)))
}

/// Open the directory store, failing when none is configured
pub async fn require_directory(config: &ProxyConfig) -> Result<SqliteDirectory> {
    open_directory(config).await?.context(
        "No server directory configured. Set [directory] database in the config file or VMS_PROXY_DATABASE.",
    )
}
