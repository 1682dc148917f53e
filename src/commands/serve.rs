use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use crate::api::{ProxyService, ServerDirectory};
use crate::config::{ProxyConfig, StaticCredentials};
use crate::server::{self, AppState};

pub async fn serve_command(config: ProxyConfig, bind: Option<String>) -> Result<()> {
    info!("Executing serve command");

    let service = build_service(&config).await?;
    let state = Arc::new(AppState {
        service,
        request_deadline: config.server.request_deadline(),
    });

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    server::serve(&bind, state).await
}

/// Build the proxy service from configuration and the process environment
pub async fn build_service(config: &ProxyConfig) -> Result<ProxyService> {
    let directory = super::open_directory(config)
        .await?
        .map(|d| Arc::new(d) as Arc<dyn ServerDirectory>);

    let fallback = StaticCredentials::from_env();
    if directory.is_none() && !fallback.is_complete() {
        warn!("Neither a server directory nor VMS_SERVER_URL/VMS_USERNAME/VMS_PASSWORD are configured");
    }

    ProxyService::from_settings(&config.backend, directory, Some(fallback))
}
