//! Server credential resolution
//!
//! Priority: explicit server id (hard requirement), then the directory's
//! default-and-active entry, then static environment configuration.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use super::error::ProxyError;
use super::models::ServerCredential;
use crate::config::StaticCredentials;

/// Read-only lookup of backend credentials
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<ServerCredential>>;

    async fn find_default_active(&self) -> anyhow::Result<Option<ServerCredential>>;
}

#[derive(Clone)]
pub struct CredentialResolver {
    directory: Option<Arc<dyn ServerDirectory>>,
    fallback: Option<StaticCredentials>,
}

impl CredentialResolver {
    pub fn new(directory: Option<Arc<dyn ServerDirectory>>, fallback: Option<StaticCredentials>) -> Self {
        Self { directory, fallback }
    }

    pub async fn resolve(&self, server_id: Option<&str>) -> Result<ServerCredential, ProxyError> {
        if let Some(id) = server_id.filter(|id| !id.is_empty()) {
            return self.resolve_explicit(id).await;
        }

        if let Some(directory) = &self.directory {
            match directory.find_default_active().await {
                Ok(Some(credential)) => {
                    debug!("Using default directory entry {}", credential.url);
                    return Ok(credential);
                }
                Ok(None) => debug!("No default active server in directory"),
                Err(e) => warn!("Default server lookup failed, using static configuration: {:#}", e),
            }
        }

        match &self.fallback {
            Some(fallback) => fallback.to_credential(),
            None => Err(ProxyError::NotConfigured(
                "no directory entry and no static server configuration".to_string(),
            )),
        }
    }

    async fn resolve_explicit(&self, id: &str) -> Result<ServerCredential, ProxyError> {
        let Some(directory) = &self.directory else {
            warn!("Server '{}' requested but no directory store is configured", id);
            return Err(ProxyError::ServerNotFound(id.to_string()));
        };

        match directory.find_by_id(id).await {
            Ok(Some(credential)) => {
                info!("Resolved server '{}' to {}", id, credential.url);
                Ok(credential)
            }
            Ok(None) => Err(ProxyError::ServerNotFound(id.to_string())),
            Err(e) => {
                warn!("Lookup of server '{}' failed: {:#}", id, e);
                Err(ProxyError::ServerNotFound(id.to_string()))
            }
        }
    }
}
