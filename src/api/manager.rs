use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use serde_json::{Value, json};

use super::auth::{AuthManager, PasswordGrantAuthenticator, TokenCache};
use super::candidates::CandidateResolver;
use super::client::{BackendClient, build_http_client};
use super::error::ProxyError;
use super::models::{AccessGrant, ProxyMode, ProxyReply, ProxyRequest, ServerCredential};
use super::resolver::{CredentialResolver, ServerDirectory};
use crate::config::{BackendSettings, StaticCredentials};

/// Validate an inbound request and decide what to dispatch
pub fn parse_mode(request: &ProxyRequest) -> Result<ProxyMode, ProxyError> {
    if let Some(batch) = &request.batch_snapshots {
        return Ok(ProxyMode::Batch {
            paths: parse_batch(batch)?,
        });
    }

    let endpoint = request
        .endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest("endpoint is required".to_string()))?;

    let method_name = request.method_name().to_ascii_uppercase();
    let method = reqwest::Method::from_bytes(method_name.as_bytes())
        .map_err(|_| ProxyError::InvalidRequest(format!("unsupported method '{}'", request.method_name())))?;

    Ok(ProxyMode::Single {
        endpoint: endpoint.to_string(),
        method,
        body: request.body.clone().filter(|b| !b.is_null()),
        return_image: request.return_image,
    })
}

fn parse_batch(batch: &Value) -> Result<BTreeMap<String, Option<String>>, ProxyError> {
    let entries = batch
        .as_object()
        .ok_or_else(|| ProxyError::InvalidRequest("batchSnapshots must be an object".to_string()))?;

    entries
        .iter()
        .map(|(key, path)| match path {
            Value::String(path) => Ok((key.clone(), Some(path.clone()))),
            Value::Null => Ok((key.clone(), None)),
            other => Err(ProxyError::InvalidRequest(format!(
                "batchSnapshots['{}'] must be a string or null, got {}",
                key, other
            ))),
        })
        .collect()
}

/// End-to-end request handling: credentials, token, dispatch
#[derive(Clone)]
pub struct ProxyService {
    credentials: CredentialResolver,
    auth: AuthManager,
    backend: BackendClient,
}

impl ProxyService {
    pub fn new(credentials: CredentialResolver, auth: AuthManager, backend: BackendClient) -> Self {
        Self {
            credentials,
            auth,
            backend,
        }
    }

    /// Wire up the production collaborators from configuration
    pub fn from_settings(
        settings: &BackendSettings,
        directory: Option<Arc<dyn ServerDirectory>>,
        fallback: Option<StaticCredentials>,
    ) -> anyhow::Result<Self> {
        let http = build_http_client(settings.timeout(), settings.accept_invalid_certs)?;

        let authenticator = PasswordGrantAuthenticator::with_endpoint(
            http.clone(),
            &settings.token_path,
            &settings.client_id,
        );
        let auth = AuthManager::new(
            CandidateResolver::new(settings.fallback_port),
            TokenCache::new(settings.token_safety_margin_secs, settings.default_token_lifetime_secs),
            Arc::new(authenticator),
        );
        let backend = BackendClient::with_options(http, &settings.api_prefix, settings.batch_concurrency);

        Ok(Self::new(CredentialResolver::new(directory, fallback), auth, backend))
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Resolve credentials for `server_id` and obtain a usable token
    pub async fn authorize(&self, server_id: Option<&str>) -> Result<(ServerCredential, AccessGrant), ProxyError> {
        let credential = self.credentials.resolve(server_id).await?;
        let grant = self.auth.get_access_token(&credential).await?;
        debug!("Authorized against {}", grant.base_url);
        Ok((credential, grant))
    }

    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyReply, ProxyError> {
        let mode = parse_mode(&request)?;
        let (_, grant) = self.authorize(request.server_id.as_deref()).await?;

        match mode {
            ProxyMode::Batch { paths } => {
                info!("Fetching {} snapshots from {}", paths.len(), grant.base_url);
                let images = self.backend.dispatch_batch(&grant, &paths).await;
                Ok(ProxyReply::ok(json!({ "images": images })))
            }
            ProxyMode::Single {
                endpoint,
                method,
                body,
                return_image,
            } => {
                self.backend
                    .dispatch(&grant, &endpoint, method, body.as_ref(), return_image)
                    .await
            }
        }
    }
}
