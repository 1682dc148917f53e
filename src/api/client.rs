use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose};
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};

use super::constants::{self, API_PREFIX, BATCH_CONCURRENCY, DEFAULT_IMAGE_MIME, REQUEST_TIMEOUT_SECS};
use super::error::{ProxyError, classify_transport};
use super::models::{AccessGrant, ProxyReply};

/// Build the shared outbound HTTP client
pub fn build_http_client(timeout: Duration, accept_invalid_certs: bool) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .connect_timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .user_agent(concat!("vms-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Issues authenticated calls against the backend resource API
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    api_prefix: String,
    batch_concurrency: usize,
}

impl BackendClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_options(http_client, API_PREFIX, BATCH_CONCURRENCY)
    }

    pub fn with_options(http_client: reqwest::Client, api_prefix: &str, batch_concurrency: usize) -> Self {
        Self {
            http_client,
            api_prefix: api_prefix.to_string(),
            batch_concurrency: batch_concurrency.max(1),
        }
    }

    /// Default client with the standard 15s timeout
    pub fn with_defaults() -> anyhow::Result<Self> {
        let http = build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS), false)?;
        Ok(Self::new(http))
    }

    /// Get shared HTTP client for making requests (cheap clone)
    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    pub fn url_for(&self, grant: &AccessGrant, endpoint: &str) -> String {
        constants::api_url(grant.base_url.as_str(), &self.api_prefix, endpoint)
    }

    /// Single call: JSON passthrough, or an image wrapped as a data URL
    pub async fn dispatch(
        &self,
        grant: &AccessGrant,
        endpoint: &str,
        method: reqwest::Method,
        body: Option<&Value>,
        return_image: bool,
    ) -> Result<ProxyReply, ProxyError> {
        let url = self.url_for(grant, endpoint);
        debug!("{} {}", method, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, constants::headers::bearer(&grant.token));

        if let Some(body) = body {
            let payload = serde_json::to_vec(body).context("Failed to serialize request body")?;
            request = request
                .header(CONTENT_TYPE, constants::headers::CONTENT_TYPE_JSON)
                .body(payload);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e, &url))?;
        let status = response.status();

        if return_image {
            if !status.is_success() {
                warn!("Image request to {} failed with {}", url, status);
                return Ok(ProxyReply::with_status(
                    status.as_u16(),
                    json!({ "error": format!("Failed to fetch image: {}", status) }),
                ));
            }

            let image = read_data_url(response, &url).await?;
            return Ok(ProxyReply::ok(json!({ "image": image })));
        }

        let bytes = response.bytes().await.map_err(|e| classify_transport(&e, &url))?;
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                ProxyError::Internal(anyhow::anyhow!(
                    "Backend returned non-JSON body ({}) from {}: {}",
                    status,
                    url,
                    e
                ))
            })?
        };

        Ok(ProxyReply::with_status(status.as_u16(), payload))
    }

    /// Fetch many snapshots. A failed entry becomes `None`; the batch never fails.
    pub async fn dispatch_batch(
        &self,
        grant: &AccessGrant,
        paths: &BTreeMap<String, Option<String>>,
    ) -> BTreeMap<String, Option<String>> {
        self.fetch_snapshots(grant, paths)
            .await
            .into_iter()
            .map(|(key, outcome)| match outcome {
                Ok(data_url) => (key, data_url),
                Err(e) => {
                    warn!("Snapshot '{}' unavailable: {}", key, e);
                    (key, None)
                }
            })
            .collect()
    }

    /// Per-entry outcomes, with failure reasons kept. `Ok(None)` means no path was given.
    pub async fn fetch_snapshots(
        &self,
        grant: &AccessGrant,
        paths: &BTreeMap<String, Option<String>>,
    ) -> BTreeMap<String, Result<Option<String>, ProxyError>> {
        stream::iter(paths.clone())
            .map(|(key, path)| async move {
                let outcome = match path.as_deref().filter(|p| !p.is_empty()) {
                    Some(path) => self.fetch_snapshot(grant, path).await.map(Some),
                    None => Ok(None),
                };
                (key, outcome)
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await
    }

    async fn fetch_snapshot(&self, grant: &AccessGrant, path: &str) -> Result<String, ProxyError> {
        let url = self.url_for(grant, path);

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, constants::headers::bearer(&grant.token))
            .send()
            .await
            .map_err(|e| classify_transport(&e, &url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: format!("snapshot request to {} failed", url),
            });
        }

        read_data_url(response, &url).await
    }
}

async fn read_data_url(response: reqwest::Response, url: &str) -> Result<String, ProxyError> {
    let mime = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string();

    let bytes = response.bytes().await.map_err(|e| classify_transport(&e, url))?;
    Ok(data_url(&mime, &bytes))
}

/// `data:<mime>;base64,<payload>`
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_encoding() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
        assert_eq!(data_url("image/jpeg", b""), "data:image/jpeg;base64,");
    }

    #[test]
    fn test_url_for_uses_grant_candidate() {
        let client = BackendClient::with_defaults().unwrap();
        let grant = AccessGrant {
            token: "t".into(),
            base_url: crate::api::models::CandidateUrl::new("http://vms.local:8380"),
        };

        assert_eq!(
            client.url_for(&grant, "/cameras"),
            "http://vms.local:8380/api/rest/v1/cameras"
        );
        assert_eq!(
            client.url_for(&grant, "/api/rest/v1/cameras"),
            "http://vms.local:8380/api/rest/v1/cameras"
        );
    }
}
