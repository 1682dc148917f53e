use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::candidates::CandidateResolver;
use super::constants::{self, DEFAULT_TOKEN_LIFETIME_SECS, TOKEN_SAFETY_MARGIN_SECS};
use super::error::{ProxyError, classify_transport};
use super::models::{AccessGrant, CachedToken, CandidateUrl, IssuedToken, ServerCredential, TokenKey};

/// Process-wide bearer token cache, keyed by candidate URL and username
#[derive(Debug, Clone)]
pub struct TokenCache {
    tokens: Arc<Mutex<HashMap<TokenKey, CachedToken>>>,
    login_gates: Arc<Mutex<HashMap<TokenKey, Arc<Mutex<()>>>>>,
    safety_margin: TimeDelta,
    default_lifetime_secs: u64,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(TOKEN_SAFETY_MARGIN_SECS, DEFAULT_TOKEN_LIFETIME_SECS)
    }
}

impl TokenCache {
    pub fn new(safety_margin_secs: i64, default_lifetime_secs: u64) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            login_gates: Arc::new(Mutex::new(HashMap::new())),
            safety_margin: TimeDelta::try_seconds(safety_margin_secs).unwrap_or(TimeDelta::MAX),
            default_lifetime_secs,
        }
    }

    /// Token for `key`, unless it expires within the safety margin
    pub async fn get_valid(&self, key: &TokenKey) -> Option<String> {
        // An unrepresentable cutoff means nothing is fresh enough
        let cutoff = Utc::now().checked_add_signed(self.safety_margin)?;
        let tokens = self.tokens.lock().await;
        tokens
            .get(key)
            .filter(|cached| cached.expires_at > cutoff)
            .map(|cached| cached.access_token.clone())
    }

    /// Store a freshly issued token, overwriting any previous entry for `key`
    pub async fn store(&self, key: TokenKey, issued: &IssuedToken) -> CachedToken {
        let lifetime = issued.expires_in.unwrap_or(self.default_lifetime_secs);
        let now = Utc::now();
        let expires_at = expiry_after(now, lifetime).unwrap_or_else(|| {
            warn!(
                "Token lifetime of {}s is out of range, assuming {}s",
                lifetime, self.default_lifetime_secs
            );
            expiry_after(now, self.default_lifetime_secs).unwrap_or(now)
        });
        let cached = CachedToken {
            access_token: issued.access_token.clone(),
            expires_at,
        };

        self.insert(key, cached.clone()).await;
        cached
    }

    pub async fn insert(&self, key: TokenKey, cached: CachedToken) {
        let mut tokens = self.tokens.lock().await;
        tokens.insert(key, cached);
    }

    pub async fn get(&self, key: &TokenKey) -> Option<CachedToken> {
        let tokens = self.tokens.lock().await;
        tokens.get(key).cloned()
    }

    /// Lock serialising logins for `key`, so concurrent misses authenticate once
    pub async fn login_gate(&self, key: &TokenKey) -> Arc<Mutex<()>> {
        let mut gates = self.login_gates.lock().await;
        gates.entry(key.clone()).or_default().clone()
    }

    pub async fn len(&self) -> usize {
        self.tokens.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.lock().await.is_empty()
    }
}

fn expiry_after(now: chrono::DateTime<Utc>, lifetime_secs: u64) -> Option<chrono::DateTime<Utc>> {
    let lifetime = TimeDelta::try_seconds(i64::try_from(lifetime_secs).ok()?)?;
    now.checked_add_signed(lifetime)
}

/// Exchanges a username/password for a bearer token at one candidate endpoint
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        candidate: &CandidateUrl,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, ProxyError>;
}

/// OAuth password grant against the backend's identity provider
#[derive(Debug, Clone)]
pub struct PasswordGrantAuthenticator {
    http_client: reqwest::Client,
    token_path: String,
    client_id: String,
}

impl PasswordGrantAuthenticator {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_endpoint(http_client, constants::TOKEN_PATH, constants::CLIENT_ID)
    }

    pub fn with_endpoint(http_client: reqwest::Client, token_path: &str, client_id: &str) -> Self {
        Self {
            http_client,
            token_path: token_path.to_string(),
            client_id: client_id.to_string(),
        }
    }
}

#[async_trait]
impl Authenticator for PasswordGrantAuthenticator {
    async fn authenticate(
        &self,
        candidate: &CandidateUrl,
        username: &str,
        password: &str,
    ) -> Result<IssuedToken, ProxyError> {
        let token_url = constants::token_endpoint(candidate.as_str(), &self.token_path);
        debug!("Requesting token from {}", token_url);

        let response = self
            .http_client
            .post(&token_url)
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&e, candidate.as_str()))?;

        let status = response.status();
        debug!("Token request status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProxyError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(&e, candidate.as_str()))?;

        let issued: IssuedToken = serde_json::from_str(&body)
            .map_err(|e| ProxyError::Authentication(format!("malformed token response: {}", e)))?;

        if issued.access_token.is_empty() {
            return Err(ProxyError::Authentication("No access token in response".to_string()));
        }

        Ok(issued)
    }
}

/// Walks the candidate list until one yields a token
enum AuthStep {
    TryCandidate(usize),
    Done(Result<AccessGrant, ProxyError>),
}

/// Owns the token cache and decides which candidate endpoint to use
#[derive(Clone)]
pub struct AuthManager {
    resolver: CandidateResolver,
    cache: TokenCache,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthManager {
    pub fn new(resolver: CandidateResolver, cache: TokenCache, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            resolver,
            cache,
            authenticator,
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Token plus the candidate it is valid for.
    ///
    /// A cached token short-circuits the walk. Only connectivity failures move
    /// on to the next candidate; any other failure is returned immediately.
    pub async fn get_access_token(&self, credential: &ServerCredential) -> Result<AccessGrant, ProxyError> {
        let candidates = self.resolver.candidates(&credential.url);
        let mut last_error: Option<ProxyError> = None;
        let mut step = AuthStep::TryCandidate(0);

        loop {
            step = match step {
                AuthStep::TryCandidate(index) if index >= candidates.len() => {
                    AuthStep::Done(Err(last_error.take().unwrap_or_else(|| {
                        ProxyError::Authentication("no candidate endpoint issued a token".to_string())
                    })))
                }
                AuthStep::TryCandidate(index) => {
                    let candidate = &candidates[index];
                    match self.token_for(candidate, credential).await {
                        Ok(token) => AuthStep::Done(Ok(AccessGrant {
                            token,
                            base_url: candidate.clone(),
                        })),
                        Err(e) if e.is_connectivity() => {
                            warn!("Candidate {} unreachable, trying next: {}", candidate, e);
                            last_error = Some(e);
                            AuthStep::TryCandidate(index + 1)
                        }
                        Err(e) => AuthStep::Done(Err(e)),
                    }
                }
                AuthStep::Done(result) => return result,
            };
        }
    }

    async fn token_for(&self, candidate: &CandidateUrl, credential: &ServerCredential) -> Result<String, ProxyError> {
        let key = TokenKey::new(candidate, &credential.username);

        if let Some(token) = self.cache.get_valid(&key).await {
            debug!("Using cached token for {} at {}", credential.username, candidate);
            return Ok(token);
        }

        let gate = self.cache.login_gate(&key).await;
        let _login = gate.lock().await;

        // Another request may have logged in while we waited
        if let Some(token) = self.cache.get_valid(&key).await {
            debug!("Using token obtained concurrently for {} at {}", credential.username, candidate);
            return Ok(token);
        }

        info!("Authenticating {} at {}", credential.username, candidate);
        let issued = self
            .authenticator
            .authenticate(candidate, &credential.username, &credential.password)
            .await?;

        let cached = self.cache.store(key, &issued).await;
        info!("Token for {} at {} valid until {}", credential.username, candidate, cached.expires_at);
        Ok(cached.access_token)
    }
}
