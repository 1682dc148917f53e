//! Static backend credentials from the process environment

use log::info;

use crate::api::error::ProxyError;
use crate::api::models::ServerCredential;

pub const URL_VAR: &str = "VMS_SERVER_URL";
pub const USERNAME_VAR: &str = "VMS_USERNAME";
pub const PASSWORD_VAR: &str = "VMS_PASSWORD";

/// Last-resort credentials. Any field may be missing; checked on use.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl StaticCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let credentials = Self {
            url: read(URL_VAR),
            username: read(USERNAME_VAR),
            password: read(PASSWORD_VAR),
        };

        if credentials.is_complete() {
            info!("Static server configuration found for {:?}", credentials.url);
        }
        credentials
    }

    pub fn is_complete(&self) -> bool {
        self.url.is_some() && self.username.is_some() && self.password.is_some()
    }

    pub fn to_credential(&self) -> Result<ServerCredential, ProxyError> {
        match (&self.url, &self.username, &self.password) {
            (Some(url), Some(username), Some(password)) => {
                Ok(ServerCredential::new(url.clone(), username.clone(), password.clone()))
            }
            _ => Err(ProxyError::NotConfigured(format!(
                "missing {}",
                self.missing_vars().join(", ")
            ))),
        }
    }

    fn missing_vars(&self) -> Vec<&'static str> {
        [
            (URL_VAR, self.url.is_none()),
            (USERNAME_VAR, self.username.is_none()),
            (PASSWORD_VAR, self.password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}
