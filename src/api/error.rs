//! Error taxonomy for the gateway
//!
//! Every failure is classified into an [`ErrorKind`]. The authentication loop
//! only advances to the next candidate endpoint on [`ErrorKind::Connectivity`].

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Address unreachable: timeout, refused connection, TLS trust failure
    Connectivity,
    /// Token endpoint rejected the login or answered with garbage
    Authentication,
    /// Resource endpoint answered with a non-success status
    Upstream,
    /// No usable credentials, or an unknown server identifier
    Configuration,
    /// Malformed inbound request
    Request,
    Internal,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("VMS server credentials not configured: {0}")]
    NotConfigured(String),

    #[error("VMS server '{0}' not found")]
    ServerNotFound(String),

    #[error("Cannot reach {url}: {message}")]
    Connectivity {
        url: String,
        message: String,
        timed_out: bool,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Backend returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid proxy request: {0}")]
    InvalidRequest(String),

    #[error("VMS server unreachable from proxy: no answer within {0:?}")]
    DeadlineExceeded(Duration),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::NotConfigured(_) | ProxyError::ServerNotFound(_) => ErrorKind::Configuration,
            ProxyError::Connectivity { .. } => ErrorKind::Connectivity,
            ProxyError::Authentication(_) => ErrorKind::Authentication,
            ProxyError::Upstream { .. } => ErrorKind::Upstream,
            ProxyError::InvalidRequest(_) => ErrorKind::Request,
            ProxyError::DeadlineExceeded(_) | ProxyError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        self.kind() == ErrorKind::Connectivity
    }

    /// Timeouts and aborts, surfaced as 504
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ProxyError::Connectivity { timed_out: true, .. } | ProxyError::DeadlineExceeded(_)
        )
    }

    /// HTTP status reported to the web client
    pub fn status_code(&self) -> u16 {
        match self {
            _ if self.is_timeout() => 504,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }
}

/// Classify a transport-level reqwest failure against `url`
pub fn classify_transport(error: &reqwest::Error, url: &str) -> ProxyError {
    let message = error_chain(error);

    if error.is_timeout() {
        return ProxyError::Connectivity {
            url: url.to_string(),
            message,
            timed_out: true,
        };
    }

    if error.is_connect() || mentions_certificate(&message) {
        return ProxyError::Connectivity {
            url: url.to_string(),
            message,
            timed_out: false,
        };
    }

    ProxyError::Internal(anyhow::anyhow!("Request to {} failed: {}", url, message))
}

/// Flatten an error and its sources into one line
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

fn mentions_certificate(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl")
}
