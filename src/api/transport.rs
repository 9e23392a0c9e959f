// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transport capability for API server requests.
//!
//! A fetch acquires a connection from an [`Upstream`], sends one request on it and
//! drops it. Dropping the boxed [`UpstreamConn`] is what releases the connection, so
//! every exit path of a fetch releases it.

use crate::errors::{ConfigError, FetchError, InitError};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// A single GET request to the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Request path, starting with `/`
    pub path: String,
    /// Request headers in the order they are sent
    pub headers: Vec<(&'static str, String)>,
}

impl ApiRequest {
    /// Value of the first header named `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response to an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

/// Source of API server connections.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Acquire a connection. Dropping it releases it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Connect`] if no connection can be acquired.
    async fn connect(&self) -> Result<Box<dyn UpstreamConn>, FetchError>;
}

/// An acquired API server connection.
#[async_trait]
pub trait UpstreamConn: Send {
    /// Send a request and read the whole response.
    ///
    /// Any status code is a successful send; interpreting it is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the request cannot be sent or the
    /// response cannot be read.
    async fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, FetchError>;
}

/// TLS settings for HTTPS API servers.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// PEM bundle of additional trusted roots
    pub ca_file: Option<String>,
    /// Whether server certificates are verified
    pub verify: bool,
}

/// Build the API base URL from a server address
///
/// Converts "kubernetes.default.svc:443" or "https://kubernetes.default.svc:443/"
/// to `<https://kubernetes.default.svc:443>`
pub(crate) fn build_api_url(server: &str) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        server.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", server.trim_end_matches('/'))
    }
}

/// [`Upstream`] backed by a shared reqwest client.
///
/// reqwest pools connections internally; requests carry `Connection: close`, so each
/// acquired connection serves exactly one request.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: HttpClient,
    base_url: String,
}

impl HttpUpstream {
    /// Create an upstream for the API server at `api_url`.
    ///
    /// A missing CA file is skipped with a warning; an unparsable one is an error.
    ///
    /// # Errors
    ///
    /// Returns [`InitError`] if the URL is invalid or the HTTP client cannot be built.
    pub fn new(api_url: &str, tls: &TlsSettings) -> Result<Self, InitError> {
        let base_url = build_api_url(api_url);
        let parsed = Url::parse(&base_url).map_err(|e| ConfigError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = HttpClient::builder();

        if parsed.scheme() == "https" {
            if let Some(ca_file) = tls.ca_file.as_deref() {
                if let Some(cert) = load_ca_certificate(ca_file)? {
                    builder = builder.add_root_certificate(cert);
                }
            }
            if !tls.verify {
                warn!(url = %base_url, "TLS certificate verification disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder.build().map_err(|e| InitError::Transport {
            reason: e.to_string(),
        })?;

        debug!(url = %base_url, "API server transport created");

        Ok(Self { client, base_url })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn load_ca_certificate(path: &str) -> Result<Option<reqwest::Certificate>, InitError> {
    if !Path::new(path).exists() {
        warn!(path = %path, "CA file not found, using built-in roots");
        return Ok(None);
    }

    let pem = std::fs::read(path).map_err(|e| InitError::Transport {
        reason: format!("cannot read CA file {path}: {e}"),
    })?;
    let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| InitError::Transport {
        reason: format!("invalid CA file {path}: {e}"),
    })?;

    Ok(Some(cert))
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn connect(&self) -> Result<Box<dyn UpstreamConn>, FetchError> {
        Ok(Box::new(HttpConn {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
        }))
    }
}

struct HttpConn {
    client: HttpClient,
    base_url: String,
}

#[async_trait]
impl UpstreamConn for HttpConn {
    async fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self.client.get(&url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.send().await.map_err(|e| FetchError::Transport {
            path: request.path.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            path: request.path.clone(),
            reason: format!("failed to read response body: {e}"),
        })?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod transport_tests;
