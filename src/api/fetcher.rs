// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod metadata fetcher.
//!
//! [`ApiServerFetcher`] issues a single `GET /api/v1/namespaces/{ns}/pods/{pod}` per
//! call and converts the JSON Pod object into its encoded form. There is no retry:
//! any transport error, non-200 status or undecodable body fails the fetch.

use super::transport::{ApiRequest, Upstream};
use crate::codec;
use crate::constants::{API_SUCCESS_STATUS, USER_AGENT};
use crate::errors::FetchError;
use crate::metrics;
use crate::tag::Identity;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// An API object converted to its encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    buf: Vec<u8>,
}

impl RemoteObject {
    /// Wrap an encoded object.
    #[must_use]
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// The encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Source of pod metadata.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch the Pod object for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the object cannot be retrieved or decoded.
    async fn fetch(&self, identity: &Identity) -> Result<RemoteObject, FetchError>;
}

/// Characters escaped inside one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// API server path of a Pod object.
///
/// Namespace and pod name are percent-encoded, so each stays a single path segment.
#[must_use]
pub fn pod_path(identity: &Identity) -> String {
    format!(
        "/api/v1/namespaces/{}/pods/{}",
        utf8_percent_encode(&identity.namespace, PATH_SEGMENT),
        utf8_percent_encode(&identity.pod_name, PATH_SEGMENT)
    )
}

/// [`MetadataFetcher`] talking to the Kubernetes API server.
#[derive(Clone)]
pub struct ApiServerFetcher {
    upstream: Option<Arc<dyn Upstream>>,
    auth_header: Option<String>,
}

impl std::fmt::Debug for ApiServerFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServerFetcher")
            .field("upstream", &self.upstream.is_some())
            .field("auth", &self.auth_header.is_some())
            .finish()
    }
}

impl ApiServerFetcher {
    /// Create a fetcher.
    ///
    /// The `Authorization` header is built once here from `token`. Without a token,
    /// requests are sent unauthenticated.
    #[must_use]
    pub fn new(upstream: Option<Arc<dyn Upstream>>, token: Option<&str>) -> Self {
        Self {
            upstream,
            auth_header: token.map(|t| format!("Bearer {}", t.trim())),
        }
    }

    /// Build the request for a pod.
    #[must_use]
    pub fn request(&self, identity: &Identity) -> ApiRequest {
        let mut headers = vec![
            ("User-Agent", USER_AGENT.to_string()),
            ("Connection", "close".to_string()),
        ];
        if let Some(auth) = &self.auth_header {
            headers.push(("Authorization", auth.clone()));
        }

        ApiRequest {
            path: pod_path(identity),
            headers,
        }
    }
}

#[async_trait]
impl MetadataFetcher for ApiServerFetcher {
    async fn fetch(&self, identity: &Identity) -> Result<RemoteObject, FetchError> {
        let upstream = self.upstream.as_ref().ok_or(FetchError::NoUpstream)?;
        let request = self.request(identity);

        let mut conn = upstream.connect().await.map_err(|e| {
            error!(error = %e, "API server connection error");
            metrics::record_api_request("connect_error", None);
            e
        })?;

        let start = Instant::now();
        let result = conn.send(&request).await;
        drop(conn);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                debug!(
                    namespace = %identity.namespace,
                    pod = %identity.pod_name,
                    error = %e,
                    "API server request failed"
                );
                metrics::record_api_request("transport_error", Some(start.elapsed()));
                return Err(e);
            }
        };

        debug!(
            namespace = %identity.namespace,
            pod = %identity.pod_name,
            status = response.status,
            "API server response"
        );
        metrics::record_api_request(&response.status.to_string(), Some(start.elapsed()));

        if response.status != API_SUCCESS_STATUS {
            return Err(FetchError::Status {
                status: response.status,
                path: request.path,
            });
        }

        let buf = codec::pack_json(&response.body).map_err(|e| FetchError::Decode {
            path: request.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(RemoteObject::new(buf))
    }
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod fetcher_tests;
