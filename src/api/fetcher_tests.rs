// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the pod metadata fetcher.

use super::{pod_path, ApiServerFetcher, MetadataFetcher};
use crate::api::transport::{ApiRequest, ApiResponse, Upstream, UpstreamConn};
use crate::codec::to_json;
use crate::constants::USER_AGENT;
use crate::errors::FetchError;
use crate::tag::Identity;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Behavior {
    Respond(u16, &'static str),
    TransportError,
    ConnectError,
}

/// Upstream that tracks how many connections are currently held.
struct MockUpstream {
    behavior: Behavior,
    outstanding: Arc<AtomicUsize>,
    acquired: AtomicUsize,
    last_request: Arc<Mutex<Option<ApiRequest>>>,
}

impl MockUpstream {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            outstanding: Arc::new(AtomicUsize::new(0)),
            acquired: AtomicUsize::new(0),
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

struct MockConn {
    behavior: Behavior,
    outstanding: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<ApiRequest>>>,
}

impl Drop for MockConn {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn connect(&self) -> Result<Box<dyn UpstreamConn>, FetchError> {
        if matches!(self.behavior, Behavior::ConnectError) {
            return Err(FetchError::Connect {
                reason: "connection refused".to_string(),
            });
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConn {
            behavior: self.behavior.clone(),
            outstanding: Arc::clone(&self.outstanding),
            last_request: Arc::clone(&self.last_request),
        }))
    }
}

#[async_trait]
impl UpstreamConn for MockConn {
    async fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        match &self.behavior {
            Behavior::Respond(status, body) => Ok(ApiResponse {
                status: *status,
                body: body.as_bytes().to_vec(),
            }),
            Behavior::TransportError | Behavior::ConnectError => Err(FetchError::Transport {
                path: request.path.clone(),
                reason: "connection reset by peer".to_string(),
            }),
        }
    }
}

fn fetcher(upstream: &Arc<MockUpstream>, token: Option<&str>) -> ApiServerFetcher {
    let upstream: Arc<dyn Upstream> = upstream.clone();
    ApiServerFetcher::new(Some(upstream), token)
}

fn web_0() -> Identity {
    Identity::new("default", "web-0")
}

const POD_JSON: &str = r#"{
    "kind": "Pod",
    "apiVersion": "v1",
    "metadata": {
        "name": "web-0",
        "namespace": "default",
        "uid": "u-1",
        "labels": {"app": "web"}
    }
}"#;

#[test]
fn test_pod_path() {
    assert_eq!(pod_path(&web_0()), "/api/v1/namespaces/default/pods/web-0");
}

#[test]
fn test_pod_path_escapes_segments() {
    let identity = Identity::new("default/pods/victim?x=", "web 0#frag");

    let path = pod_path(&identity);

    assert_eq!(
        path,
        "/api/v1/namespaces/default%2Fpods%2Fvictim%3Fx=/pods/web%200%23frag"
    );
    assert!(!path.contains('?'));
    assert_eq!(path.matches('/').count(), 6);
}

#[tokio::test]
async fn test_fetch_sends_escaped_path() {
    let upstream = MockUpstream::new(Behavior::Respond(404, "{}"));
    let fetcher = fetcher(&upstream, None);

    let err = fetcher
        .fetch(&Identity::new("default/pods/victim?x=", "web-0"))
        .await
        .unwrap_err();

    let sent = upstream.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(
        sent.path,
        "/api/v1/namespaces/default%2Fpods%2Fvictim%3Fx=/pods/web-0"
    );
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[test]
fn test_request_headers_with_token() {
    let upstream = MockUpstream::new(Behavior::Respond(200, "{}"));
    let fetcher = fetcher(&upstream, Some("abc.def\n"));

    let request = fetcher.request(&web_0());

    assert_eq!(request.header("User-Agent"), Some(USER_AGENT));
    assert_eq!(request.header("Connection"), Some("close"));
    assert_eq!(request.header("Authorization"), Some("Bearer abc.def"));
}

#[test]
fn test_request_headers_without_token() {
    let upstream = MockUpstream::new(Behavior::Respond(200, "{}"));
    let fetcher = fetcher(&upstream, None);

    let request = fetcher.request(&web_0());

    assert_eq!(request.header("Authorization"), None);
    assert_eq!(request.headers.len(), 2);
}

#[tokio::test]
async fn test_fetch_success_decodes_body() {
    let upstream = MockUpstream::new(Behavior::Respond(200, POD_JSON));
    let fetcher = fetcher(&upstream, Some("token"));

    let object = fetcher.fetch(&web_0()).await.unwrap();

    let value = to_json(object.as_bytes()).unwrap();
    assert_eq!(value["metadata"]["uid"], json!("u-1"));
    assert_eq!(value["metadata"]["labels"], json!({"app": "web"}));
    assert_eq!(upstream.acquired(), 1);
    assert_eq!(upstream.outstanding(), 0);
    assert_eq!(
        upstream.last_request.lock().unwrap().as_ref().unwrap().path,
        "/api/v1/namespaces/default/pods/web-0"
    );
}

#[tokio::test]
async fn test_fetch_non_200_releases_connection() {
    let upstream = MockUpstream::new(Behavior::Respond(403, r#"{"kind":"Status"}"#));
    let fetcher = fetcher(&upstream, Some("token"));

    let err = fetcher.fetch(&web_0()).await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            status: 403,
            path: "/api/v1/namespaces/default/pods/web-0".to_string(),
        }
    );
    assert_eq!(upstream.outstanding(), 0);
}

#[tokio::test]
async fn test_fetch_transport_error_releases_connection() {
    let upstream = MockUpstream::new(Behavior::TransportError);
    let fetcher = fetcher(&upstream, Some("token"));

    let err = fetcher.fetch(&web_0()).await.unwrap_err();

    assert!(matches!(err, FetchError::Transport { .. }));
    assert_eq!(upstream.acquired(), 1);
    assert_eq!(upstream.outstanding(), 0);
}

#[tokio::test]
async fn test_fetch_decode_error_releases_connection() {
    let upstream = MockUpstream::new(Behavior::Respond(200, "<html>proxy error</html>"));
    let fetcher = fetcher(&upstream, Some("token"));

    let err = fetcher.fetch(&web_0()).await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }));
    assert_eq!(upstream.acquired(), 1);
    assert_eq!(upstream.outstanding(), 0);
}

#[tokio::test]
async fn test_fetch_connect_error() {
    let upstream = MockUpstream::new(Behavior::ConnectError);
    let fetcher = fetcher(&upstream, Some("token"));

    let err = fetcher.fetch(&web_0()).await.unwrap_err();

    assert!(matches!(err, FetchError::Connect { .. }));
    assert_eq!(upstream.acquired(), 0);
    assert_eq!(upstream.outstanding(), 0);
}

#[tokio::test]
async fn test_fetch_without_upstream() {
    let fetcher = ApiServerFetcher::new(None, Some("token"));

    let err = fetcher.fetch(&web_0()).await.unwrap_err();

    assert_eq!(err, FetchError::NoUpstream);
}

#[tokio::test]
async fn test_fetch_is_not_retried() {
    let upstream = MockUpstream::new(Behavior::Respond(503, ""));
    let fetcher = fetcher(&upstream, Some("token"));

    assert!(fetcher.fetch(&web_0()).await.is_err());

    assert_eq!(upstream.acquired(), 1);
}
