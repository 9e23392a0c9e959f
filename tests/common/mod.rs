// Common test utilities for integration tests

#![allow(dead_code)]

use kubemeta::api::{ApiServerFetcher, HttpUpstream, TlsSettings, Upstream};
use kubemeta::cache::{HashStore, MetadataStore};
use kubemeta::codec::decode;
use kubemeta::context::KubeContext;
use kubemeta::resolver::Resolver;
use kubemeta::tag::TagParser;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bearer token the mocked API server expects
pub const TOKEN: &str = "integration-token";

/// Docker id satisfying the default tag pattern
pub const DOCKER_ID: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Container log tag for a pod, in the default tag layout
pub fn log_tag(pod: &str, namespace: &str, container: &str) -> String {
    format!("kube.var.log.containers.{pod}_{namespace}_{container}-{DOCKER_ID}.log")
}

/// API server path of a pod
pub fn pod_path(namespace: &str, pod: &str) -> String {
    format!("/api/v1/namespaces/{namespace}/pods/{pod}")
}

/// Number of entries in an encoded map
pub fn entry_count(buf: &[u8]) -> usize {
    decode(buf)
        .expect("buffer should decode")
        .as_map()
        .expect("buffer should hold a map")
        .len()
}

/// Minimal Pod object with the given metadata section
pub fn pod_object(metadata: Value) -> Value {
    json!({
        "kind": "Pod",
        "apiVersion": "v1",
        "metadata": metadata,
        "spec": {"containers": [{"name": "app", "image": "nginx:1.27"}]},
        "status": {"phase": "Running"}
    })
}

/// Mount a pod response that must be requested exactly `times` times
pub async fn mount_pod(server: &MockServer, namespace: &str, pod: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(pod_path(namespace, pod)))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("Connection", "close"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Resolver wired to a real HTTP transport against `server`, using the default tag pattern
pub fn resolver_for(server: &MockServer, store: Arc<dyn MetadataStore>) -> Resolver {
    let tls = TlsSettings {
        ca_file: None,
        verify: true,
    };
    let upstream: Arc<dyn Upstream> =
        Arc::new(HttpUpstream::new(&server.uri(), &tls).expect("transport should build"));
    let fetcher = ApiServerFetcher::new(Some(upstream), Some(TOKEN));
    let parser = TagParser::new(kubemeta::constants::DEFAULT_TAG_REGEX)
        .expect("default pattern should compile");

    let context = KubeContext::from_parts(parser, store, Arc::new(fetcher), "metadata", None);
    Resolver::new(Arc::new(context))
}

/// Resolver with an unbounded store
pub fn default_resolver(server: &MockServer) -> (Resolver, Arc<HashStore>) {
    let store = Arc::new(HashStore::new());
    (resolver_for(server, store.clone()), store)
}
