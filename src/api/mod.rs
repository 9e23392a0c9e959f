// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes API server access.
//!
//! This module fetches Pod objects from the API server. It is split in two layers:
//!
//! - [`transport`] - the connection capability ([`Upstream`]) and its reqwest implementation
//! - [`fetcher`] - the pod metadata fetcher building requests and decoding responses
//!
//! # Example
//!
//! ```rust,no_run
//! use kubemeta::api::{ApiServerFetcher, HttpUpstream, MetadataFetcher, TlsSettings};
//! use kubemeta::tag::Identity;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tls = TlsSettings { ca_file: None, verify: true };
//! let upstream = HttpUpstream::new("https://kubernetes.default.svc:443", &tls)?;
//! let fetcher = ApiServerFetcher::new(Some(Arc::new(upstream)), Some("token"));
//!
//! let pod = fetcher.fetch(&Identity::new("default", "web-0")).await?;
//! println!("{} bytes", pod.as_bytes().len());
//! # Ok(())
//! # }
//! ```

pub mod fetcher;
pub mod transport;

pub use fetcher::{pod_path, ApiServerFetcher, MetadataFetcher, RemoteObject};
pub use transport::{ApiRequest, ApiResponse, HttpUpstream, TlsSettings, Upstream, UpstreamConn};
