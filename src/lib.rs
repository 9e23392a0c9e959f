// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # kubemeta - Kubernetes metadata enrichment for log records
//!
//! kubemeta turns the tag of a container log record into a flat metadata map and
//! enriches it with the pod's UID, labels and annotations fetched from the
//! Kubernetes API server. Results are cached per pod, so the API server is only
//! asked once for each pod.
//!
//! ## Overview
//!
//! For every record:
//!
//! 1. the tag is decomposed by a pattern with named capture groups
//! 2. the `namespace_name` and `pod_name` captures form the cache key
//! 3. on a cache miss the Pod object is fetched and merged into the tag metadata
//! 4. the merged map is cached and returned, MessagePack-encoded
//!
//! ## Modules
//!
//! - [`codec`] - MessagePack object view, map encoder and JSON conversion
//! - [`tag`] - Tag decomposition and pod identity
//! - [`cache`] - Metadata store capability and the in-memory store
//! - [`api`] - API server transport and pod metadata fetcher
//! - [`merge`] - Merge of tag metadata with pod metadata
//! - [`resolver`] - Per-record cache-aside resolution
//! - [`context`] - Process-wide context and startup probe
//! - [`config`] - Configuration file and command line overrides
//! - [`local_info`] - Discovery of the filter's own pod
//!
//! ## Example
//!
//! ```rust,no_run
//! use kubemeta::{codec, config::FilterConfig, context::KubeContext, resolver::Resolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let context = KubeContext::init(&FilterConfig::default()).await?;
//! let resolver = Resolver::new(Arc::new(context));
//!
//! let tag = "kube.var.log.containers.web-0_default_nginx-\
//!            0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef.log";
//! let resolved = resolver.resolve(tag).await?;
//! println!("{}", codec::to_json(&resolved.buf)?);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod local_info;
pub mod merge;
pub mod metrics;
pub mod resolver;
pub mod tag;
