// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-record metadata resolution.
//!
//! [`Resolver::resolve`] runs the cache-aside flow for one tag:
//!
//! ```text
//! decompose ── partial identity ──────────────────────────────► Local
//!     │
//!     └─ full identity ─► cache get ── hit ───────────────────► Cached
//!                             │
//!                             └─ miss ─► fetch ─► merge ─► put ─► Fetched
//!                                                           │
//!                                                           └─ refused ─► Uncached
//! ```
//!
//! A fetch or merge failure fails the record and leaves the cache untouched.
//! Two concurrent misses for the same pod both fetch; the last put wins.
//!
//! # Example
//!
//! ```rust,no_run
//! use kubemeta::config::FilterConfig;
//! use kubemeta::context::KubeContext;
//! use kubemeta::resolver::Resolver;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let context = KubeContext::init(&FilterConfig::default()).await?;
//! let resolver = Resolver::new(Arc::new(context));
//!
//! let resolved = resolver
//!     .resolve("kube.var.log.containers.web-0_default_nginx-0123.log")
//!     .await?;
//! println!("{:?}: {} bytes", resolved.source, resolved.buf.len());
//! # Ok(())
//! # }
//! ```

use crate::context::KubeContext;
use crate::errors::ResolveError;
use crate::merge::merge;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where resolved metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// Tag metadata only; the tag does not name a full pod identity
    Local,
    /// Served from the cache
    Cached,
    /// Fetched, merged and cached
    Fetched,
    /// Fetched and merged, but the cache refused the entry
    Uncached,
}

impl MetadataSource {
    /// Lowercase name, used in metrics and output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cached => "cached",
            Self::Fetched => "fetched",
            Self::Uncached => "uncached",
        }
    }
}

impl std::fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded metadata for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMetadata {
    /// Encoded map; shared with the cache for `Cached` and `Fetched`
    pub buf: Arc<[u8]>,
    /// How the map was produced
    pub source: MetadataSource,
}

impl ResolvedMetadata {
    fn new(buf: impl Into<Arc<[u8]>>, source: MetadataSource) -> Self {
        Self {
            buf: buf.into(),
            source,
        }
    }
}

/// Resolves tags to encoded metadata using a shared [`KubeContext`].
#[derive(Debug, Clone)]
pub struct Resolver {
    context: Arc<KubeContext>,
}

impl Resolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(context: Arc<KubeContext>) -> Self {
        Self { context }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &KubeContext {
        &self.context
    }

    /// Resolve metadata for a tag.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoMatch`] if the tag does not match the pattern, and
    /// [`ResolveError::Fetch`] or [`ResolveError::Merge`] if a cache miss could not
    /// be filled. No error is retried.
    pub async fn resolve(&self, tag: &str) -> Result<ResolvedMetadata, ResolveError> {
        let result = self.resolve_tag(tag).await;
        match &result {
            Ok(resolved) => metrics::record_resolution(resolved.source.as_str()),
            Err(e) => metrics::record_resolution(e.kind()),
        }
        result
    }

    async fn resolve_tag(&self, tag: &str) -> Result<ResolvedMetadata, ResolveError> {
        let context = &self.context;

        let decomposed = context.parser.decompose(tag)?;
        let flat = decomposed.encode()?;

        let Some(identity) = decomposed.identity.complete() else {
            debug!(tag = %tag, "Tag has no full pod identity, skipping enrichment");
            return Ok(ResolvedMetadata::new(flat, MetadataSource::Local));
        };
        let key = identity.cache_key();

        if let Some(buf) = context.store.get(&key) {
            metrics::record_cache_lookup(true);
            debug!(key = %key, "Metadata cache hit");
            return Ok(ResolvedMetadata::new(buf, MetadataSource::Cached));
        }
        metrics::record_cache_lookup(false);
        debug!(key = %key, "Metadata cache miss");

        let remote = context
            .fetcher
            .fetch(&identity)
            .await
            .map_err(|source| ResolveError::Fetch {
                key: key.clone(),
                source,
            })?;

        let merged = merge(&flat, &remote, &context.metadata_section).map_err(|source| {
            ResolveError::Merge {
                key: key.clone(),
                source,
            }
        })?;

        match context.store.put(&key, merged) {
            Ok(handle) => {
                // Return the store's copy, not the one that was moved in
                let buf = context
                    .store
                    .get_by_handle(handle)
                    .or_else(|| context.store.get(&key))
                    .ok_or_else(|| ResolveError::CacheHandleLost { key: key.clone() })?;
                debug!(key = %key, slot = handle.index(), "Cached merged metadata");
                Ok(ResolvedMetadata::new(buf, MetadataSource::Fetched))
            }
            Err(failure) => {
                metrics::record_cache_write_failure();
                warn!(
                    key = %failure.key,
                    reason = %failure.reason,
                    "Failed to cache metadata, serving it uncached"
                );
                Ok(ResolvedMetadata::new(failure.blob, MetadataSource::Uncached))
            }
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
