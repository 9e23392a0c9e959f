// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process-wide filter context.
//!
//! A [`KubeContext`] is built once at startup and shared by every resolution. It
//! holds the compiled tag pattern, the metadata cache, the fetcher (transport and
//! authorization header) and the identity of the pod the filter runs in. Nothing
//! in it is mutated after construction except the cache contents.

use crate::api::{ApiServerFetcher, HttpUpstream, MetadataFetcher, Upstream};
use crate::cache::{HashStore, MetadataStore};
use crate::config::FilterConfig;
use crate::errors::InitError;
use crate::local_info;
use crate::tag::{Identity, TagParser};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared configuration and capabilities for metadata resolution.
#[derive(Clone)]
pub struct KubeContext {
    /// Compiled tag pattern
    pub parser: TagParser,

    /// Merged metadata cache
    pub store: Arc<dyn MetadataStore>,

    /// Source of pod metadata
    pub fetcher: Arc<dyn MetadataFetcher>,

    /// Top-level key of a Pod object holding its metadata
    pub metadata_section: String,

    /// Pod the filter runs in, if it runs in one
    pub local: Option<Identity>,
}

impl std::fmt::Debug for KubeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeContext")
            .field("pattern", &self.parser.pattern())
            .field("metadata_section", &self.metadata_section)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl KubeContext {
    /// Assemble a context from explicit capabilities.
    #[must_use]
    pub fn from_parts(
        parser: TagParser,
        store: Arc<dyn MetadataStore>,
        fetcher: Arc<dyn MetadataFetcher>,
        metadata_section: impl Into<String>,
        local: Option<Identity>,
    ) -> Self {
        Self {
            parser,
            store,
            fetcher,
            metadata_section: metadata_section.into(),
            local,
        }
    }

    /// Build the context from configuration.
    ///
    /// Reads the local pod files, builds the API server transport and, when
    /// `probe_on_start` is set, fetches the filter's own pod once to prove the API
    /// server is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`InitError`] if the configuration is invalid, the transport cannot
    /// be built, or the connectivity probe fails.
    pub async fn init(config: &FilterConfig) -> Result<Self, InitError> {
        config.validate()?;
        let parser = TagParser::new(&config.tag_regex)?;

        let local = local_info::discover(&config.namespace_file, &config.token_file);

        let upstream: Arc<dyn Upstream> =
            Arc::new(HttpUpstream::new(&config.api_url, &config.tls())?);
        let fetcher = ApiServerFetcher::new(Some(upstream), local.token.as_deref());
        debug!(fetcher = ?fetcher, "Metadata fetcher created");

        let store = match config.cache_max_entries {
            Some(max_entries) => HashStore::with_max_entries(max_entries),
            None => HashStore::new(),
        };

        let context = Self::from_parts(
            parser,
            Arc::new(store),
            Arc::new(fetcher),
            config.metadata_section.clone(),
            local.identity,
        );

        if config.probe_on_start {
            context.probe().await?;
        } else {
            debug!("Startup connectivity probe disabled");
        }

        Ok(context)
    }

    /// Fetch the local pod's own metadata once.
    ///
    /// Skipped with a warning when the filter does not run in a pod.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::Connectivity`] if the fetch fails.
    pub async fn probe(&self) -> Result<(), InitError> {
        let Some(local) = &self.local else {
            warn!("No local pod identity, skipping API server connectivity check");
            return Ok(());
        };

        self.fetcher
            .fetch(local)
            .await
            .map_err(|source| InitError::Connectivity {
                namespace: local.namespace.clone(),
                pod: local.pod_name.clone(),
                source,
            })?;

        info!(
            namespace = %local.namespace,
            pod = %local.pod_name,
            "API server connectivity OK"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
