// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Filter configuration.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file, then
//! command line flags or their environment variables.
//!
//! # Example
//!
//! ```yaml
//! api_url: https://kubernetes.default.svc:443
//! tls_verify: true
//! tag_regex: '^kube\.(?P<pod_name>[^_]+)_(?P<namespace_name>[^_]+)\.log$'
//! cache_max_entries: 10000
//! ```

use crate::api::transport::build_api_url;
use crate::api::TlsSettings;
use crate::constants::{
    DEFAULT_API_URL, DEFAULT_METADATA_SECTION, DEFAULT_TAG_REGEX, NAMESPACE_FILE_PATH,
    SERVICE_ACCOUNT_CA_PATH, SERVICE_ACCOUNT_TOKEN_PATH,
};
use crate::errors::ConfigError;
use crate::tag::TagParser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Complete filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct FilterConfig {
    /// API server URL; a bare `host:port` is treated as HTTPS
    pub api_url: String,
    /// PEM bundle trusted for the API server, skipped if the file is missing
    pub ca_file: Option<String>,
    /// Verify the API server certificate
    pub tls_verify: bool,
    /// `ServiceAccount` token file
    pub token_file: PathBuf,
    /// File holding the namespace of the filter's own pod
    pub namespace_file: PathBuf,
    /// Tag pattern with named capture groups
    pub tag_regex: String,
    /// Top-level key of a Pod object holding its metadata
    pub metadata_section: String,
    /// Maximum number of cached pods; unbounded when unset
    pub cache_max_entries: Option<usize>,
    /// Fetch the filter's own pod at startup to check connectivity
    pub probe_on_start: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ca_file: Some(SERVICE_ACCOUNT_CA_PATH.to_string()),
            tls_verify: true,
            token_file: PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH),
            namespace_file: PathBuf::from(NAMESPACE_FILE_PATH),
            tag_regex: DEFAULT_TAG_REGEX.to_string(),
            metadata_section: DEFAULT_METADATA_SECTION.to_string(),
            cache_max_entries: None,
            probe_on_start: true,
        }
    }
}

impl FilterConfig {
    /// Load configuration from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] if the file cannot be
    /// read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&contents).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is not a valid configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply command line overrides.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(api_url) = &overrides.api_url {
            self.api_url.clone_from(api_url);
        }
        if let Some(ca_file) = &overrides.ca_file {
            self.ca_file = Some(ca_file.clone());
        }
        if overrides.insecure_skip_tls_verify {
            self.tls_verify = false;
        }
        if let Some(token_file) = &overrides.token_file {
            self.token_file.clone_from(token_file);
        }
        if let Some(namespace_file) = &overrides.namespace_file {
            self.namespace_file.clone_from(namespace_file);
        }
        if let Some(tag_regex) = &overrides.tag_regex {
            self.tag_regex.clone_from(tag_regex);
        }
        if let Some(section) = &overrides.metadata_section {
            self.metadata_section.clone_from(section);
        }
        if let Some(max_entries) = overrides.cache_max_entries {
            self.cache_max_entries = Some(max_entries);
        }
        if overrides.no_probe {
            self.probe_on_start = false;
        }
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an invalid API URL, an invalid tag pattern, or an
    /// empty metadata section name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_api_url()?;
        TagParser::new(&self.tag_regex)?;
        if self.metadata_section.trim().is_empty() {
            return Err(ConfigError::EmptyMetadataSection);
        }
        Ok(())
    }

    /// TLS settings for the API server transport.
    #[must_use]
    pub fn tls(&self) -> TlsSettings {
        TlsSettings {
            ca_file: self.ca_file.clone(),
            verify: self.tls_verify,
        }
    }

    fn parsed_api_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: self.api_url.clone(),
            reason,
        };

        if self.api_url.trim().is_empty() {
            return Err(invalid("URL is empty".to_string()));
        }
        if let Some((scheme, _)) = self.api_url.split_once("://") {
            if scheme != "http" && scheme != "https" {
                return Err(invalid(format!("unsupported scheme '{scheme}'")));
            }
        }
        let url = Url::parse(&build_api_url(&self.api_url)).map_err(|e| invalid(e.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("URL has no host".to_string()));
        }
        Ok(url)
    }
}

/// Command line overrides for [`FilterConfig`].
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Kubernetes API server URL
    #[arg(long, env = "KUBEMETA_API_URL")]
    pub api_url: Option<String>,

    /// CA bundle trusted for the API server
    #[arg(long, env = "KUBEMETA_CA_FILE")]
    pub ca_file: Option<String>,

    /// Do not verify the API server certificate
    #[arg(long, env = "KUBEMETA_INSECURE_SKIP_TLS_VERIFY")]
    pub insecure_skip_tls_verify: bool,

    /// `ServiceAccount` token file
    #[arg(long, env = "KUBEMETA_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// File holding the namespace of this pod
    #[arg(long, env = "KUBEMETA_NAMESPACE_FILE")]
    pub namespace_file: Option<PathBuf>,

    /// Tag pattern with `pod_name` and `namespace_name` capture groups
    #[arg(long, env = "KUBEMETA_TAG_REGEX")]
    pub tag_regex: Option<String>,

    /// Top-level key of a Pod object holding its metadata
    #[arg(long, env = "KUBEMETA_METADATA_SECTION")]
    pub metadata_section: Option<String>,

    /// Maximum number of cached pods
    #[arg(long, env = "KUBEMETA_CACHE_MAX_ENTRIES")]
    pub cache_max_entries: Option<usize>,

    /// Skip the startup connectivity check
    #[arg(long, env = "KUBEMETA_NO_PROBE")]
    pub no_probe: bool,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
