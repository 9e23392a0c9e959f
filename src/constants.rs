// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the kubemeta filter.
//!
//! This module contains all string and numeric constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Local Pod Environment
// ============================================================================

/// Path to the namespace file mounted into every pod
pub const NAMESPACE_FILE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Path to the `ServiceAccount` token file in Kubernetes pods
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Path to the cluster CA bundle mounted into every pod
pub const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Environment variable holding the pod name inside a container
pub const HOSTNAME_ENV: &str = "HOSTNAME";

/// Kernel hostname, used when `HOSTNAME` is not exported
pub const KERNEL_HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";

/// Pod name used when no hostname can be discovered
pub const UNKNOWN_POD_NAME: &str = "unknown";

// ============================================================================
// API Server Constants
// ============================================================================

/// Default in-cluster API server URL
pub const DEFAULT_API_URL: &str = "https://kubernetes.default.svc:443";

/// `User-Agent` sent with every API server request
pub const USER_AGENT: &str = concat!("kubemeta/", env!("CARGO_PKG_VERSION"));

/// HTTP status the API server must answer with for a fetch to succeed
pub const API_SUCCESS_STATUS: u16 = 200;

/// Top-level key of a Pod object holding its metadata
pub const DEFAULT_METADATA_SECTION: &str = "metadata";

// ============================================================================
// Tag Decomposition Constants
// ============================================================================

/// Capture group carrying the pod name
pub const CAPTURE_POD_NAME: &str = "pod_name";

/// Capture group carrying the namespace name
pub const CAPTURE_NAMESPACE_NAME: &str = "namespace_name";

/// Longest Kubernetes object name (DNS-1123 subdomain)
pub const MAX_OBJECT_NAME_LEN: usize = 253;

/// Separator between namespace and pod name in a cache key
pub const CACHE_KEY_SEPARATOR: char = ':';

/// Default pattern for tags built from container log file paths:
/// `<prefix>.var.log.containers.<pod>_<namespace>_<container>-<docker id>.log`
pub const DEFAULT_TAG_REGEX: &str = r"^(?P<tag>[^.]+)\.var\.log\.containers\.(?P<pod_name>[a-z0-9](?:[-a-z0-9]*[a-z0-9])?(?:\.[a-z0-9](?:[-a-z0-9]*[a-z0-9])?)*)_(?P<namespace_name>[^_]+)_(?P<container_name>.+)-(?P<docker_id>[a-z0-9]{64})\.log$";

// ============================================================================
// Metadata Merge Constants
// ============================================================================

/// Key of the pod UID inside the metadata section
pub const META_UID: &str = "uid";

/// Key of the pod labels inside the metadata section
pub const META_LABELS: &str = "labels";

/// Key of the pod annotations inside the metadata section
pub const META_ANNOTATIONS: &str = "annotations";

/// Output key the pod UID is renamed to
pub const OUTPUT_POD_ID: &str = "pod_id";

// ============================================================================
// Codec Constants
// ============================================================================

/// Maximum nesting depth accepted when decoding an encoded object
pub const MAX_DECODE_DEPTH: usize = 64;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;
