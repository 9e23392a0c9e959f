// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Discovery of the pod the filter itself runs in.
//!
//! Inside a pod, Kubernetes mounts the namespace name and a `ServiceAccount`
//! token under `/var/run/secrets/kubernetes.io/serviceaccount/`, and sets the
//! hostname to the pod name. Outside a pod none of this exists, which is not an
//! error: the filter then runs without a local identity.

use crate::constants::{HOSTNAME_ENV, KERNEL_HOSTNAME_PATH, UNKNOWN_POD_NAME};
use crate::errors::LocalInfoError;
use crate::tag::Identity;
use std::path::Path;
use tracing::{debug, info, warn};

/// What could be learned about the local pod.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LocalPodInfo {
    /// Namespace and pod name, present when the namespace file exists
    pub identity: Option<Identity>,
    /// `ServiceAccount` token, trimmed
    pub token: Option<String>,
}

impl std::fmt::Debug for LocalPodInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPodInfo")
            .field("identity", &self.identity)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Read the namespace the filter runs in.
///
/// # Errors
///
/// Returns [`LocalInfoError::NamespaceUnavailable`] if the file cannot be read or is empty.
pub fn read_namespace(path: &Path) -> Result<String, LocalInfoError> {
    let unavailable = |reason: String| LocalInfoError::NamespaceUnavailable {
        path: path.display().to_string(),
        reason,
    };

    let namespace = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
    let namespace = namespace.trim();
    if namespace.is_empty() {
        return Err(unavailable("file is empty".to_string()));
    }
    Ok(namespace.to_string())
}

/// Read the `ServiceAccount` token.
///
/// # Errors
///
/// Returns [`LocalInfoError::TokenUnavailable`] if the file cannot be read or is empty.
pub fn read_token(path: &Path) -> Result<String, LocalInfoError> {
    let unavailable = |reason: String| LocalInfoError::TokenUnavailable {
        path: path.display().to_string(),
        reason,
    };

    let token = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(unavailable("file is empty".to_string()));
    }
    Ok(token.to_string())
}

/// Pod name of the filter: `$HOSTNAME`, then the kernel hostname, then `unknown`.
#[must_use]
pub fn pod_name() -> String {
    pod_name_from(
        std::env::var(HOSTNAME_ENV).ok(),
        Path::new(KERNEL_HOSTNAME_PATH),
    )
}

pub(crate) fn pod_name_from(env_value: Option<String>, kernel_hostname: &Path) -> String {
    if let Some(name) = env_value.filter(|v| !v.trim().is_empty()) {
        return name.trim().to_string();
    }

    match std::fs::read_to_string(kernel_hostname) {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        Ok(_) | Err(_) => {
            debug!("No hostname available, using '{UNKNOWN_POD_NAME}'");
            UNKNOWN_POD_NAME.to_string()
        }
    }
}

/// Discover the local pod.
///
/// A missing namespace file means the filter does not run in a pod; it is logged
/// and leaves `identity` empty. A missing token is logged as a warning and leaves
/// API requests unauthenticated.
#[must_use]
pub fn discover(namespace_file: &Path, token_file: &Path) -> LocalPodInfo {
    let identity = match read_namespace(namespace_file) {
        Ok(namespace) => Some(Identity::new(namespace, pod_name())),
        Err(e) => {
            info!(error = %e, "Not running inside a pod, no local identity");
            None
        }
    };

    let token = match read_token(token_file) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(error = %e, "API server requests will be sent without authorization");
            None
        }
    };

    if let Some(identity) = &identity {
        info!(
            namespace = %identity.namespace,
            pod = %identity.pod_name,
            "Discovered local pod"
        );
    }

    LocalPodInfo { identity, token }
}

#[cfg(test)]
#[path = "local_info_tests.rs"]
mod local_info_tests;
