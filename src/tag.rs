// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tag decomposition into flat metadata and pod identity.
//!
//! Log record tags encode where a record came from, typically the container log
//! file path with `/` replaced by `.`:
//!
//! ```text
//! kube.var.log.containers.web-0_default_nginx-<docker id>.log
//! ```
//!
//! A [`TagParser`] applies a pattern with named capture groups to the tag. Every
//! named group that took part in the match becomes one flat metadata entry, in
//! group order. The `pod_name` and `namespace_name` groups additionally populate
//! the pod [`Identity`] used as the cache key.
//!
//! # Example
//!
//! ```rust
//! use kubemeta::tag::TagParser;
//!
//! let parser = TagParser::new(
//!     r"^kube\.(?P<pod_name>[^_]+)_(?P<namespace_name>[^_]+)\.log$",
//! ).unwrap();
//!
//! let decomposed = parser.decompose("kube.web-0_default.log").unwrap();
//! let identity = decomposed.identity.complete().unwrap();
//! assert_eq!(identity.cache_key(), "default:web-0");
//! ```

use crate::codec::MapEncoder;
use crate::constants::{
    CACHE_KEY_SEPARATOR, CAPTURE_NAMESPACE_NAME, CAPTURE_POD_NAME, MAX_OBJECT_NAME_LEN,
};
use crate::errors::{ConfigError, DecomposeError, EncodeError};
use regex::Regex;

/// A pod identity: the namespace and pod name pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Namespace of the pod
    pub namespace: String,
    /// Name of the pod
    pub pod_name: String,
}

impl Identity {
    /// Create an identity from its parts.
    #[must_use]
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
        }
    }

    /// Cache key for this identity: `<namespace>:<pod name>`.
    ///
    /// The separator is not escaped, so `a:b` / `c` and `a` / `b:c` share a key.
    /// Namespace names cannot contain `:`, which keeps real identities apart.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = String::with_capacity(self.namespace.len() + self.pod_name.len() + 1);
        key.push_str(&self.namespace);
        key.push(CACHE_KEY_SEPARATOR);
        key.push_str(&self.pod_name);
        key
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}

/// Whether `name` is a valid Kubernetes object name (DNS-1123 subdomain).
///
/// Lowercase alphanumerics and `-`, in `.`-separated labels that start and end
/// with an alphanumeric.
#[must_use]
pub fn is_object_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
        return false;
    }

    name.split('.').all(|label| {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                is_alnum(*first)
                    && is_alnum(*last)
                    && bytes.iter().all(|b| is_alnum(*b) || *b == b'-')
            }
            _ => false,
        }
    })
}

fn is_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

/// Identity fields found in a tag, possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialIdentity {
    /// First `namespace_name` capture, if any
    pub namespace: Option<String>,
    /// First `pod_name` capture, if any
    pub pod_name: Option<String>,
}

impl PartialIdentity {
    /// The full identity, if both fields were captured and are valid object names.
    ///
    /// A capture that cannot name a Kubernetes object is treated as missing.
    #[must_use]
    pub fn complete(&self) -> Option<Identity> {
        match (&self.namespace, &self.pod_name) {
            (Some(namespace), Some(pod_name))
                if is_object_name(namespace) && is_object_name(pod_name) =>
            {
                Some(Identity::new(namespace, pod_name))
            }
            _ => None,
        }
    }
}

/// Result of decomposing one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposed {
    /// Identity fields found in the tag
    pub identity: PartialIdentity,
    /// Flat metadata entries in capture group order, duplicates kept
    pub entries: Vec<(String, String)>,
}

impl Decomposed {
    /// Encode the flat metadata as a map.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if an entry is too large for the wire format.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = MapEncoder::new(self.entries.len())?;
        for (name, value) in &self.entries {
            encoder.push_str(name, value)?;
        }
        encoder.finish()
    }
}

/// Compiled tag pattern.
#[derive(Debug, Clone)]
pub struct TagParser {
    regex: Regex,
}

impl TagParser {
    /// Compile a tag pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile or
    /// has no named capture group.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        if regex.capture_names().flatten().next().is_none() {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern has no named capture groups".to_string(),
            });
        }

        Ok(Self { regex })
    }

    /// The source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Decompose a tag into flat metadata and identity fields.
    ///
    /// Named groups that did not participate in the match are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DecomposeError::NoMatch`] if the pattern does not match the tag.
    pub fn decompose(&self, tag: &str) -> Result<Decomposed, DecomposeError> {
        let captures = self
            .regex
            .captures(tag)
            .ok_or_else(|| DecomposeError::NoMatch {
                tag: tag.to_string(),
            })?;

        let mut identity = PartialIdentity::default();
        let mut entries = Vec::new();

        for (index, name) in self.regex.capture_names().enumerate() {
            let Some(name) = name else {
                continue;
            };
            let Some(value) = captures.get(index) else {
                continue;
            };
            let value = value.as_str();

            if name == CAPTURE_POD_NAME && identity.pod_name.is_none() {
                identity.pod_name = Some(value.to_string());
            } else if name == CAPTURE_NAMESPACE_NAME && identity.namespace.is_none() {
                identity.namespace = Some(value.to_string());
            }

            entries.push((name.to_string(), value.to_string()));
        }

        Ok(Decomposed { identity, entries })
    }
}

#[cfg(test)]
#[path = "tag_tests.rs"]
mod tag_tests;
