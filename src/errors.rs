// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for kubemeta.
//!
//! Each failure domain of the filter has its own error enum:
//!
//! - [`DecomposeError`] - a tag could not be decomposed (input error)
//! - [`LocalInfoError`] - local pod files are unavailable (informational)
//! - [`FetchError`] - the API server could not be reached or answered badly
//! - [`DecodeError`] / [`EncodeError`] - malformed encoded input or a broken output invariant
//! - [`CacheWriteFailure`] - the cache store refused an entry (non-fatal)
//! - [`MergeError`] - API metadata could not be merged into the tag metadata
//! - [`ConfigError`] / [`InitError`] - startup failures, the only process-fatal errors
//! - [`ResolveError`] - the per-record failure returned by the resolver
//!
//! Failures of a single record never affect other records or shared state.

use thiserror::Error;

/// Errors raised while decoding an encoded object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the object did
    #[error("unexpected end of encoded data at offset {offset}")]
    UnexpectedEof {
        /// Offset at which more bytes were expected
        offset: usize,
    },

    /// The reserved marker byte (0xc1) was found
    #[error("reserved marker byte at offset {offset}")]
    ReservedMarker {
        /// Offset of the marker byte
        offset: usize,
    },

    /// Nested maps and arrays exceeded the depth limit
    #[error("encoded object nested deeper than {max} levels")]
    TooDeep {
        /// Depth limit that was hit
        max: usize,
    },

    /// A JSON document could not be parsed or converted
    #[error("malformed JSON document: {reason}")]
    Json {
        /// Parser error
        reason: String,
    },
}

/// Errors raised while producing an encoded object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The declared map size does not match the entries actually written
    #[error("map header declared {declared} entries but {written} were written")]
    SizeMismatch {
        /// Size written in the map header
        declared: u32,
        /// Number of entries appended
        written: u32,
    },

    /// A map or string is too large for the wire format
    #[error("{what} of length {len} exceeds the encodable maximum")]
    TooLarge {
        /// What was being encoded
        what: &'static str,
        /// Offending length
        len: usize,
    },

    /// The underlying writer failed
    #[error("failed to write encoded data: {0}")]
    Write(String),
}

/// Errors raised while decomposing a tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecomposeError {
    /// The configured pattern does not match the tag at all
    #[error("tag '{tag}' does not match the configured pattern")]
    NoMatch {
        /// The tag that failed to match
        tag: String,
    },
}

/// Local pod information that could not be loaded.
///
/// None of these abort startup; they only downgrade what the filter can do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalInfoError {
    /// The namespace file is missing or unreadable (likely not running in a pod)
    #[error("cannot read namespace file {path}: {reason}")]
    NamespaceUnavailable {
        /// Path of the namespace file
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The `ServiceAccount` token file is missing or unreadable
    #[error("cannot read token file {path}: {reason}")]
    TokenUnavailable {
        /// Path of the token file
        path: String,
        /// Underlying I/O error
        reason: String,
    },
}

/// Errors raised while fetching pod metadata from the API server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The context was built without a transport
    #[error("no API server transport configured")]
    NoUpstream,

    /// A connection could not be acquired
    #[error("failed to acquire API server connection: {reason}")]
    Connect {
        /// Underlying transport error
        reason: String,
    },

    /// The request could not be sent or the response could not be read
    #[error("API server request to {path} failed: {reason}")]
    Transport {
        /// Request path
        path: String,
        /// Underlying transport error
        reason: String,
    },

    /// The API server answered with a status other than 200
    #[error("API server returned HTTP {status} for {path}")]
    Status {
        /// HTTP status code received
        status: u16,
        /// Request path
        path: String,
    },

    /// The response body is not valid JSON or could not be re-encoded
    #[error("failed to decode API server response for {path}: {reason}")]
    Decode {
        /// Request path
        path: String,
        /// Decoder error
        reason: String,
    },
}

/// Why a cache store refused an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWriteReason {
    /// The store holds its maximum number of entries
    Full {
        /// Configured capacity
        max_entries: usize,
    },
    /// The store's lock was poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for CacheWriteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full { max_entries } => write!(f, "store is full ({max_entries} entries)"),
            Self::Poisoned => write!(f, "store lock poisoned"),
        }
    }
}

/// A cache store refused an entry.
///
/// The rejected blob is handed back so the caller can still use it.
#[derive(Error, Debug)]
#[error("failed to cache metadata for '{key}': {reason}")]
pub struct CacheWriteFailure {
    /// Cache key of the rejected entry
    pub key: String,
    /// Why the entry was rejected
    pub reason: CacheWriteReason,
    /// The rejected blob, returned to the caller
    pub blob: Vec<u8>,
}

/// Errors raised while merging API metadata into tag metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// One of the inputs is not validly encoded
    #[error("malformed input: {0}")]
    Decode(#[from] DecodeError),

    /// An input that must be a map is something else
    #[error("{what} is not a map")]
    NotAMap {
        /// Which input was malformed
        what: &'static str,
    },

    /// The API object has no metadata section
    #[error("API object has no '{section}' section")]
    NoMetadataSection {
        /// Name of the section that was looked up
        section: String,
    },

    /// The merged output could not be encoded
    #[error("failed to encode merged metadata: {0}")]
    Encode(#[from] EncodeError),
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration file {path}: {reason}")]
    Read {
        /// Path of the configuration file
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The configuration file is not valid YAML for the filter
    #[error("failed to parse configuration file {path}: {reason}")]
    Parse {
        /// Path of the configuration file
        path: String,
        /// Parser error
        reason: String,
    },

    /// The API server URL is invalid
    #[error("invalid API server URL '{url}': {reason}")]
    InvalidUrl {
        /// The configured URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The tag pattern does not compile or has no named groups
    #[error("invalid tag pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The configured pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// The metadata section name is empty
    #[error("metadata section name must not be empty")]
    EmptyMetadataSection,
}

/// Errors that abort filter initialization.
#[derive(Error, Debug)]
pub enum InitError {
    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP transport could not be built
    #[error("failed to build API server transport: {reason}")]
    Transport {
        /// Underlying client builder error
        reason: String,
    },

    /// The startup connectivity probe failed
    #[error("could not get metadata for pod {namespace}/{pod}: {source}")]
    Connectivity {
        /// Local namespace
        namespace: String,
        /// Local pod name
        pod: String,
        /// Probe failure
        #[source]
        source: FetchError,
    },
}

/// Errors returned when resolving metadata for a single record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The tag does not match the configured pattern
    #[error(transparent)]
    NoMatch(#[from] DecomposeError),

    /// Pod metadata could not be fetched after a cache miss
    #[error("failed to fetch metadata for '{key}': {source}")]
    Fetch {
        /// Cache key of the pod
        key: String,
        /// Fetch failure
        #[source]
        source: FetchError,
    },

    /// Pod metadata could not be merged after a cache miss
    #[error("failed to merge metadata for '{key}': {source}")]
    Merge {
        /// Cache key of the pod
        key: String,
        /// Merge failure
        #[source]
        source: MergeError,
    },

    /// The tag metadata could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The store accepted an entry but could not return it
    #[error("cache entry for '{key}' vanished after insert")]
    CacheHandleLost {
        /// Cache key of the pod
        key: String,
    },
}

impl ResolveError {
    /// Whether the failure came from the API server side of a cache miss.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Merge { .. })
    }

    /// Short label for the failure kind, used in metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoMatch(_) => "no_match",
            Self::Fetch { .. } => "fetch_error",
            Self::Merge { .. } => "merge_error",
            Self::Encode(_) => "encode_error",
            Self::CacheHandleLost { .. } => "cache_handle_lost",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
