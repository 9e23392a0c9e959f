// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Identity cache for merged pod metadata.
//!
//! The resolver talks to the cache through the [`MetadataStore`] capability:
//!
//! - `get` looks a blob up by cache key
//! - `put` moves a blob into the store and returns a handle to its slot
//! - `get_by_handle` returns the store-owned blob behind a handle
//!
//! Blobs handed out by the store are `Arc<[u8]>`, so their lifetime follows the
//! store entry rather than the call that produced them. [`HashStore`] is the
//! in-memory implementation used by the filter. It has no TTL and does not evict.

use crate::errors::{CacheWriteFailure, CacheWriteReason};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Handle to a store slot, returned by [`MetadataStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(usize);

impl EntryHandle {
    /// Slot index behind this handle.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Key/value store for merged metadata blobs.
///
/// Implementations must be safe for concurrent `get` and `put`.
pub trait MetadataStore: Send + Sync {
    /// Look a blob up by cache key.
    fn get(&self, key: &str) -> Option<Arc<[u8]>>;

    /// Move a blob into the store under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheWriteFailure`], carrying the blob back, if the store refuses it.
    fn put(&self, key: &str, blob: Vec<u8>) -> Result<EntryHandle, CacheWriteFailure>;

    /// The store-owned blob behind a handle.
    fn get_by_handle(&self, handle: EntryHandle) -> Option<Arc<[u8]>>;
}

#[derive(Debug, Default)]
struct Slots {
    index: HashMap<String, usize>,
    blobs: Vec<Arc<[u8]>>,
}

/// In-memory [`MetadataStore`] guarded by a `RwLock`.
///
/// Handles are slot indexes and stay valid for the life of the store. Putting an
/// existing key replaces the blob in its slot (last insert wins).
#[derive(Debug, Default)]
pub struct HashStore {
    slots: RwLock<Slots>,
    max_entries: Option<usize>,
}

impl HashStore {
    /// Create an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that refuses new keys once it holds `max_entries`.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            slots: RwLock::default(),
            max_entries: Some(max_entries),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.blobs.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for HashStore {
    fn get(&self, key: &str) -> Option<Arc<[u8]>> {
        let slots = self.slots.read().ok()?;
        let index = *slots.index.get(key)?;
        slots.blobs.get(index).cloned()
    }

    fn put(&self, key: &str, blob: Vec<u8>) -> Result<EntryHandle, CacheWriteFailure> {
        let Ok(mut slots) = self.slots.write() else {
            return Err(CacheWriteFailure {
                key: key.to_string(),
                reason: CacheWriteReason::Poisoned,
                blob,
            });
        };

        if let Some(&index) = slots.index.get(key) {
            debug!(key = %key, slot = index, "Replacing cached metadata");
            slots.blobs[index] = Arc::from(blob);
            return Ok(EntryHandle(index));
        }

        if let Some(max_entries) = self.max_entries {
            if slots.blobs.len() >= max_entries {
                return Err(CacheWriteFailure {
                    key: key.to_string(),
                    reason: CacheWriteReason::Full { max_entries },
                    blob,
                });
            }
        }

        let index = slots.blobs.len();
        slots.blobs.push(Arc::from(blob));
        slots.index.insert(key.to_string(), index);
        Ok(EntryHandle(index))
    }

    fn get_by_handle(&self, handle: EntryHandle) -> Option<Arc<[u8]>> {
        let slots = self.slots.read().ok()?;
        slots.blobs.get(handle.0).cloned()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
