// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge of tag metadata with API server pod metadata.
//!
//! The output is one flat map: every entry of the tag metadata in its original
//! order, followed by up to three entries taken from the Pod's metadata section:
//!
//! | Source key    | Output key    |
//! |---------------|---------------|
//! | `uid`         | `pod_id`      |
//! | `labels`      | `labels`      |
//! | `annotations` | `annotations` |
//!
//! Keys and values are copied as raw encoded spans, so nested label and annotation
//! values survive whatever shape they have.

use crate::api::RemoteObject;
use crate::codec::{self, MapEncoder};
use crate::constants::{META_ANNOTATIONS, META_LABELS, META_UID, OUTPUT_POD_ID};
use crate::errors::MergeError;

/// Merge encoded tag metadata with a fetched Pod object.
///
/// `section` names the top-level key of the Pod object holding its metadata.
///
/// # Errors
///
/// Returns [`MergeError`] if either input is malformed, the metadata section is
/// missing, or the output cannot be encoded.
pub fn merge(flat: &[u8], remote: &RemoteObject, section: &str) -> Result<Vec<u8>, MergeError> {
    let flat = codec::decode(flat)?;
    let flat = flat.as_map().ok_or(MergeError::NotAMap { what: "flat map" })?;

    let root = codec::decode(remote.as_bytes())?;
    let root = root
        .as_map()
        .ok_or(MergeError::NotAMap { what: "remote object" })?;

    let metadata = root
        .get(section)
        .ok_or_else(|| MergeError::NoMetadataSection {
            section: section.to_string(),
        })?
        .as_map()
        .ok_or(MergeError::NotAMap {
            what: "metadata section",
        })?;

    let uid = metadata.get(META_UID);
    let labels = metadata.entry(META_LABELS);
    let annotations = metadata.entry(META_ANNOTATIONS);

    let size = flat.len()
        + usize::from(uid.is_some())
        + usize::from(labels.is_some())
        + usize::from(annotations.is_some());

    let mut encoder = MapEncoder::new(size)?;

    for (key, value) in flat.entries() {
        encoder.push_object(key, value);
    }
    if let Some(uid) = uid {
        encoder.push_str_key(OUTPUT_POD_ID, uid)?;
    }
    for (key, value) in [labels, annotations].into_iter().flatten() {
        encoder.push_object(key, value);
    }

    Ok(encoder.finish()?)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod merge_tests;
