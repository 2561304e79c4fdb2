//! Extension-list augmentation for the real creation call.
//!
//! # Responsibility
//! - Merge auto-detected extensions into the caller's requested list.
//!
//! # Invariants
//! - The caller's list is never reordered and never loses an entry.
//! - The merged list contains no exact-string duplicates.
//! - The original envelope is never mutated; augmentation derives a copy.

use crate::model::InstanceCreateInfo;
use std::collections::BTreeSet;

/// Appends detected extension names to the requested list, suppressing
/// exact-string duplicates.
pub fn merge_extension_names(requested: &[String], detected: &BTreeSet<String>) -> Vec<String> {
    let mut merged: Vec<String> = requested.to_vec();
    for name in detected {
        if !merged.iter().any(|existing| existing == name) {
            merged.push(name.clone());
        }
    }
    merged
}

/// Derives a creation envelope with the augmented extension list.
pub fn augment_create_info(
    request: &InstanceCreateInfo,
    detected: &BTreeSet<String>,
) -> InstanceCreateInfo {
    InstanceCreateInfo {
        application_info: request.application_info.clone(),
        enabled_api_layers: request.enabled_api_layers.clone(),
        enabled_extensions: merge_extension_names(&request.enabled_extensions, detected),
    }
}
