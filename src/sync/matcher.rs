//! Video-to-item matching
//!
//! Builds a per-run index from external video id to media item, extracting
//! ids from the provider slot, the item name, or the file name.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::services::media::MediaItem;

// External video ids are 11 characters of [A-Za-z0-9_-].
static EXACT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());
static EMBEDDED_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_-]{11}").unwrap());

/// Extract the external video id carried by a media item, if any.
///
/// Precedence: provider-id slot, then an item name that is itself an id,
/// then an id embedded in the file name. Candidates starting or ending with
/// `-` are ignored; real ids never do.
pub fn extract_external_id(item: &MediaItem) -> Option<String> {
    if let Some(id) = item.provider_external_id() {
        return Some(id.to_string());
    }

    if EXACT_ID.is_match(&item.title) {
        return Some(item.title.clone());
    }

    if let Some(path) = &item.path {
        let stem = std::path::Path::new(path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        for candidate in EMBEDDED_ID.find_iter(stem) {
            let candidate = candidate.as_str();
            if !candidate.starts_with('-') && !candidate.ends_with('-') {
                return Some(candidate.to_string());
            }
        }
    }

    None
}

/// Per-run index of media items keyed by external video id.
///
/// Items carrying no extractable id are excluded, never flagged; the media
/// server may simply not have scanned the file yet.
pub struct MediaIndex {
    by_external_id: HashMap<String, MediaItem>,
}

impl MediaIndex {
    pub fn build(items: impl IntoIterator<Item = MediaItem>) -> Self {
        let mut by_external_id: HashMap<String, MediaItem> = HashMap::new();
        let mut skipped = 0usize;
        for item in items {
            match extract_external_id(&item) {
                Some(id) => {
                    by_external_id.entry(id).or_insert(item);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped = skipped, "media items without an external id excluded from index");
        }
        Self { by_external_id }
    }

    pub fn resolve(&self, external_id: &str) -> Option<&MediaItem> {
        self.by_external_id.get(external_id)
    }

    pub fn len(&self) -> usize {
        self.by_external_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_external_id.is_empty()
    }
}
