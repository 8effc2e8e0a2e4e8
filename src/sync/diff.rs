//! Diff engine
//!
//! Computes the target metadata for a matched video/item pair and emits a
//! partial update carrying only the fields that actually differ. A pair
//! already in sync produces an empty update and therefore no write call.

use std::collections::HashMap;

use chrono::Datelike;

use crate::services::archive::ArchiveVideo;
use crate::services::media::{ItemUpdate, MediaItem, PROVIDER_SLOT};

/// Season grouping of a video: its channel plus its publish year.
///
/// A pure function of the video's channel id and publish date, so a video
/// resolves to the same season label on every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeasonKey {
    pub channel_id: String,
    pub year: i32,
}

impl SeasonKey {
    pub fn for_video(video: &ArchiveVideo) -> Self {
        Self {
            channel_id: video.channel_id.clone(),
            year: video.published_at.year(),
        }
    }

    pub fn label(&self) -> String {
        format!("{:04}", self.year)
    }
}

/// Compute the partial update that brings `item` in line with `video`.
///
/// Comparisons are exact: case-sensitive, whitespace-preserving, tags as
/// set equality. The provider-id slot is backfilled once for items matched
/// without it, so later runs resolve them through the index directly.
pub fn plan_update(
    video: &ArchiveVideo,
    item: &MediaItem,
    channel_names: &HashMap<String, String>,
) -> ItemUpdate {
    let mut update = ItemUpdate::default();

    if item.title != video.title {
        update.name = Some(video.title.clone());
    }
    if item.description != video.description {
        update.overview = Some(video.description.clone());
    }
    if item.tags != video.tags {
        update.tags = Some(video.tags.iter().cloned().collect());
    }

    let show = channel_names
        .get(&video.channel_id)
        .cloned()
        .unwrap_or_else(|| video.channel_id.clone());
    if item.parent_show.as_deref() != Some(show.as_str()) {
        update.series_name = Some(show);
    }

    let season = SeasonKey::for_video(video);
    let label = season.label();
    if item.season_label.as_deref() != Some(label.as_str()) {
        update.season_name = Some(label);
    }
    if item.premiere_date != Some(video.published_at) {
        update.premiere_date = Some(video.published_at.format("%Y-%m-%d").to_string());
    }
    if item.production_year != Some(season.year) {
        update.production_year = Some(season.year);
    }

    if item.provider_external_id().is_none() {
        update.provider_ids = Some(HashMap::from([(
            PROVIDER_SLOT.to_string(),
            video.external_id.clone(),
        )]));
    }

    update
}
