//! Synchronization engine
//!
//! One full pass: enumerate the archive, index the media library, diff each
//! matched pair and write back whatever drifted, then publish a run report.

pub mod diff;
pub mod matcher;
pub mod report;
pub mod scheduler;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::services::archive::{ArchiveClient, ArchiveVideo};
use crate::services::error::ClientError;
use crate::services::media::{MediaClient, MediaItem};
use matcher::MediaIndex;
use report::{ItemOutcome, ReportSlot, RunCounters, SyncRunReport};

/// A media item with no counterpart left in the archive
#[derive(Debug, Clone, Serialize)]
pub struct OrphanItem {
    pub item_id: String,
    pub title: String,
    pub external_id: Option<String>,
    pub path: Option<String>,
}

/// Classify a failed item update.
///
/// An item that vanished between matching and writing is unmatched, not a
/// failure; everything else counts against the run.
pub fn classify_update_failure(err: &ClientError) -> ItemOutcome {
    match err {
        ClientError::NotFound(_) => ItemOutcome::Unmatched,
        _ => ItemOutcome::Failed,
    }
}

/// Orchestrates synchronization runs and owns the last-run report.
pub struct SyncService {
    archive: Arc<ArchiveClient>,
    media: Arc<MediaClient>,
    library_name: String,
    last_report: ReportSlot,
}

impl SyncService {
    pub fn new(archive: Arc<ArchiveClient>, media: Arc<MediaClient>, library_name: String) -> Self {
        Self {
            archive,
            media,
            library_name,
            last_report: ReportSlot::default(),
        }
    }

    /// The last completed run, if any. Failed attempts that aborted before
    /// completion never replace this.
    pub fn last_report(&self) -> Option<Arc<SyncRunReport>> {
        self.last_report.latest()
    }

    /// Run one full synchronization pass.
    ///
    /// Phase errors (credentials, an unfetchable page, a missing library)
    /// abort with `Err` and leave the published report untouched. Per-item
    /// failures are folded into the report instead.
    pub async fn run(&self) -> Result<Arc<SyncRunReport>> {
        let started_at = Utc::now();
        info!("sync run started");

        info!(phase = "fetching_archive", "enumerating archive videos and channels");
        let videos: Vec<ArchiveVideo> = self
            .archive
            .videos()
            .try_collect()
            .await
            .context("failed to enumerate archive videos")?;
        let channels = self
            .archive
            .channels()
            .await
            .context("failed to list archive channels")?;
        let channel_names: HashMap<String, String> = channels
            .into_iter()
            .map(|channel| (channel.channel_id, channel.name))
            .collect();
        info!(
            videos = videos.len(),
            channels = channel_names.len(),
            "archive enumeration complete"
        );

        info!(phase = "fetching_media", library = %self.library_name, "enumerating media items");
        let library_id = self
            .media
            .find_library_root(&self.library_name)
            .await
            .context("failed to resolve media library root")?;
        let items: Vec<MediaItem> = self
            .media
            .items(&library_id)
            .try_collect()
            .await
            .context("failed to enumerate media items")?;
        info!(items = items.len(), "media enumeration complete");

        info!(phase = "matching", "building media index");
        let index = MediaIndex::build(items);
        debug!(indexed = index.len(), "media index built");

        info!(phase = "updating", "diffing and updating items");
        let mut counters = RunCounters::default();
        let mut attempted: HashSet<String> = HashSet::new();
        for video in &videos {
            let outcome = self
                .sync_video(video, &index, &channel_names, &mut attempted)
                .await;
            counters.record(outcome);
        }

        let report = SyncRunReport {
            started_at,
            finished_at: Utc::now(),
            counters,
            status: counters.status(),
        };
        debug_assert!(report.counters.is_conserved());
        let report = self.last_report.publish(report);
        info!(
            processed = report.counters.processed,
            updated = report.counters.updated,
            skipped = report.counters.skipped,
            unmatched = report.counters.unmatched,
            failed = report.counters.failed,
            status = ?report.status,
            "sync run finished"
        );
        Ok(report)
    }

    /// Diff and, if needed, update the item matching one video.
    async fn sync_video(
        &self,
        video: &ArchiveVideo,
        index: &MediaIndex,
        channel_names: &HashMap<String, String>,
        attempted: &mut HashSet<String>,
    ) -> ItemOutcome {
        let Some(item) = index.resolve(&video.external_id) else {
            debug!(video = %video.external_id, "no media item for video");
            return ItemOutcome::Unmatched;
        };

        // Never issue two updates against the same item in one run.
        if attempted.contains(&item.item_id) {
            debug!(
                video = %video.external_id,
                item = %item.item_id,
                "item already written this run"
            );
            return ItemOutcome::Skipped;
        }

        let update = diff::plan_update(video, item, channel_names);
        if update.is_empty() {
            return ItemOutcome::Skipped;
        }

        attempted.insert(item.item_id.clone());
        match self.media.update_item(&item.item_id, &update).await {
            Ok(()) => {
                debug!(video = %video.external_id, item = %item.item_id, "item updated");
                ItemOutcome::Updated
            }
            Err(err) => {
                let outcome = classify_update_failure(&err);
                if outcome == ItemOutcome::Failed {
                    warn!(
                        video = %video.external_id,
                        channel = %video.channel_id,
                        item = %item.item_id,
                        error = %err,
                        "item update failed"
                    );
                } else {
                    debug!(
                        video = %video.external_id,
                        item = %item.item_id,
                        "item vanished before update"
                    );
                }
                outcome
            }
        }
    }

    /// List media items with no counterpart in the archive. Report-only;
    /// nothing is deleted.
    pub async fn find_orphans(&self) -> Result<Vec<OrphanItem>> {
        let archive_ids: HashSet<String> = self
            .archive
            .videos()
            .map_ok(|video| video.external_id)
            .try_collect()
            .await
            .context("failed to enumerate archive videos")?;

        let library_id = self
            .media
            .find_library_root(&self.library_name)
            .await
            .context("failed to resolve media library root")?;
        let items: Vec<MediaItem> = self
            .media
            .items(&library_id)
            .try_collect()
            .await
            .context("failed to enumerate media items")?;

        let orphans = items
            .into_iter()
            .filter(|item| match matcher::extract_external_id(item) {
                Some(id) => !archive_ids.contains(&id),
                None => true,
            })
            .map(|item| OrphanItem {
                item_id: item.item_id,
                title: item.title,
                external_id: item.external_id,
                path: item.path,
            })
            .collect();
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanished_item_is_unmatched_not_failed() {
        let outcome = classify_update_failure(&ClientError::NotFound("gone".into()));
        assert_eq!(outcome, ItemOutcome::Unmatched);
    }

    #[test]
    fn test_other_write_errors_are_failures() {
        let transient = ClientError::Transient("timeout".into());
        assert_eq!(classify_update_failure(&transient), ItemOutcome::Failed);

        let api = ClientError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert_eq!(classify_update_failure(&api), ItemOutcome::Failed);
    }
}
