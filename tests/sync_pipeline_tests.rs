//! Integration tests for the synchronization pipeline
//!
//! These tests drive the match/diff/classify path over in-memory data:
//! - end-to-end run scenarios and their report counters
//! - the idempotence guarantee (a second pass issues zero writes)
//! - conservation of the report counters

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

use vodsync::services::archive::ArchiveVideo;
use vodsync::services::error::ClientError;
use vodsync::services::media::{ItemUpdate, MediaItem};
use vodsync::sync::classify_update_failure;
use vodsync::sync::diff;
use vodsync::sync::matcher::MediaIndex;
use vodsync::sync::report::{ItemOutcome, RunCounters, RunStatus};

// ============================================================================
// In-memory pipeline
// ============================================================================

fn video(external_id: &str, channel_id: &str, title: &str, published: &str) -> ArchiveVideo {
    ArchiveVideo {
        external_id: external_id.to_string(),
        title: title.to_string(),
        description: format!("description of {title}"),
        published_at: NaiveDate::parse_from_str(published, "%Y-%m-%d").unwrap(),
        channel_id: channel_id.to_string(),
        tags: ["archived".to_string()].into_iter().collect(),
    }
}

/// A media item fully in sync with the given video.
fn synced_item(item_id: &str, video: &ArchiveVideo, channels: &HashMap<String, String>) -> MediaItem {
    let show = channels
        .get(&video.channel_id)
        .cloned()
        .unwrap_or_else(|| video.channel_id.clone());
    MediaItem {
        item_id: item_id.to_string(),
        external_id: Some(video.external_id.clone()),
        parent_show: Some(show),
        season_label: Some(format!("{:04}", video.published_at.year())),
        title: video.title.clone(),
        description: video.description.clone(),
        tags: video.tags.clone(),
        premiere_date: Some(video.published_at),
        production_year: Some(video.published_at.year()),
        path: None,
    }
}

/// Apply an update the way the media server would.
fn apply_update(item: &mut MediaItem, update: &ItemUpdate) {
    if let Some(name) = &update.name {
        item.title = name.clone();
    }
    if let Some(overview) = &update.overview {
        item.description = overview.clone();
    }
    if let Some(tags) = &update.tags {
        item.tags = tags.iter().cloned().collect();
    }
    if let Some(series_name) = &update.series_name {
        item.parent_show = Some(series_name.clone());
    }
    if let Some(season_name) = &update.season_name {
        item.season_label = Some(season_name.clone());
    }
    if let Some(premiere_date) = &update.premiere_date {
        item.premiere_date = NaiveDate::parse_from_str(premiere_date, "%Y-%m-%d").ok();
    }
    if let Some(year) = update.production_year {
        item.production_year = Some(year);
    }
    if let Some(provider_ids) = &update.provider_ids {
        if let Some(id) = provider_ids.values().next() {
            item.external_id = Some(id.clone());
        }
    }
}

/// One updating pass: match, diff, write through the given sink, count.
fn run_pass<W>(
    videos: &[ArchiveVideo],
    items: &[MediaItem],
    channels: &HashMap<String, String>,
    mut write: W,
) -> RunCounters
where
    W: FnMut(&MediaItem, &ItemUpdate) -> Result<(), ClientError>,
{
    let index = MediaIndex::build(items.iter().cloned());
    let mut counters = RunCounters::default();
    let mut attempted: HashSet<String> = HashSet::new();

    for video in videos {
        let outcome = match index.resolve(&video.external_id) {
            None => ItemOutcome::Unmatched,
            Some(item) if attempted.contains(&item.item_id) => ItemOutcome::Skipped,
            Some(item) => {
                let update = diff::plan_update(video, item, channels);
                if update.is_empty() {
                    ItemOutcome::Skipped
                } else {
                    attempted.insert(item.item_id.clone());
                    match write(item, &update) {
                        Ok(()) => ItemOutcome::Updated,
                        Err(err) => classify_update_failure(&err),
                    }
                }
            }
        };
        counters.record(outcome);
    }
    counters
}

fn two_channels() -> HashMap<String, String> {
    HashMap::from([
        ("UC1".to_string(), "First Channel".to_string()),
        ("UC2".to_string(), "Second Channel".to_string()),
    ])
}

// ============================================================================
// Run scenarios
// ============================================================================

#[test]
fn test_one_stale_item_among_three() {
    let channels = two_channels();
    let videos = vec![
        video("aaaaaaaaaaa", "UC1", "First video", "2023-01-15"),
        video("bbbbbbbbbbb", "UC1", "Second video", "2023-03-02"),
        video("ccccccccccc", "UC2", "Third video", "2024-07-19"),
    ];
    let mut items = vec![
        synced_item("i1", &videos[0], &channels),
        synced_item("i2", &videos[1], &channels),
        synced_item("i3", &videos[2], &channels),
    ];
    items[1].title = "Stale title".to_string();

    let mut writes = 0;
    let counters = run_pass(&videos, &items, &channels, |_, _| {
        writes += 1;
        Ok(())
    });

    assert_eq!(counters.processed, 3);
    assert_eq!(counters.updated, 1);
    assert_eq!(counters.skipped, 2);
    assert_eq!(counters.unmatched, 0);
    assert_eq!(counters.status(), RunStatus::Succeeded);
    assert_eq!(writes, 1);
    assert!(counters.is_conserved());
}

#[test]
fn test_not_yet_scanned_video_is_unmatched_not_failed() {
    let channels = two_channels();
    let videos = vec![
        video("aaaaaaaaaaa", "UC1", "First video", "2023-01-15"),
        video("bbbbbbbbbbb", "UC1", "Not scanned yet", "2023-03-02"),
    ];
    let items = vec![synced_item("i1", &videos[0], &channels)];

    let counters = run_pass(&videos, &items, &channels, |_, _| Ok(()));

    assert_eq!(counters.processed, 2);
    assert_eq!(counters.unmatched, 1);
    assert!(counters.updated <= 1);
    assert_eq!(counters.failed, 0);
    assert_eq!(counters.status(), RunStatus::Succeeded);
    assert!(counters.is_conserved());
}

#[test]
fn test_item_removed_mid_run_is_unmatched() {
    let channels = two_channels();
    let videos = vec![
        video("aaaaaaaaaaa", "UC1", "Survivor", "2023-01-15"),
        video("bbbbbbbbbbb", "UC1", "Removed", "2023-03-02"),
    ];
    let mut items = vec![
        synced_item("i1", &videos[0], &channels),
        synced_item("i2", &videos[1], &channels),
    ];
    items[1].title = "Stale".to_string();

    // The write against i2 finds the item already gone.
    let counters = run_pass(&videos, &items, &channels, |item, _| {
        if item.item_id == "i2" {
            Err(ClientError::NotFound("item vanished".into()))
        } else {
            Ok(())
        }
    });

    assert_eq!(counters.processed, 2);
    assert_eq!(counters.unmatched, 1);
    assert_eq!(counters.failed, 0);
    assert_eq!(counters.status(), RunStatus::Succeeded);
    assert!(counters.is_conserved());
}

#[test]
fn test_mixed_write_failures_finish_partial() {
    let channels = two_channels();
    let videos = vec![
        video("aaaaaaaaaaa", "UC1", "Updates fine", "2023-01-15"),
        video("bbbbbbbbbbb", "UC1", "Write breaks", "2023-03-02"),
    ];
    let mut items = vec![
        synced_item("i1", &videos[0], &channels),
        synced_item("i2", &videos[1], &channels),
    ];
    items[0].title = "Stale one".to_string();
    items[1].title = "Stale two".to_string();

    let counters = run_pass(&videos, &items, &channels, |item, _| {
        if item.item_id == "i2" {
            Err(ClientError::Transient("connection reset".into()))
        } else {
            Ok(())
        }
    });

    assert_eq!(counters.updated, 1);
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.status(), RunStatus::Partial);
    assert!(counters.is_conserved());
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_second_pass_issues_zero_writes() {
    let channels = two_channels();
    let videos = vec![
        video("aaaaaaaaaaa", "UC1", "First video", "2023-01-15"),
        video("bbbbbbbbbbb", "UC1", "Second video", "2023-03-02"),
        video("ccccccccccc", "UC2", "Third video", "2024-07-19"),
    ];

    // Freshly scanned items: only the file-derived name, nothing else.
    let mut items: Vec<MediaItem> = videos
        .iter()
        .enumerate()
        .map(|(i, v)| MediaItem {
            item_id: format!("i{i}"),
            external_id: None,
            parent_show: None,
            season_label: None,
            title: v.external_id.clone(),
            description: String::new(),
            tags: Default::default(),
            premiere_date: None,
            production_year: None,
            path: Some(format!("/media/{}/{}.mp4", v.channel_id, v.external_id)),
        })
        .collect();

    // First pass writes everything back to the items.
    let mut updates: Vec<(String, ItemUpdate)> = Vec::new();
    let first = run_pass(&videos, &items, &channels, |item, update| {
        updates.push((item.item_id.clone(), update.clone()));
        Ok(())
    });
    assert_eq!(first.updated, 3);
    for (item_id, update) in &updates {
        let item = items.iter_mut().find(|i| &i.item_id == item_id).unwrap();
        apply_update(item, update);
    }

    // Second pass over unchanged source data: everything already in sync.
    let second = run_pass(&videos, &items, &channels, |item, update| {
        panic!("unexpected write against {}: {update:?}", item.item_id);
    });
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, second.processed);
    assert_eq!(second.status(), RunStatus::Succeeded);
    assert!(second.is_conserved());
}

#[test]
fn test_provider_id_backfill_converges() {
    let channels = two_channels();
    let videos = vec![video("aaaaaaaaaaa", "UC1", "First video", "2023-01-15")];

    // In sync except for the missing provider id (matched via path).
    let mut item = synced_item("i1", &videos[0], &channels);
    item.external_id = None;
    item.path = Some("/media/UC1/aaaaaaaaaaa.mp4".to_string());
    let mut items = vec![item];

    let mut recorded: Option<ItemUpdate> = None;
    let first = run_pass(&videos, &items, &channels, |_, update| {
        recorded = Some(update.clone());
        Ok(())
    });
    assert_eq!(first.updated, 1);

    let update = recorded.unwrap();
    assert!(update.provider_ids.is_some());
    assert!(update.name.is_none());

    apply_update(&mut items[0], &update);
    let second = run_pass(&videos, &items, &channels, |_, _| {
        panic!("backfill should not repeat");
    });
    assert_eq!(second.skipped, 1);
}
