//! vodsync - keeps media server metadata in sync with a video archive service
//!
//! The archive owns source-of-truth video and channel metadata; the media
//! server discovers the files through its own library scan. vodsync joins
//! the two on the shared external video id, groups a channel's videos into
//! per-year seasons, and rewrites whatever item metadata drifted. Sync runs
//! are triggered by the archive's download-completed webhook (coalesced to
//! one run at a time), by a periodic schedule, or manually.

pub mod api;
pub mod cli;
pub mod config;
pub mod jobs;
pub mod services;
pub mod sync;

use std::sync::Arc;

use crate::config::Config;
use crate::services::archive::ArchiveClient;
use crate::services::media::MediaClient;
use crate::sync::SyncService;
use crate::sync::scheduler::SyncScheduler;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub archive: Arc<ArchiveClient>,
    pub media: Arc<MediaClient>,
    pub sync: Arc<SyncService>,
    pub scheduler: SyncScheduler,
}
