//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Archive API base URL
    pub archive_url: String,

    /// Archive API token
    pub archive_token: String,

    /// Media server base URL
    pub media_url: String,

    /// Media server API key
    pub media_api_key: String,

    /// Display name of the target media library
    pub media_library: String,

    /// Port for the inbound notification listener
    pub listen_port: u16,

    /// Path prefix under which the archive's media files are mounted
    pub media_path_prefix: String,

    /// Hours between scheduled full syncs in server mode
    pub sync_interval_hours: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let archive_url = env::var("ARCHIVE_URL").context("ARCHIVE_URL is required")?;
        Url::parse(&archive_url).context("ARCHIVE_URL is not a valid URL")?;

        let media_url = env::var("MEDIA_URL").context("MEDIA_URL is required")?;
        Url::parse(&media_url).context("MEDIA_URL is not a valid URL")?;

        Ok(Self {
            archive_url,

            archive_token: env::var("ARCHIVE_TOKEN").context("ARCHIVE_TOKEN is required")?,

            media_url,

            media_api_key: env::var("MEDIA_API_KEY").context("MEDIA_API_KEY is required")?,

            media_library: env::var("MEDIA_LIBRARY").unwrap_or_else(|_| "YouTube".to_string()),

            listen_port: env::var("LISTEN_PORT")
                .unwrap_or_else(|_| "8001".to_string())
                .parse()
                .context("Invalid LISTEN_PORT")?,

            media_path_prefix: env::var("MEDIA_PATH_PREFIX")
                .context("MEDIA_PATH_PREFIX is required")?,

            sync_interval_hours: env::var("SYNC_INTERVAL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .context("Invalid SYNC_INTERVAL_HOURS")?,
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_hours.saturating_mul(3600))
    }
}
