//! Archive API client
//!
//! Read access to the video-archival service that owns source-of-truth
//! video and channel metadata. All endpoints are authenticated with a
//! token header; listings are page-number paginated.

use std::collections::{BTreeSet, VecDeque};

use chrono::NaiveDate;
use futures::Stream;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::{ClientError, Result};
use super::parse_wire_date;
use super::retry::{RetryConfig, retry_async};

const PAGE_SIZE: u32 = 100;

/// Safety cap on pagination, matching the archive's own page limit.
const MAX_PAGES: u32 = 100;

/// Archive API client
pub struct ArchiveClient {
    client: Client,
    base_url: String,
    token: String,
    retry: RetryConfig,
}

/// A video snapshot from the archive. Immutable per fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveVideo {
    /// Stable, globally unique video identifier shared with the media server
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub published_at: NaiveDate,
    pub channel_id: String,
    pub tags: BTreeSet<String>,
}

/// A channel from the archive, used to label show-level grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveChannel {
    pub channel_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(default)]
    data: Vec<RawVideo>,
    #[serde(default)]
    paginate: Paginate,
}

#[derive(Debug, Default, Deserialize)]
struct Paginate {
    #[serde(default)]
    current_page: u32,
    #[serde(default)]
    last_page: u32,
    #[serde(default)]
    total_hits: u64,
}

#[derive(Debug, Deserialize)]
struct VideoEnvelope {
    data: RawVideo,
}

#[derive(Debug, Deserialize)]
struct ChannelPage {
    #[serde(default)]
    data: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct ChannelEnvelope {
    data: RawChannel,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    youtube_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    published: Option<String>,
    channel: Option<RawChannel>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    channel_id: Option<String>,
    channel_name: Option<String>,
}

impl RawVideo {
    /// Validate a raw record into a typed video.
    ///
    /// Records missing the external id, the channel, or a parseable publish
    /// date are rejected here and never reach the sync engine.
    fn into_video(self) -> Option<ArchiveVideo> {
        let Some(external_id) = self.youtube_id.filter(|id| !id.is_empty()) else {
            warn!(title = %self.title, "discarding archive video without an external id");
            return None;
        };
        let Some(channel_id) = self
            .channel
            .as_ref()
            .and_then(|c| c.channel_id.clone())
            .filter(|id| !id.is_empty())
        else {
            warn!(video = %external_id, "discarding archive video without a channel");
            return None;
        };
        let Some(published_at) = self.published.as_deref().and_then(parse_wire_date) else {
            warn!(
                video = %external_id,
                published = ?self.published,
                "discarding archive video with unparseable publish date"
            );
            return None;
        };

        Some(ArchiveVideo {
            external_id,
            title: self.title,
            description: self.description,
            published_at,
            channel_id,
            tags: self.tags.unwrap_or_default().into_iter().collect(),
        })
    }
}

impl RawChannel {
    fn into_channel(self) -> Option<ArchiveChannel> {
        let channel_id = self.channel_id.filter(|id| !id.is_empty())?;
        let name = self
            .channel_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| channel_id.clone());
        Some(ArchiveChannel { channel_id, name })
    }
}

impl ArchiveClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: Client,
        retry: RetryConfig,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            retry,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, message));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Validation(e.to_string()))
    }

    /// Test connection to the archive
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/api/ping/"))
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::from_status(status, message))
        }
    }

    async fn video_page(&self, page: u32) -> Result<VideoPage> {
        let query = vec![
            ("page", page.to_string()),
            ("limit", PAGE_SIZE.to_string()),
        ];
        retry_async(
            || self.get_json("/api/video/", &query),
            &self.retry,
            "archive video page",
        )
        .await
    }

    /// All videos in the archive as a lazy stream.
    ///
    /// Pagination is followed transparently until the last page; each call
    /// starts a fresh traversal. Malformed records are dropped with a warning.
    pub fn videos(&self) -> impl Stream<Item = Result<ArchiveVideo>> + '_ {
        struct PageState {
            next_page: u32,
            buffered: VecDeque<ArchiveVideo>,
            done: bool,
        }

        futures::stream::try_unfold(
            PageState {
                next_page: 1,
                buffered: VecDeque::new(),
                done: false,
            },
            move |mut state| async move {
                loop {
                    if let Some(video) = state.buffered.pop_front() {
                        return Ok(Some((video, state)));
                    }
                    if state.done {
                        return Ok(None);
                    }
                    if state.next_page > MAX_PAGES {
                        warn!(pages = MAX_PAGES, "reached archive page cap, stopping");
                        return Ok(None);
                    }

                    let page = self.video_page(state.next_page).await?;
                    if page.data.is_empty() {
                        state.done = true;
                        continue;
                    }

                    let current = if page.paginate.current_page == 0 {
                        state.next_page
                    } else {
                        page.paginate.current_page
                    };
                    state.done = current >= page.paginate.last_page.max(1);
                    state.next_page = current + 1;

                    debug!(
                        page = current,
                        fetched = page.data.len(),
                        total = page.paginate.total_hits,
                        "archive video page fetched"
                    );
                    for raw in page.data {
                        if let Some(video) = raw.into_video() {
                            state.buffered.push_back(video);
                        }
                    }
                }
            },
        )
    }

    /// Get a single video by its external id
    pub async fn video(&self, external_id: &str) -> Result<ArchiveVideo> {
        let path = format!("/api/video/{external_id}/");
        let envelope: VideoEnvelope =
            retry_async(|| self.get_json(&path, &[]), &self.retry, "archive video").await?;
        envelope
            .data
            .into_video()
            .ok_or_else(|| ClientError::Validation(format!("malformed video record {external_id}")))
    }

    /// All channels known to the archive
    pub async fn channels(&self) -> Result<Vec<ArchiveChannel>> {
        let page: ChannelPage = retry_async(
            || self.get_json("/api/channel/", &[]),
            &self.retry,
            "archive channels",
        )
        .await?;
        Ok(page
            .data
            .into_iter()
            .filter_map(RawChannel::into_channel)
            .collect())
    }

    /// Get a single channel by id
    pub async fn channel(&self, channel_id: &str) -> Result<ArchiveChannel> {
        let path = format!("/api/channel/{channel_id}/");
        let envelope: ChannelEnvelope =
            retry_async(|| self.get_json(&path, &[]), &self.retry, "archive channel").await?;
        envelope
            .data
            .into_channel()
            .ok_or_else(|| ClientError::Validation(format!("malformed channel record {channel_id}")))
    }

    /// Total number of videos in the archive (pagination header of page one)
    pub async fn total_videos(&self) -> Result<u64> {
        let query = vec![("page", "1".to_string()), ("limit", "1".to_string())];
        let page: VideoPage = retry_async(
            || self.get_json("/api/video/", &query),
            &self.retry,
            "archive video count",
        )
        .await?;
        Ok(page.paginate.total_hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_record_decoding() {
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "youtube_id": "dQw4w9WgXcQ",
            "title": "A title",
            "description": "A description",
            "published": "2023-01-15",
            "channel": {"channel_id": "UC123", "channel_name": "A channel"},
            "tags": ["music", "live"]
        }))
        .unwrap();

        let video = raw.into_video().unwrap();
        assert_eq!(video.external_id, "dQw4w9WgXcQ");
        assert_eq!(video.channel_id, "UC123");
        assert_eq!(
            video.published_at,
            NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
        );
        assert!(video.tags.contains("music"));
    }

    #[test]
    fn test_video_with_timestamp_publish_date() {
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "youtube_id": "abcdefghijk",
            "published": "2021-06-30T14:05:00Z",
            "channel": {"channel_id": "UC9"}
        }))
        .unwrap();

        let video = raw.into_video().unwrap();
        assert_eq!(
            video.published_at,
            NaiveDate::from_ymd_opt(2021, 6, 30).unwrap()
        );
        assert_eq!(video.title, "");
        assert!(video.tags.is_empty());
    }

    #[test]
    fn test_malformed_records_are_rejected() {
        // No external id
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "title": "orphan",
            "published": "2023-01-15",
            "channel": {"channel_id": "UC123"}
        }))
        .unwrap();
        assert!(raw.into_video().is_none());

        // No channel
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "youtube_id": "abcdefghijk",
            "published": "2023-01-15"
        }))
        .unwrap();
        assert!(raw.into_video().is_none());

        // Garbage publish date
        let raw: RawVideo = serde_json::from_value(serde_json::json!({
            "youtube_id": "abcdefghijk",
            "published": "someday",
            "channel": {"channel_id": "UC123"}
        }))
        .unwrap();
        assert!(raw.into_video().is_none());
    }

    #[test]
    fn test_page_envelope_decoding() {
        let page: VideoPage = serde_json::from_value(serde_json::json!({
            "data": [
                {"youtube_id": "abcdefghijk", "published": "2023-01-15",
                 "channel": {"channel_id": "UC123"}}
            ],
            "paginate": {"current_page": 2, "last_page": 5, "total_hits": 417}
        }))
        .unwrap();

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.paginate.current_page, 2);
        assert_eq!(page.paginate.last_page, 5);
        assert_eq!(page.paginate.total_hits, 417);
    }

    #[test]
    fn test_channel_name_falls_back_to_id() {
        let raw = RawChannel {
            channel_id: Some("UC123".into()),
            channel_name: None,
        };
        let channel = raw.into_channel().unwrap();
        assert_eq!(channel.name, "UC123");
    }
}
