//! Media server API client
//!
//! Read/update access to the library whose item metadata is being kept in
//! sync. Authenticated with an API key query parameter; item listings are
//! window-paginated with `StartIndex`/`Limit`.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::NaiveDate;
use futures::Stream;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{ClientError, Result};
use super::parse_wire_date;
use super::retry::{RetryConfig, retry_async};

const ITEM_PAGE_SIZE: u64 = 200;

/// Extended fields requested on item listings; the defaults omit most of
/// what the diff needs.
const ITEM_FIELDS: &str =
    "Overview,Tags,ProviderIds,Path,PremiereDate,ProductionYear,SeriesName,SeasonName";

/// Provider-id slot carrying the shared external video id
pub const PROVIDER_SLOT: &str = "YouTube";

/// Media server API client
pub struct MediaClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

/// A library item owned by the media server.
///
/// The engine only reads these and selectively overwrites fields through
/// [`ItemUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub item_id: String,
    /// External video id read from the provider-id slot; absent means the
    /// item has not been matched to the archive yet.
    pub external_id: Option<String>,
    pub parent_show: Option<String>,
    pub season_label: Option<String>,
    pub title: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub premiere_date: Option<NaiveDate>,
    pub production_year: Option<i32>,
    pub path: Option<String>,
}

impl MediaItem {
    /// The provider-slot external id, treating an empty string as absent.
    pub fn provider_external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Partial metadata update for one item.
///
/// Unset fields are not serialized, so the server leaves them untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premiere_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub production_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ids: Option<HashMap<String, String>>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemPage {
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    total_record_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawItem {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    overview: String,
    #[serde(default)]
    tags: Vec<String>,
    series_name: Option<String>,
    season_name: Option<String>,
    premiere_date: Option<String>,
    production_year: Option<i32>,
    path: Option<String>,
    #[serde(default)]
    provider_ids: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLibrary {
    name: Option<String>,
    item_id: Option<String>,
}

impl RawItem {
    fn into_item(self) -> Option<MediaItem> {
        let Some(item_id) = self.id.filter(|id| !id.is_empty()) else {
            warn!(name = %self.name, "discarding media item without an id");
            return None;
        };
        // The provider slot key has varied in casing across server versions.
        let external_id = self
            .provider_ids
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(PROVIDER_SLOT))
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty());

        Some(MediaItem {
            item_id,
            external_id,
            parent_show: self.series_name,
            season_label: self.season_name,
            title: self.name,
            description: self.overview,
            tags: self.tags.into_iter().collect(),
            premiere_date: self.premiere_date.as_deref().and_then(parse_wire_date),
            production_year: self.production_year,
            path: self.path,
        })
    }
}

impl MediaClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
        retry: RetryConfig,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
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
            .query(&[("api_key", self.api_key.as_str())])
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

    /// Test connection to the media server
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("/System/Info"))
            .query(&[("api_key", self.api_key.as_str())])
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

    /// Resolve a library by its display name
    pub async fn find_library_root(&self, name: &str) -> Result<String> {
        let libraries: Vec<RawLibrary> = retry_async(
            || self.get_json("/Library/VirtualFolders", &[]),
            &self.retry,
            "media virtual folders",
        )
        .await?;

        libraries
            .into_iter()
            .find(|library| library.name.as_deref() == Some(name))
            .and_then(|library| library.item_id)
            .ok_or_else(|| ClientError::NotFound(format!("library '{name}' not found")))
    }

    async fn item_page(&self, library_id: &str, start_index: u64) -> Result<ItemPage> {
        let query = vec![
            ("ParentId", library_id.to_string()),
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", "Episode,Movie,Video".to_string()),
            ("Fields", ITEM_FIELDS.to_string()),
            ("StartIndex", start_index.to_string()),
            ("Limit", ITEM_PAGE_SIZE.to_string()),
        ];
        retry_async(
            || self.get_json("/Items", &query),
            &self.retry,
            "media item page",
        )
        .await
    }

    /// All items under a library as a lazy stream.
    ///
    /// Windowed pagination driven by the reported total record count; each
    /// call starts a fresh traversal.
    pub fn items<'a>(&'a self, library_id: &'a str) -> impl Stream<Item = Result<MediaItem>> + 'a {
        struct WindowState {
            start_index: u64,
            buffered: VecDeque<MediaItem>,
            done: bool,
        }

        futures::stream::try_unfold(
            WindowState {
                start_index: 0,
                buffered: VecDeque::new(),
                done: false,
            },
            move |mut state| async move {
                loop {
                    if let Some(item) = state.buffered.pop_front() {
                        return Ok(Some((item, state)));
                    }
                    if state.done {
                        return Ok(None);
                    }

                    let page = self.item_page(library_id, state.start_index).await?;
                    let fetched = page.items.len() as u64;
                    if fetched == 0 {
                        state.done = true;
                        continue;
                    }
                    state.start_index += fetched;
                    state.done = state.start_index >= page.total_record_count;

                    debug!(
                        fetched = fetched,
                        total = page.total_record_count,
                        "media item page fetched"
                    );
                    for raw in page.items {
                        if let Some(item) = raw.into_item() {
                            state.buffered.push_back(item);
                        }
                    }
                }
            },
        )
    }

    /// Get a single item by id
    pub async fn item(&self, item_id: &str) -> Result<MediaItem> {
        let path = format!("/Items/{item_id}");
        let query = vec![("Fields", ITEM_FIELDS.to_string())];
        let raw: RawItem =
            retry_async(|| self.get_json(&path, &query), &self.retry, "media item").await?;
        raw.into_item()
            .ok_or_else(|| ClientError::Validation(format!("malformed item record {item_id}")))
    }

    /// Total number of items under a library
    pub async fn item_count(&self, library_id: &str) -> Result<u64> {
        let query = vec![
            ("ParentId", library_id.to_string()),
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", "Episode,Movie,Video".to_string()),
            ("StartIndex", "0".to_string()),
            ("Limit", "1".to_string()),
        ];
        let page: ItemPage = retry_async(
            || self.get_json("/Items", &query),
            &self.retry,
            "media item count",
        )
        .await?;
        Ok(page.total_record_count)
    }

    /// Partially update one item's metadata.
    ///
    /// A vanished item surfaces as [`ClientError::NotFound`], which the
    /// caller treats as unmatched rather than fatal.
    pub async fn update_item(&self, item_id: &str, update: &ItemUpdate) -> Result<()> {
        let path = format!("/Items/{item_id}");
        retry_async(
            || async {
                let response = self
                    .client
                    .post(self.url(&path))
                    .query(&[("api_key", self.api_key.as_str())])
                    .json(update)
                    .send()
                    .await?;

                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    let message = response.text().await.unwrap_or_default();
                    Err(ClientError::from_status(status, message))
                }
            },
            &self.retry,
            "media item update",
        )
        .await
    }

    /// Trigger a library rescan. Never called implicitly during a sync run.
    pub async fn refresh_library(&self, library_id: &str) -> Result<()> {
        let path = format!("/Library/VirtualFolders/{library_id}/Refresh");
        let response = self
            .client
            .post(self.url(&path))
            .query(&[("api_key", self.api_key.as_str())])
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_item_wire_mapping() {
        let raw: RawItem = serde_json::from_value(serde_json::json!({
            "Id": "i1",
            "Name": "A video",
            "Overview": "About things",
            "Tags": ["one", "two"],
            "SeriesName": "A channel",
            "SeasonName": "2023",
            "PremiereDate": "2023-01-15T00:00:00.0000000Z",
            "ProductionYear": 2023,
            "Path": "/media/UC123/abcdefghijk.mp4",
            "ProviderIds": {"YouTube": "abcdefghijk"}
        }))
        .unwrap();

        let item = raw.into_item().unwrap();
        assert_eq!(item.item_id, "i1");
        assert_eq!(item.external_id.as_deref(), Some("abcdefghijk"));
        assert_eq!(item.parent_show.as_deref(), Some("A channel"));
        assert_eq!(item.season_label.as_deref(), Some("2023"));
        assert_eq!(
            item.premiere_date,
            Some(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap())
        );
        assert_eq!(item.production_year, Some(2023));
    }

    #[test]
    fn test_provider_slot_casing_is_tolerated() {
        let raw: RawItem = serde_json::from_value(serde_json::json!({
            "Id": "i2",
            "Name": "x",
            "ProviderIds": {"Youtube": "abcdefghijk"}
        }))
        .unwrap();
        let item = raw.into_item().unwrap();
        assert_eq!(item.external_id.as_deref(), Some("abcdefghijk"));
    }

    #[test]
    fn test_partial_update_serializes_only_set_fields() {
        let update = ItemUpdate {
            name: Some("New title".into()),
            production_year: Some(2024),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Name": "New title", "ProductionYear": 2024})
        );
    }

    #[test]
    fn test_empty_update_detection() {
        assert!(ItemUpdate::default().is_empty());
        let update = ItemUpdate {
            tags: Some(vec!["a".into()]),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_item_page_envelope() {
        let page: ItemPage = serde_json::from_value(serde_json::json!({
            "Items": [{"Id": "i1", "Name": "x"}],
            "TotalRecordCount": 31
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_record_count, 31);
    }
}
