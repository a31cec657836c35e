// YouTube Data API operations used by the web UI

use std::sync::Arc;

use crate::error::ApiError;
use crate::http_client::YouTubeHttpClient;
use crate::models::youtube::{
    BulkDeleteOutcome, DeleteFailure, ListResponse, Playlist, PlaylistItem, PlaylistItemSummary,
};

/// Page size for list calls (API maximum)
const MAX_RESULTS: &str = "50";

/// Default YouTube Data API base URL
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Clone)]
pub struct YouTubeApi {
    http: Arc<YouTubeHttpClient>,
    base_url: String,
}

impl YouTubeApi {
    pub fn new(http: Arc<YouTubeHttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// All playlists owned by the signed-in user, following pagination
    pub async fn list_playlists(&self) -> Result<Vec<Playlist>, ApiError> {
        let playlists: Vec<Playlist> = self
            .list_all(
                "playlists",
                &[
                    ("part", "snippet,contentDetails"),
                    ("mine", "true"),
                    ("maxResults", MAX_RESULTS),
                ],
            )
            .await?;

        tracing::info!("Fetched {} playlists", playlists.len());
        Ok(playlists)
    }

    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<(), ApiError> {
        self.delete("playlists", playlist_id).await?;
        tracing::info!("Deleted playlist {}", playlist_id);
        Ok(())
    }

    /// Videos in a playlist, simplified for the UI
    pub async fn list_playlist_items(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItemSummary>, ApiError> {
        let items: Vec<PlaylistItem> = self
            .list_all(
                "playlistItems",
                &[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", MAX_RESULTS),
                ],
            )
            .await?;

        tracing::info!("Fetched {} items of playlist {}", items.len(), playlist_id);
        Ok(items.into_iter().map(PlaylistItemSummary::from).collect())
    }

    pub async fn delete_playlist_item(&self, item_id: &str) -> Result<(), ApiError> {
        self.delete("playlistItems", item_id).await?;
        tracing::info!("Deleted playlist item {}", item_id);
        Ok(())
    }

    /// Delete playlists one by one, collecting failures
    pub async fn delete_playlists(&self, ids: &[String]) -> BulkDeleteOutcome {
        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.delete_playlist(id).await {
                tracing::warn!("Failed to delete playlist {}: {}", id, e);
                failures.push(DeleteFailure {
                    id: id.clone(),
                    error: e.user_message(),
                });
            }
        }
        BulkDeleteOutcome::from_failures(failures)
    }

    /// Delete playlist items one by one, collecting failures
    pub async fn delete_playlist_items(&self, ids: &[String]) -> BulkDeleteOutcome {
        let mut failures = Vec::new();
        for id in ids {
            if let Err(e) = self.delete_playlist_item(id).await {
                tracing::warn!("Failed to delete playlist item {}: {}", id, e);
                failures.push(DeleteFailure {
                    id: id.clone(),
                    error: e.user_message(),
                });
            }
        }
        BulkDeleteOutcome::from_failures(failures)
    }

    async fn list_all<T>(&self, resource: &str, query: &[(&str, &str)]) -> Result<Vec<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, resource);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self.http.client().get(&url).query(query);
            if let Some(ref token) = page_token {
                builder = builder.query(&[("pageToken", token.as_str())]);
            }
            let req = builder
                .build()
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build request: {}", e)))?;

            let response = self.http.request_with_retry(req).await?;
            let page: ListResponse<T> = response.json().await.map_err(|e| {
                ApiError::Internal(anyhow::anyhow!("Failed to parse {} response: {}", resource, e))
            })?;

            items.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => {
                    tracing::debug!("Fetching next {} page", resource);
                    page_token = Some(next);
                }
                None => break,
            }
        }

        Ok(items)
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<(), ApiError> {
        if id.trim().is_empty() {
            return Err(ApiError::ValidationError(format!("empty {} id", resource)));
        }

        let url = format!("{}/{}", self.base_url, resource);
        let req = self
            .http
            .client()
            .delete(&url)
            .query(&[("id", id)])
            .build()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to build request: {}", e)))?;

        self.http.request_with_retry(req).await?;
        Ok(())
    }
}
