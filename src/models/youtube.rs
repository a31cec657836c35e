// YouTube Data API v3 models
// Only the fields this app reads are modelled; everything else is ignored

use serde::{Deserialize, Serialize};

/// One page of a list response (`playlists.list`, `playlistItems.list`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub snippet: Option<PlaylistSnippet>,
    pub content_details: Option<PlaylistContentDetails>,
}

impl Playlist {
    pub fn title(&self) -> &str {
        self.snippet
            .as_ref()
            .and_then(|s| s.title.as_deref())
            .unwrap_or("")
    }

    /// Number of videos in the playlist (0 when unknown)
    pub fn item_count(&self) -> u64 {
        self.content_details
            .as_ref()
            .and_then(|d| d.item_count)
            .unwrap_or(0)
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.snippet.as_ref()?.thumbnails.as_ref()?.best()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnippet {
    pub title: Option<String>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistContentDetails {
    pub item_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

impl Thumbnails {
    /// Smallest available thumbnail
    pub fn best(&self) -> Option<&str> {
        self.default
            .as_ref()
            .or(self.medium.as_ref())
            .or(self.high.as_ref())
            .map(|t| t.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: Option<String>,
    pub snippet: Option<PlaylistItemSnippet>,
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub title: Option<String>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: Option<String>,
}

/// Simplified playlist item as served to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSummary {
    pub playlist_item_id: Option<String>,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

impl From<PlaylistItem> for PlaylistItemSummary {
    fn from(item: PlaylistItem) -> Self {
        let snippet = item.snippet.unwrap_or_default();
        let thumbnail = snippet
            .thumbnails
            .and_then(|t| t.default)
            .map(|t| t.url);
        Self {
            playlist_item_id: item.id,
            video_id: item.content_details.and_then(|d| d.video_id),
            title: snippet.title,
            thumbnail,
        }
    }
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
pub struct GoogleError {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of a bulk delete; `success` is true only if nothing failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkDeleteOutcome {
    pub success: bool,
    pub failures: Vec<DeleteFailure>,
}

impl BulkDeleteOutcome {
    pub fn from_failures(failures: Vec<DeleteFailure>) -> Self {
        Self {
            success: failures.is_empty(),
            failures,
        }
    }
}
