// Playlist sorting and totals for the listing page

use serde::Deserialize;
use std::cmp::Reverse;

use crate::models::youtube::Playlist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Title,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// `?sort=&order=` as sent by the UI; unknown values fall back to defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SortParams {
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl SortParams {
    pub fn key(&self) -> SortKey {
        parse_sort_key(self.sort.as_deref().unwrap_or(""))
    }

    pub fn order(&self) -> SortOrder {
        parse_sort_order(self.order.as_deref().unwrap_or(""))
    }
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Count => "count",
        }
    }
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn flipped(&self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

/// Parse sort key from string
fn parse_sort_key(s: &str) -> SortKey {
    match s {
        "count" => SortKey::Count,
        _ => SortKey::Title,
    }
}

/// Parse sort order from string
fn parse_sort_order(s: &str) -> SortOrder {
    match s {
        "desc" => SortOrder::Desc,
        _ => SortOrder::Asc,
    }
}

/// Stable sort; descending order keeps equal playlists in input order
pub fn sort_playlists(playlists: &mut [Playlist], key: SortKey, order: SortOrder) {
    match (key, order) {
        (SortKey::Title, SortOrder::Asc) => {
            playlists.sort_by_cached_key(|p| p.title().to_lowercase())
        }
        (SortKey::Title, SortOrder::Desc) => {
            playlists.sort_by_cached_key(|p| Reverse(p.title().to_lowercase()))
        }
        (SortKey::Count, SortOrder::Asc) => playlists.sort_by_key(Playlist::item_count),
        (SortKey::Count, SortOrder::Desc) => playlists.sort_by_key(|p| Reverse(p.item_count())),
    }
}

/// Summary line shown above the playlist table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistTotals {
    pub playlists: usize,
    pub videos: u64,
}

pub fn totals(playlists: &[Playlist]) -> PlaylistTotals {
    PlaylistTotals {
        playlists: playlists.len(),
        videos: playlists.iter().map(Playlist::item_count).sum(),
    }
}
