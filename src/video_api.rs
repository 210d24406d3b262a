use async_trait::async_trait;
use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PLATFORM: &str = "youtube";
pub const MUSIC_PLATFORM: &str = "music";

pub const WATCH_LATER_ID: &str = "WL";
pub const LIKED_VIDEOS_ID: &str = "LL";

/// Remote collection service of a single authenticated account.
///
/// Every call maps to exactly one remote request so that callers stay in
/// control of the quota they spend.
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn list_playlists(
        &self,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<Page<Playlist>>;

    /// Item count of a playlist, probed with an empty page.
    async fn playlist_item_count(&self, playlist_id: &str) -> Result<u64>;

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
        max_results: u32,
    ) -> Result<Page<PlaylistItem>>;

    /// Creates a playlist and returns its id.
    async fn insert_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<String>;

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()>;

    async fn like_video(&self, video_id: &str) -> Result<()>;
}

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// A playlist as listed remotely and as persisted in the playlist index.
///
/// Field order is the column order of the index file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub title: String,
    pub id: String,
    pub url: String,
    pub item_count: u64,
    pub fetched_videos: u64,
    pub platform: String,
}

impl Playlist {
    pub fn new(id: &str, title: &str, item_count: u64) -> Self {
        Self {
            title: title.to_string(),
            id: id.to_string(),
            url: playlist_url(id),
            item_count,
            fetched_videos: 0,
            platform: DEFAULT_PLATFORM.to_string(),
        }
    }

    pub fn is_liked_videos(&self) -> bool {
        self.id == LIKED_VIDEOS_ID
    }

    pub fn is_music(&self) -> bool {
        self.platform == MUSIC_PLATFORM
    }
}

/// Membership entry of a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
}

/// A video record of a fetched playlist.
///
/// Field order is the column order of the per-playlist video files.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub title: String,
    pub video_id: String,
    pub url: String,
    pub playlist: String,
    pub playlist_id: String,
}

impl Video {
    pub fn from_item(item: PlaylistItem, playlist: &Playlist) -> Self {
        Self {
            url: video_url(&item.video_id),
            title: item.title,
            video_id: item.video_id,
            playlist: playlist.title.clone(),
            playlist_id: playlist.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Privacy {
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }
}

/// Failures reported by the remote service.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

pub fn is_not_found(err: &Report) -> bool {
    matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound { .. }))
}

pub fn playlist_url(id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", id)
}

pub fn video_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}
