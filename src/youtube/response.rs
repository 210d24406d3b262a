use color_eyre::eyre::{Error, OptionExt, Result};
use tracing::warn;

use super::model::{
    YoutubeErrorResponse, YoutubeListResponse, YoutubePlaylistItemResponse,
    YoutubePlaylistResponse,
};
use crate::video_api::{ApiError, Page, Playlist, PlaylistItem};

const QUOTA_REASONS: [&str; 3] = ["quotaExceeded", "rateLimitExceeded", "dailyLimitExceeded"];

// multiples

impl TryInto<Page<Playlist>> for YoutubeListResponse<YoutubePlaylistResponse> {
    type Error = Error;

    fn try_into(self) -> Result<Page<Playlist>, Self::Error> {
        let mut items = vec![];
        for item in self.items {
            let playlist: Playlist = item.try_into()?;
            items.push(playlist);
        }
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

impl TryInto<Page<PlaylistItem>> for YoutubeListResponse<YoutubePlaylistItemResponse> {
    type Error = Error;

    fn try_into(self) -> Result<Page<PlaylistItem>, Self::Error> {
        let mut items = vec![];
        for item in self.items {
            let entry_id = item.id.clone();
            let parsed: Result<PlaylistItem> = item.try_into();
            match parsed {
                Ok(i) => items.push(i),
                Err(e) => {
                    warn!("failed to parse playlist item {}, skipping it: {}", entry_id, e);
                }
            }
        }
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

// singles

impl TryInto<Playlist> for YoutubePlaylistResponse {
    type Error = Error;

    fn try_into(self) -> Result<Playlist, Self::Error> {
        let item_count = self.content_details.map_or(0, |c| c.item_count);
        Ok(Playlist::new(&self.id, &self.snippet.title, item_count))
    }
}

impl TryInto<PlaylistItem> for YoutubePlaylistItemResponse {
    type Error = Error;

    fn try_into(self) -> Result<PlaylistItem, Self::Error> {
        let snippet = self.snippet.ok_or_eyre("missing snippet")?;
        let video_id = snippet
            .resource_id
            .video_id
            .ok_or_eyre("resource is not a video")?;
        Ok(PlaylistItem {
            video_id,
            title: snippet.title,
        })
    }
}

/// Maps a failed response to the error kinds callers act upon.
pub fn api_error(status: u16, body: &str) -> ApiError {
    let parsed: Option<YoutubeErrorResponse> = serde_json::from_str(body).ok();
    let (message, reasons): (String, Vec<String>) = match parsed {
        Some(res) => (
            res.error.message,
            res.error.errors.into_iter().map(|e| e.reason).collect(),
        ),
        None => (body.trim().to_string(), vec![]),
    };

    if status == 404 {
        ApiError::NotFound { message }
    } else if status == 403 && reasons.iter().any(|r| QUOTA_REASONS.contains(&r.as_str())) {
        ApiError::QuotaExceeded { message }
    } else {
        ApiError::Status { status, message }
    }
}
