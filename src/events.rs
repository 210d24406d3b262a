//! Structured progress events emitted by the fetch and migrate passes.
//!
//! Components never log directly. They report a [`SyncEvent`] to the
//! [`EventSink`] they were built with, and the sink decides how to render it.
//! The binary uses [`TracingSink`], which turns every event into a `tracing`
//! record so it reaches both the console and the log file.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Fetch side: the local copy of the playlist matches the remote count.
    PlaylistUpToDate { title: String },
    /// Fetch side: `previous` is `None` for a playlist never fetched before.
    PlaylistRefetching {
        title: String,
        previous: Option<u64>,
        declared: u64,
    },
    PlaylistSaved { title: String, videos: usize },
    PlaylistEmpty { title: String },

    RecordsLoaded { what: String, count: usize },
    /// Migrate side: the destination already had this playlist.
    PlaylistExists { title: String, id: String },
    PlaylistCreated { title: String, id: String },
    PlaylistRecordsMissing { title: String },
    VideoAlreadyPresent { video_id: String, playlist_id: String },
    VideoInserted { video_id: String, playlist_id: String },
    VideoFailed {
        video_id: String,
        playlist_id: String,
        not_found: bool,
        error: String,
    },
    ProcessingLikes { count: usize },
    VideoLiked { video_id: String },
    LikeFailed {
        video_id: String,
        not_found: bool,
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Renders events as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::PlaylistUpToDate { title } => {
                info!("'{}' is up-to-date, no need to fetch videos", title)
            }
            SyncEvent::PlaylistRefetching {
                title,
                previous: None,
                declared,
            } => info!("'{}' was never fetched, fetching {} videos", title, declared),
            SyncEvent::PlaylistRefetching {
                title,
                previous: Some(previous),
                declared,
            } => {
                if declared >= previous {
                    info!(
                        "'{}' is missing {} videos, updating...",
                        title,
                        declared - previous
                    )
                } else {
                    info!(
                        "'{}' has {} videos fewer than last fetch, updating...",
                        title,
                        previous - declared
                    )
                }
            }
            SyncEvent::PlaylistSaved { title, videos } => {
                info!("saved {} videos of '{}'", videos, title)
            }
            SyncEvent::PlaylistEmpty { title } => info!("no videos found for playlist '{}'", title),
            SyncEvent::RecordsLoaded { what, count } => info!("loaded {} {}", count, what),
            SyncEvent::PlaylistExists { title, id } => {
                info!("playlist '{}' already exists with ID {}, skipping", title, id)
            }
            SyncEvent::PlaylistCreated { title, id } => {
                info!("created playlist '{}' with ID {}", title, id)
            }
            SyncEvent::PlaylistRecordsMissing { title } => {
                warn!("video records for playlist '{}' not found", title)
            }
            SyncEvent::VideoAlreadyPresent {
                video_id,
                playlist_id,
            } => info!(
                "skipped adding video {} since it is already in playlist {}",
                video_id, playlist_id
            ),
            SyncEvent::VideoInserted {
                video_id,
                playlist_id,
            } => debug!("added video {} to playlist {}", video_id, playlist_id),
            SyncEvent::VideoFailed {
                video_id,
                not_found: true,
                ..
            } => error!("video {} not found, skipping this video", video_id),
            SyncEvent::VideoFailed {
                video_id, error, ..
            } => error!("failed to add video {}: {}", video_id, error),
            SyncEvent::ProcessingLikes { count } => {
                info!("processing 'Liked Videos', {} videos to like", count)
            }
            SyncEvent::VideoLiked { video_id } => debug!("liked video {}", video_id),
            SyncEvent::LikeFailed {
                video_id,
                not_found: true,
                ..
            } => error!("video {} not found when trying to like it", video_id),
            SyncEvent::LikeFailed {
                video_id, error, ..
            } => error!("failed to like video {}: {}", video_id, error),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
