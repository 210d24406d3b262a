use clap::Args;
use color_eyre::eyre::Result;
use tracing::{debug, info};

use crate::ConfigArgs;
use crate::events::{EventSink, SyncEvent};
use crate::store::RecordStore;
use crate::video_api::{LIKED_VIDEOS_ID, Playlist, Video, VideoApi, WATCH_LATER_ID};

const SYSTEM_PLAYLISTS: [(&str, &str); 2] = [
    (WATCH_LATER_ID, "Watch Later"),
    (LIKED_VIDEOS_ID, "Liked Videos"),
];

#[derive(Args, Debug, Clone)]
pub struct FetchOptions {
    /// Stop listing owned playlists once this many were retrieved, 0 lists them all
    #[arg(long, default_value = "50")]
    pub playlist_limit: usize,

    /// Do not fetch the "Watch Later" and "Liked Videos" system playlists
    #[arg(long, default_value = "false")]
    pub no_system: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            playlist_limit: 50,
            no_system: false,
        }
    }
}

impl FetchOptions {
    pub fn limit(&self) -> Option<usize> {
        (self.playlist_limit > 0).then_some(self.playlist_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    Skip,
    /// The membership API has no "since" cursor, so every video is listed again.
    RefetchAll { previous: Option<u64> },
}

/// Decides whether the local copy of `current` can be trusted.
///
/// `saved` is the playlist as recorded by the previous run and `on_disk` the
/// number of video records currently stored for it.
pub fn decide(saved: Option<&Playlist>, on_disk: Option<usize>, current: &Playlist) -> FetchDecision {
    let Some(saved) = saved else {
        return FetchDecision::RefetchAll { previous: None };
    };
    let on_disk = on_disk.unwrap_or(0) as u64;
    if saved.fetched_videos == current.item_count && on_disk == current.item_count {
        FetchDecision::Skip
    } else {
        FetchDecision::RefetchAll {
            previous: Some(saved.fetched_videos),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub checked: usize,
    pub skipped: usize,
    pub refetched: usize,
    pub videos_saved: usize,
}

/// Copies the playlists of the source account into the record store.
pub struct Fetcher<'a> {
    api: &'a dyn VideoApi,
    store: &'a RecordStore,
    config: &'a ConfigArgs,
    options: FetchOptions,
    events: &'a dyn EventSink,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        api: &'a dyn VideoApi,
        store: &'a RecordStore,
        config: &'a ConfigArgs,
        options: FetchOptions,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            api,
            store,
            config,
            options,
            events,
        }
    }

    /// Lists owned playlists, then the system playlists when enabled.
    pub async fn enumerate_collections(&self) -> Result<Vec<Playlist>> {
        let limit = self.options.limit();
        let page_size = match limit {
            Some(l) => self.config.page_size.min(l as u32),
            None => self.config.page_size,
        };

        let mut playlists = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_playlists(page_token.as_deref(), page_size)
                .await?;
            playlists.extend(page.items);
            page_token = page.next_page_token;

            if let Some(limit) = limit.filter(|l| playlists.len() >= *l) {
                debug!("playlist limit of {} reached", limit);
                playlists.truncate(limit);
                break;
            }
            if page_token.is_none() {
                break;
            }
        }

        if !self.options.no_system {
            for (id, title) in SYSTEM_PLAYLISTS {
                let item_count = self.api.playlist_item_count(id).await?;
                playlists.push(Playlist::new(id, title, item_count));
            }
        }

        Ok(playlists)
    }

    pub async fn enumerate_items(&self, playlist: &Playlist) -> Result<Vec<Video>> {
        let mut videos = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_playlist_items(&playlist.id, page_token.as_deref(), self.config.page_size)
                .await?;
            videos.extend(
                page.items
                    .into_iter()
                    .map(|item| Video::from_item(item, playlist)),
            );
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        Ok(videos)
    }

    pub fn reconcile(&self, playlist: &Playlist, saved: &[Playlist]) -> Result<FetchDecision> {
        let saved = saved.iter().find(|p| p.id == playlist.id);
        let on_disk = self.store.load_videos(playlist)?.map(|v| v.len());
        Ok(decide(saved, on_disk, playlist))
    }

    pub async fn run(&self) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut playlists = self.enumerate_collections().await?;
        let saved = self.store.load_playlists()?;
        // rows of playlists no longer listed are kept
        let mut index = saved.clone();
        self.events.emit(SyncEvent::RecordsLoaded {
            what: "previously fetched playlists".to_string(),
            count: saved.len(),
        });

        for playlist in playlists.iter_mut() {
            info!("checking playlist '{}', ID: {}", playlist.title, playlist.id);
            report.checked += 1;

            // platform tags are assigned by hand in the index and survive refetches
            if let Some(previous) = saved.iter().find(|p| p.id == playlist.id) {
                playlist.platform = previous.platform.clone();
            }

            match self.reconcile(playlist, &saved)? {
                FetchDecision::Skip => {
                    playlist.fetched_videos = playlist.item_count;
                    report.skipped += 1;
                    self.events.emit(SyncEvent::PlaylistUpToDate {
                        title: playlist.title.clone(),
                    });
                }
                FetchDecision::RefetchAll { previous } => {
                    self.events.emit(SyncEvent::PlaylistRefetching {
                        title: playlist.title.clone(),
                        previous,
                        declared: playlist.item_count,
                    });
                    let videos = self.enumerate_items(playlist).await?;
                    self.store.save_videos(playlist, &videos)?;
                    if videos.is_empty() {
                        self.events.emit(SyncEvent::PlaylistEmpty {
                            title: playlist.title.clone(),
                        });
                    } else {
                        self.events.emit(SyncEvent::PlaylistSaved {
                            title: playlist.title.clone(),
                            videos: videos.len(),
                        });
                    }
                    playlist.fetched_videos = videos.len() as u64;
                    report.refetched += 1;
                    report.videos_saved += videos.len();

                    // an aborted run must not lose the playlists already rewritten
                    upsert(&mut index, playlist);
                    self.store.save_playlists(&index)?;
                }
            }
        }

        for playlist in playlists.iter() {
            upsert(&mut index, playlist);
        }
        self.store.save_playlists(&index)?;
        info!(
            "playlists and videos have been updated: {} checked, {} up-to-date, {} refetched ({} videos)",
            report.checked, report.skipped, report.refetched, report.videos_saved
        );
        Ok(report)
    }
}

fn upsert(index: &mut Vec<Playlist>, playlist: &Playlist) {
    match index.iter_mut().find(|p| p.id == playlist.id) {
        Some(row) => *row = playlist.clone(),
        None => index.push(playlist.clone()),
    }
}
