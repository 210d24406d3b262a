use std::time::Instant;

use clap::Args;
use color_eyre::eyre::{Result, eyre};
use tracing::{debug, info};

use crate::ConfigArgs;
use crate::events::{EventSink, SyncEvent};
use crate::store::{FailedLike, FailedVideo, RecordStore};
use crate::video_api::{Playlist, Privacy, VideoApi, is_not_found};

/// Prefix keeping YouTube Music playlists apart from same-named YouTube ones.
pub const MUSIC_PREFIX: &str = "YM__";

#[derive(Args, Debug, Clone)]
pub struct MigrateOptions {
    /// Privacy status given to created playlists
    #[arg(long, value_enum, default_value = "private")]
    pub privacy: Privacy,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            privacy: Privacy::Private,
        }
    }
}

pub fn destination_title(playlist: &Playlist) -> String {
    if playlist.is_music() {
        format!("{}{}", MUSIC_PREFIX, playlist.title)
    } else {
        playlist.title.clone()
    }
}

pub fn description(playlist: &Playlist) -> &'static str {
    if playlist.is_music() {
        "Imported from YouTube Music"
    } else {
        "Imported from YouTube"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsuredPlaylist {
    Existing(String),
    Created(String),
}

impl EnsuredPlaylist {
    pub fn id(&self) -> &str {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    AlreadyPresent,
    Inserted,
    /// The failure went to the ledger.
    Failed,
}

/// Terminal state of one playlist in a migrate pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistOutcome {
    /// The destination already had it, so its videos are not replayed.
    Skipped,
    /// Created and every video record replayed.
    Done,
    /// No video records were found locally.
    RecordsMissing,
    /// Replayed as likes instead of a playlist.
    Liked,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MigrationReport {
    pub created: usize,
    pub skipped: usize,
    pub records_missing: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub failed: usize,
    pub liked: usize,
    pub like_failed: usize,
    pub elapsed_secs: f64,
}

/// Replays recorded playlists against the destination account.
///
/// Existence checks list the destination before every mutation. This is only
/// safe with a single writer per account.
pub struct Migrator<'a> {
    api: &'a dyn VideoApi,
    store: &'a RecordStore,
    config: &'a ConfigArgs,
    options: MigrateOptions,
    events: &'a dyn EventSink,
}

impl<'a> Migrator<'a> {
    pub fn new(
        api: &'a dyn VideoApi,
        store: &'a RecordStore,
        config: &'a ConfigArgs,
        options: MigrateOptions,
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

    /// Looks the title up across every page of the destination playlists.
    pub async fn find_playlist(&self, title: &str) -> Result<Option<String>> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_playlists(page_token.as_deref(), self.config.page_size)
                .await?;
            if let Some(p) = page.items.into_iter().find(|p| p.title == title) {
                return Ok(Some(p.id));
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                debug!("playlist '{}' does not exist", title);
                return Ok(None);
            }
        }
    }

    pub async fn ensure_collection(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<EnsuredPlaylist> {
        if let Some(id) = self.find_playlist(title).await? {
            return Ok(EnsuredPlaylist::Existing(id));
        }
        let id = self.api.insert_playlist(title, description, privacy).await?;
        self.events.emit(SyncEvent::PlaylistCreated {
            title: title.to_string(),
            id: id.clone(),
        });
        Ok(EnsuredPlaylist::Created(id))
    }

    async fn contains_video(&self, playlist_id: &str, video_id: &str) -> Result<bool> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .api
                .list_playlist_items(playlist_id, page_token.as_deref(), self.config.page_size)
                .await?;
            if page.items.iter().any(|i| i.video_id == video_id) {
                return Ok(true);
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                return Ok(false);
            }
        }
    }

    async fn insert_if_absent(&self, playlist_id: &str, video_id: &str) -> Result<Membership> {
        if self.contains_video(playlist_id, video_id).await? {
            return Ok(Membership::AlreadyPresent);
        }
        self.api.insert_playlist_item(playlist_id, video_id).await?;
        Ok(Membership::Inserted)
    }

    /// Adds the video unless the playlist already holds it.
    ///
    /// Remote failures are ledgered and reported as [`Membership::Failed`];
    /// only a failing ledger write is returned as an error.
    pub async fn ensure_membership(&self, playlist_id: &str, video_id: &str) -> Result<Membership> {
        match self.insert_if_absent(playlist_id, video_id).await {
            Ok(membership) => {
                let event = match membership {
                    Membership::AlreadyPresent => SyncEvent::VideoAlreadyPresent {
                        video_id: video_id.to_string(),
                        playlist_id: playlist_id.to_string(),
                    },
                    _ => SyncEvent::VideoInserted {
                        video_id: video_id.to_string(),
                        playlist_id: playlist_id.to_string(),
                    },
                };
                self.events.emit(event);
                Ok(membership)
            }
            Err(e) => {
                let error = e.to_string();
                self.events.emit(SyncEvent::VideoFailed {
                    video_id: video_id.to_string(),
                    playlist_id: playlist_id.to_string(),
                    not_found: is_not_found(&e),
                    error: error.clone(),
                });
                self.store.append_failed_video(&FailedVideo {
                    video_id: video_id.to_string(),
                    playlist_id: playlist_id.to_string(),
                    error,
                })?;
                Ok(Membership::Failed)
            }
        }
    }

    /// Likes the video, ledgering any remote failure. Returns whether it succeeded.
    pub async fn like_item(&self, video_id: &str) -> Result<bool> {
        match self.api.like_video(video_id).await {
            Ok(()) => {
                self.events.emit(SyncEvent::VideoLiked {
                    video_id: video_id.to_string(),
                });
                Ok(true)
            }
            Err(e) => {
                let error = e.to_string();
                self.events.emit(SyncEvent::LikeFailed {
                    video_id: video_id.to_string(),
                    not_found: is_not_found(&e),
                    error: error.clone(),
                });
                self.store.append_failed_like(&FailedLike {
                    video_id: video_id.to_string(),
                    error,
                })?;
                Ok(false)
            }
        }
    }

    async fn replay_likes(
        &self,
        playlist: &Playlist,
        report: &mut MigrationReport,
    ) -> Result<PlaylistOutcome> {
        let Some(videos) = self.store.load_videos(playlist)? else {
            self.events.emit(SyncEvent::PlaylistRecordsMissing {
                title: playlist.title.clone(),
            });
            report.records_missing += 1;
            return Ok(PlaylistOutcome::RecordsMissing);
        };

        self.events.emit(SyncEvent::ProcessingLikes {
            count: videos.len(),
        });
        for video in videos.iter() {
            if self.like_item(&video.video_id).await? {
                report.liked += 1;
            } else {
                report.like_failed += 1;
            }
        }
        Ok(PlaylistOutcome::Liked)
    }

    pub async fn migrate_playlist(
        &self,
        playlist: &Playlist,
        report: &mut MigrationReport,
    ) -> Result<PlaylistOutcome> {
        if playlist.is_liked_videos() {
            return self.replay_likes(playlist, report).await;
        }

        let title = destination_title(playlist);
        let ensured = self
            .ensure_collection(&title, description(playlist), self.options.privacy)
            .await?;
        let playlist_id = match ensured {
            EnsuredPlaylist::Existing(id) => {
                self.events.emit(SyncEvent::PlaylistExists { title, id });
                report.skipped += 1;
                return Ok(PlaylistOutcome::Skipped);
            }
            EnsuredPlaylist::Created(id) => id,
        };
        report.created += 1;

        let Some(videos) = self.store.load_videos(playlist)? else {
            self.events.emit(SyncEvent::PlaylistRecordsMissing { title });
            report.records_missing += 1;
            return Ok(PlaylistOutcome::RecordsMissing);
        };
        self.events.emit(SyncEvent::RecordsLoaded {
            what: format!("videos for '{}'", title),
            count: videos.len(),
        });

        for video in videos.iter() {
            match self.ensure_membership(&playlist_id, &video.video_id).await? {
                Membership::Inserted => report.inserted += 1,
                Membership::AlreadyPresent => report.already_present += 1,
                Membership::Failed => report.failed += 1,
            }
        }
        Ok(PlaylistOutcome::Done)
    }

    pub async fn run(&self) -> Result<MigrationReport> {
        let start = Instant::now();
        let index = self.store.playlists_path();
        if !index.exists() {
            return Err(eyre!(
                "no playlist records at {:?}, run the fetch pass first",
                index
            ));
        }
        let playlists = self.store.load_playlists()?;
        self.events.emit(SyncEvent::RecordsLoaded {
            what: "playlists".to_string(),
            count: playlists.len(),
        });

        let mut report = MigrationReport::default();
        for playlist in playlists.iter() {
            let outcome = self.migrate_playlist(playlist, &mut report).await?;
            debug!("playlist '{}' finished as {:?}", playlist.title, outcome);
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            "created {} playlists, skipped {}, added {} videos ({} already present, {} failed), liked {} ({} failed)",
            report.created,
            report.skipped,
            report.inserted,
            report.already_present,
            report.failed,
            report.liked,
            report.like_failed
        );
        info!("process completed in {:.2} seconds", report.elapsed_secs);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::video_api::testing::FakeApi;
    use crate::video_api::{LIKED_VIDEOS_ID, PlaylistItem, Video};

    fn config(dir: &std::path::Path, page_size: u32) -> ConfigArgs {
        ConfigArgs {
            records_dir: dir.to_path_buf(),
            page_size,
            debug: false,
            proxy: None,
        }
    }

    /// Writes the records a fetch pass would have produced.
    fn record(store: &RecordStore, playlist: &Playlist, video_ids: &[&str]) {
        let videos: Vec<Video> = video_ids
            .iter()
            .map(|id| {
                Video::from_item(
                    PlaylistItem {
                        video_id: id.to_string(),
                        title: String::new(),
                    },
                    playlist,
                )
            })
            .collect();
        store.save_videos(playlist, &videos).unwrap();
    }

    fn music(title: &str, id: &str, count: u64) -> Playlist {
        let mut p = Playlist::new(id, title, count);
        p.platform = "music".to_string();
        p
    }

    #[test]
    fn music_playlists_are_namespaced() {
        let p = music("Music", "PL1", 0);
        assert_eq!(destination_title(&p), "YM__Music");
        assert_eq!(description(&p), "Imported from YouTube Music");
        let p = Playlist::new("PL1", "Music", 0);
        assert_eq!(destination_title(&p), "Music");
        assert_eq!(description(&p), "Imported from YouTube");
    }

    #[tokio::test]
    async fn music_playlist_is_created_and_filled() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = music("Music", "PLsrc", 3);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "b", "c"]);

        let api = FakeApi::new();
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        let created = api.playlists();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "YM__Music");
        assert_eq!(api.members(&created[0].id), vec!["a", "b", "c"]);
        assert_eq!(report.created, 1);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.failed, 0);
        assert!(store.load_failed_videos().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_playlist_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = Playlist::new("PLsrc", "Music", 2);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "b"]);

        let api = FakeApi::new().with_playlist("PLdst", "Music", &["a"]);
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(api.calls().insert_playlist, 0);
        assert_eq!(api.calls().insert_item, 0);
        assert_eq!(api.members("PLdst"), vec!["a"]);
        assert!(events.events().contains(&SyncEvent::PlaylistExists {
            title: "Music".to_string(),
            id: "PLdst".to_string(),
        }));
    }

    #[tokio::test]
    async fn not_found_video_is_ledgered_and_replay_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = Playlist::new("PLsrc", "Talks", 3);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "gone", "c"]);

        let api = FakeApi::new().with_missing_video("gone");
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        let playlists = api.playlists();
        let dst = &playlists[0];
        assert_eq!(api.members(&dst.id), vec!["a", "c"]);
        assert_eq!(api.calls().insert_item, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);

        let ledger = store.load_failed_videos().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].video_id, "gone");
        assert_eq!(ledger[0].playlist_id, dst.id);
        assert_eq!(ledger[0].error, "not found: video gone");
        assert!(events.events().iter().any(|e| matches!(
            e,
            SyncEvent::VideoFailed { not_found: true, .. }
        )));
    }

    #[tokio::test]
    async fn quota_failure_is_ledgered_and_replay_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = Playlist::new("PLsrc", "Talks", 3);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "busy", "c"]);

        let api = FakeApi::new().with_quota_exhausted_video("busy");
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        let playlists = api.playlists();
        assert_eq!(api.members(&playlists[0].id), vec!["a", "c"]);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);

        let ledger = store.load_failed_videos().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].video_id, "busy");
        assert_eq!(ledger[0].error, "quota exceeded: daily limit reached");
        assert!(events.events().contains(&SyncEvent::VideoFailed {
            video_id: "busy".to_string(),
            playlist_id: playlists[0].id.clone(),
            not_found: false,
            error: "quota exceeded: daily limit reached".to_string(),
        }));
    }

    #[tokio::test]
    async fn failed_membership_lookup_is_ledgered_and_replay_continues() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = Playlist::new("PLsrc", "Talks", 2);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "b"]);

        let api = FakeApi::new();
        api.fail_item_listings(1);
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        let playlists = api.playlists();
        assert_eq!(api.members(&playlists[0].id), vec!["b"]);
        assert_eq!(api.calls().insert_item, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.failed, 1);

        let ledger = store.load_failed_videos().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].video_id, "a");
        assert_eq!(ledger[0].playlist_id, playlists[0].id);
        assert_eq!(ledger[0].error, "request failed with status 500: backend error");
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let api = FakeApi::new();
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);

        let first = migrator
            .ensure_collection("Mix", "d", Privacy::Private)
            .await
            .unwrap();
        let second = migrator
            .ensure_collection("Mix", "d", Privacy::Private)
            .await
            .unwrap();
        assert!(matches!(first, EnsuredPlaylist::Created(_)));
        assert_eq!(second, EnsuredPlaylist::Existing(first.id().to_string()));
        assert_eq!(api.calls().insert_playlist, 1);
    }

    #[tokio::test]
    async fn ensure_membership_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let api = FakeApi::new().with_playlist("PL1", "Mix", &[]);
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);

        assert_eq!(
            migrator.ensure_membership("PL1", "v").await.unwrap(),
            Membership::Inserted
        );
        assert_eq!(
            migrator.ensure_membership("PL1", "v").await.unwrap(),
            Membership::AlreadyPresent
        );
        assert_eq!(api.members("PL1"), vec!["v"]);
        assert_eq!(api.calls().insert_item, 1);
    }

    #[tokio::test]
    async fn lookups_see_past_the_first_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 2);
        let api = FakeApi::new()
            .with_playlist("PL1", "One", &[])
            .with_playlist("PL2", "Two", &[])
            .with_playlist("PL3", "Three", &["a", "b", "c"]);
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);

        assert_eq!(
            migrator
                .ensure_collection("Three", "d", Privacy::Private)
                .await
                .unwrap(),
            EnsuredPlaylist::Existing("PL3".to_string())
        );
        assert_eq!(
            migrator.ensure_membership("PL3", "c").await.unwrap(),
            Membership::AlreadyPresent
        );
        assert_eq!(api.calls().insert_playlist, 0);
        assert_eq!(api.calls().insert_item, 0);
    }

    #[tokio::test]
    async fn liked_videos_are_replayed_as_likes() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let liked = Playlist::new(LIKED_VIDEOS_ID, "Liked Videos", 3);
        store.save_playlists(&[liked.clone()]).unwrap();
        record(&store, &liked, &["a", "gone", "c"]);

        let api = FakeApi::new().with_missing_video("gone");
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        assert_eq!(api.calls().insert_playlist, 0);
        assert_eq!(api.calls().list_playlists, 0);
        assert_eq!(api.liked(), vec!["a", "c"]);
        assert_eq!(report.liked, 2);
        assert_eq!(report.like_failed, 1);
        let ledger = store.load_failed_likes().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].video_id, "gone");
    }

    #[tokio::test]
    async fn quota_failure_of_a_like_is_ledgered() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let liked = Playlist::new(LIKED_VIDEOS_ID, "Liked Videos", 2);
        store.save_playlists(&[liked.clone()]).unwrap();
        record(&store, &liked, &["busy", "b"]);

        let api = FakeApi::new().with_quota_exhausted_video("busy");
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        assert_eq!(api.liked(), vec!["b"]);
        assert_eq!(report.liked, 1);
        assert_eq!(report.like_failed, 1);
        assert!(store.failed_likes_path().ends_with("failed_liked_videos.csv"));
        let ledger = store.load_failed_likes().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].video_id, "busy");
        assert_eq!(ledger[0].error, "quota exceeded: daily limit reached");
        assert!(store.load_failed_videos().unwrap().is_empty());
        assert!(events.events().iter().any(|e| matches!(
            e,
            SyncEvent::LikeFailed { not_found: false, .. }
        )));
    }

    #[tokio::test]
    async fn liked_videos_without_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let liked = Playlist::new(LIKED_VIDEOS_ID, "Liked Videos", 3);
        store.save_playlists(&[liked]).unwrap();

        let api = FakeApi::new();
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        let report = migrator.run().await.unwrap();

        assert_eq!(report.records_missing, 1);
        assert_eq!(api.calls(), Default::default());
        assert!(events.events().contains(&SyncEvent::PlaylistRecordsMissing {
            title: "Liked Videos".to_string(),
        }));
    }

    #[tokio::test]
    async fn rerun_skips_playlists_created_before() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let source = Playlist::new("PLsrc", "Mix", 2);
        store.save_playlists(&[source.clone()]).unwrap();
        record(&store, &source, &["a", "b"]);

        let api = FakeApi::new();
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        migrator.run().await.unwrap();
        api.reset_calls();

        let report = migrator.run().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(api.calls().insert_playlist, 0);
        assert_eq!(api.calls().insert_item, 0);
        assert_eq!(api.playlists().len(), 1);
    }

    #[tokio::test]
    async fn missing_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        let config = config(dir.path(), 50);
        let api = FakeApi::new();
        let events = RecordingSink::new();
        let migrator = Migrator::new(&api, &store, &config, MigrateOptions::default(), &events);
        assert!(migrator.run().await.is_err());
    }
}
