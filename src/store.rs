//! Flat-file record store shared by the fetch and migrate passes.
//!
//! Layout under the store root:
//! - `playlists_updated.csv`: one row per playlist with its fetched count
//! - `videos_<title>__<id>.csv`: the videos of one playlist
//! - `failed_videos.csv`, `failed_liked_videos.csv`: append-only failure ledgers

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::video_api::{Playlist, Video};

const PLAYLISTS_FILE: &str = "playlists_updated.csv";
const FAILED_VIDEOS_FILE: &str = "failed_videos.csv";
const FAILED_LIKES_FILE: &str = "failed_liked_videos.csv";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FailedVideo {
    pub video_id: String,
    pub playlist_id: String,
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FailedLike {
    pub video_id: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)
            .wrap_err_with(|| format!("failed to create record dir {:?}", store.root))?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn playlists_path(&self) -> PathBuf {
        self.root.join(PLAYLISTS_FILE)
    }

    /// Video records are keyed by the source title and id of the playlist.
    pub fn videos_path(&self, playlist: &Playlist) -> PathBuf {
        let title = playlist.title.replace(['/', '\\'], "_");
        self.root
            .join(format!("videos_{}__{}.csv", title, playlist.id))
    }

    pub fn failed_videos_path(&self) -> PathBuf {
        self.root.join(FAILED_VIDEOS_FILE)
    }

    pub fn failed_likes_path(&self) -> PathBuf {
        self.root.join(FAILED_LIKES_FILE)
    }

    /// A missing index reads as no playlists.
    pub fn load_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(read_records(&self.playlists_path())?.unwrap_or_default())
    }

    pub fn save_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        write_records(&self.playlists_path(), playlists)
    }

    /// `None` when the playlist was never saved, as opposed to saved empty.
    pub fn load_videos(&self, playlist: &Playlist) -> Result<Option<Vec<Video>>> {
        read_records(&self.videos_path(playlist))
    }

    pub fn save_videos(&self, playlist: &Playlist, videos: &[Video]) -> Result<()> {
        write_records(&self.videos_path(playlist), videos)
    }

    pub fn append_failed_video(&self, record: &FailedVideo) -> Result<()> {
        append_record(&self.failed_videos_path(), record)
    }

    pub fn append_failed_like(&self, record: &FailedLike) -> Result<()> {
        append_record(&self.failed_likes_path(), record)
    }

    pub fn load_failed_videos(&self) -> Result<Vec<FailedVideo>> {
        Ok(read_records(&self.failed_videos_path())?.unwrap_or_default())
    }

    pub fn load_failed_likes(&self) -> Result<Vec<FailedLike>> {
        Ok(read_records(&self.failed_likes_path())?.unwrap_or_default())
    }
}

fn read_records<T>(path: &Path) -> Result<Option<Vec<T>>>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(None);
    }
    let mut reader =
        csv::Reader::from_path(path).wrap_err_with(|| format!("failed to open {:?}", path))?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .wrap_err_with(|| format!("malformed records in {:?}", path))?;
    debug!("read {} records from {:?}", records.len(), path);
    Ok(Some(records))
}

fn write_records<T: Serialize + Columns>(path: &Path, records: &[T]) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("failed to create {:?}", path))?;
    // serde only emits a header alongside the first record
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(T::COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    debug!("wrote {} records to {:?}", records.len(), path);
    Ok(())
}

fn append_record<T: Serialize + Columns>(path: &Path, record: &T) -> Result<()> {
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("failed to open {:?}", path))?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if is_new {
        writer.write_record(T::COLUMNS)?;
    }
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}

trait Columns {
    const COLUMNS: &'static [&'static str];
}

impl Columns for Playlist {
    const COLUMNS: &'static [&'static str] =
        &["title", "id", "url", "item_count", "fetched_videos", "platform"];
}

impl Columns for Video {
    const COLUMNS: &'static [&'static str] = &["title", "video_id", "url", "playlist", "playlist_id"];
}

impl Columns for FailedVideo {
    const COLUMNS: &'static [&'static str] = &["video_id", "playlist_id", "error"];
}

impl Columns for FailedLike {
    const COLUMNS: &'static [&'static str] = &["video_id", "error"];
}
