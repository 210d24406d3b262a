mod args;

use std::path::Path;

use args::{Command, RootArgs};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::{Level, debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::non_blocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::Targets, fmt, prelude::*};
use tube_mover::auth::{DESTINATION_TOKEN, MANAGE_SCOPE, READONLY_SCOPE, SOURCE_TOKEN};
use tube_mover::events::TracingSink;
use tube_mover::fetch::Fetcher;
use tube_mover::migrate::Migrator;
use tube_mover::store::RecordStore;
use tube_mover::youtube::YoutubeApi;

/// Splits the log file path into the appender directory and file name.
fn log_location(path: &Path) -> Result<(&Path, &str)> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("invalid log file path {:?}", path))?;
    Ok((dir, name))
}

/// Never rotates, appends to the same file across runs.
fn log_appender(path: &Path) -> Result<RollingFileAppender> {
    let (dir, name) = log_location(path)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .wrap_err_with(|| format!("failed to open log file {:?}", path))
}

fn init_logging(args: &RootArgs) -> Result<WorkerGuard> {
    // Only shows logging for current crate
    let level: Level = args.logging.clone().into();
    let filter = Targets::new().with_target("tube_mover", level);

    let (log_writer, guard) = non_blocking(log_appender(&args.log_file)?);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(log_writer))
        .with(filter)
        .init();
    debug!("Logging level: {}", level);
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = RootArgs::parse();
    let _log_guard = init_logging(&args)?;
    debug!("CMD arguments: {:?}", args);

    let store = RecordStore::open(&args.config.records_dir)?;
    debug!("records stored in {:?}", store.root());
    let events = TracingSink;

    match &args.command {
        Command::Fetch { auth, options } => {
            info!("Fetching playlists ...");
            let api = YoutubeApi::connect(auth, SOURCE_TOKEN, READONLY_SCOPE, &args.config).await?;
            Fetcher::new(&api, &store, &args.config, options.clone(), &events)
                .run()
                .await?;
        }
        Command::Migrate { auth, options } => {
            info!("Migrating playlists ...");
            let api =
                YoutubeApi::connect(auth, DESTINATION_TOKEN, MANAGE_SCOPE, &args.config).await?;
            Migrator::new(&api, &store, &args.config, options.clone(), &events)
                .run()
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_in_working_directory() {
        let (dir, name) = log_location(Path::new("youtube_migration.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "youtube_migration.log");
    }

    #[test]
    fn log_file_in_nested_directory() {
        let (dir, name) = log_location(Path::new("logs/run/migration.log")).unwrap();
        assert_eq!(dir, Path::new("logs/run"));
        assert_eq!(name, "migration.log");
    }

    #[test]
    fn log_appender_keeps_previous_runs() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("youtube_migration.log");
        std::fs::write(&path, "first run\n").unwrap();

        let mut appender = log_appender(&path).unwrap();
        appender.write_all(b"second run\n").unwrap();
        appender.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first run\nsecond run\n");
    }

    #[test]
    fn log_file_path_without_name_is_rejected() {
        assert!(log_location(Path::new("/")).is_err());
        assert!(log_location(Path::new("logs/..")).is_err());
    }
}
