use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tube_mover::ConfigArgs;
use tube_mover::auth::AuthArgs;
use tube_mover::fetch::FetchOptions;
use tube_mover::migrate::MigrateOptions;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// File receiving a copy of the console output
    #[arg(long, global = true, env = "TUBE_MOVER_LOG", default_value = "youtube_migration.log")]
    pub log_file: PathBuf,

    /// Logging level
    #[arg(short, long, global = true, value_enum, default_value = "info")]
    pub logging: LoggingLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy the playlists of the source account into the record store
    Fetch {
        #[command(flatten)]
        auth: AuthArgs,

        #[command(flatten)]
        options: FetchOptions,
    },
    /// Replay the recorded playlists and likes on the destination account
    Migrate {
        #[command(flatten)]
        auth: AuthArgs,

        #[command(flatten)]
        options: MigrateOptions,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LoggingLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LoggingLevel> for Level {
    fn from(level: LoggingLevel) -> Self {
        match level {
            LoggingLevel::Error => Level::ERROR,
            LoggingLevel::Warn => Level::WARN,
            LoggingLevel::Info => Level::INFO,
            LoggingLevel::Debug => Level::DEBUG,
            LoggingLevel::Trace => Level::TRACE,
        }
    }
}
