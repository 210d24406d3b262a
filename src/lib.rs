pub mod auth;
pub mod events;
pub mod fetch;
pub mod migrate;
pub mod store;
pub mod video_api;
pub mod youtube;

use std::path::PathBuf;

use clap::Args;

// TODO: move the clap derive behind a feature once the library has another consumer,
// it only exists to share this configuration structure with the bin
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding the playlist index, video records and failure ledgers
    #[arg(long, global = true, env = "TUBE_MOVER_RECORDS", default_value = "./csvs")]
    pub records_dir: PathBuf,

    /// Number of results requested per page (the API caps it at 50)
    #[arg(long, global = true, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=50))]
    pub page_size: u32,

    /// Enable debug mode to dump the last raw API response in a `debug` folder
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Proxy to use for all requests in the format http://<ip>:<port>
    #[arg(long, global = true)]
    pub proxy: Option<String>,
}
