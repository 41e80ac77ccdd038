use std::{net::SocketAddr, path::PathBuf};

#[derive(clap::Parser)]
#[command(rename_all = "snake_case", version, about)]
pub struct Arguments {
    #[arg(long = "config.file", env = "VESSEL_DIST_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Overrides `server.listen` from the config file.
    #[arg(long = "listen", env = "VESSEL_DIST_LISTEN")]
    pub listen: Option<SocketAddr>,
}
