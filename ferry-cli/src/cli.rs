//! Command line interface definition

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ferryd",
    about = "Data placement scheduling daemon",
    version
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the request server listen address
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Override the log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check_config: bool,
}
