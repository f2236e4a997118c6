use std::path::PathBuf;

use clap::Parser;

/// Terminal globe for SAR imagery search and terrain measurements
#[derive(Debug, Parser)]
#[command(name = "sar-map", version, about)]
pub struct Cli {
    /// TOML settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON image catalog; the built-in demo records are used otherwise
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Directory holding Natural Earth GeoJSON files
    #[arg(long, value_name = "DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Write logs to this file (the terminal is taken by the UI)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Start in imperial units
    #[arg(long)]
    pub imperial: bool,
}
