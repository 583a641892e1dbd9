use clap::Parser;
use geowalk_core::{ErrorPolicy, LanguageCode, MapScheme};
use std::path::PathBuf;

/// Walk a route of coordinates and reverse geocode them one at a time
#[derive(Parser, Debug)]
#[command(name = "geowalk")]
#[command(author = "Albert Hui")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sequential reverse geocoding over a fixed route", long_about = None)]
pub struct Args {
    /// JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Text file with one "latitude, longitude" pair per line
    #[arg(long = "coordinates", value_name = "FILE")]
    pub coordinates: Option<PathBuf>,

    /// Result language, e.g. en-GB or de-CH
    #[arg(short = 'l', long = "language")]
    pub language: Option<LanguageCode>,

    /// Maximum number of places requested per lookup
    #[arg(long = "max-items")]
    pub max_items: Option<usize>,

    /// What to do when a lookup fails: halt, skip or continue
    #[arg(long = "on-error")]
    pub on_error: Option<ErrorPolicy>,

    /// Map scheme to load, e.g. normal.day
    #[arg(long = "scheme")]
    pub scheme: Option<MapScheme>,

    /// Resolve coordinates locally instead of querying a server
    #[arg(long = "offline")]
    pub offline: bool,

    /// Grant permissions without prompting
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// Press the trigger N times and exit instead of reading stdin
    #[arg(short = 't', long = "triggers", value_name = "N")]
    pub triggers: Option<u32>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Parses command-line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
