use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

/// Census mesh CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "censogeo", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch an IBGE census mesh into the local cache
    Download(DownloadArgs),

    /// Compute overlap similarity between two meshes
    Similarity(SimilarityArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Census year: 2010 or 2022
    #[arg(long)]
    pub censo: u16,

    /// Mesh level: distritos or setores
    #[arg(long)]
    pub nivel: String,

    /// Two-letter state code, e.g. SP, RJ
    #[arg(long, default_value = "SP")]
    pub uf: String,

    /// Cache directory for mesh archives
    #[arg(long, default_value = "data/cache", value_hint = ValueHint::DirPath)]
    pub cache_dir: PathBuf,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
pub enum OutputFormat { Csv, Geojson }

#[derive(Args, Debug)]
pub struct SimilarityArgs {
    /// Reference mesh (.zip archive, .shp or .json/.geojson)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub reference: PathBuf,

    /// Comparison mesh (.zip archive, .shp or .json/.geojson)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub comparison: PathBuf,

    /// Key column in the reference mesh
    #[arg(long)]
    pub left_key: Option<String>,

    /// Key column in the comparison mesh
    #[arg(long)]
    pub right_key: Option<String>,

    /// intersection, difference or overlay
    #[arg(long, default_value = "intersection")]
    pub method: String,

    /// Minimum significant intersection area for the overlay method
    #[arg(long, default_value_t = 10.0)]
    pub min_intersection_radius: f64,

    /// Keep pairs without positive overlap
    #[arg(long)]
    pub keep_all: bool,

    /// COL=VALUE equality filter, applied to whichever mesh has the column (repeatable)
    #[arg(long = "query")]
    pub queries: Vec<String>,

    /// Output file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,
}
