//! CLI argument definitions using clap
//!
//! Commands:
//! - parcelqc run --root <dir> [--config <path>] [options]
//! - parcelqc list
//! - parcelqc decode-ward <file names>

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::DuplicateKeyPolicy;

/// parcelqc - quality checks for cadastral parcel databases
#[derive(Parser, Debug)]
#[command(name = "parcelqc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Debug logging (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit log records as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run validators over every database under a folder
    Run(RunArgs),

    /// List the available validators
    List,

    /// Show the ward and zone decoded from database file names
    DecodeWard {
        /// File names such as Kathmandu_Ward_9_ka.mdb
        #[arg(required = true)]
        names: Vec<String>,
    },
}

/// Options for `run`; each one overrides the config file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Folder to scan for databases
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Map scale denominator (500, 600, 1200, 1250, 2400, 2500, 4800)
    #[arg(long)]
    pub scale: Option<u32>,

    /// Central meridian selecting the grid-sheet template (81, 84, 87)
    #[arg(long)]
    pub meridian: Option<u32>,

    /// Folder holding Gridsheet_<meridian>.shp templates
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Explicit grid-sheet template
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Topology cluster tolerance
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Keep topology staging datasets after the run
    #[arg(long)]
    pub keep_topology: bool,

    /// Fields used to detect duplicate parcels
    #[arg(long, value_enum)]
    pub duplicate_key: Option<DuplicateKeyArg>,

    /// Path fragment to skip (repeatable; replaces the default list)
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Validator ids to run (comma separated; default all)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DuplicateKeyArg {
    /// PARCELNO only
    ParcelNo,
    /// WARDNO, GRIDS1 and PARCELNO
    Composite,
}

impl From<DuplicateKeyArg> for DuplicateKeyPolicy {
    fn from(arg: DuplicateKeyArg) -> Self {
        match arg {
            DuplicateKeyArg::ParcelNo => DuplicateKeyPolicy::ParcelNo,
            DuplicateKeyArg::Composite => DuplicateKeyPolicy::Composite,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "parcelqc",
            "--verbose",
            "run",
            "--root",
            "/data",
            "--scale",
            "1200",
            "--only",
            "small-areas,invalid-sheet",
            "--duplicate-key",
            "parcel-no",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.root, Some(PathBuf::from("/data")));
        assert_eq!(args.scale, Some(1200));
        assert_eq!(args.only, vec!["small-areas", "invalid-sheet"]);
        assert_eq!(args.duplicate_key, Some(DuplicateKeyArg::ParcelNo));
    }

    #[test]
    fn test_decode_ward_requires_names() {
        assert!(Cli::try_parse_from(["parcelqc", "decode-ward"]).is_err());
        let cli = Cli::try_parse_from(["parcelqc", "decode-ward", "a_1.mdb", "b_2.mdb"]).unwrap();
        assert!(matches!(cli.command, Command::DecodeWard { names } if names.len() == 2));
    }
}
