//! Command line options for the tfs-mover tool
use crate::{
    config::MoverConfig,
    errors::{MoverError, MoverErrorKind},
    migrate::{main_migrate, MigrationRecord},
};
use clap::Parser;
use log::{debug, LevelFilter};
use std::{
    fs::write,
    path::{Path, PathBuf},
};

/// tfs-mover - Mirror every repository of a TFS server to Bitbucket
#[derive(Parser, Default, Clone, Debug)]
#[command(version)]
pub struct MoverCli {
    /// Custom configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show the default config path
    #[arg(long)]
    pub show_config_path: bool,

    /// Directory receiving the local mirrors (default: tfs)
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Only migrate the repository with this name (repeatable)
    #[arg(short, long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Reuse a destination repository that already exists instead of failing
    #[arg(short, long)]
    pub resolve_existing: bool,

    /// Write the outcome of every repository to this JSON file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Verbose mode (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl MoverCli {
    /// Log level matching the verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Warn;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Write the records as pretty JSON
/// # Errors
/// Error if the records can't be serialized or the file can't be written
pub fn write_report(path: &Path, records: &[MigrationRecord]) -> Result<(), MoverError> {
    let json = serde_json::to_string_pretty(records)?;
    write(path, json).map_err(MoverError::wrap(MoverErrorKind::Report))
}

/// Run the tfs-mover tool with the provided command line options
/// # Errors
/// Error if the configuration can't be loaded, the listing fails or the report can't be written
pub async fn tfs_mover_main() -> Result<Vec<MigrationRecord>, MoverError> {
    let args = MoverCli::parse();
    env_logger::builder()
        .filter_level(args.log_level())
        .format_target(false)
        .format_timestamp(None)
        .init();
    if let Err(e) = dotenv::dotenv() {
        debug!("No .env file loaded: {e}");
    }
    if args.show_config_path {
        println!("{}", MoverConfig::get_config_path()?.display());
        return Ok(vec![]);
    }
    let config = MoverConfig::try_new(args)?;
    if let Some(path) = &config.config_path {
        debug!("Using config file {}", path.display());
    }
    let records = main_migrate(&config).await?;
    if let Some(path) = &config.cli_args.report {
        write_report(path, &records)?;
        debug!("Report written to {}", path.display());
    }
    Ok(records)
}
