use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;
mod logging;

use commands::scan::{run_scan, ScanArgs};

/// CLI for the meteoflow sensor-data ingestion pipeline.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Scans a source tree, classifies files and runs them through the
    /// ingestion pipeline.
    Scan(ScanArgs),
    /// Lists the filetype descriptors of a configuration directory.
    Filetypes {
        /// Directory with filetype descriptor TOML files.
        #[arg(long)]
        config_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Filetypes { config_dir } => commands::filetypes::run(&config_dir),
    }
}
