mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdcal", about = "CCD gain, bias and read noise calibration")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sequences a manifest lists
    Info(commands::info::InfoArgs),
    /// Fit gain, bias and read noise from a manifest's frames
    Calibrate(commands::calibrate::CalibrateArgs),
    /// Print or save the default calibration config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Calibrate(args) => commands::calibrate::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
