use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdcal_core::group::GroupingMode;
use ccdcal_core::io::image_io::save_map;
use ccdcal_core::io::manifest::Manifest;
use ccdcal_core::noise::Reduction;
use ccdcal_core::pipeline::config::CalibrationConfig;
use ccdcal_core::pipeline::{run_calibration_reported, PipelineStage, ProgressReporter};
use ccdcal_core::ptc::FitMethod;
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::summary::{print_calibration_summary, print_config_summary};

#[derive(Clone, ValueEnum)]
pub enum GroupingArg {
    Pairwise,
    Ladder,
}

#[derive(Clone, ValueEnum)]
pub enum ReductionArg {
    Global,
    PerPixel,
}

#[derive(Clone, ValueEnum)]
pub enum FitArg {
    Ordinary,
    Weighted,
}

#[derive(Args)]
pub struct CalibrateArgs {
    /// Calibration manifest (TOML)
    pub manifest: PathBuf,

    /// Calibration config file (TOML); flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How frames are grouped into transfer curve points
    #[arg(long, value_enum)]
    pub grouping: Option<GroupingArg>,

    /// Whether statistics are reduced over the frame or kept per pixel
    #[arg(long, value_enum)]
    pub reduction: Option<ReductionArg>,

    /// Transfer curve regression
    #[arg(long, value_enum)]
    pub fit: Option<FitArg>,

    /// Fraction of full scale above which points count as saturated
    #[arg(long)]
    pub saturation_fraction: Option<f64>,

    /// Largest accepted relative residual of the fit
    #[arg(long)]
    pub max_relative_rss: Option<f64>,

    /// Drop blank and overscan columns even if the manifest does not ask to
    #[arg(long)]
    pub crop_active: bool,

    /// Write the calibration summary to this TOML file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the bias offset map to this image (TIFF, or PNG preview)
    #[arg(long)]
    pub bias_map: Option<PathBuf>,
}

/// Drives an indicatif bar from pipeline stage events.
struct BarReporter {
    pb: ProgressBar,
}

impl BarReporter {
    fn new() -> Result<Self> {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg:24} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { pb })
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.pb.set_message(stage.to_string());
        self.pb.set_length(total_items.unwrap_or(1) as u64);
        self.pb.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.pb.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.pb.length() {
            self.pb.set_position(len);
        }
    }
}

pub fn run(args: &CalibrateArgs) -> Result<()> {
    let mut manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    if args.crop_active {
        manifest.crop_active = true;
    }

    let config = match args.config {
        Some(ref config_path) => {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            CalibrationConfig::from_toml_for_camera(&contents, &manifest.model)
                .context("Invalid calibration config")?
        }
        None => CalibrationConfig::for_camera(&manifest.model),
    };
    let config = apply_overrides(config, args);

    print_config_summary(&manifest, &config);

    let frames = manifest.load_frames().context("Failed to load frames")?;
    info!(frames = frames.len(), "Frames loaded");

    let reporter = BarReporter::new()?;
    let result = run_calibration_reported(&frames, &config, &reporter)?;
    reporter.pb.finish_with_message("Done");

    let summary = result.summary();
    print_calibration_summary(&summary);

    if let Some(ref path) = args.report {
        let toml_str = toml::to_string_pretty(&summary)?;
        std::fs::write(path, toml_str)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }

    if let Some(ref path) = args.bias_map {
        save_map(result.bias_map().offset.view(), path)
            .with_context(|| format!("Failed to write bias map to {}", path.display()))?;
        println!("Bias map saved to {}", path.display());
    }

    Ok(())
}

fn apply_overrides(mut config: CalibrationConfig, args: &CalibrateArgs) -> CalibrationConfig {
    if let Some(ref grouping) = args.grouping {
        config.grouping = match grouping {
            GroupingArg::Pairwise => GroupingMode::Pairwise,
            GroupingArg::Ladder => GroupingMode::Ladder,
        };
    }
    if let Some(ref reduction) = args.reduction {
        config.reduction = match reduction {
            ReductionArg::Global => Reduction::Global,
            ReductionArg::PerPixel => Reduction::PerPixel,
        };
    }
    if let Some(ref fit) = args.fit {
        config.ptc.method = match fit {
            FitArg::Ordinary => FitMethod::Ordinary,
            FitArg::Weighted => FitMethod::Weighted,
        };
    }
    if let Some(fraction) = args.saturation_fraction {
        config.ptc.saturation_fraction = fraction;
    }
    if let Some(tolerance) = args.max_relative_rss {
        config.ptc.max_relative_rss = tolerance;
    }
    config
}
