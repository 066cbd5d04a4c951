use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdcal_core::io::manifest::Manifest;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// Calibration manifest (TOML)
    pub manifest: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let sequences = manifest.describe()?;

    println!("Camera:      {}", manifest.camera);
    println!("ADC bits:    {}", manifest.model.adc_bits);
    println!(
        "Taps:        {}x{} ({} blank, {} overscan columns)",
        manifest.model.sensor.taps_x,
        manifest.model.sensor.taps_y,
        manifest.model.sensor.blank_columns,
        manifest.model.sensor.overscan_columns
    );
    println!("Crop active: {}", manifest.crop_active);
    println!("Sequences:   {}", sequences.len());
    println!();

    let mut total = 0;
    for seq in &sequences {
        total += seq.frames;
        println!(
            "  {:>9.3} s  {:>4} x {}x{}  {}",
            seq.exposure_time,
            seq.frames,
            seq.width,
            seq.height,
            seq.path.display()
        );
        if let Some(ref instrument) = seq.instrument {
            println!("             instrument {instrument}");
        }
        if let Some(ref hk) = seq.housekeeping {
            let [t1, t2, t3, t4] = hk.temperature_adc_c;
            println!(
                "             exposure {:.3} s, FPGA {:.2} V {:.1} C",
                hk.exposure_s, hk.voltage_fpga_vccint, hk.temperature_fpga_c
            );
            println!("             ADC {t1:.1} {t2:.1} {t3:.1} {t4:.1} C");
        }
    }
    println!();
    println!("Total frames: {total}");

    Ok(())
}
