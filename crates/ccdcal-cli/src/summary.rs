use ccdcal_core::io::manifest::Manifest;
use ccdcal_core::pipeline::config::CalibrationConfig;
use ccdcal_core::ptc::Regime;
use ccdcal_core::result::CalibrationSummary;
use console::Style;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_config_summary(manifest: &Manifest, config: &CalibrationConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("CCD Calibration"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(15)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Camera"),
        s.value.apply_to(&manifest.camera)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Sequences"),
        s.value.apply_to(manifest.sequences.len())
    );
    for seq in &manifest.sequences {
        println!("  {:<14}{}", "", s.path.apply_to(seq.path.display()));
    }
    if manifest.crop_active {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Pixels"),
            s.method.apply_to("active area only")
        );
    } else {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Pixels"),
            s.disabled.apply_to("full frame")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Noise Estimation"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Grouping"),
        s.method.apply_to(config.grouping)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Reduction"),
        s.method.apply_to(config.reduction)
    );
    println!();

    println!("  {}", s.header.apply_to("Transfer Curve"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Fit"),
        s.method.apply_to(config.ptc.method)
    );
    println!(
        "    {:<12}{} counts",
        s.label.apply_to("Saturation"),
        s.value.apply_to(format!("{:.0}", config.ptc.saturation_threshold()))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tolerance"),
        s.value.apply_to(format!("{:.1e}", config.ptc.max_relative_rss))
    );
    println!();
}

pub fn print_calibration_summary(summary: &CalibrationSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{} e-/count",
        s.label.apply_to("Gain"),
        s.value.apply_to(format!("{:.4}", summary.gain))
    );
    println!(
        "    {:<12}{} e-",
        s.label.apply_to("Read noise"),
        s.value.apply_to(format!("{:.3}", summary.read_noise))
    );
    println!(
        "    {:<12}{} counts ({} frames)",
        s.label.apply_to("Bias"),
        s.value.apply_to(format!("{:.2}", summary.bias_mean)),
        summary.bias_frames
    );
    println!(
        "    {:<12}{} counts, {} e-",
        s.label.apply_to("Bias noise"),
        s.value.apply_to(format!("{:.3}", summary.bias_read_noise_counts)),
        s.value.apply_to(format!("{:.3}", summary.bias_read_noise_electrons))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Rel. RSS"),
        s.value.apply_to(format!("{:.3e}", summary.relative_rss))
    );
    println!();

    println!("  {}", s.header.apply_to("Transfer Curve Points"));
    println!(
        "    {:>10} {:>6} {:>12} {:>12} {:>12}  {}",
        s.label.apply_to("exposure"),
        s.label.apply_to("frames"),
        s.label.apply_to("mean"),
        s.label.apply_to("variance"),
        s.label.apply_to("residual"),
        s.label.apply_to("regime")
    );
    for level in &summary.levels {
        let regime = match level.regime {
            Regime::Linear => s.method.apply_to(level.regime),
            _ => s.disabled.apply_to(level.regime),
        };
        println!(
            "    {:>10.3} {:>6} {:>12.2} {:>12.2} {:>12.3}  {}",
            level.exposure_time, level.frames, level.mean, level.variance, level.residual, regime
        );
    }
    println!();
}
