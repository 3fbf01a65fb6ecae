//! Command-line argument definitions for portrait-cli.

use clap::{ArgAction, Parser, ValueEnum};
use portrait_utils::{LayerStrategy, ResizeQuality};
use std::path::PathBuf;

/// Blur the background of portraits, either uniformly or graded by estimated depth.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct PortraitArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving the composites.
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Composite to produce.
    #[arg(long, value_enum, default_value_t = BlurMode::Graduated)]
    pub mode: BlurMode,

    /// Segmentation ONNX model (defaults to settings file).
    #[arg(long, value_name = "PATH")]
    pub segmentation_model: Option<PathBuf>,

    /// Depth ONNX model, required by the graduated mode (defaults to settings file).
    #[arg(long, value_name = "PATH")]
    pub depth_model: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/portrait_settings.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated, strictly increasing blur radii for the graduated buckets.
    #[arg(long, value_delimiter = ',', value_name = "R1,R2,...")]
    pub radii: Option<Vec<u32>>,

    /// Blur radius of the simple mode.
    #[arg(long)]
    pub simple_radius: Option<u32>,

    /// Gaussian sigma per unit of blur radius.
    #[arg(long)]
    pub sigma_per_radius: Option<f32>,

    /// Multiplier applied to background-relative depth before bucketing.
    #[arg(long)]
    pub depth_scale: Option<f32>,

    /// Downsize wider inputs to this width before the graduated composite.
    #[arg(
        long,
        conflicts_with = "full_resolution",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub working_width: Option<u32>,

    /// Process graduated composites at the source resolution.
    #[arg(long, action = ArgAction::SetTrue)]
    pub full_resolution: bool,

    /// Blur layer rendering (eager or on-demand).
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<LayerStrategy>,

    /// Resize filter preference (quality or speed).
    #[arg(long)]
    pub resize_quality: Option<ResizeQuality>,

    /// Output image format (png, jpeg, webp).
    #[arg(long)]
    pub format: Option<String>,

    /// JPEG quality (1-100).
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Suffix appended to output file stems.
    #[arg(long)]
    pub suffix: Option<String>,

    /// Also write a color-coded bucket map next to each composite.
    #[arg(long, action = ArgAction::SetTrue)]
    pub save_buckets: bool,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Write the run summary to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BlurMode {
    /// One blur radius over the whole background.
    Simple,
    /// Blur intensity follows depth relative to the background.
    Graduated,
}

impl BlurMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BlurMode::Simple => "simple",
            BlurMode::Graduated => "graduated",
        }
    }
}
