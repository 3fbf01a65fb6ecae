//! Common helpers shared across the portrait crates.

/// Application configuration and settings management.
pub mod config;
/// Image loading, resizing, letterboxing and tensor conversion.
pub mod image_utils;
/// Image output helpers (encoding, naming).
pub mod output;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use config::{AppSettings, LayerStrategy, ResizeQuality, TensorLayout};
pub use image_utils::{
    ChannelNormalization, Letterbox, downscale_to_width, into_contiguous_vec, letterbox_image,
    letterbox_region, load_image, resize_filter, resize_image, rgb_to_normalized_chw,
    rgb_to_normalized_hwc,
};
pub use output::{ImageFormatHint, OutputOptions, PngCompression, save_image};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};

/// Initialize logging once for CLI environments.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Telemetry output is always
/// admitted at trace level so [`telemetry::configure`] alone decides what gets printed.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
