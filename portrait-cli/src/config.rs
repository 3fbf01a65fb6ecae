//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use portrait_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};

use crate::args::{BlurMode, PortraitArgs};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments to override loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &PortraitArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }

    if let Some(path) = args.segmentation_model.as_ref() {
        settings.models.segmentation_path = Some(path.display().to_string());
    }
    if let Some(path) = args.depth_model.as_ref() {
        settings.models.depth_path = Some(path.display().to_string());
    }
    if args.mode == BlurMode::Simple {
        // The simple composite never consults depth; skip loading that network.
        settings.models.depth_path = None;
    }

    if let Some(radii) = args.radii.as_ref() {
        settings.blur.graduated_radii = radii.clone();
        settings.pipeline.bucket_levels = u8::try_from(radii.len() + 1).unwrap_or(u8::MAX);
    }
    if let Some(radius) = args.simple_radius {
        settings.blur.simple_radius = radius;
    }
    if let Some(sigma) = args.sigma_per_radius {
        settings.blur.sigma_per_radius = sigma;
    }
    if let Some(strategy) = args.strategy {
        settings.blur.strategy = strategy;
    }
    if let Some(scale) = args.depth_scale {
        settings.depth.scale = scale;
    }

    if args.full_resolution {
        settings.pipeline.working_width = None;
    } else if let Some(width) = args.working_width {
        settings.pipeline.working_width = Some(width);
    }
    if let Some(quality) = args.resize_quality {
        settings.pipeline.resize_quality = quality;
    }

    if let Some(format) = args.format.as_ref() {
        settings.output.format = format.to_ascii_lowercase();
    }
    if let Some(quality) = args.jpeg_quality {
        settings.output.jpeg_quality = quality;
    }
    if let Some(suffix) = args.suffix.as_ref() {
        settings.output.suffix = suffix.clone();
    }
}
