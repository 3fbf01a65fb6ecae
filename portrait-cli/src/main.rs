mod args;
mod config;
mod input;
mod types;

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use image::{DynamicImage, imageops::FilterType};
use log::{info, warn};
use portrait_core::{CompositeOutput, OnnxInferenceProvider, PortraitPipeline};
use portrait_utils::{
    ImageFormatHint, OutputOptions, configure_telemetry, init_logging, load_image, normalize_path,
    resize_filter, save_image,
};

use crate::args::{BlurMode, PortraitArgs};
use crate::config::{apply_cli_overrides, load_settings};
use crate::input::{SUPPORTED_EXTENSIONS, collect_images, is_within, working_image};
use crate::types::{FailedImage, ImageSummary, RunSummary};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = PortraitArgs::parse();

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let input_path = normalize_path(&args.input)?;
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output_dir.display()
        )
    })?;
    let output_dir = normalize_path(&args.output_dir)?;

    let images: Vec<PathBuf> = collect_images(&input_path)?
        .into_iter()
        .filter(|path| !is_within(path, &output_dir))
        .collect();
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: {})",
            input_path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    if args.mode == BlurMode::Graduated && settings.models.depth_path.is_none() {
        anyhow::bail!("graduated mode needs a depth model (--depth-model or settings file)");
    }
    let provider = OnnxInferenceProvider::from_settings(&settings)
        .context("failed to initialize inference models")?;
    let pipeline = PortraitPipeline::from_settings(Arc::new(provider), &settings)
        .context("invalid pipeline settings")?;
    let output_options = OutputOptions::from_settings(&settings.output);
    let working_width = settings.pipeline.working_width;
    let filter = resize_filter(settings.pipeline.resize_quality);

    info!(
        "Processing {} image(s) in {} mode...",
        images.len(),
        args.mode.as_str()
    );
    let mut processed = Vec::with_capacity(images.len());
    let mut failed = Vec::new();
    for image_path in images {
        match process_image(
            &pipeline,
            &image_path,
            &output_dir,
            &output_options,
            &args,
            working_width,
            filter,
        ) {
            Ok(summary) => {
                info!("{} -> {}", image_path.display(), summary.output);
                processed.push(summary);
            }
            Err(err) => {
                warn!("Failed to process {}: {err:#}", image_path.display());
                failed.push(FailedImage {
                    image: image_path.display().to_string(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    if processed.is_empty() {
        anyhow::bail!("all images failed; no composites were written");
    }

    let summary = RunSummary {
        version: portrait_core::version(),
        processed,
        failed,
    };
    if let Some(json_path) = args.json.as_ref() {
        if let Some(dir) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let file = File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &summary)
            .with_context(|| format!("failed to write summary JSON to {}", json_path.display()))?;
        info!("Wrote summary to {}", json_path.display());
    } else {
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
        println!("{json}");
    }

    Ok(())
}

fn process_image(
    pipeline: &PortraitPipeline,
    image_path: &Path,
    output_dir: &Path,
    options: &OutputOptions,
    args: &PortraitArgs,
    working_width: Option<u32>,
    filter: FilterType,
) -> Result<ImageSummary> {
    let image = working_image(
        load_image(image_path)?.to_rgba8(),
        args.mode,
        working_width,
        filter,
    );
    let result: CompositeOutput = match args.mode {
        BlurMode::Simple => pipeline.render_simple(&image)?,
        BlurMode::Graduated => pipeline.render_graduated(&image)?,
    };

    let output_path = options.output_path_for(image_path, output_dir);
    let mut summary = ImageSummary::new(
        image_path.display().to_string(),
        output_path.display().to_string(),
        args.mode.as_str(),
        &result,
    );
    if args.save_buckets {
        let bucket_path = options.auxiliary_path_for(image_path, output_dir, "_buckets");
        save_image(
            &DynamicImage::ImageRgba8(result.buckets.to_debug_image()),
            &bucket_path,
            ImageFormatHint::Png,
            options,
        )?;
        summary.bucket_map = Some(bucket_path.display().to_string());
    }

    save_image(
        &DynamicImage::ImageRgba8(result.image),
        &output_path,
        options.format,
        options,
    )?;
    Ok(summary)
}
