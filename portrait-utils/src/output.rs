//! Encoding and naming of composited images written by the front ends.

use crate::config::OutputSettings;

use anyhow::{Context, Result};
use image::{
    DynamicImage, ExtendedColorType, ImageEncoder,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
        webp::WebPEncoder,
    },
};
use log::{debug, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Output formats supported by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormatHint {
    Png,
    #[default]
    Jpeg,
    Webp,
}

impl ImageFormatHint {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

impl std::str::FromStr for ImageFormatHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}

/// Simplified PNG compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

impl PngCompression {
    /// Parse a strategy name or a numeric 0-9 level.
    pub fn parse(input: &str) -> Self {
        let normalized = input.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "fast" => Self::Fast,
            "best" => Self::Best,
            "default" => Self::Default,
            _ => match normalized.parse::<u8>() {
                Ok(0..=3) => Self::Fast,
                Ok(7..=9) => Self::Best,
                Ok(_) => Self::Default,
                Err(_) => {
                    warn!("Unknown PNG compression '{input}', falling back to default strategy");
                    Self::Default
                }
            },
        }
    }

    fn into_image(self) -> CompressionType {
        match self {
            Self::Fast => CompressionType::Fast,
            Self::Default => CompressionType::Default,
            Self::Best => CompressionType::Best,
        }
    }
}

/// Resolved encoder configuration.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: ImageFormatHint,
    pub jpeg_quality: u8,
    pub png_compression: PngCompression,
    pub suffix: String,
}

impl OutputOptions {
    pub fn from_settings(settings: &OutputSettings) -> Self {
        let format = settings.format.parse().unwrap_or_else(|err| {
            warn!("{err}; writing JPEG instead");
            ImageFormatHint::Jpeg
        });
        Self {
            format,
            jpeg_quality: settings.jpeg_quality.clamp(1, 100),
            png_compression: PngCompression::parse(&settings.png_compression),
            suffix: settings.suffix.clone(),
        }
    }

    /// Destination for the composite of `source` inside `output_dir`.
    pub fn output_path_for(&self, source: &Path, output_dir: &Path) -> PathBuf {
        self.output_path_with(source, output_dir, &self.suffix, self.format)
    }

    /// Destination for an auxiliary image (e.g. a bucket visualization), always PNG.
    pub fn auxiliary_path_for(&self, source: &Path, output_dir: &Path, tag: &str) -> PathBuf {
        self.output_path_with(source, output_dir, tag, ImageFormatHint::Png)
    }

    fn output_path_with(
        &self,
        source: &Path,
        output_dir: &Path,
        suffix: &str,
        format: ImageFormatHint,
    ) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "image".to_string());
        let mut path = output_dir.join(format!("{stem}{suffix}"));
        path.set_extension(format.extension());
        path
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::from_settings(&OutputSettings::default())
    }
}

/// Encode `image` with `format` and write it to `destination`, creating parent directories.
pub fn save_image(
    image: &DynamicImage,
    destination: &Path,
    format: ImageFormatHint,
    options: &OutputOptions,
) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    debug!("Saving {} as {:?}", destination.display(), format);
    let encoded = match format {
        ImageFormatHint::Png => encode_png(image, options.png_compression)?,
        ImageFormatHint::Jpeg => encode_jpeg(image, options.jpeg_quality)?,
        ImageFormatHint::Webp => encode_webp(image)?,
    };
    fs::write(destination, encoded)
        .with_context(|| format!("failed to write {}", destination.display()))
}

fn encode_png(image: &DynamicImage, compression: PngCompression) -> Result<Vec<u8>> {
    let rgba = image.to_rgba8();
    let mut buffer = Vec::new();
    PngEncoder::new_with_quality(&mut buffer, compression.into_image(), FilterType::Adaptive)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
        .context("failed to encode PNG")?;
    Ok(buffer)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .context("failed to encode JPEG")?;
    Ok(buffer)
}

fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>> {
    let rgba = image.to_rgba8();
    let mut buffer = Vec::new();
    WebPEncoder::new_lossless(&mut buffer)
        .write_image(
            rgba.as_raw(),
            rgba.width(),
            rgba.height(),
            ExtendedColorType::Rgba8,
        )
        .context("failed to encode WebP")?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};
    use tempfile::tempdir;

    #[test]
    fn output_paths_use_suffix_and_format() {
        let options = OutputOptions::default();
        let path = options.output_path_for(Path::new("/photos/cat.PNG"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/cat_portrait.jpg"));

        let aux = options.auxiliary_path_for(Path::new("cat.png"), Path::new("/out"), "_buckets");
        assert_eq!(aux, PathBuf::from("/out/cat_buckets.png"));
    }

    #[test]
    fn unknown_format_falls_back_to_jpeg() {
        let settings = OutputSettings {
            format: "tiff".into(),
            ..OutputSettings::default()
        };
        assert_eq!(
            OutputOptions::from_settings(&settings).format,
            ImageFormatHint::Jpeg
        );
    }

    #[test]
    fn png_compression_levels() {
        assert_eq!(PngCompression::parse("2"), PngCompression::Fast);
        assert_eq!(PngCompression::parse("9"), PngCompression::Best);
        assert_eq!(PngCompression::parse("5"), PngCompression::Default);
        assert_eq!(PngCompression::parse("BEST"), PngCompression::Best);
    }

    #[test]
    fn save_image_writes_decodable_png() {
        let dir = tempdir().expect("tempdir");
        let dest = dir.path().join("nested/out.png");
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            3,
            2,
            image::Rgba([1, 2, 3, 255]),
        ));
        save_image(
            &image,
            &dest,
            ImageFormatHint::Png,
            &OutputOptions::default(),
        )
        .expect("save png");

        let decoded = image::open(&dest).expect("decode");
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.to_rgba8().get_pixel(2, 1).0, [1, 2, 3, 255]);
    }
}
