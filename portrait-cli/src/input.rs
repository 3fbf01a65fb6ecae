//! Input collection and preparation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{RgbaImage, imageops::FilterType};
use log::debug;
use portrait_utils::downscale_to_width;
use walkdir::WalkDir;

use crate::args::BlurMode;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Collect all image paths from a file or directory, sorted.
pub fn collect_images(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        anyhow::bail!(
            "input path is neither file nor directory: {}",
            path.display()
        );
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext_lower = ext.to_ascii_lowercase();
            if SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str()) {
                images.push(entry.path().to_path_buf());
            } else {
                debug!("Skipping non-image file {}", entry.path().display());
            }
        }
    }
    images.sort();
    Ok(images)
}

/// Whether `path` lies inside `dir`, so composites written there are not picked up as inputs.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

/// Image handed to the pipeline: graduated inputs wider than `working_width` are downsized.
pub fn working_image(
    image: RgbaImage,
    mode: BlurMode,
    working_width: Option<u32>,
    filter: FilterType,
) -> RgbaImage {
    match (mode, working_width) {
        (BlurMode::Graduated, Some(width)) if width > 0 && image.width() > width => {
            let scaled = downscale_to_width(&image, width, filter);
            debug!(
                "Working resolution {}x{} (from {}x{})",
                scaled.width(),
                scaled.height(),
                image.width(),
                image.height()
            );
            scaled
        }
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walks_directories_for_supported_images() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        for name in ["b.JPG", "a.png", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").expect("write");
        }
        fs::write(nested.join("c.webp"), b"x").expect("write");

        let images = collect_images(dir.path()).expect("collect");
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.webp"]);
    }

    #[test]
    fn single_file_and_missing_paths() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("photo.bmp");
        fs::write(&file, b"x").expect("write");
        assert_eq!(collect_images(&file).expect("file"), vec![file.clone()]);
        assert!(collect_images(&dir.path().join("missing")).is_err());
        assert!(is_within(&file, dir.path()));
    }

    #[test]
    fn working_width_applies_to_wide_graduated_inputs_only() {
        let wide = RgbaImage::new(200, 100);
        let scaled = working_image(wide.clone(), BlurMode::Graduated, Some(50), FilterType::Triangle);
        assert_eq!(scaled.dimensions(), (50, 25));

        let narrow = working_image(wide.clone(), BlurMode::Graduated, Some(500), FilterType::Triangle);
        assert_eq!(narrow.dimensions(), (200, 100));

        let simple = working_image(wide.clone(), BlurMode::Simple, Some(50), FilterType::Triangle);
        assert_eq!(simple.dimensions(), (200, 100));

        let full = working_image(wide, BlurMode::Graduated, None, FilterType::Triangle);
        assert_eq!(full.dimensions(), (200, 100));
    }
}
