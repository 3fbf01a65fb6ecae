//! Discrete blur-intensity buckets.
//!
//! Bucket 0 keeps the original pixel; bucket `b > 0` takes the pixel from blur layer `b`.
//! Graduated classification rounds each magnitude to the nearest integer and saturates at the
//! top bucket, so the number of blur layers is fixed ahead of time.

use image::{Rgba, RgbaImage};

use crate::error::{PortraitError, PortraitResult};
use crate::grid::{BinaryMask, Grid, MagnitudeGrid, MaskClass};
use crate::resample::Resampler;

/// Bucket of pixels that stay sharp.
pub const SHARP: u8 = 0;
/// Default number of graduated buckets (sharp + four blur levels).
pub const DEFAULT_LEVELS: u8 = 5;
/// Upper bound on configurable bucket levels.
pub const MAX_LEVELS: u8 = 16;

/// Number of buckets used by graduated classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    levels: u8,
}

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS,
        }
    }
}

impl BucketPolicy {
    pub fn new(levels: u8) -> PortraitResult<Self> {
        if !(2..=MAX_LEVELS).contains(&levels) {
            return Err(PortraitError::invalid(format!(
                "bucket levels must be within 2..={MAX_LEVELS}, got {levels}"
            )));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// Highest (most blurred) bucket.
    pub fn max_bucket(&self) -> u8 {
        self.levels - 1
    }

    /// Round `magnitude` to the nearest band, saturating at [`Self::max_bucket`].
    #[inline]
    pub fn bucket_for(&self, magnitude: f32) -> u8 {
        let rounded = magnitude.round();
        if rounded >= self.max_bucket() as f32 {
            self.max_bucket()
        } else if rounded > 0.0 {
            rounded as u8
        } else {
            SHARP
        }
    }

    /// Classify every magnitude cell.
    pub fn classify_graduated(&self, magnitudes: &MagnitudeGrid) -> BucketMap {
        BucketMap {
            grid: magnitudes.map(|&m| self.bucket_for(m)),
            levels: self.levels,
        }
    }

    /// Two-bucket classification: background blurs fully, the subject stays sharp.
    pub fn classify_simple(mask: &BinaryMask) -> BucketMap {
        BucketMap {
            grid: mask.map(|&class| match class {
                MaskClass::Background => 1,
                MaskClass::Foreground => SHARP,
            }),
            levels: 2,
        }
    }
}

/// Per-pixel bucket assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMap {
    grid: Grid<u8>,
    levels: u8,
}

/// Debug palette: black, blue, green, gray, then white for every deeper bucket.
const PALETTE: [[u8; 4]; 5] = [
    [0, 0, 0, 255],
    [0, 0, 255, 255],
    [0, 255, 0, 255],
    [136, 136, 136, 255],
    [255, 255, 255, 255],
];

impl BucketMap {
    /// Wrap precomputed bucket indices; every value must be below `levels`.
    pub fn from_grid(grid: Grid<u8>, levels: u8) -> PortraitResult<Self> {
        BucketPolicy::new(levels)?;
        if let Some(&bad) = grid.as_slice().iter().find(|&&b| b >= levels) {
            return Err(PortraitError::invalid(format!(
                "bucket {bad} out of range for {levels} levels"
            )));
        }
        Ok(Self { grid, levels })
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.grid.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.grid.get(x, y).copied()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.grid.as_slice()
    }

    pub fn grid(&self) -> &Grid<u8> {
        &self.grid
    }

    /// Pixel count per bucket, indexed by bucket.
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.levels as usize];
        for &bucket in self.grid.as_slice() {
            counts[bucket as usize] += 1;
        }
        counts
    }

    /// Blur buckets (non-zero) that occur at least once, ascending.
    pub fn present_levels(&self) -> Vec<u8> {
        self.histogram()
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, count)| **count > 0)
            .map(|(bucket, _)| bucket as u8)
            .collect()
    }

    /// Resize to `width`x`height` with `resampler`; bucket edges stay hard.
    pub fn resample<R: Resampler>(
        &self,
        resampler: &R,
        width: u32,
        height: u32,
    ) -> PortraitResult<Self> {
        Ok(Self {
            grid: resampler.resample(&self.grid, width, height)?,
            levels: self.levels,
        })
    }

    /// Render buckets as colors for inspection.
    pub fn to_debug_image(&self) -> RgbaImage {
        let (width, height) = self.dimensions();
        RgbaImage::from_fn(width, height, |x, y| {
            let bucket = self.get(x, y).unwrap_or(SHARP) as usize;
            Rgba(PALETTE[bucket.min(PALETTE.len() - 1)])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_map_to_their_own_bucket() {
        let policy = BucketPolicy::default();
        assert_eq!(policy.bucket_for(0.0), 0);
        assert_eq!(policy.bucket_for(0.49), 0);
        assert_eq!(policy.bucket_for(0.5), 1);
        assert_eq!(policy.bucket_for(1.49), 1);
        assert_eq!(policy.bucket_for(2.0), 2);
        assert_eq!(policy.bucket_for(2.5), 3);
        assert_eq!(policy.bucket_for(3.49), 3);
        assert_eq!(policy.bucket_for(3.5), 4);
        assert_eq!(policy.bucket_for(4.0), 4);
        assert_eq!(policy.bucket_for(250.0), 4);
    }

    #[test]
    fn smaller_policies_saturate_earlier() {
        let policy = BucketPolicy::new(3).unwrap();
        assert_eq!(policy.bucket_for(1.0), 1);
        assert_eq!(policy.bucket_for(2.0), 2);
        assert_eq!(policy.bucket_for(7.0), 2);
        assert!(BucketPolicy::new(1).is_err());
        assert!(BucketPolicy::new(MAX_LEVELS + 1).is_err());
    }

    #[test]
    fn graduated_classification_is_deterministic() {
        let magnitudes = Grid::from_fn(16, 16, |x, y| (x * y) as f32 * 0.037).unwrap();
        let policy = BucketPolicy::default();
        let first = policy.classify_graduated(&magnitudes);
        let second = policy.classify_graduated(&magnitudes);
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn simple_classification_blurs_background_only() {
        let mask = Grid::from_vec(
            3,
            1,
            vec![
                MaskClass::Background,
                MaskClass::Foreground,
                MaskClass::Background,
            ],
        )
        .unwrap();
        let map = BucketPolicy::classify_simple(&mask);
        assert_eq!(map.levels(), 2);
        assert_eq!(map.as_slice(), &[1, 0, 1]);
        assert_eq!(map.histogram(), vec![1, 2]);
    }

    #[test]
    fn present_levels_skip_sharp_and_unused() {
        let grid = Grid::from_vec(4, 1, vec![0u8, 3, 3, 1]).unwrap();
        let map = BucketMap::from_grid(grid, 5).unwrap();
        assert_eq!(map.present_levels(), vec![1, 3]);
        assert!(BucketMap::from_grid(Grid::filled(1, 1, 5u8).unwrap(), 5).is_err());
    }

    #[test]
    fn debug_image_uses_palette() {
        let grid = Grid::from_vec(3, 1, vec![0u8, 2, 4]).unwrap();
        let image = BucketMap::from_grid(grid, 5).unwrap().to_debug_image();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(2, 0).0, [255, 255, 255, 255]);
    }
}
