//! Blur layer generation.
//!
//! Layer `b` (1-based) is the whole image blurred at the `b`-th radius and serves every pixel in
//! bucket `b`. Layers are independent, so distinct radii render concurrently.

use image::RgbaImage;
use log::debug;
use portrait_utils::telemetry::timing_guard;
use rayon::prelude::*;

use crate::error::{PortraitError, PortraitResult};

/// Radii for graduated buckets 1..=4.
pub const GRADUATED_RADII: [u32; 4] = [7, 10, 13, 20];
/// Radius of the single simple-mode layer.
pub const SIMPLE_RADIUS: u32 = 20;
/// Gaussian sigma per unit of radius used by [`GaussianBlur::default`].
pub const DEFAULT_SIGMA_PER_RADIUS: f32 = 0.5;

/// Produces a blurred copy of an image.
///
/// Output must have the input's dimensions, and larger radii must not blur less than smaller ones.
pub trait BlurOperator: Send + Sync + std::fmt::Debug {
    fn blur(&self, image: &RgbaImage, radius: u32) -> PortraitResult<RgbaImage>;
}

/// Gaussian blur backed by `imageproc`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBlur {
    sigma_per_radius: f32,
}

impl Default for GaussianBlur {
    fn default() -> Self {
        Self {
            sigma_per_radius: DEFAULT_SIGMA_PER_RADIUS,
        }
    }
}

impl GaussianBlur {
    pub fn new(sigma_per_radius: f32) -> PortraitResult<Self> {
        if !sigma_per_radius.is_finite() || sigma_per_radius <= 0.0 {
            return Err(PortraitError::invalid(format!(
                "sigma per radius must be finite and positive, got {sigma_per_radius}"
            )));
        }
        Ok(Self { sigma_per_radius })
    }

    pub fn sigma_for(&self, radius: u32) -> f32 {
        radius as f32 * self.sigma_per_radius
    }
}

impl BlurOperator for GaussianBlur {
    fn blur(&self, image: &RgbaImage, radius: u32) -> PortraitResult<RgbaImage> {
        if radius == 0 {
            return Err(PortraitError::invalid("blur radius must be non-zero"));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(PortraitError::invalid("cannot blur an empty image"));
        }
        Ok(imageproc::filter::gaussian_blur_f32(
            image,
            self.sigma_for(radius),
        ))
    }
}

/// Strictly increasing, non-zero radii; entry `i` serves bucket `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurRadii(Vec<u32>);

impl BlurRadii {
    pub fn new(radii: Vec<u32>) -> PortraitResult<Self> {
        if radii.is_empty() {
            return Err(PortraitError::invalid("at least one blur radius is required"));
        }
        if radii.contains(&0) {
            return Err(PortraitError::invalid("blur radii must be non-zero"));
        }
        if radii.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PortraitError::invalid(format!(
                "blur radii must be strictly increasing, got {radii:?}"
            )));
        }
        Ok(Self(radii))
    }

    pub fn graduated() -> Self {
        Self(GRADUATED_RADII.to_vec())
    }

    pub fn simple() -> Self {
        Self(vec![SIMPLE_RADIUS])
    }

    /// Number of blur layers, i.e. bucket levels minus the sharp bucket.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Radius serving `bucket`, or `None` for the sharp bucket and out-of-range buckets.
    pub fn radius_for(&self, bucket: u8) -> Option<u32> {
        (bucket as usize)
            .checked_sub(1)
            .and_then(|index| self.0.get(index).copied())
    }

    /// Every blur bucket these radii cover.
    pub fn all_levels(&self) -> Vec<u8> {
        (1..=self.0.len() as u8).collect()
    }

    /// Fail unless there is exactly one radius per non-sharp bucket.
    pub fn ensure_levels(&self, levels: u8) -> PortraitResult<()> {
        if self.0.len() + 1 == levels as usize {
            Ok(())
        } else {
            Err(PortraitError::invalid(format!(
                "{levels} bucket levels need {} blur radii, got {}",
                levels.saturating_sub(1),
                self.0.len()
            )))
        }
    }
}

/// Blurred renderings indexed by bucket. Unrendered layers stay `None`.
#[derive(Debug, Clone)]
pub struct BlurLayerSet {
    radii: BlurRadii,
    layers: Vec<Option<RgbaImage>>,
}

impl BlurLayerSet {
    /// An empty set with one slot per radius.
    pub fn new(radii: BlurRadii) -> Self {
        let layers = vec![None; radii.len()];
        Self { radii, layers }
    }

    /// Render the layers for `levels` (blur buckets) from `image`, concurrently.
    ///
    /// Levels outside `1..=radii.len()` are rejected; duplicates render once.
    pub fn generate(
        image: &RgbaImage,
        radii: BlurRadii,
        operator: &dyn BlurOperator,
        levels: &[u8],
    ) -> PortraitResult<Self> {
        let _guard = timing_guard("portrait_core::blur_layers", log::Level::Debug);
        let mut wanted: Vec<(u8, u32)> = Vec::with_capacity(levels.len());
        for &level in levels {
            let radius = radii.radius_for(level).ok_or_else(|| {
                PortraitError::invalid(format!(
                    "bucket {level} has no blur radius ({} configured)",
                    radii.len()
                ))
            })?;
            if !wanted.iter().any(|&(seen, _)| seen == level) {
                wanted.push((level, radius));
            }
        }

        let rendered: Vec<(u8, RgbaImage)> = wanted
            .par_iter()
            .map(|&(level, radius)| {
                let layer = operator.blur(image, radius)?;
                if layer.dimensions() != image.dimensions() {
                    return Err(PortraitError::DimensionMismatch {
                        what: "blur layer",
                        expected: image.dimensions(),
                        actual: layer.dimensions(),
                    });
                }
                Ok((level, layer))
            })
            .collect::<PortraitResult<_>>()?;

        let mut set = Self::new(radii);
        for (level, layer) in rendered {
            set.insert(level, layer)?;
        }
        debug!(
            "Rendered {} of {} blur layers",
            set.generated_count(),
            set.radii.len()
        );
        Ok(set)
    }

    /// Place a pre-rendered layer for `bucket`.
    pub fn insert(&mut self, bucket: u8, layer: RgbaImage) -> PortraitResult<()> {
        let slot = (bucket as usize)
            .checked_sub(1)
            .and_then(|index| self.layers.get_mut(index))
            .ok_or_else(|| {
                PortraitError::invalid(format!("bucket {bucket} has no blur layer slot"))
            })?;
        *slot = Some(layer);
        Ok(())
    }

    /// Layer serving `bucket`, if it was rendered.
    pub fn get(&self, bucket: u8) -> Option<&RgbaImage> {
        (bucket as usize)
            .checked_sub(1)
            .and_then(|index| self.layers.get(index))
            .and_then(Option::as_ref)
    }

    pub fn radii(&self) -> &BlurRadii {
        &self.radii
    }

    /// Bucket levels covered, sharp bucket included.
    pub fn levels(&self) -> usize {
        self.layers.len() + 1
    }

    pub fn generated_count(&self) -> usize {
        self.layers.iter().filter(|layer| layer.is_some()).count()
    }
}
