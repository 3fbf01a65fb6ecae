//! Background-relative depth normalization.
//!
//! Raw monocular depth is only meaningful relative to itself, so scores are re-centered on the
//! mean score of the background reference cells and scaled. Subject cells are pinned to zero so
//! they always land in the sharp bucket.

use log::trace;

use crate::error::{PortraitError, PortraitResult};
use crate::grid::{CoarseMask, DepthScoreGrid, MagnitudeGrid, MaskClass};

/// Multiplier applied to baseline-relative scores unless configured otherwise.
pub const DEFAULT_DEPTH_SCALE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthNormalizer {
    scale: f32,
}

impl Default for DepthNormalizer {
    fn default() -> Self {
        Self {
            scale: DEFAULT_DEPTH_SCALE,
        }
    }
}

impl DepthNormalizer {
    pub fn new(scale: f32) -> PortraitResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PortraitError::invalid(format!(
                "depth scale must be finite and positive, got {scale}"
            )));
        }
        Ok(Self { scale })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Mean score over the background cells of `mask`.
    pub fn baseline(&self, scores: &DepthScoreGrid, mask: &CoarseMask) -> PortraitResult<f32> {
        PortraitError::ensure_dimensions(
            "coarse mask",
            scores.dimensions(),
            mask.dimensions(),
        )?;

        let mut sum = 0f64;
        let mut count = 0usize;
        for (&score, &class) in scores.as_slice().iter().zip(mask.as_slice()) {
            if class != MaskClass::Background {
                continue;
            }
            if !score.is_finite() {
                return Err(PortraitError::invalid(format!(
                    "depth score {score} in a reference cell is not finite"
                )));
            }
            sum += score as f64;
            count += 1;
        }

        if count == 0 {
            return Err(PortraitError::InsufficientReferencePixels);
        }
        let baseline = (sum / count as f64) as f32;
        trace!("Depth baseline {baseline:.4} over {count} reference cells");
        Ok(baseline)
    }

    /// Produce `|(score - baseline) * scale|` for background cells and `0` for the subject.
    pub fn normalize(
        &self,
        scores: &DepthScoreGrid,
        mask: &CoarseMask,
    ) -> PortraitResult<MagnitudeGrid> {
        let baseline = self.baseline(scores, mask)?;
        let data = scores
            .as_slice()
            .iter()
            .zip(mask.as_slice())
            .map(|(&score, &class)| match class {
                MaskClass::Background => ((score - baseline) * self.scale).abs(),
                MaskClass::Foreground => 0.0,
            })
            .collect();
        MagnitudeGrid::from_vec(scores.width(), scores.height(), data)
    }
}
