use std::path::Path;

use anyhow::{Context, Result};
use image::RgbaImage;
use log::info;
use portrait_utils::AppSettings;

use crate::depth_model::{DepthModel, DepthModelConfig};
use crate::grid::{BinaryMask, CoarseMask, DepthScoreGrid};
use crate::inference::InferenceProvider;
use crate::segmentation::{SegmentationConfig, SegmentationModel};

/// [`InferenceProvider`] backed by tract-loaded ONNX networks.
///
/// The depth network is optional; without it only the simple composite can run.
#[derive(Debug)]
pub struct OnnxInferenceProvider {
    segmentation: SegmentationModel,
    depth: Option<DepthModel>,
}

impl OnnxInferenceProvider {
    pub fn new(segmentation: SegmentationModel, depth: Option<DepthModel>) -> Self {
        Self {
            segmentation,
            depth,
        }
    }

    /// Load both networks at the given paths.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        segmentation_path: P,
        segmentation: SegmentationConfig,
        depth_path: Option<Q>,
        depth: DepthModelConfig,
    ) -> Result<Self> {
        let segmentation_path = segmentation_path.as_ref();
        let segmentation = SegmentationModel::load(segmentation_path, segmentation)
            .with_context(|| {
                format!(
                    "failed to load segmentation model from {}",
                    segmentation_path.display()
                )
            })?;
        info!("Loaded segmentation model {}", segmentation_path.display());

        let depth = match depth_path {
            Some(path) => {
                let path = path.as_ref();
                let model = DepthModel::load(path, depth).with_context(|| {
                    format!("failed to load depth model from {}", path.display())
                })?;
                info!("Loaded depth model {}", path.display());
                Some(model)
            }
            None => None,
        };

        Ok(Self::new(segmentation, depth))
    }

    /// Load the networks named in `settings.models`.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let segmentation_path = settings
            .models
            .segmentation_path
            .as_deref()
            .context("no segmentation model path configured")?;
        let quality = settings.pipeline.resize_quality;
        Self::load(
            segmentation_path,
            SegmentationConfig::from_settings(&settings.segmentation, quality),
            settings.models.depth_path.as_deref(),
            DepthModelConfig::from_settings(&settings.depth, quality),
        )
    }

    pub fn has_depth_model(&self) -> bool {
        self.depth.is_some()
    }
}

impl InferenceProvider for OnnxInferenceProvider {
    fn segment_fine(&self, image: &RgbaImage) -> Result<BinaryMask> {
        let (width, height) = image.dimensions();
        self.segmentation.segment(image)?.fine_mask(width, height)
    }

    fn segment_coarse(&self, image: &RgbaImage) -> Result<CoarseMask> {
        self.segmentation.segment(image)?.coarse_mask()
    }

    fn estimate_depth(&self, image: &RgbaImage) -> Result<DepthScoreGrid> {
        self.depth
            .as_ref()
            .context("no depth model loaded")?
            .estimate(image)
    }
}
