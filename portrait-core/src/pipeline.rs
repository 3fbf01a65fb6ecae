//! The two composite operations, wired from inference through compositing.

use std::sync::Arc;

use image::RgbaImage;
use log::info;
use portrait_utils::{AppSettings, LayerStrategy, telemetry::timing_guard};

use crate::blur::{BlurLayerSet, BlurOperator, BlurRadii, GaussianBlur};
use crate::bucket::{BucketMap, BucketPolicy};
use crate::cancel::CancellationToken;
use crate::compositor::composite;
use crate::depth::DepthNormalizer;
use crate::error::{PortraitError, PortraitResult};
use crate::grid::{CoarseMask, DepthScoreGrid};
use crate::inference::InferenceProvider;
use crate::resample::{NearestResampler, Resampler};

/// Tunables for both composite operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub policy: BucketPolicy,
    pub normalizer: DepthNormalizer,
    /// One radius per graduated blur bucket.
    pub graduated_radii: BlurRadii,
    /// Radius of the simple-mode layer.
    pub simple_radius: u32,
    pub strategy: LayerStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: BucketPolicy::default(),
            normalizer: DepthNormalizer::default(),
            graduated_radii: BlurRadii::graduated(),
            simple_radius: crate::blur::SIMPLE_RADIUS,
            strategy: LayerStrategy::Eager,
        }
    }
}

impl PipelineConfig {
    /// Validate and convert the persisted settings.
    pub fn from_settings(settings: &AppSettings) -> PortraitResult<Self> {
        let config = Self {
            policy: BucketPolicy::new(settings.pipeline.bucket_levels)?,
            normalizer: DepthNormalizer::new(settings.depth.scale)?,
            graduated_radii: BlurRadii::new(settings.blur.graduated_radii.clone())?,
            simple_radius: settings.blur.simple_radius,
            strategy: settings.blur.strategy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PortraitResult<()> {
        self.graduated_radii.ensure_levels(self.policy.levels())?;
        if self.simple_radius == 0 {
            return Err(PortraitError::invalid("simple blur radius must be non-zero"));
        }
        Ok(())
    }

    fn simple_radii(&self) -> PortraitResult<BlurRadii> {
        BlurRadii::new(vec![self.simple_radius])
    }
}

/// A composite together with what produced it.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    pub image: RgbaImage,
    /// Bucket per output pixel.
    pub buckets: BucketMap,
    /// Blur layers actually rendered.
    pub layers_generated: usize,
}

/// Runs inference, bucketing, layer generation and compositing for one image at a time.
///
/// Holds no per-image state; one pipeline can serve many threads.
#[derive(Clone)]
pub struct PortraitPipeline<R: Resampler = NearestResampler> {
    provider: Arc<dyn InferenceProvider>,
    blur: Arc<dyn BlurOperator>,
    resampler: R,
    config: PipelineConfig,
}

impl PortraitPipeline<NearestResampler> {
    /// Pipeline with the default Gaussian blur and nearest-cell resampling.
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        config: PipelineConfig,
    ) -> PortraitResult<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            blur: Arc::new(GaussianBlur::default()),
            resampler: NearestResampler,
            config,
        })
    }

    /// Build from persisted settings, including the blur sigma.
    pub fn from_settings(
        provider: Arc<dyn InferenceProvider>,
        settings: &AppSettings,
    ) -> PortraitResult<Self> {
        let config = PipelineConfig::from_settings(settings)?;
        let blur = GaussianBlur::new(settings.blur.sigma_per_radius)?;
        Ok(Self::new(provider, config)?.with_blur(Arc::new(blur)))
    }
}

impl<R: Resampler> PortraitPipeline<R> {
    pub fn with_blur(mut self, blur: Arc<dyn BlurOperator>) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_resampler<S: Resampler>(self, resampler: S) -> PortraitPipeline<S> {
        PortraitPipeline {
            provider: self.provider,
            blur: self.blur,
            resampler,
            config: self.config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Blur everything the segmentation marks as background with a single radius.
    pub fn produce_simple_composite(&self, image: &RgbaImage) -> PortraitResult<RgbaImage> {
        self.render_simple(image).map(|output| output.image)
    }

    /// Blur the background in proportion to its depth relative to the scene behind the subject.
    ///
    /// The composite has the input's resolution.
    pub fn produce_graduated_composite(&self, image: &RgbaImage) -> PortraitResult<RgbaImage> {
        self.render_graduated(image).map(|output| output.image)
    }

    /// Simple composite together with its bucket map.
    pub fn render_simple(&self, image: &RgbaImage) -> PortraitResult<CompositeOutput> {
        self.render_simple_with_cancel(image, &CancellationToken::new())
    }

    /// Graduated composite together with its bucket map.
    pub fn render_graduated(&self, image: &RgbaImage) -> PortraitResult<CompositeOutput> {
        self.render_graduated_with_cancel(image, &CancellationToken::new())
    }

    /// [`Self::render_simple`], checking `cancel` between stages.
    pub fn render_simple_with_cancel(
        &self,
        image: &RgbaImage,
        cancel: &CancellationToken,
    ) -> PortraitResult<CompositeOutput> {
        let _guard = timing_guard("portrait_core::simple_composite", log::Level::Debug);
        ensure_not_empty(image)?;

        cancel.check("segmentation")?;
        let mask = {
            let _guard = timing_guard("portrait_core::segment_fine", log::Level::Debug);
            self.provider
                .segment_fine(image)
                .map_err(PortraitError::upstream)?
        };
        PortraitError::ensure_dimensions("segmentation mask", image.dimensions(), mask.dimensions())?;
        let buckets = BucketPolicy::classify_simple(&mask);

        cancel.check("blur layers")?;
        let radii = self.config.simple_radii()?;
        let levels = self.layer_levels(&radii, &buckets);
        let layers = BlurLayerSet::generate(image, radii, self.blur.as_ref(), &levels)?;

        cancel.check("composite")?;
        let composited = composite(image, &buckets, &layers)?;
        Ok(CompositeOutput {
            image: composited,
            layers_generated: layers.generated_count(),
            buckets,
        })
    }

    /// [`Self::render_graduated`], checking `cancel` between stages.
    pub fn render_graduated_with_cancel(
        &self,
        image: &RgbaImage,
        cancel: &CancellationToken,
    ) -> PortraitResult<CompositeOutput> {
        let _guard = timing_guard("portrait_core::graduated_composite", log::Level::Debug);
        ensure_not_empty(image)?;

        cancel.check("inference")?;
        let (coarse, scores) = {
            let _guard = timing_guard("portrait_core::inference", log::Level::Debug);
            let provider = self.provider.as_ref();
            let (coarse, scores) = rayon::join(
                || provider.segment_coarse(image),
                || provider.estimate_depth(image),
            );
            (
                coarse.map_err(PortraitError::upstream)?,
                scores.map_err(PortraitError::upstream)?,
            )
        };

        cancel.check("bucket classification")?;
        let buckets = self.graduated_bucket_map(image.dimensions(), &coarse, &scores)?;

        cancel.check("blur layers")?;
        let radii = self.config.graduated_radii.clone();
        let levels = self.layer_levels(&radii, &buckets);
        let layers = BlurLayerSet::generate(image, radii, self.blur.as_ref(), &levels)?;

        cancel.check("composite")?;
        let composited = composite(image, &buckets, &layers)?;
        info!(
            "Graduated composite {}x{}: bucket histogram {:?}, {} layers rendered",
            composited.width(),
            composited.height(),
            buckets.histogram(),
            layers.generated_count()
        );
        Ok(CompositeOutput {
            image: composited,
            layers_generated: layers.generated_count(),
            buckets,
        })
    }

    /// Turn model-resolution segmentation and depth into a bucket map at `image_dims`.
    ///
    /// The coarse mask is resampled onto the depth grid, normalized against its background
    /// cells, classified, and the result resampled to the image.
    pub fn graduated_bucket_map(
        &self,
        image_dims: (u32, u32),
        coarse: &CoarseMask,
        scores: &DepthScoreGrid,
    ) -> PortraitResult<BucketMap> {
        let _guard = timing_guard("portrait_core::bucket_map", log::Level::Debug);
        let (depth_w, depth_h) = scores.dimensions();
        let mask = self.resampler.resample(coarse, depth_w, depth_h)?;
        let magnitudes = self.config.normalizer.normalize(scores, &mask)?;
        let coarse_buckets = self.config.policy.classify_graduated(&magnitudes);
        coarse_buckets.resample(&self.resampler, image_dims.0, image_dims.1)
    }

    fn layer_levels(&self, radii: &BlurRadii, buckets: &BucketMap) -> Vec<u8> {
        match self.config.strategy {
            LayerStrategy::Eager => radii.all_levels(),
            LayerStrategy::OnDemand => buckets.present_levels(),
        }
    }
}

fn ensure_not_empty(image: &RgbaImage) -> PortraitResult<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PortraitError::invalid(format!(
            "image must be non-empty, got {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, MaskClass};
    use anyhow::Result;

    #[derive(Debug)]
    struct Unused;

    impl InferenceProvider for Unused {
        fn segment_fine(&self, _: &RgbaImage) -> Result<crate::grid::BinaryMask> {
            anyhow::bail!("unused")
        }
        fn segment_coarse(&self, _: &RgbaImage) -> Result<CoarseMask> {
            anyhow::bail!("unused")
        }
        fn estimate_depth(&self, _: &RgbaImage) -> Result<DepthScoreGrid> {
            anyhow::bail!("unused")
        }
    }

    fn pipeline() -> PortraitPipeline {
        PortraitPipeline::new(Arc::new(Unused), PipelineConfig::default()).unwrap()
    }

    #[test]
    fn bucket_map_for_two_by_two_scene() {
        use MaskClass::{Background as Bg, Foreground as Fg};
        let coarse = Grid::from_vec(2, 2, vec![Bg, Bg, Fg, Fg]).unwrap();
        let scores = Grid::from_vec(2, 2, vec![1.0, 3.0, 5.0, 7.0]).unwrap();
        let buckets = pipeline()
            .graduated_bucket_map((2, 2), &coarse, &scores)
            .unwrap();
        assert_eq!(buckets.as_slice(), &[4, 4, 0, 0]);
    }

    #[test]
    fn coarse_mask_is_aligned_to_depth_grid() {
        use MaskClass::{Background as Bg, Foreground as Fg};
        // 1x2 mask stretched over a 2x4 depth grid, then the result up to 4x8 pixels.
        let coarse = Grid::from_vec(1, 2, vec![Bg, Fg]).unwrap();
        let scores = Grid::from_vec(2, 4, vec![0.0, 0.8, 0.0, 0.8, 9.0, 9.0, 9.0, 9.0]).unwrap();
        let buckets = pipeline()
            .graduated_bucket_map((4, 8), &coarse, &scores)
            .unwrap();
        assert_eq!(buckets.dimensions(), (4, 8));
        // baseline 0.4 -> magnitude 2.0 on every background cell.
        assert_eq!(buckets.histogram(), vec![16, 0, 16, 0, 0]);
        assert_eq!(buckets.get(3, 0), Some(2));
        assert_eq!(buckets.get(0, 7), Some(0));
    }

    #[test]
    fn settings_are_validated() {
        let mut settings = AppSettings::default();
        settings.pipeline.bucket_levels = 3;
        assert!(matches!(
            PipelineConfig::from_settings(&settings),
            Err(PortraitError::InvalidInput(_))
        ));
        settings.blur.graduated_radii = vec![4, 12];
        let config = PipelineConfig::from_settings(&settings).unwrap();
        assert_eq!(config.policy.levels(), 3);

        settings.blur.simple_radius = 0;
        assert!(PipelineConfig::from_settings(&settings).is_err());
    }

    #[test]
    fn empty_images_are_rejected_before_inference() {
        let empty = RgbaImage::new(0, 0);
        assert!(matches!(
            pipeline().produce_graduated_composite(&empty),
            Err(PortraitError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline().produce_simple_composite(&empty),
            Err(PortraitError::InvalidInput(_))
        ));
    }
}
