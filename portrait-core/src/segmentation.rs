//! Person segmentation on a DeepLab-style class-score network.
//!
//! The image is letterboxed onto the square model canvas, scored, and argmax'd per cell. The
//! coarse mask is the content region at model scale; the fine mask is that region mapped back
//! onto the image.

use std::path::Path;

use anyhow::{Context, Result};
use image::{RgbImage, RgbaImage, buffer::ConvertBuffer, imageops::FilterType};
use log::trace;
use portrait_utils::{
    ChannelNormalization, Letterbox, TensorLayout, config::SegmentationSettings,
    config::ResizeQuality, into_contiguous_vec, letterbox_image, resize_filter,
    rgb_to_normalized_chw, rgb_to_normalized_hwc, telemetry::timing_guard,
};
use tract_onnx::prelude::Tensor;

use crate::grid::{BinaryMask, CoarseMask, Grid, MaskClass};
use crate::model::{OnnxModel, tensor_to_vec};
use crate::resample::{NearestResampler, Resampler};

/// Everything needed to feed the segmentation network and read its scores.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    /// Square canvas edge in pixels.
    pub input_size: u32,
    pub num_classes: usize,
    /// Class whose cells become [`MaskClass::Foreground`].
    pub subject_class: usize,
    pub normalization: ChannelNormalization,
    pub layout: TensorLayout,
    pub resize_filter: FilterType,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self::from_settings(&SegmentationSettings::default(), ResizeQuality::default())
    }
}

impl SegmentationConfig {
    pub fn from_settings(settings: &SegmentationSettings, quality: ResizeQuality) -> Self {
        Self {
            input_size: settings.input_size,
            num_classes: settings.num_classes,
            subject_class: settings.subject_class,
            normalization: ChannelNormalization::uniform(settings.mean, settings.std),
            layout: settings.layout,
            resize_filter: resize_filter(quality),
        }
    }

    /// Shape of the input tensor for the configured layout.
    pub fn input_shape(&self) -> [usize; 4] {
        let size = self.input_size as usize;
        match self.layout {
            TensorLayout::Nhwc => [1, size, size, 3],
            TensorLayout::Nchw => [1, 3, size, size],
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.input_size > 0, "segmentation input size must be non-zero");
        anyhow::ensure!(
            self.subject_class < self.num_classes,
            "subject class {} is outside the {} model classes",
            self.subject_class,
            self.num_classes
        );
        anyhow::ensure!(
            self.normalization.std.iter().all(|&s| s != 0.0),
            "segmentation std must be non-zero"
        );
        Ok(())
    }
}

/// Result of one segmentation pass.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Mask over the whole model canvas, padding included.
    pub canvas: CoarseMask,
    /// Where the image content sits on the canvas.
    pub letterbox: Letterbox,
}

impl Segmentation {
    /// The content region at model scale, padding cropped away.
    pub fn coarse_mask(&self) -> Result<CoarseMask> {
        let region = self.letterbox;
        self.canvas
            .crop(region.x, region.y, region.width, region.height)
            .context("letterbox region does not fit the segmentation canvas")
    }

    /// The content region resampled to `width`x`height`.
    pub fn fine_mask(&self, width: u32, height: u32) -> Result<BinaryMask> {
        let content = self.coarse_mask()?;
        Ok(NearestResampler.resample(&content, width, height)?)
    }
}

/// Loaded segmentation network.
#[derive(Debug)]
pub struct SegmentationModel {
    model: OnnxModel,
    config: SegmentationConfig,
}

impl SegmentationModel {
    pub fn load<P: AsRef<Path>>(path: P, config: SegmentationConfig) -> Result<Self> {
        config.validate()?;
        let model = OnnxModel::load(path, "segmentation", &config.input_shape())?;
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn segment(&self, image: &RgbaImage) -> Result<Segmentation> {
        let _guard = timing_guard("portrait_core::segmentation", log::Level::Debug);
        let (tensor, letterbox) = prepare_input(image, &self.config)?;
        let output = self.model.run(tensor)?;
        let (shape, scores) = tensor_to_vec(&output, self.model.label())?;
        let canvas = decode_class_scores(&shape, &scores, &self.config)?;
        trace!(
            "Segmentation letterbox {}x{}+{}+{} on {}px canvas",
            letterbox.width, letterbox.height, letterbox.x, letterbox.y, self.config.input_size
        );
        Ok(Segmentation { canvas, letterbox })
    }
}

/// Letterbox and normalize `image` into the model's input tensor.
pub(crate) fn prepare_input(
    image: &RgbaImage,
    config: &SegmentationConfig,
) -> Result<(Tensor, Letterbox)> {
    let rgb: RgbImage = image.convert();
    let (canvas, letterbox) = letterbox_image(&rgb, config.input_size, config.resize_filter)
        .context("failed to letterbox segmentation input")?;
    let array = match config.layout {
        TensorLayout::Nhwc => rgb_to_normalized_hwc(&canvas, &config.normalization),
        TensorLayout::Nchw => rgb_to_normalized_chw(&canvas, &config.normalization),
    };
    let data = into_contiguous_vec(array);
    let tensor = Tensor::from_shape(&config.input_shape(), &data)
        .map_err(|e| anyhow::anyhow!("failed to build segmentation input tensor: {e}"))?;
    Ok((tensor, letterbox))
}

/// Argmax per-cell class scores into a mask.
///
/// Accepts `[1, H, W, C]` and `[1, C, H, W]` (batch dimension optional). The configured layout
/// wins when both readings fit.
pub(crate) fn decode_class_scores(
    shape: &[usize],
    scores: &[f32],
    config: &SegmentationConfig,
) -> Result<CoarseMask> {
    let dims = match shape {
        [1, a, b, c] | [a, b, c] => [*a, *b, *c],
        other => anyhow::bail!("unexpected segmentation output shape {other:?}"),
    };
    let classes = config.num_classes;
    let channels_last = dims[2] == classes;
    let channels_first = dims[0] == classes;
    let layout = match (channels_last, channels_first) {
        (true, true) => config.layout,
        (true, false) => TensorLayout::Nhwc,
        (false, true) => TensorLayout::Nchw,
        (false, false) => anyhow::bail!(
            "segmentation output shape {shape:?} has no axis of {classes} classes"
        ),
    };
    let (height, width) = match layout {
        TensorLayout::Nhwc => (dims[0], dims[1]),
        TensorLayout::Nchw => (dims[1], dims[2]),
    };
    let plane = height * width;
    anyhow::ensure!(
        scores.len() == plane * classes,
        "segmentation output holds {} scores, shape {shape:?} needs {}",
        scores.len(),
        plane * classes
    );

    let score_at = |cell: usize, class: usize| match layout {
        TensorLayout::Nhwc => scores[cell * classes + class],
        TensorLayout::Nchw => scores[class * plane + cell],
    };
    let data = (0..plane)
        .map(|cell| {
            let mut best = 0usize;
            let mut best_score = score_at(cell, 0);
            for class in 1..classes {
                let score = score_at(cell, class);
                if score > best_score {
                    best = class;
                    best_score = score;
                }
            }
            if best == config.subject_class {
                MaskClass::Foreground
            } else {
                MaskClass::Background
            }
        })
        .collect();

    Ok(Grid::from_vec(width as u32, height as u32, data)?)
}
