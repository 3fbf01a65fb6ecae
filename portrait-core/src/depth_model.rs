//! Relative depth estimation on a MiDaS-style network.

use std::path::Path;

use anyhow::{Context, Result};
use image::{RgbImage, RgbaImage, buffer::ConvertBuffer, imageops::FilterType};
use portrait_utils::{
    ChannelNormalization, config::DepthSettings, config::ResizeQuality, into_contiguous_vec,
    resize_filter, resize_image, rgb_to_normalized_chw, telemetry::timing_guard,
};
use tract_onnx::prelude::Tensor;

use crate::grid::{DepthScoreGrid, Grid};
use crate::model::{OnnxModel, tensor_to_vec};

#[derive(Debug, Clone, PartialEq)]
pub struct DepthModelConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub normalization: ChannelNormalization,
    pub resize_filter: FilterType,
}

impl Default for DepthModelConfig {
    fn default() -> Self {
        Self::from_settings(&DepthSettings::default(), ResizeQuality::default())
    }
}

impl DepthModelConfig {
    pub fn from_settings(settings: &DepthSettings, quality: ResizeQuality) -> Self {
        Self {
            input_width: settings.input_width,
            input_height: settings.input_height,
            normalization: ChannelNormalization::unit_range(settings.mean, settings.std),
            resize_filter: resize_filter(quality),
        }
    }

    /// `[1, 3, H, W]`
    pub fn input_shape(&self) -> [usize; 4] {
        [1, 3, self.input_height as usize, self.input_width as usize]
    }
}

/// Loaded depth network.
#[derive(Debug)]
pub struct DepthModel {
    model: OnnxModel,
    config: DepthModelConfig,
}

impl DepthModel {
    pub fn load<P: AsRef<Path>>(path: P, config: DepthModelConfig) -> Result<Self> {
        anyhow::ensure!(
            config.input_width > 0 && config.input_height > 0,
            "depth input size must be non-zero"
        );
        let model = OnnxModel::load(path, "depth", &config.input_shape())?;
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &DepthModelConfig {
        &self.config
    }

    /// Raw scores at the network's output resolution.
    pub fn estimate(&self, image: &RgbaImage) -> Result<DepthScoreGrid> {
        let _guard = timing_guard("portrait_core::depth_estimation", log::Level::Debug);
        let tensor = prepare_input(image, &self.config)?;
        let output = self.model.run(tensor)?;
        let (shape, scores) = tensor_to_vec(&output, self.model.label())?;
        decode_depth(&shape, scores)
    }
}

pub(crate) fn prepare_input(image: &RgbaImage, config: &DepthModelConfig) -> Result<Tensor> {
    let rgb: RgbImage = image.convert();
    let resized = resize_image(
        &rgb,
        config.input_width,
        config.input_height,
        config.resize_filter,
    );
    let data = into_contiguous_vec(rgb_to_normalized_chw(&resized, &config.normalization));
    Tensor::from_shape(&config.input_shape(), &data)
        .map_err(|e| anyhow::anyhow!("failed to build depth input tensor: {e}"))
}

/// Interpret `[1, 1, H, W]`, `[1, H, W]` or `[H, W]` output as a score grid.
pub(crate) fn decode_depth(shape: &[usize], scores: Vec<f32>) -> Result<DepthScoreGrid> {
    let (height, width) = match shape {
        [1, 1, h, w] | [1, h, w] | [h, w] => (*h, *w),
        other => anyhow::bail!("unexpected depth output shape {other:?}"),
    };
    let width = u32::try_from(width).context("depth output too wide")?;
    let height = u32::try_from(height).context("depth output too tall")?;
    Ok(Grid::from_vec(width, height, scores)?)
}
