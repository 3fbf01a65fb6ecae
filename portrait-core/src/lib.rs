//! Depth-aware portrait background blur.
//!
//! Segmentation and depth estimates are turned into a per-pixel blur bucket; each non-zero
//! bucket has one pre-blurred rendering of the image, and the composite copies every pixel from
//! the rendering its bucket selects. The ONNX-backed [`OnnxInferenceProvider`] runs the networks
//! with `tract-onnx`; any other [`InferenceProvider`] can be plugged in.

/// Blur operator contract and blur layer generation.
pub mod blur;
/// Bucket policy, bucket maps and their debug rendering.
pub mod bucket;
/// Cooperative cancellation between pipeline stages.
pub mod cancel;
/// Per-pixel compositing of the original and its blur layers.
pub mod compositor;
/// Background-relative depth normalization.
pub mod depth;
/// Depth network wrapper.
pub mod depth_model;
/// Error taxonomy for the composite operations.
pub mod error;
/// Row-major grids and mask classes.
pub mod grid;
/// Inference provider contract.
pub mod inference;
/// ONNX model loading and execution.
pub mod model;
/// End-to-end composite operations.
pub mod pipeline;
/// ONNX-backed inference provider.
pub mod provider;
/// Grid resampling.
pub mod resample;
/// Segmentation network wrapper.
pub mod segmentation;

pub use blur::{BlurLayerSet, BlurOperator, BlurRadii, GaussianBlur};
pub use bucket::{BucketMap, BucketPolicy};
pub use cancel::CancellationToken;
pub use compositor::composite;
pub use depth::DepthNormalizer;
pub use depth_model::{DepthModel, DepthModelConfig};
pub use error::{PortraitError, PortraitResult};
pub use grid::{BinaryMask, CoarseMask, DepthScoreGrid, Grid, MagnitudeGrid, MaskClass};
pub use inference::InferenceProvider;
pub use model::OnnxModel;
pub use pipeline::{CompositeOutput, PipelineConfig, PortraitPipeline};
pub use provider::OnnxInferenceProvider;
pub use resample::{NearestResampler, Resampler};
pub use segmentation::{Segmentation, SegmentationConfig, SegmentationModel};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
