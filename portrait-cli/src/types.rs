//! Serializable run summary.

use serde::Serialize;
use portrait_core::CompositeOutput;

/// Outcome for one processed image.
#[derive(Debug, Serialize)]
pub struct ImageSummary {
    pub image: String,
    pub output: String,
    pub mode: &'static str,
    pub width: u32,
    pub height: u32,
    /// Pixel count per bucket, sharp bucket first.
    pub bucket_histogram: Vec<usize>,
    pub layers_generated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_map: Option<String>,
}

impl ImageSummary {
    pub fn new(image: String, output: String, mode: &'static str, result: &CompositeOutput) -> Self {
        Self {
            image,
            output,
            mode,
            width: result.image.width(),
            height: result.image.height(),
            bucket_histogram: result.buckets.histogram(),
            layers_generated: result.layers_generated,
            bucket_map: None,
        }
    }
}

/// Whole-run summary printed or written as JSON.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub version: &'static str,
    pub processed: Vec<ImageSummary>,
    pub failed: Vec<FailedImage>,
}

#[derive(Debug, Serialize)]
pub struct FailedImage {
    pub image: String,
    pub error: String,
}
