//! Per-pixel selection between the original image and its blur layers.

use image::RgbaImage;
use portrait_utils::telemetry::timing_guard;
use rayon::prelude::*;

use crate::blur::BlurLayerSet;
use crate::bucket::{BucketMap, SHARP};
use crate::error::{PortraitError, PortraitResult};

const CHANNELS: usize = 4;

/// Build the final image: bucket 0 keeps the original pixel, bucket `b` copies layer `b`.
///
/// Selection is a hard switch with no blending. Every layer the bucket map refers to must be
/// present, and all inputs must share the original's resolution.
pub fn composite(
    original: &RgbaImage,
    buckets: &BucketMap,
    layers: &BlurLayerSet,
) -> PortraitResult<RgbaImage> {
    let _guard = timing_guard("portrait_core::composite", log::Level::Debug);
    let dims = original.dimensions();
    if dims.0 == 0 || dims.1 == 0 {
        return Err(PortraitError::invalid("cannot composite an empty image"));
    }
    PortraitError::ensure_dimensions("bucket map", dims, buckets.dimensions())?;

    // sources[b] is the buffer bucket b reads from; unrendered layers stay None.
    let mut sources: Vec<Option<&[u8]>> = Vec::with_capacity(buckets.levels() as usize);
    sources.push(Some(original.as_raw().as_slice()));
    for bucket in 1..buckets.levels() {
        let layer = layers.get(bucket);
        if let Some(layer) = layer {
            PortraitError::ensure_dimensions("blur layer", dims, layer.dimensions())?;
        }
        sources.push(layer.map(|image| image.as_raw().as_slice()));
    }
    for bucket in buckets.present_levels() {
        if sources[bucket as usize].is_none() {
            return Err(PortraitError::invalid(format!(
                "bucket {bucket} is used but its blur layer was not generated"
            )));
        }
    }

    let width = dims.0 as usize;
    let stride = width * CHANNELS;
    let mut output = original.clone();
    let sources = &sources;
    output
        .par_chunks_mut(stride)
        .zip(buckets.as_slice().par_chunks(width))
        .enumerate()
        .for_each(|(y, (row, bucket_row))| {
            let row_start = y * stride;
            for (x, &bucket) in bucket_row.iter().enumerate() {
                if bucket == SHARP {
                    continue;
                }
                if let Some(source) = sources[bucket as usize] {
                    let offset = x * CHANNELS;
                    row[offset..offset + CHANNELS].copy_from_slice(
                        &source[row_start + offset..row_start + offset + CHANNELS],
                    );
                }
            }
        });

    Ok(output)
}
