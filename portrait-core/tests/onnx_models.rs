use std::{path::Path, sync::Arc};

use image::{Rgba, RgbaImage};
use portrait_core::{
    DepthModelConfig, InferenceProvider, OnnxInferenceProvider, PipelineConfig, PortraitPipeline,
    SegmentationConfig,
};

const SEGMENTATION_MODEL: &str = "models/deeplabv3_257_mv_gpu.onnx";
const DEPTH_MODEL: &str = "models/midas_v21_small_256.onnx";

fn portrait_like(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - width as f32 / 2.0;
        let dy = y as f32 - height as f32 * 0.6;
        if (dx * dx) / 900.0 + (dy * dy) / 2500.0 < 1.0 {
            Rgba([205, 160, 140, 255])
        } else {
            Rgba([(x % 200) as u8, 120, (y % 180) as u8 + 40, 255])
        }
    })
}

fn load_provider() -> Option<OnnxInferenceProvider> {
    if !Path::new(SEGMENTATION_MODEL).exists() || !Path::new(DEPTH_MODEL).exists() {
        eprintln!("skipping ONNX test (models {SEGMENTATION_MODEL} / {DEPTH_MODEL} missing)");
        return None;
    }
    Some(
        OnnxInferenceProvider::load(
            SEGMENTATION_MODEL,
            SegmentationConfig::default(),
            Some(DEPTH_MODEL),
            DepthModelConfig::default(),
        )
        .expect("load models"),
    )
}

#[test]
fn provider_outputs_have_contract_resolutions() {
    let Some(provider) = load_provider() else {
        return;
    };
    let image = portrait_like(320, 240);

    let fine = provider.segment_fine(&image).expect("fine mask");
    assert_eq!(fine.dimensions(), image.dimensions());

    let coarse = provider.segment_coarse(&image).expect("coarse mask");
    assert!(coarse.width() <= 257 && coarse.height() <= 257);
    assert_eq!(coarse.width(), 257);

    let depth = provider.estimate_depth(&image).expect("depth");
    assert!(depth.as_slice().iter().all(|v| v.is_finite()));
}

#[test]
fn both_composites_keep_resolution() {
    let Some(provider) = load_provider() else {
        return;
    };
    let pipeline = PortraitPipeline::new(Arc::new(provider), PipelineConfig::default())
        .expect("pipeline");
    let image = portrait_like(320, 240);

    let simple = pipeline.produce_simple_composite(&image).expect("simple");
    assert_eq!(simple.dimensions(), image.dimensions());

    let graduated = pipeline
        .produce_graduated_composite(&image)
        .expect("graduated");
    assert_eq!(graduated.dimensions(), image.dimensions());
}
