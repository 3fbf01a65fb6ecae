use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use image::{Rgba, RgbaImage};
use portrait_core::{
    BinaryMask, BlurOperator, BucketMap, CancellationToken, CoarseMask, DepthScoreGrid,
    GaussianBlur, Grid, InferenceProvider, MaskClass, PipelineConfig, PortraitError,
    PortraitPipeline, PortraitResult,
};
use portrait_utils::LayerStrategy;

use MaskClass::{Background as Bg, Foreground as Fg};

/// Provider returning canned grids regardless of the image.
#[derive(Default)]
struct ScriptedProvider {
    fine: Option<BinaryMask>,
    coarse: Option<CoarseMask>,
    depth: Option<DepthScoreGrid>,
    calls: AtomicUsize,
}

impl InferenceProvider for ScriptedProvider {
    fn segment_fine(&self, _image: &RgbaImage) -> Result<BinaryMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fine
            .clone()
            .ok_or_else(|| anyhow::anyhow!("segmentation backend unavailable"))
    }

    fn segment_coarse(&self, _image: &RgbaImage) -> Result<CoarseMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.coarse
            .clone()
            .ok_or_else(|| anyhow::anyhow!("segmentation backend unavailable"))
    }

    fn estimate_depth(&self, _image: &RgbaImage) -> Result<DepthScoreGrid> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.depth
            .clone()
            .ok_or_else(|| anyhow::anyhow!("depth backend unavailable"))
    }
}

/// Blur that paints every pixel with the radius, so layer provenance is visible in the output.
#[derive(Debug, Default)]
struct RadiusPainter {
    seen: Mutex<Vec<u32>>,
}

impl BlurOperator for RadiusPainter {
    fn blur(&self, image: &RgbaImage, radius: u32) -> PortraitResult<RgbaImage> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(radius);
        }
        Ok(RgbaImage::from_pixel(
            image.width(),
            image.height(),
            Rgba([radius as u8, 0, 0, 255]),
        ))
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 7 % 251) as u8 + 1, (y * 3 % 200) as u8, 90, 255])
    })
}

fn pipeline(provider: ScriptedProvider, config: PipelineConfig) -> PortraitPipeline {
    PortraitPipeline::new(Arc::new(provider), config).expect("valid config")
}

#[test]
fn graduated_two_by_two_scene_blurs_background_fully() {
    let provider = ScriptedProvider {
        coarse: Some(Grid::from_vec(2, 2, vec![Bg, Bg, Fg, Fg]).unwrap()),
        depth: Some(Grid::from_vec(2, 2, vec![1.0, 3.0, 5.0, 7.0]).unwrap()),
        ..Default::default()
    };
    let painter = Arc::new(RadiusPainter::default());
    let pipeline = pipeline(provider, PipelineConfig::default()).with_blur(painter.clone());
    let image = gradient(2, 2);

    let output = pipeline
        .render_graduated(&image)
        .unwrap();

    assert_eq!(output.buckets.as_slice(), &[4, 4, 0, 0]);
    assert_eq!(output.image.get_pixel(0, 0).0, [20, 0, 0, 255]);
    assert_eq!(output.image.get_pixel(1, 0).0, [20, 0, 0, 255]);
    assert_eq!(output.image.get_pixel(0, 1), image.get_pixel(0, 1));
    assert_eq!(output.image.get_pixel(1, 1), image.get_pixel(1, 1));
    assert_eq!(output.layers_generated, 4);
}

#[test]
fn on_demand_renders_only_used_layers() {
    let provider = ScriptedProvider {
        coarse: Some(Grid::from_vec(2, 2, vec![Bg, Bg, Fg, Fg]).unwrap()),
        depth: Some(Grid::from_vec(2, 2, vec![1.0, 3.0, 5.0, 7.0]).unwrap()),
        ..Default::default()
    };
    let config = PipelineConfig {
        strategy: LayerStrategy::OnDemand,
        ..PipelineConfig::default()
    };
    let painter = Arc::new(RadiusPainter::default());
    let pipeline = pipeline(provider, config).with_blur(painter.clone());

    let output = pipeline
        .render_graduated(&gradient(2, 2))
        .unwrap();

    assert_eq!(output.layers_generated, 1);
    assert_eq!(*painter.seen.lock().unwrap(), vec![20]);
}

#[test]
fn simple_mode_pixels_are_original_or_blurred() {
    let (width, height) = (40, 30);
    let mask = Grid::from_fn(width, height, |x, y| {
        if (10..30).contains(&x) && y > 8 { Fg } else { Bg }
    })
    .unwrap();
    let provider = ScriptedProvider {
        fine: Some(mask.clone()),
        ..Default::default()
    };
    let image = gradient(width, height);
    let blurred = GaussianBlur::default().blur(&image, 20).unwrap();

    let output = pipeline(provider, PipelineConfig::default())
        .produce_simple_composite(&image)
        .unwrap();

    assert_eq!(output.dimensions(), image.dimensions());
    for (x, y, pixel) in output.enumerate_pixels() {
        let expected = match mask.get(x, y) {
            Some(Fg) => image.get_pixel(x, y),
            _ => blurred.get_pixel(x, y),
        };
        assert_eq!(pixel, expected, "pixel ({x}, {y})");
    }
}

#[test]
fn graduated_output_is_deterministic() {
    let make = || ScriptedProvider {
        coarse: Some(Grid::from_fn(9, 9, |x, _| if x < 4 { Fg } else { Bg }).unwrap()),
        depth: Some(Grid::from_fn(16, 16, |x, y| (x as f32 * 0.13) - (y as f32 * 0.07)).unwrap()),
        ..Default::default()
    };
    let image = gradient(48, 32);
    let first = pipeline(make(), PipelineConfig::default())
        .render_graduated(&image)
        .unwrap();
    let second = pipeline(make(), PipelineConfig::default())
        .render_graduated(&image)
        .unwrap();

    assert_eq!(first.buckets, second.buckets);
    assert_eq!(first.image, second.image);
}

#[test]
fn layer_insertion_order_does_not_change_composite() {
    use portrait_core::{BlurLayerSet, BlurRadii, composite};

    let image = gradient(6, 1);
    let buckets =
        BucketMap::from_grid(Grid::from_vec(6, 1, vec![0u8, 1, 2, 3, 4, 2]).unwrap(), 5).unwrap();
    let layer = |value: u8| RgbaImage::from_pixel(6, 1, Rgba([value, value, value, 255]));

    let mut forward = BlurLayerSet::new(BlurRadii::graduated());
    for bucket in 1..=4u8 {
        forward.insert(bucket, layer(bucket * 50)).unwrap();
    }
    let mut reverse = BlurLayerSet::new(BlurRadii::graduated());
    for bucket in (1..=4u8).rev() {
        reverse.insert(bucket, layer(bucket * 50)).unwrap();
    }

    assert_eq!(
        composite(&image, &buckets, &forward).unwrap(),
        composite(&image, &buckets, &reverse).unwrap()
    );
}

#[test]
fn simple_mode_rejects_mask_of_wrong_size() {
    let provider = ScriptedProvider {
        fine: Some(Grid::filled(100, 99, Bg).unwrap()),
        ..Default::default()
    };
    let err = pipeline(provider, PipelineConfig::default())
        .produce_simple_composite(&gradient(100, 100))
        .unwrap_err();
    assert!(matches!(
        err,
        PortraitError::DimensionMismatch {
            expected: (100, 100),
            actual: (100, 99),
            ..
        }
    ));
}

#[test]
fn all_foreground_scene_has_no_reference() {
    let provider = ScriptedProvider {
        coarse: Some(Grid::filled(4, 4, Fg).unwrap()),
        depth: Some(Grid::filled(4, 4, 0.5).unwrap()),
        ..Default::default()
    };
    let err = pipeline(provider, PipelineConfig::default())
        .produce_graduated_composite(&gradient(8, 8))
        .unwrap_err();
    assert!(matches!(err, PortraitError::InsufficientReferencePixels));
}

#[test]
fn graduated_composite_keeps_wide_input_resolution() {
    let provider = ScriptedProvider {
        coarse: Some(Grid::from_vec(2, 2, vec![Bg, Bg, Fg, Fg]).unwrap()),
        depth: Some(Grid::from_vec(2, 2, vec![1.0, 3.0, 5.0, 7.0]).unwrap()),
        ..Default::default()
    };
    let image = gradient(1600, 40);
    let output = pipeline(provider, PipelineConfig::default())
        .with_blur(Arc::new(RadiusPainter::default()))
        .produce_graduated_composite(&image)
        .unwrap();

    assert_eq!(output.dimensions(), image.dimensions());
    // Top half is far background, bottom half the untouched subject.
    assert_eq!(output.get_pixel(1599, 0).0, [20, 0, 0, 255]);
    assert_eq!(output.get_pixel(1599, 39), image.get_pixel(1599, 39));
}

#[test]
fn cancelled_token_stops_before_inference() {
    let provider = Arc::new(ScriptedProvider {
        fine: Some(Grid::filled(4, 4, Bg).unwrap()),
        ..Default::default()
    });
    let pipeline = PortraitPipeline::new(provider.clone(), PipelineConfig::default()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = pipeline
        .render_simple_with_cancel(&gradient(4, 4), &token)
        .unwrap_err();
    assert!(matches!(err, PortraitError::Cancelled { stage: "segmentation" }));
    let err = pipeline
        .render_graduated_with_cancel(&gradient(4, 4), &token)
        .unwrap_err();
    assert!(matches!(err, PortraitError::Cancelled { stage: "inference" }));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn provider_failures_surface_as_upstream_errors() {
    let err = pipeline(ScriptedProvider::default(), PipelineConfig::default())
        .produce_graduated_composite(&gradient(4, 4))
        .unwrap_err();
    match err {
        PortraitError::UpstreamInferenceFailure(message) => {
            assert!(message.contains("backend unavailable"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
