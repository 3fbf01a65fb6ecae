//! Persistent settings shared by the portrait library and its front ends.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs to spell out the values
//! it changes. The CLI layers its flags on top of whatever gets loaded here.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Resampling filter preference for the whole-image resizes (letterboxing, working width).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Triangle filter.
    #[default]
    Quality,
    /// Nearest filter.
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Memory layout of a model's image input and class-score output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, C, H, W]`
    Nchw,
    /// `[1, H, W, C]`
    #[default]
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nchw" => Ok(TensorLayout::Nchw),
            "nhwc" => Ok(TensorLayout::Nhwc),
            other => Err(format!(
                "invalid tensor layout '{other}'; expected 'nchw' or 'nhwc'"
            )),
        }
    }
}

/// When blur layers get rendered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayerStrategy {
    /// Render every configured radius up front.
    #[default]
    Eager,
    /// Render only the radii whose bucket occurs in the bucket map.
    OnDemand,
}

impl fmt::Display for LayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerStrategy::Eager => "eager",
            LayerStrategy::OnDemand => "on-demand",
        })
    }
}

impl FromStr for LayerStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "eager" => Ok(LayerStrategy::Eager),
            "on-demand" | "ondemand" | "lazy" => Ok(LayerStrategy::OnDemand),
            other => Err(format!(
                "invalid layer strategy '{other}'; expected 'eager' or 'on-demand'"
            )),
        }
    }
}

/// Locations of the ONNX models used by the inference provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    /// Semantic segmentation network (DeepLabV3-style, per-class scores).
    pub segmentation_path: Option<String>,
    /// Monocular depth network (MiDaS-style, single-channel relative depth).
    pub depth_path: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            segmentation_path: Some("models/deeplabv3_257_mv_gpu.onnx".into()),
            depth_path: Some("models/midas_v21_small_256.onnx".into()),
        }
    }
}

/// Segmentation model contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Number of classes scored per cell.
    pub num_classes: usize,
    /// Class index treated as the subject (foreground).
    pub subject_class: usize,
    /// Input normalization: `(value - mean) / std` on 0..=255 channel values.
    pub mean: f32,
    pub std: f32,
    pub layout: TensorLayout,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            input_size: 257,
            num_classes: 21,
            subject_class: 15,
            mean: 128.0,
            std: 128.0,
            layout: TensorLayout::Nhwc,
        }
    }
}

/// Depth model contract plus the normalization scale applied to its scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DepthSettings {
    pub input_width: u32,
    pub input_height: u32,
    /// Per-channel mean/std applied to 0..=1 RGB values.
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Multiplier applied to baseline-relative scores before bucketing.
    pub scale: f32,
}

impl Default for DepthSettings {
    fn default() -> Self {
        Self {
            input_width: 256,
            input_height: 256,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            scale: 5.0,
        }
    }
}

/// Blur radii and layer generation preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlurSettings {
    /// Radii for buckets `1..N`, strictly increasing.
    pub graduated_radii: Vec<u32>,
    /// Radius of the single layer used by the simple (mask-only) composite.
    pub simple_radius: u32,
    /// Gaussian sigma per unit of radius.
    pub sigma_per_radius: f32,
    pub strategy: LayerStrategy,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            graduated_radii: vec![7, 10, 13, 20],
            simple_radius: 20,
            sigma_per_radius: 0.5,
            strategy: LayerStrategy::Eager,
        }
    }
}

/// Pipeline-wide knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of graduated buckets, sharp bucket included.
    pub bucket_levels: u8,
    /// Downsize wider inputs to this width before the graduated composite. `None` keeps the
    /// source resolution.
    pub working_width: Option<u32>,
    pub resize_quality: ResizeQuality,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            bucket_levels: 5,
            working_width: Some(1200),
            resize_quality: ResizeQuality::Quality,
        }
    }
}

/// Encoding of written composites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// "png", "jpeg" or "webp".
    pub format: String,
    pub jpeg_quality: u8,
    /// "fast", "default", "best" or a 0-9 level.
    pub png_compression: String,
    /// Appended to the source file stem when naming outputs.
    pub suffix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: "jpeg".to_string(),
            jpeg_quality: 100,
            png_compression: "default".to_string(),
            suffix: "_portrait".to_string(),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    /// error, warn, info, debug or trace.
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string, falling back to `Debug`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    pub fn set_level(&mut self, level: LevelFilter) {
        self.level = level.as_str().to_ascii_lowercase();
    }
}

/// Root settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub models: ModelSettings,
    pub segmentation: SegmentationSettings,
    pub depth: DepthSettings,
    pub blur: BlurSettings,
    pub pipeline: PipelineSettings,
    pub output: OutputSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing model paths fall back to the built-in defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        let defaults = ModelSettings::default();
        if settings.models.segmentation_path.is_none() {
            settings.models.segmentation_path = defaults.segmentation_path;
        }
        if settings.models.depth_path.is_none() {
            settings.models.depth_path = defaults.depth_path;
        }
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON, replacing any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Default location of persisted settings (`config/portrait_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/portrait_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/portrait_settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let mut settings = AppSettings::default();
        settings.blur.strategy = LayerStrategy::OnDemand;
        settings.pipeline.working_width = None;
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "models": { "segmentation_path": null },
            "depth": { "scale": 3.5 },
            "blur": { "graduated_radii": [5, 9] },
            "pipeline": { "bucket_levels": 3 }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(
            loaded.models.segmentation_path,
            ModelSettings::default().segmentation_path
        );
        assert_eq!(loaded.depth.scale, 3.5);
        assert_eq!(loaded.depth.input_width, 256);
        assert_eq!(loaded.blur.graduated_radii, vec![5, 9]);
        assert_eq!(loaded.blur.simple_radius, 20);
        assert_eq!(loaded.pipeline.bucket_levels, 3);
        assert_eq!(loaded.pipeline.working_width, Some(1200));
        assert_eq!(loaded.segmentation.subject_class, 15);
        assert!(!loaded.telemetry.enabled);
    }

    #[test]
    fn malformed_json_reports_path() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), "{ not json").expect("write");
        let err = AppSettings::load_from_path(file.path()).expect_err("must fail");
        assert!(format!("{err}").contains("failed to parse settings JSON"));
    }

    #[test]
    fn enums_parse_from_flags() {
        assert_eq!("on_demand".parse::<LayerStrategy>(), Ok(LayerStrategy::OnDemand));
        assert_eq!("Eager".parse::<LayerStrategy>(), Ok(LayerStrategy::Eager));
        assert!("sometimes".parse::<LayerStrategy>().is_err());
        assert_eq!("NCHW".parse::<TensorLayout>(), Ok(TensorLayout::Nchw));
        assert_eq!(" speed ".parse::<ResizeQuality>(), Ok(ResizeQuality::Speed));
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let mut telemetry = TelemetrySettings::default();
        telemetry.set_level(LevelFilter::Info);
        assert_eq!(telemetry.level, "info");
        assert_eq!(telemetry.level_filter(), LevelFilter::Info);
    }
}
