//! Configuration types for lumascale
//!
//! [`ResizeConfig`] is the user-facing option set, loadable from TOML and
//! overridable from the command line. [`ResizeConfig::resolve`] validates it
//! against a source clip and applies the defaults; every configuration error
//! surfaces there, before any frame is touched. [`DenoiseConfig`] does the
//! same for the same-size denoise path.

use crate::enhance::EnhanceMode;
use crate::error::{Error, Result};
use crate::processing::{effective_extent, Filter, FilterKind, SubWindow};
use crate::types::{ChromaSiting, Resolution, SampleRange, VideoInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resize options, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Target width (None = twice the source width)
    pub width: Option<u32>,
    /// Target height (None = twice the source height)
    pub height: Option<u32>,
    /// Luma resampling kernel
    pub filter: Option<String>,
    pub filter_param_a: Option<f64>,
    pub filter_param_b: Option<f64>,
    /// Chroma resampling kernel
    pub filter_uv: Option<String>,
    pub filter_param_a_uv: Option<f64>,
    pub filter_param_b_uv: Option<f64>,
    /// Chroma siting of the source, "mpeg1" or "mpeg2"
    pub chroma_loc: Option<String>,
    /// Chroma siting of the output (None = same as `chroma_loc`)
    pub chroma_loc_out: Option<String>,
    pub shift_w: Option<f64>,
    pub shift_h: Option<f64>,
    /// Source window width; `<= 0` insets from the full width
    pub subwidth: Option<f64>,
    /// Source window height; `<= 0` insets from the full height
    pub subheight: Option<f64>,
    /// Feed the enhanced plane back through the engine this many times
    pub refine_passes: Option<u32>,
    /// waifu2x-style JSON model (None = identity model)
    pub model: Option<PathBuf>,
    /// Worker threads for batch processing (None = available parallelism)
    pub threads: Option<usize>,
    /// Raw samples use the full 0-255 range (None = limited for YUV)
    pub full: Option<bool>,
}

impl ResizeConfig {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_filter_params(mut self, a: Option<f64>, b: Option<f64>) -> Self {
        self.filter_param_a = a;
        self.filter_param_b = b;
        self
    }

    pub fn with_filter_uv(mut self, filter: impl Into<String>) -> Self {
        self.filter_uv = Some(filter.into());
        self
    }

    pub fn with_filter_uv_params(mut self, a: Option<f64>, b: Option<f64>) -> Self {
        self.filter_param_a_uv = a;
        self.filter_param_b_uv = b;
        self
    }

    pub fn with_chroma_loc(mut self, chroma_loc: impl Into<String>) -> Self {
        self.chroma_loc = Some(chroma_loc.into());
        self
    }

    pub fn with_chroma_loc_out(mut self, chroma_loc: impl Into<String>) -> Self {
        self.chroma_loc_out = Some(chroma_loc.into());
        self
    }

    pub fn with_shift(mut self, shift_w: f64, shift_h: f64) -> Self {
        self.shift_w = Some(shift_w);
        self.shift_h = Some(shift_h);
        self
    }

    pub fn with_subwindow(mut self, subwidth: f64, subheight: f64) -> Self {
        self.subwidth = Some(subwidth);
        self.subheight = Some(subheight);
        self
    }

    pub fn with_refine_passes(mut self, passes: u32) -> Self {
        self.refine_passes = Some(passes);
        self
    }

    pub fn with_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model = Some(path.into());
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_full_range(mut self, full: bool) -> Self {
        self.full = Some(full);
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Load a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&data)
    }

    /// Overlay every option set in `other` onto `self`
    pub fn merge(self, other: ResizeConfig) -> Self {
        Self {
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            filter: other.filter.or(self.filter),
            filter_param_a: other.filter_param_a.or(self.filter_param_a),
            filter_param_b: other.filter_param_b.or(self.filter_param_b),
            filter_uv: other.filter_uv.or(self.filter_uv),
            filter_param_a_uv: other.filter_param_a_uv.or(self.filter_param_a_uv),
            filter_param_b_uv: other.filter_param_b_uv.or(self.filter_param_b_uv),
            chroma_loc: other.chroma_loc.or(self.chroma_loc),
            chroma_loc_out: other.chroma_loc_out.or(self.chroma_loc_out),
            shift_w: other.shift_w.or(self.shift_w),
            shift_h: other.shift_h.or(self.shift_h),
            subwidth: other.subwidth.or(self.subwidth),
            subheight: other.subheight.or(self.subheight),
            refine_passes: other.refine_passes.or(self.refine_passes),
            model: other.model.or(self.model),
            threads: other.threads.or(self.threads),
            full: other.full.or(self.full),
        }
    }

    /// Validate against `source` and fill in defaults
    pub fn resolve(&self, source: &VideoInfo) -> Result<ResolvedConfig> {
        let sub = source.format.subsampling();
        let src = source.resolution;

        if src.width < sub.ratio_w() || src.height < sub.ratio_h() {
            return Err(Error::Config(format!(
                "source {} is smaller than the {} chroma sub-sampling ratio",
                src, source.format
            )));
        }

        let width = target_extent("width", "horizontal", self.width, src.width, sub.ratio_w())?;
        let height = target_extent("height", "vertical", self.height, src.height, sub.ratio_h())?;

        let filter = parse_filter(
            "filter",
            self.filter.as_deref(),
            self.filter_param_a,
            self.filter_param_b,
        )?;
        let filter_uv = parse_filter(
            "filter_uv",
            self.filter_uv.as_deref(),
            self.filter_param_a_uv,
            self.filter_param_b_uv,
        )?;

        let src_siting = match &self.chroma_loc {
            Some(loc) => loc.parse::<ChromaSiting>()?,
            None => ChromaSiting::default(),
        };
        let dst_siting = match &self.chroma_loc_out {
            Some(loc) => loc.parse::<ChromaSiting>().map_err(|_| {
                Error::Config(
                    "invalid 'chroma_loc_out' specified, should be 'mpeg1' or 'mpeg2'".into(),
                )
            })?,
            None => src_siting,
        };

        let window = SubWindow::default()
            .with_shift(self.shift_w.unwrap_or(0.0), self.shift_h.unwrap_or(0.0))
            .with_extent(self.subwidth.unwrap_or(0.0), self.subheight.unwrap_or(0.0));
        for (key, extent, value) in [
            ("subwidth", src.width, window.subwidth),
            ("subheight", src.height, window.subheight),
        ] {
            let effective = effective_extent(extent, value);
            if !effective.is_finite() || effective <= 0.0 {
                return Err(Error::Config(format!(
                    "'{}' gives an empty source window ({})",
                    key, effective
                )));
            }
            // tap tables grow with the window
            if effective > 2.0 * extent as f64 {
                return Err(Error::Config(format!(
                    "'{}' gives a source window of {}, more than twice the source extent {}",
                    key, effective, extent
                )));
            }
        }
        if !window.shift_w.is_finite() || !window.shift_h.is_finite() {
            return Err(Error::Config("'shift_w' and 'shift_h' must be finite".into()));
        }

        let mode = match self.refine_passes {
            None => EnhanceMode::SinglePass,
            Some(0) => {
                return Err(Error::Config(
                    "'refine_passes' must be a positive integer".into(),
                ))
            }
            Some(passes) => EnhanceMode::Refine { passes },
        };

        let threads = resolve_threads(self.threads)?;

        Ok(ResolvedConfig {
            source: *source,
            target: Resolution::new(width, height),
            filter,
            filter_uv,
            src_siting,
            dst_siting,
            window,
            mode,
            model: self.model.clone(),
            threads,
            range: SampleRange::for_format(self.full, source.format),
        })
    }
}

fn resolve_threads(threads: Option<usize>) -> Result<usize> {
    match threads {
        Some(0) => Err(Error::Config("'threads' must be a positive integer".into())),
        Some(n) => Ok(n),
        None => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
    }
}

/// Target extent for one axis: default doubles the source
fn target_extent(key: &str, axis: &str, value: Option<u32>, source: u32, ratio: u32) -> Result<u32> {
    let value = match value {
        None => source.checked_mul(2).ok_or_else(|| {
            Error::Config(format!("default '{}' overflows for source {}", key, source))
        })?,
        Some(0) => return Err(Error::Config(format!("'{}' must be a positive integer", key))),
        Some(v) => v,
    };
    if value % ratio != 0 {
        return Err(Error::Config(format!(
            "'{}' must be a multiple of {} sub-sampling ratio",
            key, axis
        )));
    }
    Ok(value)
}

/// Kernel selection for one `filter` key; lanczos defaults to a = 3, b = 0
fn parse_filter(key: &str, name: Option<&str>, a: Option<f64>, b: Option<f64>) -> Result<Filter> {
    let kind = match name {
        Some(name) => name
            .parse::<FilterKind>()
            .map_err(|_| Error::Config(format!("invalid '{}' specified", key)))?,
        None => FilterKind::default(),
    };
    let (a, b) = match kind {
        FilterKind::Lanczos => (a.or(Some(3.0)), b.or(Some(0.0))),
        _ => (a, b),
    };
    Ok(Filter::new(kind).with_params(a, b))
}

/// Validated configuration for one source clip
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub source: VideoInfo,
    pub target: Resolution,
    /// Luma kernel slot; the luma pre-pass itself is always point
    pub filter: Filter,
    pub filter_uv: Filter,
    pub src_siting: ChromaSiting,
    pub dst_siting: ChromaSiting,
    pub window: SubWindow,
    pub mode: EnhanceMode,
    pub model: Option<PathBuf>,
    pub threads: usize,
    /// Sample range for raw I/O
    pub range: SampleRange,
}

/// Noise level of the denoise model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoiseLevel {
    Low = 1,
    High = 2,
}

impl NoiseLevel {
    /// waifu2x file name of the model for this level
    pub fn model_file(&self) -> String {
        format!("noise{}_model.json", *self as u32)
    }
}

/// Same-size denoise options, all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseConfig {
    /// Noise level, 1 or 2 (None = 1)
    pub mode: Option<u32>,
    /// Directory holding `noise1_model.json` and `noise2_model.json`
    /// (None = identity model)
    pub model_dir: Option<PathBuf>,
    /// Raw samples use the full 0-255 range (None = limited for YUV)
    pub full: Option<bool>,
    pub threads: Option<usize>,
}

impl DenoiseConfig {
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    pub fn with_full_range(mut self, full: bool) -> Self {
        self.full = Some(full);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Validate against `source` and fill in defaults
    pub fn resolve(&self, source: &VideoInfo) -> Result<ResolvedDenoise> {
        let level = match self.mode.unwrap_or(1) {
            1 => NoiseLevel::Low,
            2 => NoiseLevel::High,
            _ => return Err(Error::Config("'mode' must be 1 or 2".into())),
        };

        Ok(ResolvedDenoise {
            source: *source,
            level,
            model: self.model_dir.as_ref().map(|dir| dir.join(level.model_file())),
            threads: resolve_threads(self.threads)?,
            range: SampleRange::for_format(self.full, source.format),
        })
    }
}

/// Validated denoise configuration for one source clip
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDenoise {
    pub source: VideoInfo,
    pub level: NoiseLevel,
    /// Model file for `level`, if a model directory was given
    pub model: Option<PathBuf>,
    pub threads: usize,
    pub range: SampleRange,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelFormat;
    use std::io::Write;

    fn yuv420(width: u32, height: u32) -> VideoInfo {
        VideoInfo::new(Resolution::new(width, height), PixelFormat::Yuv420p)
    }

    fn config_error(config: ResizeConfig, info: VideoInfo) -> String {
        match config.resolve(&info) {
            Err(Error::Config(msg)) => msg,
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let resolved = ResizeConfig::default().resolve(&yuv420(640, 480)).unwrap();
        assert_eq!(resolved.target, Resolution::new(1280, 960));
        assert_eq!(resolved.filter, Filter::new(FilterKind::Bicubic));
        assert_eq!(resolved.filter_uv, Filter::new(FilterKind::Bicubic));
        assert_eq!(resolved.src_siting, ChromaSiting::LeftAligned);
        assert_eq!(resolved.dst_siting, ChromaSiting::LeftAligned);
        assert_eq!(resolved.window, SubWindow::default());
        assert_eq!(resolved.mode, EnhanceMode::SinglePass);
        assert!(resolved.model.is_none());
        assert!(resolved.threads >= 1);
    }

    #[test]
    fn test_width_must_match_subsampling() {
        let msg = config_error(ResizeConfig::default().with_resolution(641, 480), yuv420(640, 480));
        assert!(msg.contains("'width'"), "{}", msg);
        let msg = config_error(ResizeConfig::default().with_resolution(640, 481), yuv420(640, 480));
        assert!(msg.contains("'height'"), "{}", msg);

        // 4:1:1 needs multiples of 4 horizontally only
        let info = VideoInfo::new(Resolution::new(640, 480), PixelFormat::Yuv411p);
        assert!(ResizeConfig::default().with_resolution(642, 481).resolve(&info).is_err());
        assert!(ResizeConfig::default().with_resolution(644, 481).resolve(&info).is_ok());

        // gray has no constraint
        let gray = VideoInfo::new(Resolution::new(640, 480), PixelFormat::Gray);
        assert!(ResizeConfig::default().with_resolution(641, 479).resolve(&gray).is_ok());
    }

    #[test]
    fn test_zero_width_rejected() {
        let msg = config_error(ResizeConfig::default().with_resolution(0, 480), yuv420(640, 480));
        assert_eq!(msg, "'width' must be a positive integer");
    }

    #[test]
    fn test_filter_names() {
        let msg = config_error(ResizeConfig::default().with_filter_uv("gauss"), yuv420(64, 48));
        assert_eq!(msg, "invalid 'filter_uv' specified");
        let msg = config_error(ResizeConfig::default().with_filter("box"), yuv420(64, 48));
        assert_eq!(msg, "invalid 'filter' specified");

        let resolved = ResizeConfig::default()
            .with_filter("Spline36")
            .with_filter_uv("LANCZOS")
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.filter.kind, FilterKind::Spline36);
        assert_eq!(resolved.filter_uv.param_a, Some(3.0));
        assert_eq!(resolved.filter_uv.param_b, Some(0.0));
    }

    #[test]
    fn test_lanczos_keeps_explicit_params() {
        let resolved = ResizeConfig::default()
            .with_filter_uv("lanczos")
            .with_filter_uv_params(Some(4.0), None)
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.filter_uv.param_a, Some(4.0));
        assert_eq!(resolved.filter_uv.param_b, Some(0.0));
    }

    #[test]
    fn test_chroma_loc() {
        let msg = config_error(ResizeConfig::default().with_chroma_loc("jpeg"), yuv420(64, 48));
        assert_eq!(msg, "invalid 'chroma_loc' specified, should be 'mpeg1' or 'mpeg2'");

        let resolved = ResizeConfig::default()
            .with_chroma_loc("mpeg1")
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.src_siting, ChromaSiting::Centered);
        assert_eq!(resolved.dst_siting, ChromaSiting::Centered);

        let resolved = ResizeConfig::default()
            .with_chroma_loc("mpeg1")
            .with_chroma_loc_out("mpeg2")
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.dst_siting, ChromaSiting::LeftAligned);
    }

    #[test]
    fn test_subwindow() {
        let resolved = ResizeConfig::default()
            .with_subwindow(-8.0, 40.0)
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.window.subwidth, -8.0);
        assert_eq!(resolved.window.subheight, 40.0);

        let msg = config_error(
            ResizeConfig::default().with_subwindow(f64::NAN, 0.0),
            yuv420(64, 48),
        );
        assert!(msg.contains("'subwidth'"), "{}", msg);
        let msg = config_error(
            ResizeConfig::default().with_subwindow(0.0, f64::INFINITY),
            yuv420(64, 48),
        );
        assert!(msg.contains("'subheight'"), "{}", msg);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let msg = config_error(
            ResizeConfig::default().with_subwindow(1e8, 0.0),
            yuv420(64, 48),
        );
        assert!(msg.contains("'subwidth'") && msg.contains("twice"), "{}", msg);
        let msg = config_error(
            ResizeConfig::default().with_subwindow(0.0, -49.0),
            yuv420(64, 48),
        );
        assert!(msg.contains("'subheight'"), "{}", msg);

        // an inset up to the source extent itself is fine
        assert!(ResizeConfig::default()
            .with_subwindow(128.0, -48.0)
            .resolve(&yuv420(64, 48))
            .is_ok());
    }

    #[test]
    fn test_full_range_flag() {
        let resolved = ResizeConfig::default().resolve(&yuv420(64, 48)).unwrap();
        assert_eq!(resolved.range, SampleRange::Limited);
        let resolved = ResizeConfig::default()
            .with_full_range(true)
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.range, SampleRange::Full);

        let merged = ResizeConfig::from_toml_str("full = true")
            .unwrap()
            .merge(ResizeConfig::default().with_full_range(false));
        assert_eq!(merged.full, Some(false));
    }

    #[test]
    fn test_denoise_mode_selects_model() {
        let info = yuv420(64, 48);
        let resolved = DenoiseConfig::default().resolve(&info).unwrap();
        assert_eq!(resolved.level, NoiseLevel::Low);
        assert!(resolved.model.is_none());
        assert_eq!(resolved.range, SampleRange::Limited);

        let resolved = DenoiseConfig::default()
            .with_mode(2)
            .with_model_dir("models/anime")
            .with_full_range(true)
            .resolve(&info)
            .unwrap();
        assert_eq!(resolved.level, NoiseLevel::High);
        assert_eq!(resolved.model, Some(PathBuf::from("models/anime/noise2_model.json")));
        assert_eq!(resolved.range, SampleRange::Full);
    }

    #[test]
    fn test_denoise_rejects_bad_mode() {
        for mode in [0, 3] {
            match DenoiseConfig::default().with_mode(mode).resolve(&yuv420(8, 8)) {
                Err(Error::Config(msg)) => assert_eq!(msg, "'mode' must be 1 or 2"),
                other => panic!("expected a configuration error, got {:?}", other),
            }
        }
        assert!(DenoiseConfig::from_toml_str("level = 2").is_err());
        assert_eq!(
            DenoiseConfig::from_toml_str("mode = 2").unwrap().mode,
            Some(2)
        );
    }

    #[test]
    fn test_refine_passes() {
        let resolved = ResizeConfig::default()
            .with_refine_passes(2)
            .resolve(&yuv420(64, 48))
            .unwrap();
        assert_eq!(resolved.mode, EnhanceMode::Refine { passes: 2 });
        let msg = config_error(ResizeConfig::default().with_refine_passes(0), yuv420(64, 48));
        assert!(msg.contains("'refine_passes'"));
    }

    #[test]
    fn test_tiny_source_rejected() {
        let msg = config_error(ResizeConfig::default(), yuv420(1, 48));
        assert!(msg.contains("smaller"));
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
width = 1920
height = 1080
filter_uv = "spline36"
chroma_loc = "mpeg1"
shift_w = 0.5
model = "models/noise1.json"
"#
        )
        .unwrap();

        let config = ResizeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.width, Some(1920));
        assert_eq!(config.filter_uv.as_deref(), Some("spline36"));
        assert_eq!(config.shift_w, Some(0.5));
        assert_eq!(config.model, Some(PathBuf::from("models/noise1.json")));

        let resolved = config.resolve(&yuv420(960, 540)).unwrap();
        assert_eq!(resolved.target, Resolution::FHD_1080P);
        assert_eq!(resolved.window.shift_w, 0.5);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ResizeConfig::from_toml_str("widht = 12").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = ResizeConfig::default()
            .with_resolution(1280, 720)
            .with_filter_uv("bilinear");
        let flags = ResizeConfig::default().with_filter_uv("point");
        let merged = file.merge(flags);
        assert_eq!(merged.width, Some(1280));
        assert_eq!(merged.filter_uv.as_deref(), Some("point"));
    }
}
