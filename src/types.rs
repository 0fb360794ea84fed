//! Common types used throughout lumascale

use crate::error::{Error, Result};
use crate::plane::{OwnedPlane, PlaneMut, PlaneRef};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    // Common resolutions
    pub const SD_480P: Self = Self::new(640, 480);
    pub const FHD_1080P: Self = Self::new(1920, 1080);

    /// Calculate total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Resolution of a plane subsampled by `subsampling`
    pub fn subsampled(&self, subsampling: Subsampling) -> Self {
        Self::new(
            self.width >> subsampling.log2_w,
            self.height >> subsampling.log2_h,
        )
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::FHD_1080P
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parse `WIDTHxHEIGHT`
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::Config(format!("invalid resolution '{}', expected WxH", s)))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid width in '{}'", s)))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid height in '{}'", s)))?;
        Ok(Self::new(width, height))
    }
}

/// Chroma subsampling, as log2 of the ratio per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Subsampling {
    pub log2_w: u8,
    pub log2_h: u8,
}

impl Subsampling {
    pub const fn new(log2_w: u8, log2_h: u8) -> Self {
        Self { log2_w, log2_h }
    }

    /// Horizontal ratio (1, 2, 4)
    pub fn ratio_w(&self) -> u32 {
        1 << self.log2_w
    }

    /// Vertical ratio (1, 2, 4)
    pub fn ratio_h(&self) -> u32 {
        1 << self.log2_h
    }
}

/// Planar pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Luma only
    Gray,
    /// 4:2:0
    #[default]
    Yuv420p,
    /// 4:2:2
    Yuv422p,
    /// 4:4:0
    Yuv440p,
    /// 4:4:4
    Yuv444p,
    /// 4:1:1
    Yuv411p,
    /// 4:1:0
    Yuv410p,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 7] = [
        PixelFormat::Gray,
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv440p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuv411p,
        PixelFormat::Yuv410p,
    ];

    /// Chroma subsampling of the format (identity for gray)
    pub fn subsampling(&self) -> Subsampling {
        match self {
            PixelFormat::Gray | PixelFormat::Yuv444p => Subsampling::new(0, 0),
            PixelFormat::Yuv420p => Subsampling::new(1, 1),
            PixelFormat::Yuv422p => Subsampling::new(1, 0),
            PixelFormat::Yuv440p => Subsampling::new(0, 1),
            PixelFormat::Yuv411p => Subsampling::new(2, 0),
            PixelFormat::Yuv410p => Subsampling::new(2, 2),
        }
    }

    /// Does this format carry chroma planes?
    pub fn has_chroma(&self) -> bool {
        !matches!(self, PixelFormat::Gray)
    }

    /// Number of planes
    pub fn plane_count(&self) -> usize {
        if self.has_chroma() {
            3
        } else {
            1
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Gray => "gray",
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv440p => "yuv440p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuv411p => "yuv411p",
            PixelFormat::Yuv410p => "yuv410p",
        }
    }

    /// Resolution of plane `index` for a frame of luma resolution `resolution`
    pub fn plane_resolution(&self, resolution: Resolution, index: usize) -> Resolution {
        if index == 0 {
            resolution
        } else {
            resolution.subsampled(self.subsampling())
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| Error::Config(format!("unknown pixel format '{}'", s)))
    }
}

/// Where the first chroma sample sits relative to the first luma sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChromaSiting {
    /// Halfway between luma samples ("mpeg1")
    Centered,
    /// Co-sited with the first luma sample ("mpeg2")
    #[default]
    LeftAligned,
}

impl ChromaSiting {
    /// Offset of the first chroma sample from the first luma sample,
    /// in luma samples, for a subsampling ratio of `ratio`.
    pub fn placement(&self, ratio: f64) -> f64 {
        match self {
            ChromaSiting::LeftAligned => 0.0,
            ChromaSiting::Centered => 0.5 - ratio / 2.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChromaSiting::Centered => "mpeg1",
            ChromaSiting::LeftAligned => "mpeg2",
        }
    }
}

impl FromStr for ChromaSiting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mpeg1" => Ok(ChromaSiting::Centered),
            "mpeg2" => Ok(ChromaSiting::LeftAligned),
            _ => Err(Error::Config(
                "invalid 'chroma_loc' specified, should be 'mpeg1' or 'mpeg2'".into(),
            )),
        }
    }
}

/// Integer sample range of 8-bit video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SampleRange {
    /// `0..=255` on every plane
    #[default]
    Full,
    /// Luma `16..=235`, chroma `16..=240`
    Limited,
}

impl SampleRange {
    /// Range implied by a `full` flag; unset means limited for YUV
    pub fn for_format(full: Option<bool>, format: PixelFormat) -> Self {
        match full.unwrap_or(!format.has_chroma()) {
            true => SampleRange::Full,
            false => SampleRange::Limited,
        }
    }

    /// Code value mapped to 0.0 and span mapped to 1.0
    fn bounds(&self, chroma: bool) -> (f32, f32) {
        match (self, chroma) {
            (SampleRange::Full, _) => (0.0, 255.0),
            (SampleRange::Limited, false) => (16.0, 219.0),
            (SampleRange::Limited, true) => (16.0, 224.0),
        }
    }

    pub fn normalize(&self, value: u8, chroma: bool) -> f32 {
        let (floor, span) = self.bounds(chroma);
        (value as f32 - floor) / span
    }

    /// Back to a code value, rounded and clamped to `0..=255`
    pub fn quantize(&self, value: f32, chroma: bool) -> u8 {
        let (floor, span) = self.bounds(chroma);
        (value * span + floor).round().clamp(0.0, 255.0) as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleRange::Full => "full",
            SampleRange::Limited => "limited",
        }
    }
}

/// Geometry and format of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub resolution: Resolution,
    pub format: PixelFormat,
}

impl VideoInfo {
    pub const fn new(resolution: Resolution, format: PixelFormat) -> Self {
        Self { resolution, format }
    }

    /// Resolution of plane `index`
    pub fn plane_resolution(&self, index: usize) -> Resolution {
        self.format.plane_resolution(self.resolution, index)
    }
}

/// A planar floating point video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame number within the clip
    pub index: u64,
    /// Luma resolution
    pub resolution: Resolution,
    /// Pixel format
    pub format: PixelFormat,
    /// Y, or Y U V
    pub planes: Vec<OwnedPlane>,
}

impl Frame {
    /// Create a zeroed frame
    pub fn new(resolution: Resolution, format: PixelFormat) -> Self {
        let planes = (0..format.plane_count())
            .map(|i| {
                let res = format.plane_resolution(resolution, i);
                OwnedPlane::new(res.width as usize, res.height as usize)
            })
            .collect();

        Self {
            index: 0,
            resolution,
            format,
            planes,
        }
    }

    /// Create a frame from existing planes
    pub fn from_planes(
        resolution: Resolution,
        format: PixelFormat,
        planes: Vec<OwnedPlane>,
    ) -> Result<Self> {
        if planes.len() != format.plane_count() {
            return Err(Error::InvalidInput(format!(
                "{} expects {} planes, got {}",
                format,
                format.plane_count(),
                planes.len()
            )));
        }
        for (i, plane) in planes.iter().enumerate() {
            let res = format.plane_resolution(resolution, i);
            if plane.width() != res.width as usize || plane.height() != res.height as usize {
                return Err(Error::InvalidInput(format!(
                    "plane {} is {}x{}, expected {}",
                    i,
                    plane.width(),
                    plane.height(),
                    res
                )));
            }
        }

        Ok(Self {
            index: 0,
            resolution,
            format,
            planes,
        })
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }

    pub fn info(&self) -> VideoInfo {
        VideoInfo::new(self.resolution, self.format)
    }

    pub fn plane(&self, index: usize) -> PlaneRef<'_> {
        self.planes[index].as_plane()
    }

    pub fn plane_mut(&mut self, index: usize) -> PlaneMut<'_> {
        self.planes[index].as_plane_mut()
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Frames processed successfully
    pub frames_processed: u64,
    /// Frames that failed
    pub frames_failed: u64,
    /// Wall time spent inside frame calls, summed over workers
    pub busy: Duration,
}

impl Stats {
    /// Average wall time per frame call in ms
    pub fn avg_frame_ms(&self) -> f64 {
        let calls = self.frames_processed + self.frames_failed;
        if calls == 0 {
            0.0
        } else {
            self.busy.as_secs_f64() * 1000.0 / calls as f64
        }
    }
}
