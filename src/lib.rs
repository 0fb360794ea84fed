//! lumascale: resize-and-upscale compositor for planar video
//!
//! Resizes frames to an arbitrary target resolution by combining a cheap
//! geometric resampler with a learned luma enhancement pass, while keeping
//! subsampled chroma correctly sited.
//!
//! # Features
//!
//! - **Geometry**: sub-pixel shifts, sub-windows and chroma re-siting for
//!   every planar YUV subsampling
//! - **Resampling**: separable point, bilinear, bicubic, spline and lanczos kernels
//! - **Enhancement**: waifu2x-style convolutional models behind a shared,
//!   lock-guarded engine
//! - **Host**: per-frame and multi-threaded batch processing, a same-size
//!   denoise path, raw video I/O in full or limited range
//!
//! # Example
//!
//! ```rust,no_run
//! use lumascale::{Frame, PipelineBuilder, PixelFormat, Resolution, VideoInfo};
//!
//! fn main() -> lumascale::Result<()> {
//!     let source = VideoInfo::new(Resolution::SD_480P, PixelFormat::Yuv420p);
//!     let pipeline = PipelineBuilder::new()
//!         .source(source)
//!         .resolution(1280, 960)
//!         .filter_uv("spline36")
//!         .build()?;
//!
//!     let frame = Frame::new(source.resolution, source.format);
//!     let upscaled = pipeline.process_frame(&frame)?;
//!     assert_eq!(upscaled.resolution, Resolution::new(1280, 960));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod enhance;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod plane;
pub mod processing;
pub mod types;

// Re-exports for convenience
pub use config::{DenoiseConfig, NoiseLevel, ResizeConfig, ResolvedConfig, ResolvedDenoise};
pub use enhance::{create_engine, EngineHandle, EnhanceMode, UpscaleEngine};
pub use error::{Error, Result};
pub use io::{RawFrameReader, RawFrameWriter};
pub use pipeline::{DenoisePipeline, PipelineBuilder, ResizePipeline, ResizePlan};
pub use plane::{OwnedPlane, PlaneMut, PlaneRef, ScratchBuffer};
pub use processing::{Filter, FilterKind, GeometricResampler, ResizeCompositor, ResizeParameters};
pub use types::{ChromaSiting, Frame, PixelFormat, Resolution, SampleRange, Stats, VideoInfo};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
