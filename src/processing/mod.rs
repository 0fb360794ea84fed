//! Frame processing
//!
//! Provides the resize path:
//! - Filter kernels and separable geometric resampling
//! - Luma and chroma resize geometry
//! - The per-frame resize-and-upscale compositor

pub mod compositor;
pub mod geometry;
pub mod kernel;
pub mod resample;

pub use compositor::{Planes, PlanesMut, ResizeCompositor};
pub use geometry::{compute_chroma_parameters, effective_extent, ResizeParameters, ScaleFactors, SubWindow};
pub use kernel::{Filter, FilterKind, Kernel};
pub use resample::{GeometricResampler, SeparableResampler};
