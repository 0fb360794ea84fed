//! Per-frame resize-and-upscale
//!
//! Luma goes through a point pre-pass to the target size and then through the
//! enhancement engine. Chroma planes are resampled with the chroma kernel and
//! never enhanced. Scratch storage lives for one call only, so any number of
//! threads may run frames through one compositor; only the engine call itself
//! is serialized.

use super::resample::{GeometricResampler, SeparableResampler};
use crate::enhance::{EngineHandle, EnhanceMode};
use crate::error::{Error, Result};
use crate::plane::{PlaneMut, PlaneRef, ScratchBuffer};

/// Source planes of one frame, by arity
#[derive(Debug, Clone, Copy)]
pub enum Planes<'a> {
    Single(PlaneRef<'a>),
    Planar {
        y: PlaneRef<'a>,
        u: PlaneRef<'a>,
        v: PlaneRef<'a>,
    },
}

/// Destination planes of one frame, by arity
#[derive(Debug)]
pub enum PlanesMut<'a> {
    Single(PlaneMut<'a>),
    Planar {
        y: PlaneMut<'a>,
        u: PlaneMut<'a>,
        v: PlaneMut<'a>,
    },
}

/// Resize-and-upscale compositor
pub struct ResizeCompositor<R: GeometricResampler = SeparableResampler> {
    /// Point resampler from source luma to target luma
    pre: R,
    /// Chroma resampler, present for three-plane formats
    chroma: Option<R>,
    engine: EngineHandle,
    mode: EnhanceMode,
}

impl<R: GeometricResampler> ResizeCompositor<R> {
    pub fn new(pre: R, chroma: Option<R>, engine: EngineHandle) -> Result<Self> {
        let target = pre.params().dst();
        if engine.resolution() != target {
            return Err(Error::Config(format!(
                "engine '{}' is sized for {}, target is {}",
                engine.name(),
                engine.resolution(),
                target
            )));
        }

        Ok(Self {
            pre,
            chroma,
            engine,
            mode: EnhanceMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: EnhanceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> EnhanceMode {
        self.mode
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn pre_resampler(&self) -> &R {
        &self.pre
    }

    pub fn chroma_resampler(&self) -> Option<&R> {
        self.chroma.as_ref()
    }

    /// Point pre-pass into a scratch plane, then enhance into `dst`
    fn upscale_luma(&self, src: PlaneRef<'_>, dst: PlaneMut<'_>, tmp: &mut [f32]) -> Result<()> {
        let target = self.pre.params().dst();
        let (w, h) = (target.width as usize, target.height as usize);

        let mut scratch = ScratchBuffer::try_new(w * h)?;
        self.pre.process(src, scratch.plane_mut(w, h)?, tmp)?;
        self.engine.enhance(dst, scratch.plane(w, h)?, self.mode)
    }

    /// Resize a single-plane frame
    pub fn process_single(&self, src: PlaneRef<'_>, dst: PlaneMut<'_>) -> Result<()> {
        tracing::trace!(
            "Single plane {}x{} -> {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        );

        let mut tmp = ScratchBuffer::try_new(self.pre.tmp_size())?;
        self.upscale_luma(src, dst, tmp.as_mut_slice())
    }

    /// Resize a three-plane frame: `[y, u, v]` into `[y, u, v]`
    pub fn process_planar(&self, src: [PlaneRef<'_>; 3], dst: [PlaneMut<'_>; 3]) -> Result<()> {
        let chroma = self
            .chroma
            .as_ref()
            .ok_or_else(|| Error::Internal("three-plane frame without a chroma resampler".into()))?;
        let [src_y, src_u, src_v] = src;
        let [dst_y, dst_u, dst_v] = dst;

        tracing::trace!(
            "Planar {}x{} -> {}x{}, chroma {}x{} -> {}x{}",
            src_y.width(),
            src_y.height(),
            dst_y.width(),
            dst_y.height(),
            src_u.width(),
            src_u.height(),
            dst_u.width(),
            dst_u.height()
        );

        let mut tmp = ScratchBuffer::try_new(self.pre.tmp_size().max(chroma.tmp_size()))?;
        self.upscale_luma(src_y, dst_y, tmp.as_mut_slice())?;
        chroma.process(src_u, dst_u, tmp.as_mut_slice())?;
        chroma.process(src_v, dst_v, tmp.as_mut_slice())
    }

    /// Dispatch on plane arity
    pub fn process(&self, src: Planes<'_>, dst: PlanesMut<'_>) -> Result<()> {
        match (src, dst) {
            (Planes::Single(src), PlanesMut::Single(dst)) => self.process_single(src, dst),
            (Planes::Planar { y, u, v }, PlanesMut::Planar { y: dy, u: du, v: dv }) => {
                self.process_planar([y, u, v], [dy, du, dv])
            }
            _ => Err(Error::Internal(
                "source and destination plane counts differ".into(),
            )),
        }
    }
}

impl<R: GeometricResampler> std::fmt::Debug for ResizeCompositor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeCompositor")
            .field("pre", self.pre.params())
            .field("chroma", &self.chroma.as_ref().map(|c| *c.params()))
            .field("engine", &self.engine)
            .field("mode", &self.mode)
            .finish()
    }
}
