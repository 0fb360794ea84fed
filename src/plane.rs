//! Plane views and frame-scoped scratch storage
//!
//! Planes are single channel `f32` grids addressed with a stride in samples.
//! The compositor only ever borrows them for the duration of one call.

use crate::error::{Error, Result};

/// Borrowed read-only plane
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneRef<'a> {
    pub fn new(data: &'a [f32], width: usize, height: usize, stride: usize) -> Result<Self> {
        check_geometry(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in samples
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Row `y`, exactly `width` samples long
    pub fn row(&self, y: usize) -> &'a [f32] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [f32]> {
        let plane = *self;
        (0..plane.height).map(move |y| plane.row(y))
    }
}

/// Borrowed writable plane
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [f32],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a> PlaneMut<'a> {
    pub fn new(data: &'a mut [f32], width: usize, height: usize, stride: usize) -> Result<Self> {
        check_geometry(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Reborrow as a read-only view
    pub fn as_plane(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: &*self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }

    /// Copy `src` row by row; dimensions must match
    pub fn copy_from(&mut self, src: PlaneRef<'_>) -> Result<()> {
        if src.width() != self.width || src.height() != self.height {
            return Err(Error::Internal(format!(
                "plane copy {}x{} -> {}x{}",
                src.width(),
                src.height(),
                self.width,
                self.height
            )));
        }
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
        Ok(())
    }
}

fn check_geometry(len: usize, width: usize, height: usize, stride: usize) -> Result<()> {
    if stride < width {
        return Err(Error::InvalidInput(format!(
            "stride {} is smaller than width {}",
            stride, width
        )));
    }
    let needed = match height {
        0 => 0,
        h => stride * (h - 1) + width,
    };
    if len < needed {
        return Err(Error::InvalidInput(format!(
            "plane {}x{} (stride {}) needs {} samples, buffer holds {}",
            width, height, stride, needed, len
        )));
    }
    Ok(())
}

/// Owned, tightly packed plane
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedPlane {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl OwnedPlane {
    /// Zero-filled plane
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidInput(format!(
                "{} samples for a {}x{} plane",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn as_plane(&self) -> PlaneRef<'_> {
        PlaneRef {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    pub fn as_plane_mut(&mut self) -> PlaneMut<'_> {
        PlaneMut {
            data: &mut self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

/// 32 bytes of samples; keeps the scratch allocation aligned for SIMD loads
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default)]
struct AlignedBlock([f32; 8]);

const BLOCK_SAMPLES: usize = 8;

/// Frame-scoped scratch allocation, released when dropped
///
/// Reservation is fallible so running out of memory fails the frame with
/// [`Error::Allocation`] instead of aborting the process.
#[derive(Debug)]
pub struct ScratchBuffer {
    blocks: Vec<AlignedBlock>,
    len: usize,
}

impl ScratchBuffer {
    /// Byte alignment of the first sample
    pub const ALIGNMENT: usize = std::mem::align_of::<AlignedBlock>();

    /// Allocate `len` zeroed samples
    pub fn try_new(len: usize) -> Result<Self> {
        let count = len.div_ceil(BLOCK_SAMPLES);
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|e| Error::Allocation(format!("{} scratch samples: {}", len, e)))?;
        blocks.resize(count, AlignedBlock::default());
        Ok(Self { blocks, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        // SAFETY: `AlignedBlock` is `repr(C)` over `[f32; 8]`, so the blocks are
        // `8 * blocks.len()` contiguous initialized samples and `len` never exceeds that.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr().cast::<f32>(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        // SAFETY: see `as_slice`; the mutable borrow of `self` makes the view unique.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr().cast::<f32>(), self.len) }
    }

    /// View the buffer as a packed `width` x `height` plane
    pub fn plane(&self, width: usize, height: usize) -> Result<PlaneRef<'_>> {
        PlaneRef::new(self.as_slice(), width, height, width)
    }

    /// View the buffer as a writable packed `width` x `height` plane
    pub fn plane_mut(&mut self, width: usize, height: usize) -> Result<PlaneMut<'_>> {
        PlaneMut::new(self.as_mut_slice(), width, height, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_geometry_checks() {
        let data = vec![0.0f32; 10 * 4];
        assert!(PlaneRef::new(&data, 8, 4, 10).is_ok());
        assert!(PlaneRef::new(&data, 8, 5, 10).is_err());
        assert!(PlaneRef::new(&data, 12, 2, 10).is_err());
    }

    #[test]
    fn test_strided_rows() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let plane = PlaneRef::new(&data, 2, 3, 4).unwrap();
        assert_eq!(plane.row(0), &[0.0, 1.0]);
        assert_eq!(plane.row(2), &[8.0, 9.0]);
    }

    #[test]
    fn test_scratch_alignment() {
        for len in [1, 7, 8, 33, 1000] {
            let mut buf = ScratchBuffer::try_new(len).unwrap();
            assert_eq!(buf.len(), len);
            assert_eq!(buf.as_slice().as_ptr() as usize % 32, 0);
            assert!(buf.as_slice().iter().all(|&v| v == 0.0));
            buf.as_mut_slice()[len - 1] = 1.5;
            assert_eq!(buf.as_slice()[len - 1], 1.5);
        }
        assert_eq!(ScratchBuffer::ALIGNMENT, 32);
    }

    #[test]
    fn test_scratch_allocation_failure() {
        let err = ScratchBuffer::try_new(usize::MAX / 4).unwrap_err();
        assert!(matches!(err, Error::Allocation(_)));
    }

    #[test]
    fn test_copy_from() {
        let src = OwnedPlane::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let mut data = vec![0.0f32; 6];
        let mut dst = PlaneMut::new(&mut data, 2, 2, 3).unwrap();
        dst.copy_from(src.as_plane()).unwrap();
        assert_eq!(data, vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]);
    }
}
