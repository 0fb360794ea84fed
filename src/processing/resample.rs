//! Geometric resampling
//!
//! [`GeometricResampler`] is the contract the compositor relies on;
//! [`SeparableResampler`] is the stock implementation: a horizontal pass into
//! caller-provided scratch, then a vertical pass into the destination.

use super::geometry::ResizeParameters;
use super::kernel::Kernel;
use crate::error::{Error, Result};
use crate::plane::{PlaneMut, PlaneRef};

/// A configured, stateless plane resampler
pub trait GeometricResampler: Send + Sync {
    /// Parameters the resampler was built from
    fn params(&self) -> &ResizeParameters;

    /// Scratch samples `process` needs
    fn tmp_size(&self) -> usize;

    /// Resample `src` into `dst` using `tmp` as scratch
    fn process(&self, src: PlaneRef<'_>, dst: PlaneMut<'_>, tmp: &mut [f32]) -> Result<()>;
}

/// Contributions to one destination sample
#[derive(Debug, Clone)]
struct Taps {
    /// First source index
    start: usize,
    /// Normalized weights for `start..start + weights.len()`
    weights: Vec<f32>,
}

/// Build the tap table for one axis
fn build_taps(kernel: Kernel, src_len: usize, dst_len: usize, shift: f64, extent: f64) -> Vec<Taps> {
    let scale = dst_len as f64 / extent;
    let filter_scale = if scale < 1.0 && kernel.widens() {
        1.0 / scale
    } else {
        1.0
    };
    let support = kernel.support() * filter_scale;
    let last = src_len as i64 - 1;

    (0..dst_len)
        .map(|i| {
            let pos = shift + (i as f64 + 0.5) / scale;
            let first = (pos - support).floor() as i64;
            let end = (pos + support).ceil() as i64;

            let lo = first.clamp(0, last);
            let hi = end.clamp(0, last);
            let mut weights = vec![0.0f64; (hi - lo + 1) as usize];
            for j in first..=end {
                let w = kernel.eval((j as f64 + 0.5 - pos) / filter_scale);
                weights[(j.clamp(0, last) - lo) as usize] += w;
            }

            let sum: f64 = weights.iter().sum();
            if sum.abs() < 1e-12 {
                // degenerate window: fall back to the nearest sample
                let nearest = (pos.floor() as i64).clamp(0, last) as usize;
                return Taps {
                    start: nearest,
                    weights: vec![1.0],
                };
            }

            let lead = weights.iter().take_while(|w| **w == 0.0).count();
            let trail = weights.iter().rev().take_while(|w| **w == 0.0).count();
            Taps {
                start: lo as usize + lead,
                weights: weights[lead..weights.len() - trail]
                    .iter()
                    .map(|w| (w / sum) as f32)
                    .collect(),
            }
        })
        .collect()
}

/// Separable two-pass resampler with precomputed taps
#[derive(Debug, Clone)]
pub struct SeparableResampler {
    params: ResizeParameters,
    horizontal: Vec<Taps>,
    vertical: Vec<Taps>,
    identity: bool,
}

impl SeparableResampler {
    pub fn new(params: ResizeParameters) -> Self {
        let kernel = params.filter().kernel();
        let (src, dst) = (params.src(), params.dst());

        let horizontal = build_taps(
            kernel,
            src.width as usize,
            dst.width as usize,
            params.shift_w(),
            params.subwidth(),
        );
        let vertical = build_taps(
            kernel,
            src.height as usize,
            dst.height as usize,
            params.shift_h(),
            params.subheight(),
        );

        tracing::debug!(
            "Resampler {} {} -> {} (shift {:.4}, {:.4}; window {:.2}x{:.2})",
            params.filter(),
            src,
            dst,
            params.shift_w(),
            params.shift_h(),
            params.subwidth(),
            params.subheight()
        );

        Self {
            params,
            horizontal,
            vertical,
            identity: params.is_identity(),
        }
    }

    fn check_geometry(&self, src: &PlaneRef<'_>, dst: &PlaneMut<'_>, tmp: &[f32]) -> Result<()> {
        let (s, d) = (self.params.src(), self.params.dst());
        if src.width() != s.width as usize || src.height() != s.height as usize {
            return Err(Error::Resample(format!(
                "source plane is {}x{}, resampler built for {}",
                src.width(),
                src.height(),
                s
            )));
        }
        if dst.width() != d.width as usize || dst.height() != d.height as usize {
            return Err(Error::Resample(format!(
                "destination plane is {}x{}, resampler built for {}",
                dst.width(),
                dst.height(),
                d
            )));
        }
        if tmp.len() < self.tmp_size() {
            return Err(Error::Resample(format!(
                "scratch holds {} samples, {} required",
                tmp.len(),
                self.tmp_size()
            )));
        }
        Ok(())
    }
}

impl GeometricResampler for SeparableResampler {
    fn params(&self) -> &ResizeParameters {
        &self.params
    }

    fn tmp_size(&self) -> usize {
        self.params.src().height as usize * self.params.dst().width as usize
    }

    fn process(&self, src: PlaneRef<'_>, mut dst: PlaneMut<'_>, tmp: &mut [f32]) -> Result<()> {
        self.check_geometry(&src, &dst, tmp)?;

        if self.identity {
            return dst.copy_from(src);
        }

        let dst_w = dst.width();

        // Pass 1: rows, src_width -> dst_width
        for (y, src_row) in src.rows().enumerate() {
            let out = &mut tmp[y * dst_w..(y + 1) * dst_w];
            for (o, taps) in out.iter_mut().zip(&self.horizontal) {
                let window = &src_row[taps.start..taps.start + taps.weights.len()];
                *o = window
                    .iter()
                    .zip(&taps.weights)
                    .fold(0.0f32, |acc, (s, w)| acc + s * w);
            }
        }

        // Pass 2: columns, one output row at a time
        for (y, taps) in self.vertical.iter().enumerate() {
            let out = dst.row_mut(y);
            out.fill(0.0);
            for (k, &w) in taps.weights.iter().enumerate() {
                let row = taps.start + k;
                let src_row = &tmp[row * dst_w..(row + 1) * dst_w];
                for (o, s) in out.iter_mut().zip(src_row) {
                    *o += s * w;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::OwnedPlane;
    use crate::processing::geometry::SubWindow;
    use crate::processing::kernel::{Filter, FilterKind};
    use crate::types::Resolution;

    fn ramp(width: usize, height: usize) -> OwnedPlane {
        let data = (0..width * height).map(|v| (v % 251) as f32 / 251.0).collect();
        OwnedPlane::from_vec(data, width, height).unwrap()
    }

    fn run(params: ResizeParameters, src: &OwnedPlane) -> OwnedPlane {
        let r = SeparableResampler::new(params);
        let d = params.dst();
        let mut dst = OwnedPlane::new(d.width as usize, d.height as usize);
        let mut tmp = vec![0.0; r.tmp_size()];
        r.process(src.as_plane(), dst.as_plane_mut(), &mut tmp).unwrap();
        dst
    }

    #[test]
    fn test_identity_is_exact() {
        let src = ramp(37, 21);
        let res = Resolution::new(37, 21);
        for kind in FilterKind::ALL {
            let params =
                ResizeParameters::luma(Filter::new(kind), res, res, SubWindow::default());
            assert_eq!(run(params, &src), src, "{}", kind);
        }
    }

    #[test]
    fn test_point_weights_identity_without_fast_path() {
        let taps = build_taps(Kernel::Point, 10, 10, 0.0, 10.0);
        for (i, t) in taps.iter().enumerate() {
            assert_eq!(t.start, i);
            assert_eq!(t.weights, vec![1.0]);
        }
    }

    #[test]
    fn test_point_doubling_duplicates_samples() {
        let src = ramp(4, 3);
        let params = ResizeParameters::luma(
            Filter::point(),
            Resolution::new(4, 3),
            Resolution::new(8, 6),
            SubWindow::default(),
        );
        let dst = run(params, &src);
        for y in 0..6 {
            for x in 0..8 {
                assert_eq!(dst.data()[y * 8 + x], src.data()[(y / 2) * 4 + x / 2]);
            }
        }
    }

    #[test]
    fn test_integer_shift_moves_samples() {
        let src = ramp(8, 1);
        let res = Resolution::new(8, 1);
        let params = ResizeParameters::luma(
            Filter::new(FilterKind::Bilinear),
            res,
            res,
            SubWindow::default().with_shift(1.0, 0.0),
        );
        let dst = run(params, &src);
        for x in 0..7 {
            assert!((dst.data()[x] - src.data()[x + 1]).abs() < 1e-6);
        }
        // clamped at the right edge
        assert!((dst.data()[7] - src.data()[7]).abs() < 1e-6);
    }

    #[test]
    fn test_constant_plane_survives_any_kernel() {
        let src = OwnedPlane::from_vec(vec![0.25; 30 * 20], 30, 20).unwrap();
        for kind in FilterKind::ALL {
            for dst in [Resolution::new(45, 50), Resolution::new(12, 7)] {
                let params = ResizeParameters::luma(
                    Filter::new(kind),
                    Resolution::new(30, 20),
                    dst,
                    SubWindow::default().with_shift(0.3, -0.7),
                );
                let out = run(params, &src);
                assert!(
                    out.data().iter().all(|v| (v - 0.25).abs() < 1e-5),
                    "{} to {}",
                    kind,
                    dst
                );
            }
        }
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let params = ResizeParameters::luma(
            Filter::point(),
            Resolution::new(8, 8),
            Resolution::new(16, 16),
            SubWindow::default(),
        );
        let r = SeparableResampler::new(params);
        assert_eq!(r.tmp_size(), 8 * 16);

        let src = ramp(8, 8);
        let mut small = OwnedPlane::new(15, 16);
        let mut tmp = vec![0.0; r.tmp_size()];
        let err = r.process(src.as_plane(), small.as_plane_mut(), &mut tmp).unwrap_err();
        assert!(matches!(err, Error::Resample(_)));

        let mut dst = OwnedPlane::new(16, 16);
        let mut short = vec![0.0; r.tmp_size() - 1];
        assert!(r.process(src.as_plane(), dst.as_plane_mut(), &mut short).is_err());
    }
}
