//! Resize geometry: luma parameters, scale factors and chroma re-siting
//!
//! Everything here runs once when a pipeline is set up. Chroma parameters are
//! only ever derived from the luma parameters, never built directly.

use super::kernel::Filter;
use crate::types::{ChromaSiting, Resolution, Subsampling};
use serde::{Deserialize, Serialize};

/// Raw user shift and sub-window values
///
/// A sub-window value `<= 0` means "full extent minus this value".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SubWindow {
    pub shift_w: f64,
    pub shift_h: f64,
    pub subwidth: f64,
    pub subheight: f64,
}

impl SubWindow {
    pub fn with_shift(mut self, shift_w: f64, shift_h: f64) -> Self {
        self.shift_w = shift_w;
        self.shift_h = shift_h;
        self
    }

    pub fn with_extent(mut self, subwidth: f64, subheight: f64) -> Self {
        self.subwidth = subwidth;
        self.subheight = subheight;
        self
    }
}

/// Effective source extent for a sub-window value
pub fn effective_extent(extent: u32, value: f64) -> f64 {
    if value <= 0.0 {
        extent as f64 - value
    } else {
        value
    }
}

/// Destination extent over effective source extent, per axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleFactors {
    pub horizontal: f64,
    pub vertical: f64,
}

impl ScaleFactors {
    /// The factor the enhancement stage has to make up; the other axis is
    /// absorbed by the geometric resampler.
    pub fn binding(&self) -> f64 {
        self.horizontal.max(self.vertical)
    }
}

/// Immutable configuration of one resampler instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResizeParameters {
    filter: Filter,
    src: Resolution,
    dst: Resolution,
    shift_w: f64,
    shift_h: f64,
    subwidth: f64,
    subheight: f64,
}

impl ResizeParameters {
    /// Luma parameters; sub-window values are resolved to effective extents
    pub fn luma(filter: Filter, src: Resolution, dst: Resolution, window: SubWindow) -> Self {
        Self {
            filter,
            src,
            dst,
            shift_w: window.shift_w,
            shift_h: window.shift_h,
            subwidth: effective_extent(src.width, window.subwidth),
            subheight: effective_extent(src.height, window.subheight),
        }
    }

    /// Same geometry, different kernel
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn src(&self) -> Resolution {
        self.src
    }

    pub fn dst(&self) -> Resolution {
        self.dst
    }

    pub fn shift_w(&self) -> f64 {
        self.shift_w
    }

    pub fn shift_h(&self) -> f64 {
        self.shift_h
    }

    /// Effective source window width
    pub fn subwidth(&self) -> f64 {
        self.subwidth
    }

    /// Effective source window height
    pub fn subheight(&self) -> f64 {
        self.subheight
    }

    pub fn scale_factors(&self) -> ScaleFactors {
        ScaleFactors {
            horizontal: self.dst.width as f64 / self.subwidth,
            vertical: self.dst.height as f64 / self.subheight,
        }
    }

    /// Same size, no shift, whole source: a point pass is a plain copy
    pub fn is_identity(&self) -> bool {
        self.src == self.dst
            && self.shift_w == 0.0
            && self.shift_h == 0.0
            && self.subwidth == self.src.width as f64
            && self.subheight == self.src.height as f64
    }
}

/// Derive the chroma-plane parameters from the luma parameters
///
/// Shifts are re-expressed in chroma samples, correcting for the siting of
/// the first chroma sample on each side of the resize. Only the horizontal
/// axis has a configurable siting; vertical placement is always zero.
///
/// The destination placement is taken from the vertical ratio, which makes it
/// zero for every format without vertical subsampling.
pub fn compute_chroma_parameters(
    luma: &ResizeParameters,
    subsampling: Subsampling,
    src_siting: ChromaSiting,
    dst_siting: ChromaSiting,
    filter_uv: Filter,
) -> ResizeParameters {
    let scale = luma.scale_factors();
    let sub_w = subsampling.ratio_w() as f64;
    let sub_h = subsampling.ratio_h() as f64;

    let src_place_h = src_siting.placement(sub_w);
    let dst_place_h = dst_siting.placement(sub_h);
    let (src_place_v, dst_place_v) = (0.0, 0.0);

    ResizeParameters {
        filter: filter_uv,
        src: luma.src.subsampled(subsampling),
        dst: luma.dst.subsampled(subsampling),
        shift_w: ((luma.shift_w - src_place_h) * scale.horizontal + dst_place_h)
            / scale.horizontal
            / sub_w,
        shift_h: ((luma.shift_h - src_place_v) * scale.vertical + dst_place_v)
            / scale.vertical
            / sub_h,
        subwidth: luma.subwidth / sub_w,
        subheight: luma.subheight / sub_h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::kernel::FilterKind;
    use crate::types::PixelFormat;

    fn luma(src: Resolution, dst: Resolution, window: SubWindow) -> ResizeParameters {
        ResizeParameters::luma(Filter::point(), src, dst, window)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_effective_extent() {
        assert_eq!(effective_extent(640, 0.0), 640.0);
        assert_eq!(effective_extent(640, 320.5), 320.5);
        // non-positive values are subtracted from the full extent as given
        assert_eq!(effective_extent(640, -8.0), 648.0);
    }

    #[test]
    fn test_binding_scale_is_max_axis() {
        let p = luma(
            Resolution::new(640, 480),
            Resolution::new(1280, 1440),
            SubWindow::default(),
        );
        let s = p.scale_factors();
        assert_eq!(s.horizontal, 2.0);
        assert_eq!(s.vertical, 3.0);
        assert_eq!(s.binding(), 3.0);
    }

    #[test]
    fn test_420_upscale_scenario() {
        let p = luma(
            Resolution::new(640, 480),
            Resolution::new(1280, 960),
            SubWindow::default(),
        );
        let uv = compute_chroma_parameters(
            &p,
            PixelFormat::Yuv420p.subsampling(),
            ChromaSiting::LeftAligned,
            ChromaSiting::LeftAligned,
            Filter::new(FilterKind::Bicubic),
        );
        assert_eq!(uv.src(), Resolution::new(320, 240));
        assert_eq!(uv.dst(), Resolution::new(640, 480));
        assert_eq!(uv.shift_w(), 0.0);
        assert_eq!(uv.shift_h(), 0.0);
        assert_eq!(p.scale_factors().binding(), 2.0);
        assert_eq!(uv.subwidth(), 320.0);
        assert_eq!(uv.subheight(), 240.0);
        assert_eq!(uv.filter().kind, FilterKind::Bicubic);
    }

    #[test]
    fn test_left_aligned_placement_cancels() {
        let window = SubWindow::default().with_shift(3.0, -1.5);
        let p = luma(Resolution::new(640, 480), Resolution::new(1600, 1200), window);
        let uv = compute_chroma_parameters(
            &p,
            Subsampling::new(1, 1),
            ChromaSiting::LeftAligned,
            ChromaSiting::LeftAligned,
            Filter::point(),
        );
        // placements are zero, so the shift only changes units
        assert!(close(uv.shift_w(), 3.0 / 2.0));
        assert!(close(uv.shift_h(), -1.5 / 2.0));
    }

    #[test]
    fn test_centered_placement() {
        assert_eq!(ChromaSiting::Centered.placement(2.0), -0.5);
        assert_eq!(ChromaSiting::LeftAligned.placement(2.0), 0.0);

        let p = luma(
            Resolution::new(640, 480),
            Resolution::new(1280, 960),
            SubWindow::default(),
        );
        let uv = compute_chroma_parameters(
            &p,
            Subsampling::new(1, 1),
            ChromaSiting::Centered,
            ChromaSiting::Centered,
            Filter::point(),
        );
        // ((0 + 0.5) * 2 - 0.5) / 2 / 2
        assert!(close(uv.shift_w(), 0.125));
        // vertical siting is fixed
        assert_eq!(uv.shift_h(), 0.0);
    }

    #[test]
    fn test_centered_422_destination_uses_vertical_ratio() {
        let p = luma(Resolution::new(64, 48), Resolution::new(128, 96), SubWindow::default());
        let uv = compute_chroma_parameters(
            &p,
            PixelFormat::Yuv422p.subsampling(),
            ChromaSiting::Centered,
            ChromaSiting::Centered,
            Filter::point(),
        );
        // source -0.5, destination 0.5 - 1/2 = 0: ((0 + 0.5) * 2 + 0) / 2 / 2
        assert!(close(uv.shift_w(), 0.25));
        assert_eq!(uv.shift_h(), 0.0);
    }

    #[test]
    fn test_centered_440_offsets_only_destination() {
        let p = luma(Resolution::new(64, 48), Resolution::new(128, 96), SubWindow::default());
        let uv = compute_chroma_parameters(
            &p,
            PixelFormat::Yuv440p.subsampling(),
            ChromaSiting::Centered,
            ChromaSiting::Centered,
            Filter::point(),
        );
        // source 0.5 - 1/2 = 0, destination 0.5 - 2/2 = -0.5: (0 * 2 - 0.5) / 2 / 1
        assert!(close(uv.shift_w(), -0.25));
    }

    #[test]
    fn test_chroma_dims_are_exact() {
        for format in PixelFormat::ALL {
            let sub = format.subsampling();
            for w in [64u32, 320, 640, 1920] {
                for h in [48u32, 240, 480, 1080] {
                    let src = Resolution::new(w, h);
                    let dst = Resolution::new(w * 2, h * 2);
                    let uv = compute_chroma_parameters(
                        &luma(src, dst, SubWindow::default()),
                        sub,
                        ChromaSiting::Centered,
                        ChromaSiting::LeftAligned,
                        Filter::point(),
                    );
                    assert_eq!(uv.dst().width * sub.ratio_w(), dst.width);
                    assert_eq!(uv.dst().height * sub.ratio_h(), dst.height);
                    assert_eq!(uv.subwidth() * sub.ratio_w() as f64, w as f64);
                }
            }
        }
    }

    #[test]
    fn test_subwindow_feeds_chroma() {
        let window = SubWindow::default().with_extent(600.0, -20.0);
        let p = luma(Resolution::new(640, 480), Resolution::new(1200, 1000), window);
        assert_eq!(p.subwidth(), 600.0);
        assert_eq!(p.subheight(), 500.0);
        let uv = compute_chroma_parameters(
            &p,
            Subsampling::new(1, 1),
            ChromaSiting::LeftAligned,
            ChromaSiting::LeftAligned,
            Filter::point(),
        );
        assert_eq!(uv.subwidth(), 300.0);
        assert_eq!(uv.subheight(), 250.0);
    }

    #[test]
    fn test_identity_detection() {
        let res = Resolution::new(64, 48);
        assert!(luma(res, res, SubWindow::default()).is_identity());
        assert!(!luma(res, res, SubWindow::default().with_shift(0.25, 0.0)).is_identity());
    }
}
