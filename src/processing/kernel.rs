//! Resampling filter kernels
//!
//! Kernel functions are evaluated in source-sample units; support is the
//! half-width beyond which the kernel is zero.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

/// Filter kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Nearest neighbour, no filtering
    Point,
    /// Triangle
    Bilinear,
    /// Mitchell-Netravali family, params b and c
    #[default]
    Bicubic,
    /// 4-tap spline
    Spline16,
    /// 6-tap spline
    Spline36,
    /// Windowed sinc, param a is the tap count
    Lanczos,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Point,
        FilterKind::Bilinear,
        FilterKind::Bicubic,
        FilterKind::Spline16,
        FilterKind::Spline36,
        FilterKind::Lanczos,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Point => "point",
            FilterKind::Bilinear => "bilinear",
            FilterKind::Bicubic => "bicubic",
            FilterKind::Spline16 => "spline16",
            FilterKind::Spline36 => "spline36",
            FilterKind::Lanczos => "lanczos",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|k| k.name() == lower)
            .ok_or_else(|| Error::Config(format!("unknown filter '{}'", s)))
    }
}

/// Kernel selection with its optional parameters
///
/// `None` parameters fall back to the kernel's own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub kind: FilterKind,
    pub param_a: Option<f64>,
    pub param_b: Option<f64>,
}

impl Filter {
    pub const fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            param_a: None,
            param_b: None,
        }
    }

    pub const fn point() -> Self {
        Self::new(FilterKind::Point)
    }

    pub fn with_params(mut self, param_a: Option<f64>, param_b: Option<f64>) -> Self {
        self.param_a = param_a;
        self.param_b = param_b;
        self
    }

    /// Resolve to an evaluable kernel
    pub fn kernel(&self) -> Kernel {
        match self.kind {
            FilterKind::Point => Kernel::Point,
            FilterKind::Bilinear => Kernel::Bilinear,
            FilterKind::Bicubic => Kernel::bicubic(
                self.param_a.unwrap_or(1.0 / 3.0),
                self.param_b.unwrap_or(1.0 / 3.0),
            ),
            FilterKind::Spline16 => Kernel::Spline16,
            FilterKind::Spline36 => Kernel::Spline36,
            FilterKind::Lanczos => Kernel::Lanczos {
                taps: self.param_a.map(|a| a.round().max(1.0) as u32).unwrap_or(3),
            },
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        match (self.param_a, self.param_b) {
            (Some(a), Some(b)) => write!(f, "({}, {})", a, b),
            (Some(a), None) => write!(f, "({})", a),
            (None, Some(b)) => write!(f, "(_, {})", b),
            (None, None) => Ok(()),
        }
    }
}

/// Evaluable kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    Point,
    Bilinear,
    /// Piecewise cubic coefficients derived from b and c
    Bicubic { p: [f64; 4], q: [f64; 4] },
    Spline16,
    Spline36,
    Lanczos { taps: u32 },
}

impl Kernel {
    fn bicubic(b: f64, c: f64) -> Self {
        Kernel::Bicubic {
            p: [
                (6.0 - 2.0 * b) / 6.0,
                0.0,
                (-18.0 + 12.0 * b + 6.0 * c) / 6.0,
                (12.0 - 9.0 * b - 6.0 * c) / 6.0,
            ],
            q: [
                (8.0 * b + 24.0 * c) / 6.0,
                (-12.0 * b - 48.0 * c) / 6.0,
                (6.0 * b + 30.0 * c) / 6.0,
                (-b - 6.0 * c) / 6.0,
            ],
        }
    }

    /// Half-width of the kernel in source samples
    pub fn support(&self) -> f64 {
        match self {
            Kernel::Point => 0.5,
            Kernel::Bilinear => 1.0,
            Kernel::Bicubic { .. } | Kernel::Spline16 => 2.0,
            Kernel::Spline36 => 3.0,
            Kernel::Lanczos { taps } => *taps as f64,
        }
    }

    /// Whether the support stretches with the downscale ratio
    pub fn widens(&self) -> bool {
        !matches!(self, Kernel::Point)
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self {
            // half-open so exactly one tap wins at a tie
            Kernel::Point => {
                if (-0.5..0.5).contains(&x) {
                    1.0
                } else {
                    0.0
                }
            }
            Kernel::Bilinear => (1.0 - x.abs()).max(0.0),
            Kernel::Bicubic { p, q } => {
                let x = x.abs();
                if x < 1.0 {
                    p[0] + x * x * (p[2] + x * p[3])
                } else if x < 2.0 {
                    q[0] + x * (q[1] + x * (q[2] + x * q[3]))
                } else {
                    0.0
                }
            }
            Kernel::Spline16 => {
                let x = x.abs();
                if x < 1.0 {
                    ((x - 9.0 / 5.0) * x - 1.0 / 5.0) * x + 1.0
                } else if x < 2.0 {
                    let x = x - 1.0;
                    ((-1.0 / 3.0 * x + 4.0 / 5.0) * x - 7.0 / 15.0) * x
                } else {
                    0.0
                }
            }
            Kernel::Spline36 => {
                let x = x.abs();
                if x < 1.0 {
                    ((13.0 / 11.0 * x - 453.0 / 209.0) * x - 3.0 / 209.0) * x + 1.0
                } else if x < 2.0 {
                    let x = x - 1.0;
                    ((-6.0 / 11.0 * x + 270.0 / 209.0) * x - 156.0 / 209.0) * x
                } else if x < 3.0 {
                    let x = x - 2.0;
                    ((1.0 / 11.0 * x - 45.0 / 209.0) * x + 26.0 / 209.0) * x
                } else {
                    0.0
                }
            }
            Kernel::Lanczos { taps } => {
                let a = *taps as f64;
                let x = x.abs();
                if x >= a {
                    0.0
                } else {
                    sinc(x) * sinc(x / a)
                }
            }
        }
    }
}

#[inline]
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let pi_x = PI * x;
        pi_x.sin() / pi_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_filter_names() {
        assert_eq!("Lanczos".parse::<FilterKind>().unwrap(), FilterKind::Lanczos);
        assert_eq!("SPLINE36".parse::<FilterKind>().unwrap(), FilterKind::Spline36);
        assert!("gauss".parse::<FilterKind>().is_err());
    }

    #[test]
    fn test_interpolating_kernels_hit_samples() {
        let kernels = [
            Kernel::Bilinear,
            Filter::new(FilterKind::Bicubic).with_params(Some(0.0), Some(0.5)).kernel(),
            Kernel::Spline16,
            Kernel::Spline36,
            Kernel::Lanczos { taps: 3 },
        ];
        for k in kernels {
            assert!(close(k.eval(0.0), 1.0), "{:?} at 0", k);
            for i in 1..=3 {
                assert!(close(k.eval(i as f64), 0.0), "{:?} at {}", k, i);
                assert!(close(k.eval(-(i as f64)), 0.0), "{:?} at -{}", k, i);
            }
        }
    }

    #[test]
    fn test_default_bicubic_is_mitchell() {
        let k = Filter::new(FilterKind::Bicubic).kernel();
        assert!(close(k.eval(0.0), 8.0 / 9.0));
        assert!(close(k.eval(1.0), 1.0 / 18.0));
        assert_eq!(k.eval(2.5), 0.0);
    }

    #[test]
    fn test_point_is_half_open() {
        assert_eq!(Kernel::Point.eval(-0.5), 1.0);
        assert_eq!(Kernel::Point.eval(0.5), 0.0);
        assert!(!Kernel::Point.widens());
    }

    #[test]
    fn test_lanczos_taps_param() {
        let k = Filter::new(FilterKind::Lanczos).with_params(Some(4.0), None).kernel();
        assert_eq!(k.support(), 4.0);
        assert_eq!(Filter::new(FilterKind::Lanczos).kernel().support(), 3.0);
    }
}
