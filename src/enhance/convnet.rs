//! Convolutional enhancement engine
//!
//! Runs a stack of 3x3 convolutions over one luma plane. Models use the
//! waifu2x JSON layout: an array of layers with `nInputPlane`,
//! `nOutputPlane`, `kW`, `kH`, `weight[out][in][ky][kx]` and `bias[out]`.
//! Hidden layers use a leaky ReLU, the last layer is linear.

use super::{check_plane, EnhanceMode, UpscaleEngine};
use crate::error::{Error, Result};
use crate::plane::{PlaneMut, PlaneRef};
use crate::types::Resolution;

use serde::Deserialize;
use std::path::Path;

const KERNEL_SIZE: usize = 3;
const KERNEL_TAPS: usize = KERNEL_SIZE * KERNEL_SIZE;
const LEAKY_SLOPE: f32 = 0.1;

/// Layer as stored in a model file
#[derive(Debug, Deserialize)]
struct RawLayer {
    #[serde(rename = "nInputPlane")]
    input_planes: usize,
    #[serde(rename = "nOutputPlane")]
    output_planes: usize,
    #[serde(rename = "kW")]
    kernel_w: usize,
    #[serde(rename = "kH")]
    kernel_h: usize,
    weight: Vec<Vec<Vec<Vec<f32>>>>,
    bias: Vec<f32>,
}

/// One 3x3 convolution layer with flattened weights
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    input_planes: usize,
    output_planes: usize,
    /// `[out][in][ky * 3 + kx]`
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Layer {
    pub fn new(
        input_planes: usize,
        output_planes: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self> {
        if input_planes == 0 || output_planes == 0 {
            return Err(Error::Model("layer with zero planes".into()));
        }
        if weights.len() != input_planes * output_planes * KERNEL_TAPS {
            return Err(Error::Model(format!(
                "{} weights for a {}->{} layer, expected {}",
                weights.len(),
                input_planes,
                output_planes,
                input_planes * output_planes * KERNEL_TAPS
            )));
        }
        if bias.len() != output_planes {
            return Err(Error::Model(format!(
                "{} biases for {} output planes",
                bias.len(),
                output_planes
            )));
        }
        Ok(Self {
            input_planes,
            output_planes,
            weights,
            bias,
        })
    }

    fn from_raw(index: usize, raw: RawLayer) -> Result<Self> {
        if raw.kernel_w != KERNEL_SIZE || raw.kernel_h != KERNEL_SIZE {
            return Err(Error::Model(format!(
                "layer {}: {}x{} kernels are not supported, expected 3x3",
                index, raw.kernel_w, raw.kernel_h
            )));
        }
        if raw.weight.len() != raw.output_planes {
            return Err(Error::Model(format!(
                "layer {}: {} weight groups for {} output planes",
                index,
                raw.weight.len(),
                raw.output_planes
            )));
        }

        let mut weights = Vec::with_capacity(raw.output_planes * raw.input_planes * KERNEL_TAPS);
        for out in &raw.weight {
            if out.len() != raw.input_planes {
                return Err(Error::Model(format!(
                    "layer {}: {} kernels per output plane, expected {}",
                    index,
                    out.len(),
                    raw.input_planes
                )));
            }
            for kernel in out {
                if kernel.len() != KERNEL_SIZE || kernel.iter().any(|r| r.len() != KERNEL_SIZE) {
                    return Err(Error::Model(format!("layer {}: malformed 3x3 kernel", index)));
                }
                weights.extend(kernel.iter().flatten());
            }
        }

        Self::new(raw.input_planes, raw.output_planes, weights, raw.bias)
            .map_err(|e| match e {
                Error::Model(msg) => Error::Model(format!("layer {}: {}", index, msg)),
                other => other,
            })
    }

    pub fn input_planes(&self) -> usize {
        self.input_planes
    }

    pub fn output_planes(&self) -> usize {
        self.output_planes
    }

    fn kernel(&self, out: usize, input: usize) -> &[f32] {
        let start = (out * self.input_planes + input) * KERNEL_TAPS;
        &self.weights[start..start + KERNEL_TAPS]
    }

    /// Valid 3x3 convolution of `input` (`w` x `h` per plane) into `output`
    /// (`w - 2` x `h - 2` per plane)
    fn convolve(&self, input: &[f32], w: usize, h: usize, output: &mut [f32]) {
        let (ow, oh) = (w - 2, h - 2);
        for o in 0..self.output_planes {
            let out = &mut output[o * ow * oh..(o + 1) * ow * oh];
            out.fill(self.bias[o]);

            for i in 0..self.input_planes {
                let k = self.kernel(o, i);
                let plane = &input[i * w * h..(i + 1) * w * h];
                for y in 0..oh {
                    let r0 = &plane[y * w..(y + 1) * w];
                    let r1 = &plane[(y + 1) * w..(y + 2) * w];
                    let r2 = &plane[(y + 2) * w..(y + 3) * w];
                    let row = &mut out[y * ow..(y + 1) * ow];
                    for (x, acc) in row.iter_mut().enumerate() {
                        *acc += k[0] * r0[x]
                            + k[1] * r0[x + 1]
                            + k[2] * r0[x + 2]
                            + k[3] * r1[x]
                            + k[4] * r1[x + 1]
                            + k[5] * r1[x + 2]
                            + k[6] * r2[x]
                            + k[7] * r2[x + 1]
                            + k[8] * r2[x + 2];
                    }
                }
            }
        }
    }
}

/// Validated stack of layers, one plane in and one plane out
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    layers: Vec<Layer>,
}

impl Model {
    pub fn from_layers(layers: Vec<Layer>) -> Result<Self> {
        let (first, last) = match (layers.first(), layers.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::Model("model has no layers".into())),
        };
        if first.input_planes != 1 {
            return Err(Error::Model(format!(
                "first layer takes {} planes, expected 1",
                first.input_planes
            )));
        }
        if last.output_planes != 1 {
            return Err(Error::Model(format!(
                "last layer produces {} planes, expected 1",
                last.output_planes
            )));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].output_planes != pair[1].input_planes {
                return Err(Error::Model(format!(
                    "layer {} produces {} planes but layer {} takes {}",
                    i,
                    pair[0].output_planes,
                    i + 1,
                    pair[1].input_planes
                )));
            }
        }
        Ok(Self { layers })
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let raw: Vec<RawLayer> = serde_json::from_str(data)?;
        let layers = raw
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Layer::from_raw(i, raw))
            .collect::<Result<Vec<_>>>()?;
        Self::from_layers(layers)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Model(format!("failed to read model {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&data)
    }

    /// Single linear layer that passes samples through unchanged
    pub fn identity() -> Self {
        let mut weights = vec![0.0; KERNEL_TAPS];
        weights[KERNEL_TAPS / 2] = 1.0;
        Self {
            layers: vec![Layer {
                input_planes: 1,
                output_planes: 1,
                weights,
                bias: vec![0.0],
            }],
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Widest intermediate, in planes
    fn max_planes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.input_planes.max(l.output_planes))
            .max()
            .unwrap_or(1)
    }
}

fn try_alloc(len: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| Error::Allocation(format!("{} engine samples: {}", len, e)))?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// Convolutional engine with working buffers sized once for its resolution
pub struct ConvNetEngine {
    model: Model,
    resolution: Resolution,
    /// Each layer trims one sample per side, so the input is padded by the depth
    pad: usize,
    front: Vec<f32>,
    back: Vec<f32>,
}

impl ConvNetEngine {
    pub fn new(model: Model, resolution: Resolution) -> Result<Self> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(Error::Config(format!(
                "engine resolution {} must be non-empty",
                resolution
            )));
        }

        let pad = model.layers.len();
        let padded = (resolution.width as usize + 2 * pad) * (resolution.height as usize + 2 * pad);
        let len = padded * model.max_planes();

        tracing::debug!(
            "ConvNet engine for {}: {} layers, {} working samples per buffer",
            resolution,
            model.layers.len(),
            len
        );

        Ok(Self {
            front: try_alloc(len)?,
            back: try_alloc(len)?,
            model,
            resolution,
            pad,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    fn padded_dims(&self) -> (usize, usize) {
        (
            self.resolution.width as usize + 2 * self.pad,
            self.resolution.height as usize + 2 * self.pad,
        )
    }

    /// Copy `src` into the front buffer with edge replication
    fn load_input(&mut self, src: PlaneRef<'_>) {
        let (pw, ph) = self.padded_dims();
        let pad = self.pad as isize;
        let (w, h) = (src.width() as isize, src.height() as isize);

        for y in 0..ph {
            let row = src.row((y as isize - pad).clamp(0, h - 1) as usize);
            let out = &mut self.front[y * pw..(y + 1) * pw];
            for (x, o) in out.iter_mut().enumerate() {
                *o = row[(x as isize - pad).clamp(0, w - 1) as usize];
            }
        }
    }

    /// Run every layer and write the final plane into `dst`
    fn run(&mut self, dst: &mut PlaneMut<'_>) {
        let (mut w, mut h) = self.padded_dims();
        let Self {
            model, front, back, ..
        } = self;
        let count = model.layers.len();

        for (i, layer) in model.layers.iter().enumerate() {
            let (ow, oh) = (w - 2, h - 2);
            let input = &front[..layer.input_planes * w * h];
            let output = &mut back[..layer.output_planes * ow * oh];
            layer.convolve(input, w, h, output);

            if i + 1 < count {
                for v in output.iter_mut() {
                    if *v < 0.0 {
                        *v *= LEAKY_SLOPE;
                    }
                }
            }

            std::mem::swap(front, back);
            w = ow;
            h = oh;
        }

        for y in 0..h {
            dst.row_mut(y).copy_from_slice(&front[y * w..(y + 1) * w]);
        }
    }
}

impl UpscaleEngine for ConvNetEngine {
    fn name(&self) -> &str {
        "convnet"
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn process(&mut self, mut dst: PlaneMut<'_>, src: PlaneRef<'_>, mode: EnhanceMode) -> Result<()> {
        check_plane(self.resolution, src.width(), src.height())?;
        check_plane(self.resolution, dst.width(), dst.height())?;
        let passes = mode.passes();
        if passes == 0 {
            return Err(Error::Enhance("refinement needs at least one pass".into()));
        }

        self.load_input(src);
        self.run(&mut dst);
        for _ in 1..passes {
            self.load_input(dst.as_plane());
            self.run(&mut dst);
        }
        Ok(())
    }
}
