//! Resize pipeline
//!
//! Setup resolves the configuration and derives every resize parameter once;
//! after that each frame is one compositor call. Frames may be processed from
//! any number of threads, and [`ResizePipeline::process_batch`] runs a pool of
//! scoped workers fed through a bounded channel. [`DenoisePipeline`] shares
//! the batch host but runs the engine at the source resolution.

use crate::config::{
    DenoiseConfig, NoiseLevel, ResizeConfig, ResolvedConfig, ResolvedDenoise,
};
use crate::enhance::{create_engine, EngineHandle, EnhanceMode};
use crate::error::{Error, Result};
use crate::processing::{
    compute_chroma_parameters, Filter, Planes, PlanesMut, ResizeCompositor, ResizeParameters,
    ScaleFactors, SeparableResampler,
};
use crate::types::{ChromaSiting, Frame, Resolution, SampleRange, Stats, VideoInfo};

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Every parameter derived at setup
#[derive(Debug, Clone, PartialEq)]
pub struct ResizePlan {
    pub source: VideoInfo,
    pub target: Resolution,
    /// Point pre-pass parameters
    pub luma: ResizeParameters,
    /// Chroma parameters, for formats with chroma
    pub chroma: Option<ResizeParameters>,
    pub scale: ScaleFactors,
    /// Configured luma kernel; the pre-pass itself is always point
    pub luma_filter: Filter,
    pub src_siting: ChromaSiting,
    pub dst_siting: ChromaSiting,
    pub mode: EnhanceMode,
}

impl ResizePlan {
    pub fn new(resolved: &ResolvedConfig) -> Self {
        let source = resolved.source;
        // the point pre-pass carries the luma filter parameters, which point ignores
        let pre_filter = Filter::point().with_params(resolved.filter.param_a, resolved.filter.param_b);
        let luma = ResizeParameters::luma(pre_filter, source.resolution, resolved.target, resolved.window);
        let chroma = source.format.has_chroma().then(|| {
            compute_chroma_parameters(
                &luma,
                source.format.subsampling(),
                resolved.src_siting,
                resolved.dst_siting,
                resolved.filter_uv,
            )
        });

        Self {
            source,
            target: resolved.target,
            scale: luma.scale_factors(),
            luma,
            chroma,
            luma_filter: resolved.filter,
            src_siting: resolved.src_siting,
            dst_siting: resolved.dst_siting,
            mode: resolved.mode,
        }
    }

    pub fn output_info(&self) -> VideoInfo {
        VideoInfo::new(self.target, self.source.format)
    }
}

fn describe(p: &ResizeParameters) -> String {
    format!(
        "{} {} -> {}, shift ({:.4}, {:.4}), window {:.2}x{:.2}",
        p.filter(),
        p.src(),
        p.dst(),
        p.shift_w(),
        p.shift_h(),
        p.subwidth(),
        p.subheight()
    )
}

impl std::fmt::Display for ResizePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "source:  {} {}", self.source.resolution, self.source.format)?;
        writeln!(f, "target:  {} {}", self.target, self.source.format)?;
        writeln!(
            f,
            "scale:   {:.4} x {:.4} (binding {:.4})",
            self.scale.horizontal,
            self.scale.vertical,
            self.scale.binding()
        )?;
        writeln!(f, "luma:    {}", describe(&self.luma))?;
        writeln!(f, "filter:  {}", self.luma_filter)?;
        if let Some(chroma) = &self.chroma {
            writeln!(f, "chroma:  {}", describe(chroma))?;
            writeln!(f, "siting:  {} -> {}", self.src_siting.name(), self.dst_siting.name())?;
        }
        write!(f, "passes:  {}", self.mode.passes())
    }
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    busy_nanos: AtomicU64,
}

impl Counters {
    /// Time one frame call and count its outcome
    fn record<T>(&self, index: u64, call: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = call();

        let elapsed = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
        self.busy_nanos.fetch_add(elapsed, Ordering::Relaxed);
        match &result {
            Ok(_) => {
                self.processed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Frame {} done in {:.2} ms", index, elapsed as f64 / 1e6);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn snapshot(&self) -> Stats {
        Stats {
            frames_processed: self.processed.load(Ordering::Relaxed),
            frames_failed: self.failed.load(Ordering::Relaxed),
            busy: Duration::from_nanos(self.busy_nanos.load(Ordering::Relaxed)),
        }
    }
}

fn check_geometry(frame: &Frame, expected: VideoInfo) -> Result<()> {
    if frame.info() != expected {
        return Err(Error::InvalidInput(format!(
            "frame {} is {} {}, pipeline expects {} {}",
            frame.index, frame.resolution, frame.format, expected.resolution, expected.format
        )));
    }
    Ok(())
}

/// Run `process` over `frames` on `workers` scoped threads
///
/// Output order matches input order. If any frame fails, the error of the
/// earliest failing frame is returned once every worker has finished.
fn run_batch<F>(frames: Vec<Frame>, workers: usize, process: F) -> Result<Vec<Frame>>
where
    F: Fn(&Frame) -> Result<Frame> + Sync,
{
    let count = frames.len();
    let workers = workers.clamp(1, count.max(1));

    let (job_tx, job_rx) = crossbeam_channel::bounded::<(usize, Frame)>(workers * 2);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, Result<Frame>)>();

    tracing::debug!("Batch of {} frames on {} workers", count, workers);

    let process = &process;
    std::thread::scope(|s| {
        for id in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                for (slot, frame) in job_rx.iter() {
                    let result = process(&frame);
                    if let Err(e) = &result {
                        tracing::warn!("Worker {} failed frame {}: {}", id, frame.index, e);
                    }
                    if result_tx.send((slot, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for job in frames.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                tracing::error!("All batch workers exited early");
                break;
            }
        }
        drop(job_tx);
    });

    let mut slots: Vec<Option<Frame>> = (0..count).map(|_| None).collect();
    let mut first_error: Option<(usize, Error)> = None;
    for (slot, result) in result_rx.try_iter() {
        match result {
            Ok(frame) => slots[slot] = Some(frame),
            Err(e) => {
                if first_error.as_ref().map_or(true, |(s, _)| slot < *s) {
                    first_error = Some((slot, e));
                }
            }
        }
    }

    if let Some((_, e)) = first_error {
        return Err(e);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, frame)| {
            frame.ok_or_else(|| Error::Internal(format!("batch slot {} has no result", i)))
        })
        .collect()
}

/// Resize-and-upscale pipeline for one source geometry
#[derive(Debug)]
pub struct ResizePipeline {
    plan: ResizePlan,
    compositor: ResizeCompositor,
    threads: usize,
    range: SampleRange,
    counters: Counters,
}

impl ResizePipeline {
    /// Set up a pipeline for `source` around an existing engine
    pub fn new(config: &ResizeConfig, source: VideoInfo, engine: EngineHandle) -> Result<Self> {
        let resolved = config.resolve(&source)?;
        Self::from_resolved(&resolved, engine)
    }

    pub fn from_resolved(resolved: &ResolvedConfig, engine: EngineHandle) -> Result<Self> {
        let plan = ResizePlan::new(resolved);

        let pre = SeparableResampler::new(plan.luma);
        let chroma = plan.chroma.map(SeparableResampler::new);
        let compositor = ResizeCompositor::new(pre, chroma, engine)?.with_mode(plan.mode);

        tracing::info!(
            "Resize pipeline: {} {} -> {} (scale {:.3}, engine {}, {} threads)",
            plan.source.format,
            plan.source.resolution,
            plan.target,
            plan.scale.binding(),
            compositor.engine().name(),
            resolved.threads
        );

        Ok(Self {
            plan,
            compositor,
            threads: resolved.threads,
            range: resolved.range,
            counters: Counters::default(),
        })
    }

    pub fn plan(&self) -> &ResizePlan {
        &self.plan
    }

    pub fn output_info(&self) -> VideoInfo {
        self.plan.output_info()
    }

    /// Configured worker count for batches
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Sample range for raw I/O of this clip
    pub fn range(&self) -> SampleRange {
        self.range
    }

    /// Resize one frame
    pub fn process_frame(&self, frame: &Frame) -> Result<Frame> {
        check_geometry(frame, self.plan.source)?;

        self.counters.record(frame.index, || {
            let mut output = Frame::new(self.plan.target, frame.format).with_index(frame.index);
            self.compositor
                .process(source_planes(frame)?, target_planes(&mut output)?)?;
            Ok(output)
        })
    }

    /// Resize `frames` on `workers` threads
    ///
    /// Output order matches input order. If any frame fails, the error of the
    /// earliest failing frame is returned once every worker has finished.
    pub fn process_batch(&self, frames: Vec<Frame>, workers: usize) -> Result<Vec<Frame>> {
        run_batch(frames, workers, |frame| self.process_frame(frame))
    }

    /// Current statistics
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }
}

fn source_planes(frame: &Frame) -> Result<Planes<'_>> {
    match frame.planes.as_slice() {
        [y] => Ok(Planes::Single(y.as_plane())),
        [y, u, v] => Ok(Planes::Planar {
            y: y.as_plane(),
            u: u.as_plane(),
            v: v.as_plane(),
        }),
        planes => Err(Error::InvalidInput(format!(
            "frame {} has {} planes",
            frame.index,
            planes.len()
        ))),
    }
}

fn target_planes(frame: &mut Frame) -> Result<PlanesMut<'_>> {
    match frame.planes.as_mut_slice() {
        [y] => Ok(PlanesMut::Single(y.as_plane_mut())),
        [y, u, v] => Ok(PlanesMut::Planar {
            y: y.as_plane_mut(),
            u: u.as_plane_mut(),
            v: v.as_plane_mut(),
        }),
        planes => Err(Error::Internal(format!("output frame has {} planes", planes.len()))),
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: ResizeConfig,
    source: Option<VideoInfo>,
    engine: Option<EngineHandle>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: ResizeConfig::default(),
            source: None,
            engine: None,
        }
    }

    pub fn config(mut self, config: ResizeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source(mut self, info: VideoInfo) -> Self {
        self.source = Some(info);
        self
    }

    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.config = self.config.with_resolution(width, height);
        self
    }

    pub fn filter_uv(mut self, filter: impl Into<String>) -> Self {
        self.config = self.config.with_filter_uv(filter);
        self
    }

    pub fn chroma_loc(mut self, chroma_loc: impl Into<String>) -> Self {
        self.config = self.config.with_chroma_loc(chroma_loc);
        self
    }

    pub fn model(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config = self.config.with_model(path);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.config = self.config.with_threads(threads);
        self
    }

    /// Use an existing engine instead of creating one from `model`
    pub fn engine(mut self, engine: EngineHandle) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn build(self) -> Result<ResizePipeline> {
        let source = self
            .source
            .ok_or_else(|| Error::Config("pipeline source geometry not set".into()))?;
        let resolved = self.config.resolve(&source)?;
        let engine = match self.engine {
            Some(engine) => engine,
            None => create_engine(resolved.model.as_deref(), resolved.target)?,
        };
        ResizePipeline::from_resolved(&resolved, engine)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Same-size denoise pipeline
///
/// Runs the engine over the luma plane at the source resolution; chroma is
/// passed through untouched.
#[derive(Debug)]
pub struct DenoisePipeline {
    source: VideoInfo,
    level: NoiseLevel,
    engine: EngineHandle,
    threads: usize,
    range: SampleRange,
    counters: Counters,
}

impl DenoisePipeline {
    /// Set up a denoise pipeline for `source` around an existing engine
    pub fn new(config: &DenoiseConfig, source: VideoInfo, engine: EngineHandle) -> Result<Self> {
        let resolved = config.resolve(&source)?;
        Self::from_resolved(&resolved, engine)
    }

    /// Set up with the engine loaded from the configured model directory
    pub fn from_config(config: &DenoiseConfig, source: VideoInfo) -> Result<Self> {
        let resolved = config.resolve(&source)?;
        let engine = create_engine(resolved.model.as_deref(), source.resolution)?;
        Self::from_resolved(&resolved, engine)
    }

    pub fn from_resolved(resolved: &ResolvedDenoise, engine: EngineHandle) -> Result<Self> {
        let source = resolved.source;
        if engine.resolution() != source.resolution {
            return Err(Error::Config(format!(
                "engine '{}' is sized for {}, denoise runs at the source resolution {}",
                engine.name(),
                engine.resolution(),
                source.resolution
            )));
        }

        tracing::info!(
            "Denoise pipeline: {} {} (level {:?}, engine {}, {} threads)",
            source.format,
            source.resolution,
            resolved.level,
            engine.name(),
            resolved.threads
        );

        Ok(Self {
            source,
            level: resolved.level,
            engine,
            threads: resolved.threads,
            range: resolved.range,
            counters: Counters::default(),
        })
    }

    pub fn level(&self) -> NoiseLevel {
        self.level
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn range(&self) -> SampleRange {
        self.range
    }

    /// Denoise one frame
    pub fn process_denoise(&self, frame: &Frame) -> Result<Frame> {
        check_geometry(frame, self.source)?;

        self.counters.record(frame.index, || {
            let mut output = frame.clone();
            self.engine
                .enhance(output.plane_mut(0), frame.plane(0), EnhanceMode::SinglePass)?;
            Ok(output)
        })
    }

    /// Denoise `frames` on `workers` threads, in input order
    pub fn process_batch(&self, frames: Vec<Frame>, workers: usize) -> Result<Vec<Frame>> {
        run_batch(frames, workers, |frame| self.process_denoise(frame))
    }

    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }
}
