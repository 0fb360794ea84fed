//! Luma enhancement engines
//!
//! An engine holds working state sized to one output resolution and is not
//! reentrant. It is shared across frames through an [`EngineHandle`], which
//! serializes every call behind a single lock.

pub mod convnet;

use crate::error::{Error, Result};
use crate::plane::{PlaneMut, PlaneRef};
use crate::types::Resolution;

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub use convnet::{ConvNetEngine, Layer, Model};

/// How an engine treats one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnhanceMode {
    /// Run the network once over the plane
    #[default]
    SinglePass,
    /// Feed the output back through the network `passes` times
    Refine { passes: u32 },
}

impl EnhanceMode {
    pub fn passes(&self) -> u32 {
        match self {
            EnhanceMode::SinglePass => 1,
            EnhanceMode::Refine { passes } => *passes,
        }
    }
}

/// Trait for luma enhancement engines
pub trait UpscaleEngine: Send {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Resolution the engine's working state is sized for
    fn resolution(&self) -> Resolution;

    /// Enhance `src` into `dst`; both must match [`resolution`](Self::resolution)
    fn process(&mut self, dst: PlaneMut<'_>, src: PlaneRef<'_>, mode: EnhanceMode) -> Result<()>;
}

/// Shared, lock-guarded engine
///
/// Cloning the handle shares the engine. The lock is held only for the
/// duration of one [`enhance`](Self::enhance) call.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<Mutex<Box<dyn UpscaleEngine>>>,
    resolution: Resolution,
    name: Arc<str>,
}

impl EngineHandle {
    pub fn new<E: UpscaleEngine + 'static>(engine: E) -> Self {
        let resolution = engine.resolution();
        let name: Arc<str> = Arc::from(engine.name());
        let engine: Box<dyn UpscaleEngine> = Box::new(engine);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            resolution,
            name,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the engine under its lock
    pub fn enhance(&self, dst: PlaneMut<'_>, src: PlaneRef<'_>, mode: EnhanceMode) -> Result<()> {
        let mut engine = self.engine.lock();
        engine.process(dst, src, mode)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name)
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Create the stock engine for `resolution`
///
/// Loads a waifu2x-style JSON model from `model`, or uses the identity model
/// when none is given.
pub fn create_engine(model: Option<&Path>, resolution: Resolution) -> Result<EngineHandle> {
    let model = match model {
        Some(path) => {
            let model = Model::from_file(path)?;
            tracing::info!(
                "Loaded model {} ({} layers)",
                path.display(),
                model.layers().len()
            );
            model
        }
        None => {
            tracing::info!("No model configured, using identity model");
            Model::identity()
        }
    };

    let engine = ConvNetEngine::new(model, resolution)?;
    Ok(EngineHandle::new(engine))
}

/// Check a plane against the engine resolution
pub(crate) fn check_plane(resolution: Resolution, width: usize, height: usize) -> Result<()> {
    if width != resolution.width as usize || height != resolution.height as usize {
        return Err(Error::Enhance(format!(
            "plane is {}x{}, engine is sized for {}",
            width, height, resolution
        )));
    }
    Ok(())
}
