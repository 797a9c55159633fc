//! Operator workflow: capture background, capture object, compute, send.
//!
//! Each state is its own type and every transition consumes the previous
//! state, so core calls can only be made from the state that allows them:
//!
//! ```rust
//! # use std::sync::Arc;
//! # use zigscan_pipeline::session::{Idle, PathSink};
//! # use zigscan_pipeline::{CalibrationParameters, Frame, RunConfig, WorldPoint};
//! # fn run<S: PathSink>(calib: Arc<CalibrationParameters>, bg: Frame, obj: Frame, sink: &mut S)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let computed = Idle::new(calib)
//!     .capture_background(bg)
//!     .capture_object(obj)
//!     .compute_path(&RunConfig::default())?;
//! let sent = computed.send(sink, 2001)?;
//! let _ready_for_next = sent.next_sample();
//! # Ok(())
//! # }
//! ```
//!
//! Failed transitions hand the previous state back inside the error, so an
//! operator can retry with a different [`RunConfig`] or resend without
//! recapturing anything.

use std::sync::Arc;

use crate::calibration::CalibrationParameters;
use crate::diagnostics::NoClock;
use crate::segment::Segmenter;
use crate::types::{Frame, PathResult, PipelineError, RunConfig, WorldPoint};

/// Destination for a finished scan path, such as the device controller.
pub trait PathSink {
    /// Transport failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deliver an ordered plate path for `sample_id`.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the path could not be delivered.
    fn send(&mut self, sample_id: i32, path: &[WorldPoint]) -> Result<(), Self::Error>;
}

/// What every state carries.
#[derive(Clone)]
struct Context {
    calib: Arc<CalibrationParameters>,
    segmenter: Segmenter,
}

// ───────────────────────── Idle ──────────────────────────

/// Nothing captured yet.
#[must_use = "session states are consumed by advancing; call .capture_background() to continue"]
pub struct Idle {
    ctx: Context,
}

impl Idle {
    /// Start a session with the default [`Segmenter`].
    pub fn new(calib: Arc<CalibrationParameters>) -> Self {
        Self {
            ctx: Context {
                calib,
                segmenter: Segmenter::default(),
            },
        }
    }

    /// Use different segmentation constants.
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.ctx.segmenter = segmenter;
        self
    }

    /// The shared calibration.
    #[must_use]
    pub fn calibration(&self) -> &CalibrationParameters {
        &self.ctx.calib
    }

    /// Store the empty-plate reference frame.
    pub fn capture_background(self, background: Frame) -> BackgroundCaptured {
        tracing::debug!(width = background.width(), height = background.height(), "background captured");
        BackgroundCaptured {
            ctx: self.ctx,
            background,
        }
    }
}

// ───────────────────────── BackgroundCaptured ──────────────────────────

/// Background frame held; waiting for an object.
#[must_use = "session states are consumed by advancing; call .capture_object() to continue"]
pub struct BackgroundCaptured {
    ctx: Context,
    background: Frame,
}

impl BackgroundCaptured {
    /// The stored background frame.
    #[must_use]
    pub const fn background(&self) -> &Frame {
        &self.background
    }

    /// Store the frame with the object on the plate.
    pub fn capture_object(self, object: Frame) -> ObjectCaptured {
        tracing::debug!(width = object.width(), height = object.height(), "object captured");
        ObjectCaptured {
            ctx: self.ctx,
            background: self.background,
            object,
        }
    }

    /// Replace the background frame.
    pub fn recapture_background(self, background: Frame) -> Self {
        Self { background, ..self }
    }

    /// Drop the background and start over.
    pub fn reset(self) -> Idle {
        Idle { ctx: self.ctx }
    }
}

// ───────────────────────── ObjectCaptured ──────────────────────────

/// Both frames held; a path can be computed.
#[must_use = "session states are consumed by advancing; call .compute_path() to continue"]
pub struct ObjectCaptured {
    ctx: Context,
    background: Frame,
    object: Frame,
}

impl ObjectCaptured {
    /// The stored background frame.
    #[must_use]
    pub const fn background(&self) -> &Frame {
        &self.background
    }

    /// The stored object frame.
    #[must_use]
    pub const fn object(&self) -> &Frame {
        &self.object
    }

    /// Run [`path_generation`](crate::path_generation) on the held frames.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeFailed`] carrying this state back together with the
    /// pipeline error, so the caller can retry with another config.
    pub fn compute_path(self, config: &RunConfig) -> Result<PathComputed, ComputeFailed> {
        match crate::diagnostics::path_generation_with_diagnostics(
            &self.ctx.calib,
            &self.object,
            &self.background,
            config,
            &self.ctx.segmenter,
            &NoClock,
        ) {
            Ok((result, _)) => Ok(PathComputed {
                ctx: self.ctx,
                background: self.background,
                object: self.object,
                config: config.clone(),
                result,
            }),
            Err(error) => {
                tracing::warn!(%error, recoverable = error.is_recoverable(), "path computation failed");
                Err(ComputeFailed { state: self, error })
            }
        }
    }

    /// Replace the object frame.
    pub fn recapture_object(self, object: Frame) -> Self {
        Self { object, ..self }
    }

    /// Drop the object frame, keeping the background.
    pub fn discard_object(self) -> BackgroundCaptured {
        BackgroundCaptured {
            ctx: self.ctx,
            background: self.background,
        }
    }
}

/// [`ObjectCaptured::compute_path`] failed.
#[derive(thiserror::Error)]
#[error("path computation failed: {error}")]
pub struct ComputeFailed {
    /// The state to retry from.
    pub state: ObjectCaptured,
    /// Why it failed.
    #[source]
    pub error: PipelineError,
}

impl std::fmt::Debug for ComputeFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeFailed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

// ───────────────────────── PathComputed ──────────────────────────

/// A path is ready for review and sending.
#[must_use = "session states are consumed by advancing; call .send() or .adjust() to continue"]
pub struct PathComputed {
    ctx: Context,
    background: Frame,
    object: Frame,
    config: RunConfig,
    result: PathResult,
}

impl PathComputed {
    /// The computed path, visualization and mask.
    #[must_use]
    pub const fn result(&self) -> &PathResult {
        &self.result
    }

    /// The config the path was computed with.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Discard the path to recompute with different parameters.
    pub fn adjust(self) -> ObjectCaptured {
        ObjectCaptured {
            ctx: self.ctx,
            background: self.background,
            object: self.object,
        }
    }

    /// Deliver the world path to `sink` under `sample_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SendFailed`] carrying this state back together with the
    /// sink's error, so the caller can resend.
    pub fn send<S: PathSink>(self, sink: &mut S, sample_id: i32) -> Result<Sent, SendFailed<S::Error>> {
        if let Err(error) = sink.send(sample_id, &self.result.world_path) {
            tracing::warn!(%error, sample_id, "sending path failed");
            return Err(SendFailed { state: self, error });
        }
        tracing::info!(sample_id, points = self.result.world_path.len(), "path sent");
        Ok(Sent {
            ctx: self.ctx,
            background: self.background,
            object: self.object,
            config: self.config,
            result: self.result,
            sample_id,
        })
    }
}

/// [`PathComputed::send`] failed.
#[derive(thiserror::Error)]
#[error("sending the path failed: {error}")]
pub struct SendFailed<E: std::error::Error + 'static> {
    /// The state to resend from.
    pub state: PathComputed,
    /// Why it failed.
    #[source]
    pub error: E,
}

impl<E: std::error::Error + 'static> std::fmt::Debug for SendFailed<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendFailed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

// ───────────────────────── Sent ──────────────────────────

/// The path has been delivered.
#[must_use = "session states are consumed by advancing; call .next_sample() or .reset() to continue"]
pub struct Sent {
    ctx: Context,
    background: Frame,
    object: Frame,
    config: RunConfig,
    result: PathResult,
    sample_id: i32,
}

impl Sent {
    /// The delivered path.
    #[must_use]
    pub const fn result(&self) -> &PathResult {
        &self.result
    }

    /// The sample identifier the path was sent under.
    #[must_use]
    pub const fn sample_id(&self) -> i32 {
        self.sample_id
    }

    /// The config the path was computed with.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The object frame of the delivered sample.
    #[must_use]
    pub const fn object(&self) -> &Frame {
        &self.object
    }

    /// The background frame, kept for the next sample.
    #[must_use]
    pub const fn background(&self) -> &Frame {
        &self.background
    }

    /// Keep the background and wait for the next object.
    pub fn next_sample(self) -> BackgroundCaptured {
        BackgroundCaptured {
            ctx: self.ctx,
            background: self.background,
        }
    }

    /// Drop everything and start over.
    pub fn reset(self) -> Idle {
        Idle { ctx: self.ctx }
    }
}
