//! Path generation diagnostics: timing, counts, and other metrics for each
//! stage.
//!
//! Every call to [`path_generation_with_diagnostics`] collects diagnostics
//! alongside the result. Time is read through the [`Clock`] trait so the
//! core never touches a platform clock itself; callers pass a real clock
//! (the CLI wraps `std::time::Instant`) or [`NoClock`] when they only want
//! the counts.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationParameters;
use crate::segment::Segmenter;
use crate::types::{Frame, PathResult, PipelineError, RunConfig};

/// Source of monotonic time.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Run `stage` and measure it with `clock`.
pub(crate) fn timed<C: Clock, T, E>(
    clock: &C,
    stage: impl FnOnce() -> Result<T, E>,
) -> Result<(T, Duration), E> {
    let start = clock.now();
    let value = stage()?;
    Ok((value, clock.elapsed(&start)))
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single path generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathDiagnostics {
    /// Foreground segmentation (absent when synthesis ran on a given mask).
    pub segmentation: Option<StageDiagnostics>,
    /// Pixel scale estimation.
    pub scale: StageDiagnostics,
    /// Binarization and boundary extraction.
    pub contours: StageDiagnostics,
    /// Boundary stroke with safety margin.
    pub margin: StageDiagnostics,
    /// Scan line sampling.
    pub sampling: StageDiagnostics,
    /// Zig-zag ordering.
    pub ordering: StageDiagnostics,
    /// Projection to plate coordinates.
    pub projection: StageDiagnostics,
    /// Visualization rendering.
    pub render: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PathSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

impl StageDiagnostics {
    pub(crate) const fn new(duration: Duration, metrics: StageMetrics) -> Self {
        Self { duration, metrics }
    }
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Foreground segmentation.
    Segmentation {
        /// Border band width in pixels.
        border_px: u32,
        /// Foreground threshold.
        threshold: u8,
        /// Number of foreground pixels.
        foreground_pixels: u64,
        /// Total pixel count.
        total_pixels: u64,
    },
    /// Pixel scale estimation.
    Scale {
        /// Mean millimeters per pixel.
        pixmm: f64,
        /// Top, bottom, left and right edge ratios.
        edge_ratios: [f64; 4],
    },
    /// Boundary extraction.
    Contours {
        /// Number of boundaries.
        boundary_count: usize,
        /// Number of outer boundaries.
        outer_count: usize,
        /// Total boundary pixels.
        point_count: usize,
    },
    /// Margin rasterization.
    Margin {
        /// Stroke width in pixels.
        stroke_px: u32,
        /// Painted pixels on the canvas.
        painted_pixels: u64,
    },
    /// Scan line sampling.
    Sampling {
        /// Line step in pixels.
        skip: u32,
        /// Lines visited.
        sampled_lines: usize,
        /// Lines with at least one crossing.
        lines_with_hits: usize,
        /// Crossing points kept.
        crossing_count: usize,
    },
    /// Zig-zag ordering.
    Ordering {
        /// Points in the ordered path.
        point_count: usize,
        /// Largest step between consecutive points (pixels).
        max_step_px: f64,
    },
    /// Plate projection.
    Projection {
        /// Points projected.
        point_count: usize,
        /// Plate bounding box `[min_x, min_y, max_x, max_y]` in millimeters.
        extent_mm: [f64; 4],
    },
    /// Visualization.
    Render {
        /// Path stroke width in pixels.
        line_width: f32,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    /// Frame width in pixels.
    pub image_width: u32,
    /// Frame height in pixels.
    pub image_height: u32,
    /// Estimated millimeters per pixel.
    pub pixmm: f64,
    /// Number of region boundaries.
    pub boundary_count: usize,
    /// Points in the final path.
    pub path_point_count: usize,
}

impl PathDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Path Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}  |  {:.4} mm/px",
            self.summary.image_width, self.summary.image_height, self.summary.pixmm,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Boundaries: {}  |  Path points: {}",
            self.summary.boundary_count, self.summary.path_point_count,
        ));

        lines.join("\n")
    }

    /// Stages that ran, in execution order.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = Vec::with_capacity(8);
        if let Some(ref s) = self.segmentation {
            stages.push(("Segmentation", s));
        }
        stages.extend([
            ("Scale", &self.scale),
            ("Contours", &self.contours),
            ("Margin", &self.margin),
            ("Sampling", &self.sampling),
            ("Ordering", &self.ordering),
            ("Projection", &self.projection),
            ("Render", &self.render),
        ]);
        stages
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Segmentation {
            border_px,
            threshold,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let share = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("border={border_px}px thresh={threshold} fg={foreground_pixels} ({share:.1}%)")
        }
        StageMetrics::Scale { pixmm, edge_ratios } => {
            let [top, bottom, left, right] = edge_ratios;
            format!("{pixmm:.4} mm/px (t={top:.4} b={bottom:.4} l={left:.4} r={right:.4})")
        }
        StageMetrics::Contours {
            boundary_count,
            outer_count,
            point_count,
        } => format!(
            "{boundary_count} boundaries ({outer_count} outer, {} holes), {point_count} pts",
            boundary_count - outer_count
        ),
        StageMetrics::Margin {
            stroke_px,
            painted_pixels,
        } => format!("stroke={stroke_px}px painted={painted_pixels}"),
        StageMetrics::Sampling {
            skip,
            sampled_lines,
            lines_with_hits,
            crossing_count,
        } => format!(
            "skip={skip}px lines={sampled_lines} hit={lines_with_hits} crossings={crossing_count}"
        ),
        StageMetrics::Ordering {
            point_count,
            max_step_px,
        } => format!("{point_count} pts, max step {max_step_px:.1}px"),
        StageMetrics::Projection {
            point_count,
            extent_mm,
        } => {
            let [min_x, min_y, max_x, max_y] = extent_mm;
            format!(
                "{point_count} pts, X {min_x:.1}..{max_x:.1} mm, Y {min_y:.1}..{max_y:.1} mm"
            )
        }
        StageMetrics::Render { line_width } => format!("line={line_width}px"),
    }
}

/// Count pixels with value 255.
pub(crate) fn count_set_pixels(image: &image::GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == 255)))
        .sum()
}

/// Segment, synthesize and project, recording diagnostics for every stage.
///
/// This is [`path_generation`](crate::path_generation) with an explicit
/// [`Segmenter`] and a [`Clock`] for timing.
///
/// # Errors
///
/// Returns [`PipelineError::PathGeneration`] for an invalid `config`,
/// [`PipelineError::Segmentation`] if the frames cannot be compared and
/// [`PipelineError::PathGeneration`] if no path can be synthesized.
pub fn path_generation_with_diagnostics<C: Clock>(
    calib: &CalibrationParameters,
    object: &Frame,
    background: &Frame,
    config: &RunConfig,
    segmenter: &Segmenter,
    clock: &C,
) -> Result<(PathResult, PathDiagnostics), PipelineError> {
    let total_start = clock.now();
    config.validate()?;

    let (mask, seg_duration) = timed(clock, || segmenter.segment(background, object, config.threshold))?;
    let foreground_pixels = count_set_pixels(&mask);
    tracing::debug!(foreground_pixels, "segmented object frame");
    let segmentation = StageDiagnostics::new(
        seg_duration,
        StageMetrics::Segmentation {
            border_px: segmenter.border_px,
            threshold: config.threshold,
            foreground_pixels,
            total_pixels: u64::from(mask.width()) * u64::from(mask.height()),
        },
    );

    let (result, mut diagnostics) = crate::synthesize::synthesize_with_diagnostics(&mask, object, calib, config, clock)?;
    diagnostics.segmentation = Some(segmentation);
    diagnostics.total_duration = clock.elapsed(&total_start);

    tracing::info!(
        points = result.world_path.len(),
        pixmm = result.pixmm,
        "path generated"
    );
    Ok((result, diagnostics))
}
