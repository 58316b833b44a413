//! Retrying a lagging pass with a longer control period.
//!
//! A smoothing pass reports [`SmoothingError::LaggingMotion`] when the step
//! duration is too short for the generator to keep up. This policy restores
//! the original trajectory and runs the pass again with the step duration
//! stretched by a constant factor, until it succeeds or the attempts run out.

use crate::{
    limits::Scaling,
    otg::Otg,
    smoothing::{Result, SmoothingError, SmoothingReport, Smoother},
    trajectory::Trajectory,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSION_FACTOR: f64 = 1.1;
pub const DEFAULT_MAX_ATTEMPTS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationExtension {
    /// Multiplier applied to the step duration after each lagging pass.
    pub factor: f64,
    /// Passes run before giving up, including the first.
    pub max_attempts: usize,
}

impl Default for DurationExtension {
    fn default() -> Self {
        Self {
            factor: DEFAULT_EXTENSION_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl DurationExtension {
    pub fn is_valid(&self) -> bool {
        self.factor.is_finite() && self.factor > 1.0 && self.max_attempts > 0
    }
}

/// Smooths `trajectory`, stretching the step duration whenever the pass lags.
///
/// Errors other than lag are returned straight away. On any failure the
/// trajectory is left exactly as it was passed in. Every attempt is a full
/// pass and starts by resetting the generator, so nothing carries over from
/// a lagging attempt.
pub fn smooth_with_extension<O: Otg>(
    smoother: &mut Smoother<O>,
    trajectory: &mut Trajectory,
    scaling: Scaling,
    extension: DurationExtension,
) -> Result<SmoothingReport> {
    trajectory.validate()?;
    scaling.validate()?;
    if trajectory.len() < 2 {
        return smoother.apply(trajectory, scaling);
    }
    let mut step_duration = smoother.step_duration(trajectory)?;
    let original = trajectory.clone();
    let max_attempts = extension.max_attempts.max(1);

    let mut attempt = 1;
    loop {
        match smoother.apply_with_step_duration(trajectory, scaling, step_duration) {
            Ok(mut report) => {
                report.attempts = attempt;
                return Ok(report);
            }
            Err(err @ SmoothingError::LaggingMotion { .. }) if attempt < max_attempts => {
                let extended = step_duration * extension.factor;
                tracing::info!(
                    attempt,
                    step_duration,
                    extended,
                    error = %err,
                    "extending step duration"
                );
                trajectory.clone_from(&original);
                step_duration = extended;
                attempt += 1;
            }
            Err(err) => {
                trajectory.clone_from(&original);
                return Err(err);
            }
        }
    }
}
