//! Online trajectory generator contract.
//!
//! An OTG takes a current and a target kinematic state plus limits and
//! advances the current state by one control step. The smoothing loop only
//! ever talks to a generator through [`Otg::step`].

use crate::limits::LimitSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position, velocity and acceleration over the active joints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
}

impl KinematicState {
    pub fn zeros(dofs: usize) -> Self {
        Self {
            position: vec![0.0; dofs],
            velocity: vec![0.0; dofs],
            acceleration: vec![0.0; dofs],
        }
    }

    /// A state at rest at `position`.
    pub fn at_rest(position: Vec<f64>) -> Self {
        let dofs = position.len();
        Self {
            position,
            velocity: vec![0.0; dofs],
            acceleration: vec![0.0; dofs],
        }
    }

    pub fn dofs(&self) -> usize {
        self.position.len()
    }

    pub fn is_consistent(&self) -> bool {
        self.velocity.len() == self.position.len() && self.acceleration.len() == self.position.len()
    }

    pub fn is_finite(&self) -> bool {
        self.position
            .iter()
            .chain(&self.velocity)
            .chain(&self.acceleration)
            .all(|v| v.is_finite())
    }

    /// Euclidean norm of the velocity across all joints.
    pub fn speed(&self) -> f64 {
        self.velocity.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Outcome of a single generator step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtgStatus {
    /// The step completed without reaching the target.
    Working,
    /// The target state was reached within the step.
    Finished,
    ErrorInvalidInput,
    /// The current or target state lies outside the limits.
    ErrorLimitViolation,
    ErrorExecutionTimeCalculation,
}

impl OtgStatus {
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Working | Self::Finished)
    }
}

impl fmt::Display for OtgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Working => "working",
            Self::Finished => "finished",
            Self::ErrorInvalidInput => "invalid input",
            Self::ErrorLimitViolation => "limit violation",
            Self::ErrorExecutionTimeCalculation => "execution time calculation failed",
        };
        f.write_str(s)
    }
}

/// Input of one generator step.
#[derive(Clone, Copy, Debug)]
pub struct OtgRequest<'a> {
    pub current: &'a KinematicState,
    pub target: &'a KinematicState,
    pub limits: &'a LimitSet,
    pub step_duration: f64,
}

impl OtgRequest<'_> {
    pub fn dofs(&self) -> usize {
        self.current.dofs()
    }
}

/// Relative rounding allowed on a reported elapsed time past the step end.
const ELAPSED_SLACK: f64 = 1e-9;

/// Output of one generator step.
#[derive(Clone, Debug, PartialEq)]
pub struct OtgResponse {
    pub status: OtgStatus,
    /// State reached at the end of the step.
    pub state: KinematicState,
    /// Time consumed by the step. Equal to the step duration unless the
    /// target was reached earlier.
    pub elapsed: f64,
}

impl OtgResponse {
    /// A response that reports `status` and leaves the current state as is.
    pub fn rejected(request: &OtgRequest<'_>, status: OtgStatus) -> Self {
        Self {
            status,
            state: request.current.clone(),
            elapsed: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == OtgStatus::Finished
    }

    /// True when the reached state matches `request` in size, is finite, and
    /// the reported time lies within the step.
    pub fn fits(&self, request: &OtgRequest<'_>) -> bool {
        let step = request.step_duration;
        self.state.is_consistent()
            && self.state.dofs() == request.limits.dofs()
            && self.state.is_finite()
            && self.elapsed.is_finite()
            && self.elapsed >= 0.0
            && self.elapsed <= step + step * ELAPSED_SLACK
    }
}

pub trait Otg {
    fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse;

    /// Drops whatever the generator carries over between steps. Called at
    /// the start of every smoothing pass.
    fn reset(&mut self) {}
}

impl<T: Otg + ?Sized> Otg for &mut T {
    fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
        (**self).step(request)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<T: Otg + ?Sized> Otg for Box<T> {
    fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
        (**self).step(request)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_euclidean() {
        let state = KinematicState {
            position: vec![0.0, 0.0],
            velocity: vec![3.0, -4.0],
            acceleration: vec![0.0, 0.0],
        };
        assert_eq!(state.speed(), 5.0);
    }

    #[test]
    fn only_working_and_finished_are_ok() {
        assert!(OtgStatus::Working.is_ok());
        assert!(OtgStatus::Finished.is_ok());
        assert!(!OtgStatus::ErrorInvalidInput.is_ok());
        assert!(!OtgStatus::ErrorLimitViolation.is_ok());
        assert!(!OtgStatus::ErrorExecutionTimeCalculation.is_ok());
    }

    #[test]
    fn responses_must_fit_the_request() {
        let current = KinematicState::zeros(2);
        let limits = LimitSet::uniform(2, 1.0, 1.0, 10.0);
        let request = OtgRequest {
            current: &current,
            target: &current,
            limits: &limits,
            step_duration: 0.5,
        };
        let good = OtgResponse {
            status: OtgStatus::Working,
            state: KinematicState::zeros(2),
            elapsed: 0.5,
        };
        assert!(good.fits(&request));

        let short = OtgResponse {
            state: KinematicState::zeros(1),
            ..good.clone()
        };
        assert!(!short.fits(&request));

        let mut nan = good.clone();
        nan.state.velocity[1] = f64::NAN;
        assert!(!nan.fits(&request));

        for elapsed in [-0.1, 0.6, f64::NAN] {
            let response = OtgResponse {
                elapsed,
                ..good.clone()
            };
            assert!(!response.fits(&request), "{elapsed}");
        }
    }

    #[test]
    fn consistency_checks_lengths() {
        let mut state = KinematicState::at_rest(vec![1.0, 2.0]);
        assert!(state.is_consistent());
        state.acceleration.pop();
        assert!(!state.is_consistent());
    }
}
