//! Waypoint-feedback smoothing.
//!
//! The pass seeds a [`FeedbackState`] from the first waypoint, then for every
//! following waypoint asks the generator for one control step toward it and
//! overwrites the waypoint with the state actually reached. Each step starts
//! exactly where the previous one ended.
//!
//! The pass is not atomic: when it fails part-way, waypoints before the
//! failure have already been rewritten. Callers that need the original back
//! should keep a copy (see [`crate::retry`]).

use crate::{
    jerk_limited::JerkLimitedOtg,
    limits::{LimitSet, Scaling, ScalingError},
    otg::{Otg, OtgStatus},
    trajectory::{Trajectory, TrajectoryError},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod duplicate;
mod lag;
mod seed;

pub use duplicate::{DEFAULT_DUPLICATE_TOLERANCE, is_duplicate};
pub use lag::{DEFAULT_LAG_TOLERANCE, DEFAULT_MIN_TARGET_SPEED, Lag, LagDetector};
pub use seed::FeedbackState;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(#[from] TrajectoryError),
    #[error(transparent)]
    InvalidScaling(#[from] ScalingError),
    #[error("no step duration configured and the trajectory carries no timing")]
    MissingStepDuration,
    #[error("invalid step duration {0}")]
    InvalidStepDuration(f64),
    #[error("generator failed toward waypoint {waypoint}: {status}")]
    Solver { waypoint: usize, status: OtgStatus },
    #[error("generator returned an unusable state toward waypoint {waypoint}")]
    InvalidResponse { waypoint: usize },
    #[error(
        "lagging motion toward waypoint {waypoint}: target speed {target_speed:.6}, achieved {achieved_speed:.6}"
    )]
    LaggingMotion {
        waypoint: usize,
        target_speed: f64,
        achieved_speed: f64,
    },
}

impl SmoothingError {
    /// True for errors detected before any waypoint was touched.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidTrajectory(_)
                | Self::InvalidScaling(_)
                | Self::MissingStepDuration
                | Self::InvalidStepDuration(_)
        )
    }
}

pub type Result<T, E = SmoothingError> = std::result::Result<T, E>;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Control period of one generator step. Falls back to the trajectory's
    /// average segment duration when unset.
    pub step_duration: Option<f64>,
    pub duplicate_tolerance: f64,
    pub lag: LagDetector,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            step_duration: None,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
            lag: LagDetector::default(),
        }
    }
}

/// Summary of a successful pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SmoothingReport {
    /// Generator invocations made by the final pass.
    pub solver_calls: usize,
    /// Waypoints copied forward without a generator call.
    pub skipped_duplicates: usize,
    pub step_duration: f64,
    /// Time of the last waypoint relative to the first.
    pub duration: f64,
    /// Passes run, including the successful one.
    pub attempts: usize,
}

/// Runs smoothing passes with an injected generator.
pub struct Smoother<O> {
    otg: O,
    config: SmoothingConfig,
}

impl<O: Otg> Smoother<O> {
    pub fn new(otg: O, config: SmoothingConfig) -> Self {
        Self { otg, config }
    }

    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    pub fn otg(&self) -> &O {
        &self.otg
    }

    pub fn into_otg(self) -> O {
        self.otg
    }

    /// The control period a pass over `trajectory` would use.
    pub fn step_duration(&self, trajectory: &Trajectory) -> Result<f64> {
        let step = match self.config.step_duration {
            Some(step) => step,
            None => {
                let average = trajectory.average_segment_duration();
                if average <= 0.0 {
                    return Err(SmoothingError::MissingStepDuration);
                }
                average
            }
        };
        if !(step.is_finite() && step > 0.0) {
            return Err(SmoothingError::InvalidStepDuration(step));
        }
        Ok(step)
    }

    /// Smooths `trajectory` in place.
    pub fn apply(&mut self, trajectory: &mut Trajectory, scaling: Scaling) -> Result<SmoothingReport> {
        trajectory.validate()?;
        scaling.validate()?;
        if trajectory.len() < 2 {
            tracing::debug!("trajectory has a single waypoint, nothing to smooth");
            return Ok(SmoothingReport {
                attempts: 1,
                ..SmoothingReport::default()
            });
        }
        let step_duration = self.step_duration(trajectory)?;
        self.apply_with_step_duration(trajectory, scaling, step_duration)
    }

    /// Smooths `trajectory` in place with an explicit control period,
    /// ignoring the configured one.
    pub fn apply_with_step_duration(
        &mut self,
        trajectory: &mut Trajectory,
        scaling: Scaling,
        step_duration: f64,
    ) -> Result<SmoothingReport> {
        trajectory.validate()?;
        if !(step_duration.is_finite() && step_duration > 0.0) {
            return Err(SmoothingError::InvalidStepDuration(step_duration));
        }
        let limits = LimitSet::from_group(trajectory.group(), scaling)?;
        let variables = trajectory.group().variable_indices();
        let mut feedback = FeedbackState::seed(trajectory)?;
        self.otg.reset();

        let mut report = SmoothingReport {
            step_duration,
            attempts: 1,
            ..SmoothingReport::default()
        };

        for index in 1..trajectory.len() {
            let previous_time = trajectory.time_from_start(index - 1);
            let duplicate = match (trajectory.waypoint(index - 1), trajectory.waypoint(index)) {
                (Some(previous), Some(next)) => {
                    is_duplicate(previous, next, &variables, self.config.duplicate_tolerance)
                }
                _ => false,
            };
            if duplicate {
                tracing::debug!(waypoint = index, "skipping duplicate waypoint");
                trajectory.set_group_state(index, &feedback.current);
                trajectory.set_time_from_start(index, previous_time);
                report.skipped_duplicates += 1;
                continue;
            }

            feedback.retarget(trajectory.group_state(index));
            let request = feedback.request(&limits, step_duration);
            let response = self.otg.step(&request);
            report.solver_calls += 1;

            if !response.status.is_ok() {
                tracing::warn!(waypoint = index, status = %response.status, "generator step failed");
                return Err(SmoothingError::Solver {
                    waypoint: index,
                    status: response.status,
                });
            }
            if !response.fits(&request) {
                tracing::warn!(
                    waypoint = index,
                    dofs = response.state.dofs(),
                    elapsed = response.elapsed,
                    "generator response does not fit the request"
                );
                return Err(SmoothingError::InvalidResponse { waypoint: index });
            }
            if let Some(lag) = self.config.lag.check(&request, &response) {
                tracing::warn!(
                    waypoint = index,
                    target_speed = lag.target_speed,
                    achieved_speed = lag.achieved_speed,
                    joint = ?lag.joint,
                    "lagging motion detected"
                );
                return Err(SmoothingError::LaggingMotion {
                    waypoint: index,
                    target_speed: lag.target_speed,
                    achieved_speed: lag.achieved_speed,
                });
            }

            tracing::debug!(
                waypoint = index,
                status = %response.status,
                elapsed = response.elapsed,
                "generator step"
            );
            trajectory.set_group_state(index, &response.state);
            trajectory.set_time_from_start(index, previous_time + response.elapsed);
            feedback.accept(&response);
        }

        report.duration = trajectory.duration();
        tracing::info!(
            waypoints = trajectory.len(),
            solver_calls = report.solver_calls,
            skipped = report.skipped_duplicates,
            duration = report.duration,
            "smoothing complete"
        );
        Ok(report)
    }
}

/// Smooths `trajectory` with the built-in generator and default settings.
///
/// The control period is the trajectory's average segment duration, so the
/// input must carry timing.
pub fn apply_smoothing(
    trajectory: &mut Trajectory,
    velocity_scale: f64,
    acceleration_scale: f64,
) -> Result<SmoothingReport> {
    let mut smoother = Smoother::new(JerkLimitedOtg::default(), SmoothingConfig::default());
    smoother.apply(trajectory, Scaling::new(velocity_scale, acceleration_scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        otg::{KinematicState, OtgRequest, OtgResponse},
        trajectory::{JointBounds, JointGroup, Waypoint},
    };

    /// Jumps straight to the target and records every request.
    #[derive(Default)]
    struct Teleport {
        requests: Vec<(KinematicState, KinematicState)>,
        resets: usize,
    }

    impl Otg for Teleport {
        fn reset(&mut self) {
            self.resets += 1;
        }

        fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
            self.requests
                .push((request.current.clone(), request.target.clone()));
            OtgResponse {
                status: OtgStatus::Finished,
                state: request.target.clone(),
                elapsed: request.step_duration,
            }
        }
    }

    /// Moves half way to the target each step.
    struct HalfWay;

    impl Otg for HalfWay {
        fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
            let mut state = request.current.clone();
            for (p, t) in state.position.iter_mut().zip(&request.target.position) {
                *p += 0.5 * (t - *p);
            }
            OtgResponse {
                status: OtgStatus::Working,
                state,
                elapsed: request.step_duration,
            }
        }
    }

    struct Refuse(OtgStatus);

    /// Reports success with a fixed state and elapsed time.
    struct Garbage {
        state: KinematicState,
        elapsed: f64,
    }

    impl Otg for Garbage {
        fn step(&mut self, _: &OtgRequest<'_>) -> OtgResponse {
            OtgResponse {
                status: OtgStatus::Working,
                state: self.state.clone(),
                elapsed: self.elapsed,
            }
        }
    }

    impl Otg for Refuse {
        fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
            OtgResponse::rejected(request, self.0)
        }
    }

    fn config(step: f64) -> SmoothingConfig {
        SmoothingConfig {
            step_duration: Some(step),
            ..SmoothingConfig::default()
        }
    }

    fn line(points: &[f64]) -> Trajectory {
        let group = JointGroup::serial("axis", 1, JointBounds::new(1.0, 1.0, 10.0));
        Trajectory::from_positions(group, points.iter().map(|p| vec![*p]).collect())
    }

    #[test]
    fn requests_chain_previous_output() {
        let mut trajectory = line(&[0.0, 1.0, 2.0, 3.0]);
        let mut smoother = Smoother::new(HalfWay, config(0.5));
        smoother.apply(&mut trajectory, Scaling::default()).unwrap();

        let positions: Vec<f64> = trajectory.waypoints().iter().map(|w| w.positions[0]).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.25, 2.125]);
        let times: Vec<f64> = trajectory.waypoints().iter().map(|w| w.time_from_start).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn seeded_request_starts_at_first_waypoint() {
        let mut trajectory = line(&[0.25, 1.0]);
        let mut smoother = Smoother::new(Teleport::default(), config(0.1));
        smoother.apply(&mut trajectory, Scaling::default()).unwrap();
        let requests = &smoother.otg().requests;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, KinematicState::at_rest(vec![0.25]));
        assert_eq!(requests[0].1, KinematicState::at_rest(vec![1.0]));
    }

    #[test]
    fn solver_failure_aborts() {
        let mut trajectory = line(&[0.0, 1.0, 2.0]);
        let mut smoother = Smoother::new(Refuse(OtgStatus::ErrorLimitViolation), config(0.1));
        let err = smoother.apply(&mut trajectory, Scaling::default()).unwrap_err();
        assert_eq!(
            err,
            SmoothingError::Solver {
                waypoint: 1,
                status: OtgStatus::ErrorLimitViolation,
            }
        );
        assert!(!err.is_invalid_input());
    }

    #[test]
    fn invalid_input_leaves_trajectory_untouched() {
        let mut trajectory = line(&[0.0, 1.0]);
        let original = trajectory.clone();
        let mut smoother = Smoother::new(Teleport::default(), config(0.1));

        let err = smoother
            .apply(&mut trajectory, Scaling::new(1.5, 1.0))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(trajectory, original);
        assert!(smoother.otg().requests.is_empty());
    }

    #[test]
    fn step_duration_falls_back_to_average_segment() {
        let group = JointGroup::serial("axis", 1, JointBounds::default());
        let trajectory = Trajectory::with_waypoints(
            group,
            vec![
                Waypoint::new(vec![0.0]),
                Waypoint::new(vec![1.0]).at(0.2),
                Waypoint::new(vec![2.0]).at(0.6),
            ],
        );
        let smoother = Smoother::new(Teleport::default(), SmoothingConfig::default());
        assert_eq!(smoother.step_duration(&trajectory), Ok(0.3));

        let untimed = line(&[0.0, 1.0]);
        assert_eq!(
            smoother.step_duration(&untimed),
            Err(SmoothingError::MissingStepDuration)
        );

        let smoother = Smoother::new(Teleport::default(), config(-1.0));
        assert_eq!(
            smoother.step_duration(&untimed),
            Err(SmoothingError::InvalidStepDuration(-1.0))
        );
    }

    #[test]
    fn duplicate_copies_previous_output() {
        let mut trajectory = line(&[0.0, 1.0, 1.0, 2.0]);
        let mut smoother = Smoother::new(HalfWay, config(1.0));
        let report = smoother.apply(&mut trajectory, Scaling::default()).unwrap();
        assert_eq!(report.solver_calls, 3);
        assert_eq!(report.skipped_duplicates, 0);

        // HalfWay leaves waypoint 1 at 0.5, so waypoint 2 is a real move.
        let mut trajectory = line(&[0.0, 1.0, 1.0, 2.0]);
        let mut smoother = Smoother::new(Teleport::default(), config(1.0));
        let report = smoother.apply(&mut trajectory, Scaling::default()).unwrap();
        assert_eq!(report.solver_calls, 2);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(trajectory.waypoint(2), trajectory.waypoint(1));
    }

    #[test]
    fn unusable_responses_are_rejected() {
        let cases = [
            (KinematicState::zeros(0), 0.1),
            (KinematicState::zeros(2), 0.1),
            (KinematicState::at_rest(vec![f64::NAN]), 0.1),
            (KinematicState::at_rest(vec![0.5]), -0.1),
            (KinematicState::at_rest(vec![0.5]), 0.2),
            (KinematicState::at_rest(vec![0.5]), f64::INFINITY),
        ];
        for (state, elapsed) in cases {
            let mut trajectory = line(&[0.0, 1.0]);
            let original = trajectory.clone();
            let mut smoother = Smoother::new(Garbage { state, elapsed }, config(0.1));
            let err = smoother.apply(&mut trajectory, Scaling::default()).unwrap_err();
            assert_eq!(err, SmoothingError::InvalidResponse { waypoint: 1 });
            assert!(!err.is_invalid_input());
            assert_eq!(trajectory, original);
        }
    }

    #[test]
    fn every_pass_resets_the_generator() {
        let mut smoother = Smoother::new(Teleport::default(), config(0.1));
        let mut trajectory = line(&[0.0, 1.0]);
        smoother.apply(&mut trajectory, Scaling::default()).unwrap();
        smoother.apply(&mut trajectory, Scaling::default()).unwrap();
        assert_eq!(smoother.otg().resets, 2);
        assert_eq!(smoother.otg().requests.len(), 2);
    }
}
