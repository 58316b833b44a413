//! Built-in jerk-limited online generator.
//!
//! Every step first tries to capture the target with one quintic polynomial
//! per joint, all sharing the shortest duration that keeps velocity,
//! acceleration and jerk inside the limits. A captured plan is followed until
//! the step runs out or the target is reached. When the request that follows
//! continues from the state this generator returned, toward the same target
//! under the same limits, the cached plan is resumed instead of re-planned.
//!
//! A target in motion is a hand-off point rather than a place to stop, so
//! for those the plan that lands exactly at the end of the step is preferred
//! whenever it fits. A state this generator returned part-way through a plan
//! is therefore reproduced exactly when it is requested as a target again.
//!
//! When no quintic fits, typically because the joints are still accelerating
//! away from the target, every joint brakes toward rest in fixed sub-cycles
//! and capture is retried every few cycles.

use crate::{
    limits::LimitSet,
    otg::{KinematicState, Otg, OtgRequest, OtgResponse, OtgStatus},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod brake;
mod quintic;

use brake::brake;
use quintic::{Boundary, Quintic};

pub const DEFAULT_CYCLE: f64 = 1e-3;
pub const DEFAULT_CAPTURE_INTERVAL: u32 = 20;
pub const DEFAULT_MAX_DURATION: f64 = 1e3;
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Shortest plan duration tried by the search.
pub const MIN_PLAN_DURATION: f64 = 1e-3;
const DURATION_GROWTH: f64 = 1.25;
const DURATION_BISECTIONS: usize = 40;
/// Relative slack on the limits when checking a given plan or state. The
/// duration search itself works against the exact limits.
const LIMIT_MARGIN: f64 = 1e-9;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GeneratorConfigError {
    #[error("cycle must be positive and finite, got {0}")]
    Cycle(f64),
    #[error("capture interval must be at least one cycle")]
    CaptureInterval,
    #[error("max duration must be finite and at least {MIN_PLAN_DURATION} s, got {0}")]
    MaxDuration(f64),
    #[error("tolerance must be finite and non-negative, got {0}")]
    Tolerance(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Sub-cycle used while braking, in seconds.
    pub cycle: f64,
    /// Braking cycles between two capture attempts.
    pub capture_interval: u32,
    /// Longest plan the capture search considers, in seconds.
    pub max_duration: f64,
    /// Distance below which the current state counts as the target.
    pub tolerance: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cycle: DEFAULT_CYCLE,
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            max_duration: DEFAULT_MAX_DURATION,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), GeneratorConfigError> {
        if !(self.cycle.is_finite() && self.cycle > 0.0) {
            return Err(GeneratorConfigError::Cycle(self.cycle));
        }
        if self.capture_interval == 0 {
            return Err(GeneratorConfigError::CaptureInterval);
        }
        if !(self.max_duration.is_finite() && self.max_duration >= MIN_PLAN_DURATION) {
            return Err(GeneratorConfigError::MaxDuration(self.max_duration));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(GeneratorConfigError::Tolerance(self.tolerance));
        }
        Ok(())
    }
}

/// Synchronized quintics, one per joint.
#[derive(Clone, Debug)]
struct Plan {
    joints: Vec<Quintic>,
    duration: f64,
}

impl Plan {
    /// The plan of length `duration`, if it stays inside `limits` widened by
    /// the relative `margin`.
    fn fit(
        current: &KinematicState,
        target: &KinematicState,
        limits: &LimitSet,
        duration: f64,
        margin: f64,
    ) -> Option<Self> {
        let mut joints = Vec::with_capacity(current.dofs());
        for joint in 0..current.dofs() {
            let quintic = Quintic::new(
                boundary(current, joint),
                boundary(target, joint),
                duration,
            );
            let peaks = quintic.peaks();
            let within = |value: f64, limit: f64| value <= limit * (1.0 + margin);
            if !(within(peaks.velocity, limits.max_velocity[joint])
                && within(peaks.acceleration, limits.max_acceleration[joint])
                && within(peaks.jerk, limits.max_jerk[joint]))
            {
                return None;
            }
            joints.push(quintic);
        }
        Some(Self { joints, duration })
    }

    fn state_at(&self, t: f64) -> KinematicState {
        let mut state = KinematicState::zeros(self.joints.len());
        for (joint, quintic) in self.joints.iter().enumerate() {
            let sample = quintic.sample(t);
            state.position[joint] = sample.position;
            state.velocity[joint] = sample.velocity;
            state.acceleration[joint] = sample.acceleration;
        }
        state
    }
}

fn boundary(state: &KinematicState, joint: usize) -> Boundary {
    Boundary {
        position: state.position[joint],
        velocity: state.velocity[joint],
        acceleration: state.acceleration[joint],
    }
}

/// A plan in progress, valid while requests continue from `state`.
#[derive(Clone, Debug)]
struct Resume {
    plan: Plan,
    offset: f64,
    state: KinematicState,
    target: KinematicState,
    limits: LimitSet,
}

impl Resume {
    fn continues(&self, request: &OtgRequest<'_>) -> bool {
        request.current == &self.state
            && request.target == &self.target
            && request.limits == &self.limits
    }
}

#[derive(Clone, Debug, Default)]
pub struct JerkLimitedOtg {
    config: GeneratorConfig,
    resume: Option<Resume>,
}

impl JerkLimitedOtg {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            resume: None,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn check(&self, request: &OtgRequest<'_>) -> Result<(), OtgStatus> {
        let OtgRequest {
            current,
            target,
            limits,
            step_duration,
        } = *request;
        let dofs = current.dofs();
        let well_formed = current.is_consistent()
            && target.is_consistent()
            && target.dofs() == dofs
            && limits.dofs() == dofs
            && limits.is_valid()
            && current.is_finite()
            && target.is_finite()
            && step_duration.is_finite()
            && step_duration > 0.0
            && self.config.validate().is_ok();
        if !well_formed {
            return Err(OtgStatus::ErrorInvalidInput);
        }

        let exceeds = |state: &KinematicState| {
            (0..dofs).any(|joint| {
                state.velocity[joint].abs() > limits.max_velocity[joint] * (1.0 + LIMIT_MARGIN)
                    || state.acceleration[joint].abs()
                        > limits.max_acceleration[joint] * (1.0 + LIMIT_MARGIN)
            })
        };
        if exceeds(current) || exceeds(target) {
            return Err(OtgStatus::ErrorLimitViolation);
        }
        Ok(())
    }

    fn reached(&self, current: &KinematicState, target: &KinematicState) -> bool {
        let tolerance = self.config.tolerance;
        let close = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(a, b)| (a - b).abs() <= tolerance);
        close(&current.position, &target.position)
            && close(&current.velocity, &target.velocity)
            && close(&current.acceleration, &target.acceleration)
    }

    /// A plan from `current` to `target` with `available` seconds left in the
    /// step.
    ///
    /// Moving targets take the plan ending exactly at the end of the step when
    /// it fits. Otherwise the shortest plan found wins, with the plan ending at
    /// the end of the step as a fallback for narrow feasible ranges the search
    /// steps over.
    fn capture(
        &self,
        current: &KinematicState,
        target: &KinematicState,
        limits: &LimitSet,
        available: f64,
    ) -> Option<Plan> {
        let landing = || {
            if available >= MIN_PLAN_DURATION && available <= self.config.max_duration {
                Plan::fit(current, target, limits, available, LIMIT_MARGIN)
            } else {
                None
            }
        };
        if !at_rest(target) {
            if let Some(plan) = landing() {
                return Some(plan);
            }
        }
        match self.shortest(current, target, limits) {
            Some(plan) if plan.duration <= available => Some(plan),
            shortest => landing().or(shortest),
        }
    }

    /// Shortest plan from `current` to `target` on the search grid, if any
    /// fits the limits.
    fn shortest(
        &self,
        current: &KinematicState,
        target: &KinematicState,
        limits: &LimitSet,
    ) -> Option<Plan> {
        let mut below = None;
        let mut duration = MIN_PLAN_DURATION;
        while duration <= self.config.max_duration {
            if let Some(plan) = Plan::fit(current, target, limits, duration, 0.0) {
                let Some(mut lo) = below else {
                    return Some(plan);
                };
                let (mut hi, mut best) = (duration, plan);
                for _ in 0..DURATION_BISECTIONS {
                    let mid = 0.5 * (lo + hi);
                    match Plan::fit(current, target, limits, mid, 0.0) {
                        Some(plan) => {
                            hi = mid;
                            best = plan;
                        }
                        None => lo = mid,
                    }
                }
                return Some(best);
            }
            below = Some(duration);
            duration *= DURATION_GROWTH;
        }
        None
    }

    /// Follows `plan` from `offset` for what remains of the step after
    /// `elapsed`.
    fn follow(
        &mut self,
        plan: Plan,
        offset: f64,
        elapsed: f64,
        request: &OtgRequest<'_>,
    ) -> OtgResponse {
        let available = request.step_duration - elapsed;
        let left = plan.duration - offset;
        if left <= available {
            return OtgResponse {
                status: OtgStatus::Finished,
                state: request.target.clone(),
                elapsed: elapsed + left,
            };
        }

        let offset = offset + available;
        let state = plan.state_at(offset);
        if !state.is_finite() {
            return OtgResponse::rejected(request, OtgStatus::ErrorExecutionTimeCalculation);
        }
        self.resume = Some(Resume {
            plan,
            offset,
            state: state.clone(),
            target: request.target.clone(),
            limits: request.limits.clone(),
        });
        OtgResponse {
            status: OtgStatus::Working,
            state,
            elapsed: request.step_duration,
        }
    }

    fn brake_cycle(&self, state: &mut KinematicState, limits: &LimitSet, dt: f64) {
        for joint in 0..state.dofs() {
            let next = brake(
                boundary(state, joint),
                limits.max_velocity[joint],
                limits.max_acceleration[joint],
                limits.max_jerk[joint],
                dt,
            );
            state.position[joint] = next.position;
            state.velocity[joint] = next.velocity;
            state.acceleration[joint] = next.acceleration;
        }
    }
}

fn at_rest(state: &KinematicState) -> bool {
    state
        .velocity
        .iter()
        .chain(&state.acceleration)
        .all(|v| *v == 0.0)
}

impl Otg for JerkLimitedOtg {
    /// Forgets the plan in progress.
    fn reset(&mut self) {
        self.resume = None;
    }

    fn step(&mut self, request: &OtgRequest<'_>) -> OtgResponse {
        let resume = self.resume.take();
        if let Err(status) = self.check(request) {
            return OtgResponse::rejected(request, status);
        }
        if let Some(resume) = resume.filter(|resume| resume.continues(request)) {
            return self.follow(resume.plan, resume.offset, 0.0, request);
        }
        if self.reached(request.current, request.target) {
            return OtgResponse {
                status: OtgStatus::Finished,
                state: request.target.clone(),
                elapsed: 0.0,
            };
        }

        let step_duration = request.step_duration;
        let mut state = request.current.clone();
        let mut elapsed = 0.0;
        loop {
            let available = step_duration - elapsed;
            if let Some(plan) = self.capture(&state, request.target, request.limits, available) {
                return self.follow(plan, 0.0, elapsed, request);
            }
            if at_rest(&state) {
                tracing::debug!(elapsed, "no plan reaches the target from rest");
                return OtgResponse::rejected(request, OtgStatus::ErrorExecutionTimeCalculation);
            }
            tracing::trace!(elapsed, "no plan fits, braking");
            for _ in 0..self.config.capture_interval {
                let remaining = step_duration - elapsed;
                if remaining <= step_duration * f64::EPSILON {
                    if !state.is_finite() {
                        return OtgResponse::rejected(
                            request,
                            OtgStatus::ErrorExecutionTimeCalculation,
                        );
                    }
                    return OtgResponse {
                        status: OtgStatus::Working,
                        state,
                        elapsed: step_duration,
                    };
                }
                let dt = self.config.cycle.min(remaining);
                self.brake_cycle(&mut state, request.limits, dt);
                elapsed += dt;
            }
        }
    }
}
