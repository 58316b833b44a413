//! Lagging-motion detection.
//!
//! A generator step that cannot reach its target within the step duration
//! may still report success. Two symptoms give it away: the achieved speed
//! falls short of a moving target's speed, or a joint that still has ground
//! to cover is moving away from its target position. Either indicates a
//! step duration that is too short for the limits.
//!
//! This is a heuristic. The thresholds are configurable because the right
//! values depend on the generator in use.

use crate::otg::{OtgRequest, OtgResponse};
use serde::{Deserialize, Serialize};

/// Target speeds at or below this count as a stop, so the speed shortfall
/// check does not apply to them.
pub const DEFAULT_MIN_TARGET_SPEED: f64 = 0.01;
/// Relative speed shortfall tolerated, and the distance and speed below
/// which a joint moving away from its target is ignored.
pub const DEFAULT_LAG_TOLERANCE: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagDetector {
    pub min_target_speed: f64,
    pub tolerance: f64,
}

impl Default for LagDetector {
    fn default() -> Self {
        Self {
            min_target_speed: DEFAULT_MIN_TARGET_SPEED,
            tolerance: DEFAULT_LAG_TOLERANCE,
        }
    }
}

/// Details of a detected lag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lag {
    /// Euclidean norm of the requested target velocity.
    pub target_speed: f64,
    /// Euclidean norm of the achieved velocity.
    pub achieved_speed: f64,
    /// Joint moving away from its target, when that is what gave the lag
    /// away.
    pub joint: Option<usize>,
}

impl LagDetector {
    pub fn check(&self, request: &OtgRequest<'_>, response: &OtgResponse) -> Option<Lag> {
        if response.is_finished() {
            return None;
        }

        let target_speed = request.target.speed();
        let achieved_speed = response.state.speed();
        let lag = |joint| Lag {
            target_speed,
            achieved_speed,
            joint,
        };

        if target_speed > self.min_target_speed
            && achieved_speed < target_speed * (1.0 - self.tolerance)
        {
            return Some(lag(None));
        }

        let reached = &response.state;
        let joints = request.target.position.iter().zip(&reached.position).zip(&reached.velocity);
        for (joint, ((&target, &position), &velocity)) in joints.enumerate() {
            let remaining = target - position;
            if remaining.abs() <= self.tolerance {
                continue;
            }
            if remaining.signum() * velocity < -self.tolerance {
                return Some(lag(Some(joint)));
            }
        }

        None
    }

    pub fn is_lagging(&self, request: &OtgRequest<'_>, response: &OtgResponse) -> bool {
        self.check(request, response).is_some()
    }
}
