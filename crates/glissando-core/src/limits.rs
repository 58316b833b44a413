//! Per-joint motion limits and scaling.

use crate::trajectory::JointGroup;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Velocity used for joints without a velocity bound.
pub const DEFAULT_MAX_VELOCITY: f64 = 5.0;
/// Acceleration used for joints without an acceleration bound.
pub const DEFAULT_MAX_ACCELERATION: f64 = 10.0;
/// Jerk used for joints without a jerk bound.
pub const DEFAULT_MAX_JERK: f64 = 1000.0;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("{name} scaling factor {value} is outside (0, 1]")]
pub struct ScalingError {
    pub name: &'static str,
    pub value: f64,
}

/// Multipliers applied to the velocity and acceleration limits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    pub velocity: f64,
    pub acceleration: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            velocity: 1.0,
            acceleration: 1.0,
        }
    }
}

impl Scaling {
    pub const fn new(velocity: f64, acceleration: f64) -> Self {
        Self {
            velocity,
            acceleration,
        }
    }

    pub fn validate(&self) -> Result<(), ScalingError> {
        let factors = [
            ("velocity", self.velocity),
            ("acceleration", self.acceleration),
        ];
        for (name, value) in factors {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ScalingError { name, value });
            }
        }
        Ok(())
    }
}

/// Scaled limits for every joint of a group, in group order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitSet {
    pub max_velocity: Vec<f64>,
    pub max_acceleration: Vec<f64>,
    pub max_jerk: Vec<f64>,
}

impl LimitSet {
    /// The same limits for each of `dofs` joints.
    pub fn uniform(dofs: usize, max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            max_velocity: vec![max_velocity; dofs],
            max_acceleration: vec![max_acceleration; dofs],
            max_jerk: vec![max_jerk; dofs],
        }
    }

    /// Derives the limits of `group`. Velocity and acceleration are scaled,
    /// jerk is taken as is.
    pub fn from_group(group: &JointGroup, scaling: Scaling) -> Result<Self, ScalingError> {
        scaling.validate()?;
        let mut limits = Self::uniform(0, 0.0, 0.0, 0.0);
        for joint in &group.joints {
            let bounds = &joint.bounds;
            limits.max_velocity.push(
                bounds.max_velocity.unwrap_or(DEFAULT_MAX_VELOCITY) * scaling.velocity,
            );
            limits.max_acceleration.push(
                bounds.max_acceleration.unwrap_or(DEFAULT_MAX_ACCELERATION)
                    * scaling.acceleration,
            );
            limits
                .max_jerk
                .push(bounds.max_jerk.unwrap_or(DEFAULT_MAX_JERK));
        }
        Ok(limits)
    }

    pub fn dofs(&self) -> usize {
        self.max_velocity.len()
    }

    pub fn is_valid(&self) -> bool {
        let positive = |values: &[f64]| values.iter().all(|v| v.is_finite() && *v > 0.0);
        let dofs = self.dofs();
        self.max_acceleration.len() == dofs
            && self.max_jerk.len() == dofs
            && positive(&self.max_velocity)
            && positive(&self.max_acceleration)
            && positive(&self.max_jerk)
    }
}
