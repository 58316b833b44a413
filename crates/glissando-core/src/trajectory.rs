//! Trajectory data model.
//!
//! A [`Trajectory`] is an ordered list of full robot states ([`Waypoint`]s)
//! together with the [`JointGroup`] that selects which state variables are
//! actuated. The smoothing pass only reads and writes the group's variables.

use crate::otg::KinematicState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("trajectory has no waypoints")]
    Empty,
    #[error("joint group {0:?} has no joints")]
    EmptyGroup(String),
    #[error("joint {joint:?} maps to variable {variable} but waypoints only have {variables}")]
    VariableOutOfRange {
        joint: String,
        variable: usize,
        variables: usize,
    },
    #[error("waypoint {waypoint} has {found} positions, expected {expected}")]
    InconsistentWaypoint {
        waypoint: usize,
        expected: usize,
        found: usize,
    },
    #[error("waypoint {waypoint} has {found} {field}, expected {expected}")]
    MismatchedDerivative {
        waypoint: usize,
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("waypoint {waypoint} contains a non-finite value")]
    NonFinite { waypoint: usize },
    #[error("waypoint {waypoint} starts at {time_from_start}s, before its predecessor")]
    TimeReversal { waypoint: usize, time_from_start: f64 },
    #[error("joint {joint:?} has invalid {field} bound {value}")]
    InvalidBound {
        joint: String,
        field: &'static str,
        value: f64,
    },
}

pub type Result<T, E = TrajectoryError> = std::result::Result<T, E>;

/// Optional per-joint motion bounds. Missing entries fall back to the
/// defaults in [`crate::limits`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_acceleration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jerk: Option<f64>,
}

impl JointBounds {
    pub const fn new(max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            max_velocity: Some(max_velocity),
            max_acceleration: Some(max_acceleration),
            max_jerk: Some(max_jerk),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    /// Index of this joint's variable in every waypoint's state vectors.
    pub variable: usize,
    #[serde(default)]
    pub bounds: JointBounds,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointGroup {
    pub name: String,
    pub joints: Vec<Joint>,
}

impl JointGroup {
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        Self {
            name: name.into(),
            joints,
        }
    }

    /// A group of `count` joints mapped onto variables `0..count`, all
    /// sharing the same bounds.
    pub fn serial(name: impl Into<String>, count: usize, bounds: JointBounds) -> Self {
        let joints = (0..count)
            .map(|variable| Joint {
                name: format!("joint_{variable}"),
                variable,
                bounds,
            })
            .collect();
        Self::new(name, joints)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn variable_indices(&self) -> Vec<usize> {
        self.joints.iter().map(|joint| joint.variable).collect()
    }
}

/// A single robot state along the trajectory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub positions: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocities: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerations: Option<Vec<f64>>,
    #[serde(default)]
    pub time_from_start: f64,
}

impl Waypoint {
    pub fn new(positions: Vec<f64>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn with_velocities(mut self, velocities: Vec<f64>) -> Self {
        self.velocities = Some(velocities);
        self
    }

    pub fn with_accelerations(mut self, accelerations: Vec<f64>) -> Self {
        self.accelerations = Some(accelerations);
        self
    }

    pub fn at(mut self, time_from_start: f64) -> Self {
        self.time_from_start = time_from_start;
        self
    }

    pub fn variable_count(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, variable: usize) -> f64 {
        self.positions[variable]
    }

    /// Velocity of `variable`, zero when the waypoint carries no velocities.
    pub fn velocity(&self, variable: usize) -> f64 {
        self.velocities.as_ref().map_or(0.0, |v| v[variable])
    }

    /// Acceleration of `variable`, zero when the waypoint carries no
    /// accelerations.
    pub fn acceleration(&self, variable: usize) -> f64 {
        self.accelerations.as_ref().map_or(0.0, |a| a[variable])
    }

    pub fn set_position(&mut self, variable: usize, value: f64) {
        self.positions[variable] = value;
    }

    pub fn set_velocity(&mut self, variable: usize, value: f64) {
        let len = self.positions.len();
        self.velocities.get_or_insert_with(|| vec![0.0; len])[variable] = value;
    }

    pub fn set_acceleration(&mut self, variable: usize, value: f64) {
        let len = self.positions.len();
        self.accelerations.get_or_insert_with(|| vec![0.0; len])[variable] = value;
    }

    fn is_finite(&self) -> bool {
        let finite = |values: &[f64]| values.iter().all(|v| v.is_finite());
        finite(&self.positions)
            && self.velocities.as_deref().is_none_or(finite)
            && self.accelerations.as_deref().is_none_or(finite)
            && self.time_from_start.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    group: JointGroup,
    #[serde(default)]
    waypoints: Vec<Waypoint>,
}

impl Trajectory {
    pub fn new(group: JointGroup) -> Self {
        Self {
            group,
            waypoints: Vec::new(),
        }
    }

    pub fn with_waypoints(group: JointGroup, waypoints: Vec<Waypoint>) -> Self {
        Self { group, waypoints }
    }

    /// Builds an untimed trajectory from bare joint positions.
    pub fn from_positions(group: JointGroup, positions: Vec<Vec<f64>>) -> Self {
        let waypoints = positions.into_iter().map(Waypoint::new).collect();
        Self::with_waypoints(group, waypoints)
    }

    pub fn push(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    pub fn group(&self) -> &JointGroup {
        &self.group
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn waypoint_mut(&mut self, index: usize) -> Option<&mut Waypoint> {
        self.waypoints.get_mut(index)
    }

    pub fn time_from_start(&self, index: usize) -> f64 {
        self.waypoints[index].time_from_start
    }

    pub fn set_time_from_start(&mut self, index: usize, time: f64) {
        self.waypoints[index].time_from_start = time;
    }

    /// Time of the last waypoint relative to the first.
    pub fn duration(&self) -> f64 {
        match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => last.time_from_start - first.time_from_start,
            _ => 0.0,
        }
    }

    /// Mean duration between consecutive waypoints, zero for trajectories
    /// with fewer than two waypoints.
    pub fn average_segment_duration(&self) -> f64 {
        if self.waypoints.len() < 2 {
            return 0.0;
        }
        self.duration() / (self.waypoints.len() - 1) as f64
    }

    /// Reads the group's variables of waypoint `index`. Missing velocities
    /// and accelerations read as zero.
    pub fn group_state(&self, index: usize) -> KinematicState {
        let waypoint = &self.waypoints[index];
        let mut state = KinematicState::zeros(self.group.len());
        for (i, joint) in self.group.joints.iter().enumerate() {
            state.position[i] = waypoint.position(joint.variable);
            state.velocity[i] = waypoint.velocity(joint.variable);
            state.acceleration[i] = waypoint.acceleration(joint.variable);
        }
        state
    }

    /// Writes `state` into the group's variables of waypoint `index`.
    pub fn set_group_state(&mut self, index: usize, state: &KinematicState) {
        let waypoint = &mut self.waypoints[index];
        for (i, joint) in self.group.joints.iter().enumerate() {
            waypoint.set_position(joint.variable, state.position[i]);
            waypoint.set_velocity(joint.variable, state.velocity[i]);
            waypoint.set_acceleration(joint.variable, state.acceleration[i]);
        }
    }

    /// Largest absolute velocity reached by each group joint.
    pub fn peak_velocities(&self) -> Vec<f64> {
        self.peaks(Waypoint::velocity)
    }

    /// Largest absolute acceleration reached by each group joint.
    pub fn peak_accelerations(&self) -> Vec<f64> {
        self.peaks(Waypoint::acceleration)
    }

    fn peaks(&self, read: fn(&Waypoint, usize) -> f64) -> Vec<f64> {
        self.group
            .joints
            .iter()
            .map(|joint| {
                self.waypoints
                    .iter()
                    .map(|w| read(w, joint.variable).abs())
                    .fold(0.0, f64::max)
            })
            .collect()
    }

    /// Checks the structural consistency the smoothing pass relies on.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.waypoints.first() else {
            return Err(TrajectoryError::Empty);
        };
        if self.group.is_empty() {
            return Err(TrajectoryError::EmptyGroup(self.group.name.clone()));
        }

        let variables = first.variable_count();
        for joint in &self.group.joints {
            if joint.variable >= variables {
                return Err(TrajectoryError::VariableOutOfRange {
                    joint: joint.name.clone(),
                    variable: joint.variable,
                    variables,
                });
            }
            let bounds = [
                ("max_velocity", joint.bounds.max_velocity),
                ("max_acceleration", joint.bounds.max_acceleration),
                ("max_jerk", joint.bounds.max_jerk),
            ];
            for (field, value) in bounds {
                match value {
                    Some(value) if !(value.is_finite() && value > 0.0) => {
                        return Err(TrajectoryError::InvalidBound {
                            joint: joint.name.clone(),
                            field,
                            value,
                        });
                    }
                    _ => {}
                }
            }
        }

        let mut previous_time = f64::NEG_INFINITY;
        for (index, waypoint) in self.waypoints.iter().enumerate() {
            if waypoint.variable_count() != variables {
                return Err(TrajectoryError::InconsistentWaypoint {
                    waypoint: index,
                    expected: variables,
                    found: waypoint.variable_count(),
                });
            }
            let derivatives = [
                ("velocities", &waypoint.velocities),
                ("accelerations", &waypoint.accelerations),
            ];
            for (field, values) in derivatives {
                match values {
                    Some(values) if values.len() != variables => {
                        return Err(TrajectoryError::MismatchedDerivative {
                            waypoint: index,
                            field,
                            expected: variables,
                            found: values.len(),
                        });
                    }
                    _ => {}
                }
            }
            if !waypoint.is_finite() {
                return Err(TrajectoryError::NonFinite { waypoint: index });
            }
            if waypoint.time_from_start < previous_time {
                return Err(TrajectoryError::TimeReversal {
                    waypoint: index,
                    time_from_start: waypoint.time_from_start,
                });
            }
            previous_time = waypoint.time_from_start;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm() -> JointGroup {
        JointGroup::serial("arm", 2, JointBounds::new(1.0, 2.0, 10.0))
    }

    #[test]
    fn missing_derivatives_read_as_zero() {
        let waypoint = Waypoint::new(vec![0.5, -0.5]);
        assert_eq!(waypoint.velocity(1), 0.0);
        assert_eq!(waypoint.acceleration(0), 0.0);
    }

    #[test]
    fn setting_a_derivative_materializes_the_vector() {
        let mut waypoint = Waypoint::new(vec![0.0, 0.0, 0.0]);
        waypoint.set_velocity(1, 2.0);
        assert_eq!(waypoint.velocities, Some(vec![0.0, 2.0, 0.0]));
        assert!(waypoint.accelerations.is_none());
    }

    #[test]
    fn group_state_follows_variable_indices() {
        let group = JointGroup::new(
            "wrist",
            vec![
                Joint {
                    name: "b".into(),
                    variable: 2,
                    bounds: JointBounds::default(),
                },
                Joint {
                    name: "a".into(),
                    variable: 0,
                    bounds: JointBounds::default(),
                },
            ],
        );
        let mut trajectory = Trajectory::from_positions(group, vec![vec![1.0, 7.0, 3.0]]);
        let mut state = trajectory.group_state(0);
        assert_eq!(state.position, vec![3.0, 1.0]);

        state.velocity = vec![0.25, 0.5];
        trajectory.set_group_state(0, &state);
        let waypoint = trajectory.waypoint(0).unwrap();
        assert_eq!(waypoint.positions, vec![1.0, 7.0, 3.0]);
        assert_eq!(waypoint.velocities, Some(vec![0.5, 0.0, 0.25]));
    }

    #[test]
    fn average_segment_duration() {
        let trajectory = Trajectory::with_waypoints(
            arm(),
            vec![
                Waypoint::new(vec![0.0, 0.0]),
                Waypoint::new(vec![1.0, 0.0]).at(0.5),
                Waypoint::new(vec![1.0, 1.0]).at(1.5),
            ],
        );
        assert_eq!(trajectory.duration(), 1.5);
        assert_eq!(trajectory.average_segment_duration(), 0.75);
        assert_eq!(Trajectory::new(arm()).average_segment_duration(), 0.0);
    }

    #[test]
    fn validate_rejects_empty() {
        assert_eq!(Trajectory::new(arm()).validate(), Err(TrajectoryError::Empty));
        let empty_group = Trajectory::from_positions(JointGroup::new("none", vec![]), vec![vec![]]);
        assert_eq!(
            empty_group.validate(),
            Err(TrajectoryError::EmptyGroup("none".into()))
        );
    }

    #[test]
    fn validate_rejects_inconsistent_waypoints() {
        let trajectory =
            Trajectory::from_positions(arm(), vec![vec![0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        assert_eq!(
            trajectory.validate(),
            Err(TrajectoryError::InconsistentWaypoint {
                waypoint: 1,
                expected: 2,
                found: 3,
            })
        );

        let trajectory = Trajectory::with_waypoints(
            arm(),
            vec![Waypoint::new(vec![0.0, 0.0]).with_velocities(vec![0.0])],
        );
        assert!(matches!(
            trajectory.validate(),
            Err(TrajectoryError::MismatchedDerivative {
                field: "velocities",
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let trajectory = Trajectory::from_positions(arm(), vec![vec![0.0, f64::NAN]]);
        assert_eq!(
            trajectory.validate(),
            Err(TrajectoryError::NonFinite { waypoint: 0 })
        );

        let group = JointGroup::serial("arm", 1, JointBounds::new(-1.0, 1.0, 1.0));
        let trajectory = Trajectory::from_positions(group, vec![vec![0.0]]);
        assert!(matches!(
            trajectory.validate(),
            Err(TrajectoryError::InvalidBound {
                field: "max_velocity",
                ..
            })
        ));

        let group = JointGroup::serial("arm", 3, JointBounds::default());
        let trajectory = Trajectory::from_positions(group, vec![vec![0.0, 0.0]]);
        assert!(matches!(
            trajectory.validate(),
            Err(TrajectoryError::VariableOutOfRange { variable: 2, .. })
        ));
    }

    #[test]
    fn peaks_use_absolute_values() {
        let trajectory = Trajectory::with_waypoints(
            arm(),
            vec![
                Waypoint::new(vec![0.0, 0.0]).with_velocities(vec![-0.75, 0.1]),
                Waypoint::new(vec![0.0, 0.0])
                    .with_velocities(vec![0.5, 0.2])
                    .with_accelerations(vec![0.0, -3.0]),
            ],
        );
        assert_eq!(trajectory.peak_velocities(), vec![0.75, 0.2]);
        assert_eq!(trajectory.peak_accelerations(), vec![0.0, 3.0]);
    }
}
