// Feedback state handed from one generator step to the next

use super::SmoothingError;
use crate::{
    limits::LimitSet,
    otg::{KinematicState, OtgRequest, OtgResponse},
    trajectory::{Trajectory, TrajectoryError},
};

/// The state carried across generator steps.
///
/// `current` is always the state reached by the previous step, or the first
/// waypoint before any step ran. `target` is the waypoint being approached.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackState {
    pub current: KinematicState,
    pub target: KinematicState,
}

impl FeedbackState {
    /// Seeds the loop from the first waypoint with `current == target`.
    pub fn seed(trajectory: &Trajectory) -> Result<Self, SmoothingError> {
        if trajectory.is_empty() {
            return Err(TrajectoryError::Empty.into());
        }
        if trajectory.group().is_empty() {
            return Err(TrajectoryError::EmptyGroup(trajectory.group().name.clone()).into());
        }
        let state = trajectory.group_state(0);
        Ok(Self {
            current: state.clone(),
            target: state,
        })
    }

    /// Points the next step at `target`, starting from the current state.
    pub fn retarget(&mut self, target: KinematicState) {
        self.target = target;
    }

    /// Feeds the state reached by a step back in as the next starting point.
    pub fn accept(&mut self, response: &OtgResponse) {
        self.current.clone_from(&response.state);
    }

    pub fn request<'a>(&'a self, limits: &'a LimitSet, step_duration: f64) -> OtgRequest<'a> {
        OtgRequest {
            current: &self.current,
            target: &self.target,
            limits,
            step_duration,
        }
    }
}
