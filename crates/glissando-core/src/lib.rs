//! Trajectory smoothing driven by an online trajectory generator.
//!
//! The smoothing pass walks a trajectory waypoint by waypoint, feeding each
//! generator output back in as the next input. The generator itself sits
//! behind the [`otg::Otg`] trait so alternative implementations can be
//! swapped in without touching the loop.

pub mod jerk_limited;
pub mod limits;
pub mod otg;
pub mod retry;
pub mod smoothing;
pub mod trajectory;

pub use jerk_limited::{GeneratorConfig, JerkLimitedOtg};
pub use limits::{LimitSet, Scaling};
pub use otg::{KinematicState, Otg, OtgRequest, OtgResponse, OtgStatus};
pub use retry::{DurationExtension, smooth_with_extension};
pub use smoothing::{
    SmoothingConfig, SmoothingError, SmoothingReport, Smoother, apply_smoothing,
};
pub use trajectory::{Joint, JointBounds, JointGroup, Trajectory, TrajectoryError, Waypoint};
