use bolero::check;
use glissando_core::{
    DurationExtension, JerkLimitedOtg, JointBounds, JointGroup, LimitSet, Scaling,
    SmoothingConfig, SmoothingError, Smoother, Trajectory, smooth_with_extension,
};

const JOINTS: usize = 2;
const MAX_WAYPOINTS: usize = 4;

fn trajectory_from(raw: &[(i8, i8)]) -> Trajectory {
    let group = JointGroup::serial("arm", JOINTS, JointBounds::new(1.0, 2.0, 50.0));
    let mut positions = vec![vec![0.0; JOINTS]];
    positions.extend(
        raw.iter()
            .take(MAX_WAYPOINTS)
            .map(|&(a, b)| vec![f64::from(a) / 64.0, f64::from(b) / 64.0]),
    );
    Trajectory::from_positions(group, positions)
}

fn scaling_from(raw: u8) -> Scaling {
    let factor = 0.2 + 0.8 * f64::from(raw) / 255.0;
    Scaling::new(factor, factor)
}

#[test]
fn smoothed_states_respect_limits() {
    check!()
        .with_type::<(u8, Vec<(i8, i8)>)>()
        .for_each(|(scale, raw)| {
            let mut trajectory = trajectory_from(raw);
            let scaling = scaling_from(*scale);
            let limits = LimitSet::from_group(trajectory.group(), scaling).unwrap();
            let config = SmoothingConfig {
                step_duration: Some(0.5),
                ..SmoothingConfig::default()
            };
            let mut smoother = Smoother::new(JerkLimitedOtg::default(), config);
            let original = trajectory.clone();
            let report = match smooth_with_extension(
                &mut smoother,
                &mut trajectory,
                scaling,
                DurationExtension::default(),
            ) {
                Ok(report) => report,
                // Sharp reversals can outrun every step duration tried.
                Err(SmoothingError::LaggingMotion { .. }) => {
                    assert_eq!(trajectory, original);
                    return;
                }
                Err(err) => panic!("{err}"),
            };

            let mut previous = 0.0;
            for index in 0..trajectory.len() {
                let time = trajectory.time_from_start(index);
                assert!(time >= previous);
                assert!(time - previous <= report.step_duration * (1.0 + 1e-9));
                previous = time;

                let state = trajectory.group_state(index);
                assert!(state.is_finite());
                for joint in 0..JOINTS {
                    assert!(state.velocity[joint].abs() <= limits.max_velocity[joint] * (1.0 + 1e-6));
                    assert!(
                        state.acceleration[joint].abs()
                            <= limits.max_acceleration[joint] * (1.0 + 1e-6)
                    );
                }
            }
        });
}

#[test]
fn long_steps_land_on_every_waypoint() {
    check!()
        .with_type::<Vec<(i8, i8)>>()
        .for_each(|raw| {
            let mut trajectory = trajectory_from(raw);
            let original = trajectory.clone();
            let config = SmoothingConfig {
                step_duration: Some(30.0),
                ..SmoothingConfig::default()
            };
            let mut smoother = Smoother::new(JerkLimitedOtg::default(), config);
            smoother.apply(&mut trajectory, Scaling::default()).unwrap();

            for (smoothed, input) in trajectory.waypoints().iter().zip(original.waypoints()) {
                assert_eq!(smoothed.positions, input.positions);
            }
        });
}
