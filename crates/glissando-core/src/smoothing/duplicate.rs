use crate::trajectory::Waypoint;

/// Position difference below which two waypoints count as the same state.
pub const DEFAULT_DUPLICATE_TOLERANCE: f64 = 1e-6;

/// Returns true when every listed variable of `next` lies within
/// `tolerance` of `previous`.
pub fn is_duplicate(previous: &Waypoint, next: &Waypoint, variables: &[usize], tolerance: f64) -> bool {
    variables
        .iter()
        .all(|&v| (next.position(v) - previous.position(v)).abs() < tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_positions() {
        let a = Waypoint::new(vec![1.0, 2.0, 3.0]);
        assert!(is_duplicate(&a, &a.clone(), &[0, 1, 2], DEFAULT_DUPLICATE_TOLERANCE));
    }

    #[test]
    fn noise_below_tolerance() {
        let a = Waypoint::new(vec![1.0, 2.0]);
        let b = Waypoint::new(vec![1.0 + 1e-9, 2.0 - 1e-9]);
        assert!(is_duplicate(&a, &b, &[0, 1], DEFAULT_DUPLICATE_TOLERANCE));
    }

    #[test]
    fn one_joint_moving_is_enough() {
        let a = Waypoint::new(vec![1.0, 2.0]);
        let b = Waypoint::new(vec![1.0, 2.001]);
        assert!(!is_duplicate(&a, &b, &[0, 1], DEFAULT_DUPLICATE_TOLERANCE));
    }

    #[test]
    fn only_group_variables_count() {
        let a = Waypoint::new(vec![1.0, 2.0, 0.0]);
        let b = Waypoint::new(vec![1.0, 2.0, 5.0]);
        assert!(is_duplicate(&a, &b, &[0, 1], DEFAULT_DUPLICATE_TOLERANCE));
        assert!(!is_duplicate(&a, &b, &[0, 2], DEFAULT_DUPLICATE_TOLERANCE));
    }

    #[test]
    fn velocities_are_ignored() {
        let a = Waypoint::new(vec![0.0]);
        let b = Waypoint::new(vec![0.0]).with_velocities(vec![1.0]);
        assert!(is_duplicate(&a, &b, &[0], DEFAULT_DUPLICATE_TOLERANCE));
    }
}
