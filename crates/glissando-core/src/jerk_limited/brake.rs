use super::quintic::Boundary;

/// Advances one joint by `dt` while bringing it to rest.
///
/// The deceleration grows with jerk no larger than `max_jerk` and fades out
/// as the velocity approaches zero. Once the velocity has crossed zero it is
/// held there while any remaining acceleration is ramped out.
pub fn brake(
    state: Boundary,
    max_velocity: f64,
    max_acceleration: f64,
    max_jerk: f64,
    dt: f64,
) -> Boundary {
    let (v, a) = (state.velocity, state.acceleration);
    if v == 0.0 && a == 0.0 {
        return state;
    }

    let direction = if v != 0.0 { v.signum() } else { -a.signum() };
    let desired = -direction * max_acceleration.min((2.0 * max_jerk * v.abs()).sqrt());
    let jerk = ((desired - a) / dt).clamp(-max_jerk, max_jerk);
    let mut acceleration = a + jerk * dt;
    let mut velocity = v + 0.5 * (a + acceleration) * dt;

    if v == 0.0 || velocity * v < 0.0 {
        velocity = 0.0;
        let ramp = max_jerk * dt;
        acceleration = if a.abs() <= ramp {
            0.0
        } else {
            a - ramp.copysign(a)
        };
    }
    let velocity = velocity.clamp(-max_velocity, max_velocity);

    Boundary {
        position: state.position + 0.5 * (v + velocity) * dt,
        velocity,
        acceleration,
    }
}
