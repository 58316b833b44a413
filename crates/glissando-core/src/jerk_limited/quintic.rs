//! Quintic polynomials joining two kinematic states over a fixed duration.

/// Position, velocity and acceleration of one joint at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Boundary {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Largest absolute value of each derivative over the whole duration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Peaks {
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
}

const ROOT_BISECTIONS: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quintic {
    c: [f64; 6],
    duration: f64,
}

impl Quintic {
    /// The unique quintic matching `start` at `t = 0` and `end` at
    /// `t = duration`. `duration` must be positive.
    pub fn new(start: Boundary, end: Boundary, duration: f64) -> Self {
        let t = duration;
        let t2 = t * t;
        let d = end.position - start.position;
        let (v0, v1) = (start.velocity, end.velocity);
        let (a0, a1) = (start.acceleration, end.acceleration);

        let c3 = (20.0 * d - (8.0 * v1 + 12.0 * v0) * t - (3.0 * a0 - a1) * t2) / (2.0 * t2 * t);
        let c4 =
            (-30.0 * d + (14.0 * v1 + 16.0 * v0) * t + (3.0 * a0 - 2.0 * a1) * t2) / (2.0 * t2 * t2);
        let c5 = (12.0 * d - 6.0 * (v1 + v0) * t + (a1 - a0) * t2) / (2.0 * t2 * t2 * t);

        Self {
            c: [start.position, v0, a0 / 2.0, c3, c4, c5],
            duration,
        }
    }

    pub fn sample(&self, t: f64) -> Sample {
        let c = &self.c;
        Sample {
            position: c[0] + t * (c[1] + t * (c[2] + t * (c[3] + t * (c[4] + t * c[5])))),
            velocity: self.velocity(t),
            acceleration: self.acceleration(t),
        }
    }

    fn velocity(&self, t: f64) -> f64 {
        let c = &self.c;
        c[1] + t * (2.0 * c[2] + t * (3.0 * c[3] + t * (4.0 * c[4] + t * 5.0 * c[5])))
    }

    fn acceleration(&self, t: f64) -> f64 {
        let c = &self.c;
        2.0 * c[2] + t * (6.0 * c[3] + t * (12.0 * c[4] + t * 20.0 * c[5]))
    }

    fn jerk(&self, t: f64) -> f64 {
        let c = &self.c;
        6.0 * c[3] + t * (24.0 * c[4] + t * 60.0 * c[5])
    }

    /// Times strictly inside the duration where the jerk crosses zero.
    fn jerk_roots(&self) -> Vec<f64> {
        let c = &self.c;
        let mut roots: Vec<f64> = quadratic_roots(60.0 * c[5], 24.0 * c[4], 6.0 * c[3])
            .into_iter()
            .filter(|t| *t > 0.0 && *t < self.duration)
            .collect();
        roots.sort_by(f64::total_cmp);
        roots
    }

    pub fn peaks(&self) -> Peaks {
        let c = &self.c;
        let end = self.duration;

        let mut jerk_times = vec![0.0, end];
        if c[5] != 0.0 {
            let vertex = -c[4] / (5.0 * c[5]);
            if vertex > 0.0 && vertex < end {
                jerk_times.push(vertex);
            }
        }
        let jerk = max_abs(jerk_times.iter().map(|&t| self.jerk(t)));

        let jerk_roots = self.jerk_roots();
        let acceleration = max_abs(
            [0.0, end]
                .into_iter()
                .chain(jerk_roots.iter().copied())
                .map(|t| self.acceleration(t)),
        );

        // The acceleration is monotone between consecutive jerk roots, so
        // each piece holds at most one velocity extremum.
        let mut knots = Vec::with_capacity(jerk_roots.len() + 2);
        knots.push(0.0);
        knots.extend(jerk_roots);
        knots.push(end);
        let mut velocity_times = vec![0.0, end];
        for piece in knots.windows(2) {
            if let Some(t) = self.acceleration_root(piece[0], piece[1]) {
                velocity_times.push(t);
            }
        }
        let velocity = max_abs(velocity_times.iter().map(|&t| self.velocity(t)));

        Peaks {
            velocity,
            acceleration,
            jerk,
        }
    }

    fn acceleration_root(&self, mut lo: f64, mut hi: f64) -> Option<f64> {
        let mut f_lo = self.acceleration(lo);
        let f_hi = self.acceleration(hi);
        if f_lo == 0.0 {
            return Some(lo);
        }
        if f_lo * f_hi > 0.0 {
            return None;
        }
        for _ in 0..ROOT_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            let f_mid = self.acceleration(mid);
            if f_mid * f_lo <= 0.0 {
                hi = mid;
            } else {
                lo = mid;
                f_lo = f_mid;
            }
        }
        Some(0.5 * (lo + hi))
    }
}

fn max_abs(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |max, v| max.max(v.abs()))
}

/// Real roots of `a t^2 + b t + c`, degrading to the linear case.
fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < f64::MIN_POSITIVE {
        if b.abs() < f64::MIN_POSITIVE {
            return vec![];
        }
        return vec![-c / b];
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return vec![];
    }
    let q = -0.5 * (b + discriminant.sqrt().copysign(b));
    let mut roots = vec![q / a];
    if q != 0.0 {
        roots.push(c / q);
    }
    roots
}
