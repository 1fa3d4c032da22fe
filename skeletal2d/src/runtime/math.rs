pub(crate) const PI: f32 = std::f32::consts::PI;
pub(crate) const PI2: f32 = 2.0 * std::f32::consts::PI;
pub(crate) const RAD_DEG: f32 = 180.0 / std::f32::consts::PI;
pub(crate) const DEG_RAD: f32 = std::f32::consts::PI / 180.0;

pub(crate) fn sin_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).sin()
}

pub(crate) fn cos_deg(degrees: f32) -> f32 {
    (degrees * DEG_RAD).cos()
}

pub(crate) fn atan2_deg(y: f32, x: f32) -> f32 {
    y.atan2(x) * RAD_DEG
}

/// Sign with `signum(0) == 0`, unlike [`f32::signum`].
pub(crate) fn signum(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Reduces an angle in degrees into `(-180, 180]`.
pub(crate) fn wrap_degrees(degrees: f32) -> f32 {
    let mut d = degrees % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Reduces an angle in radians into `[-PI, PI]` assuming it is within one turn of that range.
pub(crate) fn wrap_radians(mut radians: f32) -> f32 {
    if radians > PI {
        radians -= PI2;
    } else if radians < -PI {
        radians += PI2;
    }
    radians
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_degrees_keeps_half_open_range() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-340.0), 20.0);
        assert_eq!(wrap_degrees(720.0), 0.0);
    }

    #[test]
    fn signum_of_zero_is_zero() {
        assert_eq!(signum(0.0), 0.0);
        assert_eq!(signum(-0.0), 0.0);
        assert_eq!(signum(-3.0), -1.0);
    }
}
