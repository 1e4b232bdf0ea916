// THEORY:
// Differential mixing converts one steering value into independent left and right
// wheel speeds.
//
// 1.  **Base speed** tapers with the lateral error: a centred lane runs at 160,
//     and every unit of error costs 110, so the vehicle slows into curves.
// 2.  **Side weights** start at 1 and are pushed apart by `turn_gain * steer`.
//     A negative weight is shifted up so the slower side stops instead of
//     reversing.
// 3.  **Scaling** stretches the weights so the faster side runs at the base speed.
//
// Final speeds are rounded half-to-even and clamped to the actuator range.

pub const MAX_SPEED: i32 = 180;
const CRUISE_SPEED: f64 = 160.0;
const ERROR_SLOWDOWN: f64 = 110.0;

/// Base speed for a given lateral error.
pub fn base_speed(error: f64) -> f64 {
    (CRUISE_SPEED - ERROR_SLOWDOWN * error.abs()).clamp(0.0, MAX_SPEED as f64)
}

/// Left and right speeds for `error` and `steer`.
pub fn mix(error: f64, steer: f64, turn_gain: f64) -> (i32, i32) {
    let v_base = base_speed(error);

    let mix = steer.clamp(-1.0, 1.0);
    let mut weight_left = 1.0 + turn_gain * mix;
    let mut weight_right = 1.0 - turn_gain * mix;

    let weight_min = weight_left.min(weight_right);
    if weight_min < 0.0 {
        weight_left -= weight_min;
        weight_right -= weight_min;
    }

    let weight_max = weight_left.max(weight_right);
    let (v_left, v_right) = if weight_max > 0.0 {
        let scale = (v_base - weight_min) / weight_max;
        (weight_min + weight_left * scale, weight_min + weight_right * scale)
    } else {
        (weight_min, weight_min)
    };

    (to_speed(v_left), to_speed(v_right))
}

fn to_speed(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value.round_ties_even() as i32).clamp(0, MAX_SPEED)
}
