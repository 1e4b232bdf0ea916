// THEORY:
// The steering controller turns the normalised lateral error of the lane into a
// steering value in [-1, 1]:
//
//     steer = Kp * error + Kd * (de / dt) + Ki * (sum_error * dt)
//
// The controller is cold until its first update. A cold update only records the
// time and the error, so the derivative and integral terms contribute nothing on
// the first cycle instead of dividing by an undefined time step. From then on the
// running integral accumulates `error * dt`, clamped to `±integral_limit` so a long
// stretch of one-sided error cannot wind it up without bound.
//
// Time is passed in explicitly; the controller never reads a clock itself.

use std::time::Instant;

/// Gains and limits of the steering controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub integral_limit: f64,
}

#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    last_error: f64,
    last_time: Option<Instant>,
    sum_error: f64,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            last_error: 0.0,
            last_time: None,
            sum_error: 0.0,
        }
    }

    /// True until the first update.
    pub fn is_cold(&self) -> bool {
        self.last_time.is_none()
    }

    pub fn sum_error(&self) -> f64 {
        self.sum_error
    }

    /// Feeds one error sample taken at `now` and returns the clamped steer.
    pub fn update(&mut self, error: f64, now: Instant) -> f64 {
        let PidGains {
            kp,
            ki,
            kd,
            integral_limit,
        } = self.gains;

        let steer = match self.last_time {
            None => kp * error,
            Some(last_time) => {
                let dt = now.saturating_duration_since(last_time).as_secs_f64();
                let de = error - self.last_error;

                self.sum_error = (self.sum_error + error * dt).clamp(-integral_limit, integral_limit);

                let derivative = if dt > 0.0 { de / dt } else { 0.0 };
                kp * error + kd * derivative + ki * (self.sum_error * dt)
            }
        };

        self.last_error = error;
        self.last_time = Some(now);

        if steer.is_finite() { steer.clamp(-1.0, 1.0) } else { 0.0 }
    }
}
