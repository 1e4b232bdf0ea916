// THEORY:
// A `Command` is the single unit of output of a control cycle: what an actuator
// should do, stamped with the identifier and metadata of the frame that produced
// it. Strategies never build a `Command` themselves; they return bare `Payload`s
// and the strategy runner stamps them, so the frame/command correlation cannot be
// broken by a strategy.
//
// The payload layout depends on the actuator: a drive motor takes four values
// (direction and speed for the left side, then the right side) and a servo takes
// two (channel, angle). Encoding the layout in the enum makes a wrong-length
// payload unrepresentable; `Payload::from_values` is the checked entry point for
// raw tuples coming from outside.

use crate::core_modules::frame::Metadata;
use crate::error::CommandError;

/// Direction flag for a drive side. Line following never reverses.
pub const FORWARD: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorTarget {
    DriveMotor,
    Servo,
}

impl ActuatorTarget {
    /// Number of payload values the actuator expects.
    pub fn payload_len(self) -> usize {
        match self {
            ActuatorTarget::DriveMotor => 4,
            ActuatorTarget::Servo => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// `[left_direction, left_speed, right_direction, right_speed]`
    DriveMotor([i32; 4]),
    /// `[channel, angle]`
    Servo([i32; 2]),
}

impl Payload {
    /// Forward drive at the given side speeds.
    pub fn drive(left_speed: i32, right_speed: i32) -> Self {
        Payload::DriveMotor([FORWARD, left_speed, FORWARD, right_speed])
    }

    pub fn servo(channel: i32, angle: i32) -> Self {
        Payload::Servo([channel, angle])
    }

    pub fn from_values(target: ActuatorTarget, values: &[i32]) -> Result<Self, CommandError> {
        let length_error = || CommandError::PayloadLength {
            target,
            expected: target.payload_len(),
            actual: values.len(),
        };
        match target {
            ActuatorTarget::DriveMotor => values
                .try_into()
                .map(Payload::DriveMotor)
                .map_err(|_| length_error()),
            ActuatorTarget::Servo => values
                .try_into()
                .map(Payload::Servo)
                .map_err(|_| length_error()),
        }
    }

    pub fn target(&self) -> ActuatorTarget {
        match self {
            Payload::DriveMotor(_) => ActuatorTarget::DriveMotor,
            Payload::Servo(_) => ActuatorTarget::Servo,
        }
    }

    pub fn values(&self) -> &[i32] {
        match self {
            Payload::DriveMotor(values) => values,
            Payload::Servo(values) => values,
        }
    }
}

/// An actuation request correlated with the frame that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Copied from the originating frame.
    pub frame_id: u64,
    pub payload: Payload,
    /// Copied from the originating frame.
    pub metadata: Metadata,
}

impl Command {
    pub fn new(frame_id: u64, payload: Payload, metadata: Metadata) -> Self {
        Self {
            frame_id,
            payload,
            metadata,
        }
    }

    pub fn target(&self) -> ActuatorTarget {
        self.payload.target()
    }

    pub fn values(&self) -> &[i32] {
        self.payload.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_payload_moves_forward_on_both_sides() {
        let payload = Payload::drive(105, 45);
        assert_eq!(payload.target(), ActuatorTarget::DriveMotor);
        assert_eq!(payload.values(), &[FORWARD, 105, FORWARD, 45]);
    }

    #[test]
    fn raw_values_are_checked_against_the_target() {
        assert_eq!(
            Payload::from_values(ActuatorTarget::Servo, &[1, 90]),
            Ok(Payload::Servo([1, 90]))
        );
        assert_eq!(
            Payload::from_values(ActuatorTarget::DriveMotor, &[0, 80, 0]),
            Err(CommandError::PayloadLength {
                target: ActuatorTarget::DriveMotor,
                expected: 4,
                actual: 3,
            })
        );
        assert!(Payload::from_values(ActuatorTarget::Servo, &[0, 80, 0, 80]).is_err());
    }
}
