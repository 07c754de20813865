//! Differential-drive mixing for a four-motor chassis.
//!
//! `DifferentialDrive` maps tank (left/right) or arcade (forward/turn)
//! commands onto the left and right motor pairs. It holds only its tuning and
//! writes through the motors it is handed.
//!
//! # Example
//! ```rust
//! use chassis_core::utils::{config::DriveConfig, math::drive::DifferentialDrive};
//! let drive = DifferentialDrive::new(DriveConfig::default());
//! let (left, right) = drive.arcade_speeds(0.5, 0.25);
//! assert_eq!((left, right), (0.75, 0.25));
//! ```

use libm;

use crate::utils::{
    config::DriveConfig,
    controllers::{DriveMotors, MotorOutput},
};

/// Scale a left/right pair down so neither magnitude exceeds 1, keeping
/// their ratio.
pub fn desaturate(
    left: f32,
    right: f32,
) -> (f32, f32) {
    let max = libm::fabsf(left).max(libm::fabsf(right));
    if max > 1.0 {
        (left / max, right / max)
    } else {
        (left, right)
    }
}

/// Square an axis, keeping its sign.
fn square_keep_sign(v: f32) -> f32 {
    libm::copysignf(v * v, v)
}

/// Stateless combiner turning drive commands into motor-pair speeds.
#[derive(Debug, Clone, Copy)]
pub struct DifferentialDrive {
    config: DriveConfig,
}

impl DifferentialDrive {
    pub fn new(config: DriveConfig) -> Self {
        Self { config }
    }

    /// Motor-pair speeds for a tank command, after output scaling and
    /// per-side inversion.
    pub fn tank_speeds(
        &self,
        left: f32,
        right: f32,
    ) -> (f32, f32) {
        let left = left * self.config.max_output;
        let right = right * self.config.max_output;
        (
            if self.config.invert_left { -left } else { left },
            if self.config.invert_right { -right } else { right },
        )
    }

    /// Motor-pair speeds for an arcade command.
    ///
    /// `left = forward + turn`, `right = forward - turn`, desaturated to unit
    /// magnitude.
    pub fn arcade_speeds(
        &self,
        forward: f32,
        turn: f32,
    ) -> (f32, f32) {
        let (forward, turn) = if self.config.squared_inputs {
            (square_keep_sign(forward), square_keep_sign(turn))
        } else {
            (forward, turn)
        };
        let (left, right) = desaturate(forward + turn, forward - turn);
        self.tank_speeds(left, right)
    }

    /// Drive the left pair at `left` and the right pair at `right`.
    pub fn tank<M: MotorOutput>(
        &self,
        motors: &mut DriveMotors<M>,
        left: f32,
        right: f32,
    ) {
        let (left, right) = self.tank_speeds(left, right);
        motors.set(left, right);
    }

    /// Drive from forward and turn axes.
    pub fn arcade<M: MotorOutput>(
        &self,
        motors: &mut DriveMotors<M>,
        forward: f32,
        turn: f32,
    ) {
        let (left, right) = self.arcade_speeds(forward, turn);
        motors.set(left, right);
    }
}
