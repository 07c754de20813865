//! Scheduler and joystick ports, and the joystick drive behavior.
//!
//! The scheduler decides which behavior runs; the chassis only tells it which
//! behavior to fall back to. `DriveWithJoystick` is that fallback: it claims
//! the drive train, arcade-drives from the joystick every tick and stops the
//! motors when it ends.

use serde::{Deserialize, Serialize};

use crate::utils::controllers::{
    Chassis, ChassisError, DistanceEncoder, DriveToken, HeadingSensor, MotorOutput, RangeSensor,
};

/// Behaviors a subsystem can name as its default.
///
/// Serialized as JSON with tag `"bc"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "bc", rename_all = "snake_case")]
pub enum Behavior {
    /// Operator arcade drive from the joystick.
    DriveWithJoystick,
}

/// Command scheduler port.
pub trait Scheduler {
    /// Run `behavior` on `subsystem` whenever nothing else claims it.
    fn set_default_command(
        &mut self,
        subsystem: &'static str,
        behavior: Behavior,
    );
}

/// Joystick port. Axes read in [-1, 1] at call time.
pub trait Joystick {
    fn forward(&self) -> f32;
    fn turn(&self) -> f32;
}

/// A joystick reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub forward: f32,
    pub turn: f32,
}

impl Joystick for Axes {
    fn forward(&self) -> f32 {
        self.forward
    }

    fn turn(&self) -> f32 {
        self.turn
    }
}

/// Arcade drive from the joystick until interrupted.
#[derive(Debug, Default)]
pub struct DriveWithJoystick {
    token: Option<DriveToken>,
}

impl DriveWithJoystick {
    pub const NAME: &'static str = "DriveWithJoystick";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }

    /// Claim the drive train.
    pub fn initialize<M, E, R, G>(
        &mut self,
        chassis: &mut Chassis<M, E, R, G>,
    ) -> Result<(), ChassisError>
    where
        M: MotorOutput,
        E: DistanceEncoder,
        R: RangeSensor,
        G: HeadingSensor,
    {
        self.token = Some(chassis.claim(Self::NAME)?);
        Ok(())
    }

    pub fn execute<M, E, R, G, J>(
        &mut self,
        chassis: &mut Chassis<M, E, R, G>,
        joystick: &J,
    ) -> Result<(), ChassisError>
    where
        M: MotorOutput,
        E: DistanceEncoder,
        R: RangeSensor,
        G: HeadingSensor,
        J: Joystick,
    {
        let token = self.token.as_ref().ok_or(ChassisError::NotClaimed)?;
        chassis.drive_joystick(token, joystick)
    }

    /// Runs until interrupted.
    pub fn is_finished(&self) -> bool {
        false
    }

    /// Stop the motors and release the drive train.
    pub fn end<M, E, R, G>(
        &mut self,
        chassis: &mut Chassis<M, E, R, G>,
    ) -> Result<(), ChassisError>
    where
        M: MotorOutput,
        E: DistanceEncoder,
        R: RangeSensor,
        G: HeadingSensor,
    {
        if let Some(token) = self.token.take() {
            chassis.stop(&token)?;
            chassis.release(token)?;
        }
        Ok(())
    }
}
