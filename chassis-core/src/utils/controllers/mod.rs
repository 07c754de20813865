//! Module Exports
//!
//! Device ports the chassis drives through, and the backends that implement
//! them on real buses.
//!
//! - `chassis`: the drive-train subsystem itself.
//! - `motors`: PCA9685-driven motor outputs over I2C.
//! - `encoders`: software quadrature decoding on two digital inputs.
//! - `gyro`: heading integrated from an ICM-42670 yaw rate.
//! - `rangefinder`: averaged analog rangefinder.

pub mod chassis;
pub mod encoders;
pub mod gyro;
pub mod motors;
pub mod rangefinder;

use embassy_time::Duration;
use icm42670::Error as ImuError;
use pwm_pca9685::Error as PwmError;

pub use chassis::{Chassis, ChassisDevices, ChassisError, DriveToken};
pub use encoders::QuadratureEncoder;
pub use gyro::{HeadingIntegrator, ImuGyro};
pub use motors::Pca9685Motor;
pub use rangefinder::{AnalogInput, Rangefinder};

/// A speed controller accepting commands in [-1.0, 1.0].
pub trait MotorOutput {
    /// Command a speed. Implementations clamp to [-1.0, 1.0].
    fn set(
        &mut self,
        speed: f32,
    );

    /// Last speed applied to the hardware, after clamping. A command the
    /// device rejected leaves this unchanged.
    fn get(&self) -> f32;
}

/// A pulse counter reporting distance travelled.
pub trait DistanceEncoder {
    fn set_distance_per_pulse(
        &mut self,
        distance_per_pulse: f32,
    );

    /// Cumulative distance since the last reset.
    fn distance(&self) -> f32;

    /// Distance per second over the last update window.
    fn rate(&self) -> f32;

    /// `true` if the last movement was forward.
    fn direction(&self) -> bool;

    /// Zero the count and rate.
    fn reset(&mut self);

    /// Take one reading from the hardware. Counters fed by interrupts or a
    /// simulator have nothing to do here.
    fn poll(&mut self) {}

    /// Recompute anything derived over time. Called once per control tick.
    fn update(
        &mut self,
        _elapsed: Duration,
    ) {
    }
}

/// An analog rangefinder.
pub trait RangeSensor {
    /// Averaged output voltage.
    fn average_voltage(&mut self) -> f32;
}

/// A gyro reporting heading in degrees, clockwise positive.
pub trait HeadingSensor {
    fn angle(&self) -> f32;

    /// Degrees per second.
    fn rate(&self) -> f32;

    fn reset(&mut self);

    fn update(
        &mut self,
        _elapsed: Duration,
    ) {
    }
}

/// The four drive motors, left pair and right pair.
pub struct DriveMotors<M> {
    pub front_left: M,
    pub back_left: M,
    pub front_right: M,
    pub back_right: M,
}

impl<M: MotorOutput> DriveMotors<M> {
    /// Command both left motors to `left` and both right motors to `right`.
    pub fn set(
        &mut self,
        left: f32,
        right: f32,
    ) {
        self.front_left.set(left);
        self.back_left.set(left);
        self.front_right.set(right);
        self.back_right.set(right);
    }

    /// Current commands as `[front_left, back_left, front_right, back_right]`.
    pub fn speeds(&self) -> [f32; 4] {
        [
            self.front_left.get(),
            self.back_left.get(),
            self.front_right.get(),
            self.back_right.get(),
        ]
    }
}

/// Errors raised by the device backends.
#[derive(Debug)]
pub enum DeviceError<E: core::fmt::Debug> {
    PwmError(PwmError<E>),
    ImuError(ImuError<E>),
    PinError(E),
    AdcError(E),
}

/// Seconds in `elapsed`, as used by rate and integration math.
pub(crate) fn seconds(elapsed: Duration) -> f32 {
    elapsed.as_micros() as f32 / 1_000_000.0
}
