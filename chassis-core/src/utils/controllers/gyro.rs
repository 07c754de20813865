//! Heading sensing from the ICM-42670 IMU.
//!
//! The IMU reports yaw rate only; `HeadingIntegrator` accumulates it into a
//! heading once per control tick. The IMU shares its I2C bus with the motor
//! PWM expander through `RefCellDevice`.

use core::cell::RefCell;

use embassy_time::Duration;
use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use icm42670::{Address as ImuAddress, Icm42670};

use super::{seconds, DeviceError, HeadingSensor};

/// Accumulates a yaw rate (deg/s) into a heading (deg).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HeadingIntegrator {
    angle: f32,
    rate: f32,
}

impl HeadingIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `rate` as the current yaw rate and advance the heading by
    /// `rate * elapsed`.
    pub fn integrate(
        &mut self,
        rate: f32,
        elapsed: Duration,
    ) {
        self.rate = rate;
        self.angle += rate * seconds(elapsed);
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Gyro backed by an ICM-42670 on a shared I2C bus.
pub struct ImuGyro<'a, I2C: 'static> {
    imu: Icm42670<RefCellDevice<'a, I2C>>,
    heading: HeadingIntegrator,
}

impl<'a, I2C, E> ImuGyro<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    /// Probe and initialise the IMU at its primary address.
    pub fn new(i2c_bus: &'a RefCell<I2C>) -> Result<Self, DeviceError<E>> {
        let imu = Icm42670::new(RefCellDevice::new(i2c_bus), ImuAddress::Primary)
            .map_err(DeviceError::ImuError)?;
        tracing::info!("IMU initialised");
        Ok(Self {
            imu,
            heading: HeadingIntegrator::new(),
        })
    }

    /// Yaw rate in deg/s, clockwise positive.
    pub fn read_yaw_rate(&mut self) -> Result<f32, DeviceError<E>> {
        let gyro = self.imu.gyro_norm().map_err(DeviceError::ImuError)?;
        // The IMU's z axis is counter-clockwise positive.
        Ok(-gyro.z)
    }
}

impl<I2C, E> HeadingSensor for ImuGyro<'_, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    fn angle(&self) -> f32 {
        self.heading.angle()
    }

    fn rate(&self) -> f32 {
        self.heading.rate()
    }

    fn reset(&mut self) {
        self.heading.reset();
    }

    fn update(
        &mut self,
        elapsed: Duration,
    ) {
        match self.read_yaw_rate() {
            Ok(rate) => self.heading.integrate(rate, elapsed),
            Err(e) => tracing::error!("Failed to read gyro: {:?}", e),
        }
    }
}
