//! PCA9685-driven motor outputs.
//!
//! Each motor sits on a phase/enable channel pair of a PCA9685 PWM expander
//! feeding an H-bridge: the phase channel selects direction (full on for
//! reverse) and the enable channel's duty cycle sets speed. Several motors
//! share the expander's I2C bus through `RefCellDevice`.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;
use libm;
use pwm_pca9685::{Address as PwmAddress, Channel, Pca9685};

use super::{DeviceError, MotorOutput};

/// Default I2C address of the motor PWM expander.
pub const PWM_ADDRESS: u8 = 0x55;

const MAX_DUTY: u16 = 4095;

/// One drive motor on a PCA9685 channel pair.
pub struct Pca9685Motor<'a, I2C: 'static> {
    pwm: Pca9685<RefCellDevice<'a, I2C>>,
    phase: Channel,
    enable: Channel,
    inverted: bool,
    speed: f32,
}

impl<'a, I2C, E> Pca9685Motor<'a, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    pub fn new(
        i2c_bus: &'a RefCell<I2C>,
        address: u8,
        phase: Channel,
        enable: Channel,
    ) -> Result<Self, DeviceError<E>> {
        let pwm = Pca9685::new(RefCellDevice::new(i2c_bus), PwmAddress::from(address))
            .map_err(DeviceError::PwmError)?;
        Ok(Self {
            pwm,
            phase,
            enable,
            inverted: false,
            speed: 0.0,
        })
    }

    /// Reverse the motor's sense of forward.
    pub fn inverted(
        mut self,
        inverted: bool,
    ) -> Self {
        self.inverted = inverted;
        self
    }

    /// Wake the expander and set its prescale (60 Hz).
    pub fn configure(&mut self) -> Result<(), DeviceError<E>> {
        self.pwm.enable().map_err(DeviceError::PwmError)?;
        tracing::info!("PWM enabled");
        self.pwm.set_prescale(100).map_err(DeviceError::PwmError)?;
        tracing::info!("PWM prescale set to 60Hz");
        Ok(())
    }

    /// Write `speed`, clamped to [-1.0, 1.0], to the channel pair.
    pub fn apply(
        &mut self,
        speed: f32,
    ) -> Result<(), DeviceError<E>> {
        let speed = speed.clamp(-1.0, 1.0);
        let output = if self.inverted { -speed } else { speed };
        let reverse = output < 0.0;
        let duty = (libm::fabsf(output) * MAX_DUTY as f32) as u16;

        self.pwm
            .set_channel_on_off(self.phase, 0, if reverse { MAX_DUTY } else { 0 })
            .map_err(DeviceError::PwmError)?;
        self.pwm
            .set_channel_on_off(self.enable, 0, duty)
            .map_err(DeviceError::PwmError)?;
        self.speed = speed;
        Ok(())
    }
}

impl<I2C, E> MotorOutput for Pca9685Motor<'_, I2C>
where
    I2C: I2c<Error = E> + 'static,
    E: core::fmt::Debug,
{
    fn set(
        &mut self,
        speed: f32,
    ) {
        if let Err(e) = self.apply(speed) {
            tracing::error!("Motor command failed: {:?}", e);
        }
    }

    fn get(&self) -> f32 {
        self.speed
    }
}
