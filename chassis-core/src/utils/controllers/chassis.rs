//! The drive-train subsystem.
//!
//! `Chassis` owns the four drive motors, both wheel encoders, the
//! rangefinder and the gyro. It drives through a [`DifferentialDrive`],
//! publishes telemetry to a [`Dashboard`] and answers heading, distance and
//! obstacle queries. Driving requires a [`DriveToken`] so that only one
//! behavior commands the motors at a time.

use core::fmt;

use embassy_time::Duration;

use super::{DistanceEncoder, DriveMotors, HeadingSensor, MotorOutput, RangeSensor};
use crate::utils::{
    command::{Behavior, Joystick, Scheduler},
    config::{Calibration, ChannelClass, ChannelMap, ChassisConfig, DRIVE_TRAIN},
    math::drive::DifferentialDrive,
    telemetry::{Dashboard, DeviceInfo},
};

/// Errors raised by the chassis itself. Device failures are handled by the
/// device backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChassisError {
    /// Two devices were wired to the same channel.
    ChannelConflict { class: ChannelClass, channel: u8 },
    /// The drive is held by another behavior.
    AlreadyClaimed { holder: &'static str },
    /// Nobody holds the drive.
    NotClaimed,
    /// The token's claim was preempted.
    StaleToken,
}

impl fmt::Display for ChassisError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ChassisError::ChannelConflict { class, channel } => {
                write!(f, "{:?} channel {} is assigned twice", class, channel)
            }
            ChassisError::AlreadyClaimed { holder } => {
                write!(f, "drive train is held by {}", holder)
            }
            ChassisError::NotClaimed => write!(f, "drive train is not claimed"),
            ChassisError::StaleToken => write!(f, "drive token was preempted"),
        }
    }
}

/// Proof of drive ownership, granted by [`Chassis::claim`].
///
/// Not `Clone`: releasing consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct DriveToken {
    owner: &'static str,
    generation: u32,
}

impl DriveToken {
    pub fn owner(&self) -> &'static str {
        self.owner
    }
}

/// Devices handed to [`Chassis::new`].
pub struct ChassisDevices<M, E, R, G> {
    pub motors: DriveMotors<M>,
    pub left_encoder: E,
    pub right_encoder: E,
    pub rangefinder: R,
    pub gyro: G,
}

pub struct Chassis<M, E, R, G> {
    motors: DriveMotors<M>,
    drive: DifferentialDrive,
    left_encoder: E,
    right_encoder: E,
    rangefinder: R,
    gyro: G,
    calibration: Calibration,
    channels: ChannelMap,
    owner: Option<&'static str>,
    generation: u32,
}

impl<M, E, R, G> Chassis<M, E, R, G>
where
    M: MotorOutput,
    E: DistanceEncoder,
    R: RangeSensor,
    G: HeadingSensor,
{
    /// Wire up the drive train and register its devices with `dashboard`.
    ///
    /// Fails only if the channel map assigns a channel twice.
    #[tracing::instrument(skip_all, fields(mode = ?config.mode))]
    pub fn new<D: Dashboard>(
        config: &ChassisConfig,
        devices: ChassisDevices<M, E, R, G>,
        dashboard: &mut D,
    ) -> Result<Self, ChassisError> {
        if let Some((class, channel)) = config.channels.conflict() {
            tracing::warn!(?class, channel, "channel assigned twice");
            return Err(ChassisError::ChannelConflict { class, channel });
        }

        let calibration = config.calibration();
        let ChassisDevices {
            motors,
            mut left_encoder,
            mut right_encoder,
            rangefinder,
            gyro,
        } = devices;
        left_encoder.set_distance_per_pulse(calibration.encoder_distance_per_pulse);
        right_encoder.set_distance_per_pulse(calibration.encoder_distance_per_pulse);

        let chassis = Chassis {
            motors,
            drive: DifferentialDrive::new(config.drive),
            left_encoder,
            right_encoder,
            rangefinder,
            gyro,
            calibration,
            channels: config.channels,
            owner: None,
            generation: 0,
        };
        chassis.register(dashboard);

        tracing::info!(
            distance_per_pulse = calibration.encoder_distance_per_pulse,
            obstacle_scale = calibration.obstacle_scale,
            "drive train ready"
        );
        Ok(chassis)
    }

    fn register<D: Dashboard>(
        &self,
        dashboard: &mut D,
    ) {
        let ch = &self.channels;
        dashboard.add_actuator(DRIVE_TRAIN, "Front_Left Motor", DeviceInfo::Motor {
            channel: ch.front_left,
        });
        dashboard.add_actuator(DRIVE_TRAIN, "Back Left Motor", DeviceInfo::Motor {
            channel: ch.back_left,
        });
        dashboard.add_actuator(DRIVE_TRAIN, "Front Right Motor", DeviceInfo::Motor {
            channel: ch.front_right,
        });
        dashboard.add_actuator(DRIVE_TRAIN, "Back Right Motor", DeviceInfo::Motor {
            channel: ch.back_right,
        });
        dashboard.add_sensor(DRIVE_TRAIN, "Left Encoder", DeviceInfo::Encoder {
            a: ch.left_encoder.0,
            b: ch.left_encoder.1,
        });
        dashboard.add_sensor(DRIVE_TRAIN, "Right Encoder", DeviceInfo::Encoder {
            a: ch.right_encoder.0,
            b: ch.right_encoder.1,
        });
        dashboard.add_sensor(DRIVE_TRAIN, "Rangefinder", DeviceInfo::Rangefinder {
            channel: ch.rangefinder,
        });
        dashboard.add_sensor(DRIVE_TRAIN, "Gyro", DeviceInfo::Gyro { channel: ch.gyro });
    }

    /// Let the operator drive with the joystick whenever no other behavior
    /// holds the drive train.
    pub fn init_default_command<S: Scheduler>(
        &self,
        scheduler: &mut S,
    ) {
        scheduler.set_default_command(DRIVE_TRAIN, Behavior::DriveWithJoystick);
    }

    /// Publish encoder, gyro, motor and rangefinder readings.
    pub fn log<D: Dashboard>(
        &mut self,
        dashboard: &mut D,
    ) {
        let left = self.left_encoder.distance();
        let right = self.right_encoder.distance();
        let [fl, bl, fr, br] = self.motors.speeds();

        dashboard.put_number(DRIVE_TRAIN, "Left Distance", left);
        dashboard.put_number(DRIVE_TRAIN, "Right Distance", right);
        dashboard.put_number(DRIVE_TRAIN, "Combined distance", (left + right) / 2.0);
        dashboard.put_number(DRIVE_TRAIN, "Left Speed", self.left_encoder.rate());
        dashboard.put_number(DRIVE_TRAIN, "Right Speed", self.right_encoder.rate());
        dashboard.put_number(DRIVE_TRAIN, "Gyro Angle", self.gyro.angle());
        dashboard.put_number(DRIVE_TRAIN, "Gyro Rate", self.gyro.rate());
        dashboard.put_number(DRIVE_TRAIN, "FL motor speed", fl);
        dashboard.put_number(DRIVE_TRAIN, "BL motor speed", bl);
        dashboard.put_number(DRIVE_TRAIN, "FR motor speed", fr);
        dashboard.put_number(DRIVE_TRAIN, "BR motor speed", br);
        dashboard.put_string(
            DRIVE_TRAIN,
            "Left Encoder direction",
            direction_label(self.left_encoder.direction()),
        );
        dashboard.put_string(
            DRIVE_TRAIN,
            "Right Encoder direction",
            direction_label(self.right_encoder.direction()),
        );
        let obstacle = self.distance_to_obstacle();
        dashboard.put_number(DRIVE_TRAIN, "RangeFinder", obstacle);
    }

    /// Take the drive train for `owner`.
    pub fn claim(
        &mut self,
        owner: &'static str,
    ) -> Result<DriveToken, ChassisError> {
        if let Some(holder) = self.owner {
            return Err(ChassisError::AlreadyClaimed { holder });
        }
        Ok(self.grant(owner))
    }

    /// Take the drive train for `owner`, invalidating any current holder's
    /// token.
    pub fn preempt(
        &mut self,
        owner: &'static str,
    ) -> DriveToken {
        if let Some(holder) = self.owner {
            tracing::warn!(holder, owner, "drive train preempted");
        }
        self.grant(owner)
    }

    fn grant(
        &mut self,
        owner: &'static str,
    ) -> DriveToken {
        self.generation = self.generation.wrapping_add(1);
        self.owner = Some(owner);
        tracing::info!(owner, "drive train claimed");
        DriveToken {
            owner,
            generation: self.generation,
        }
    }

    /// Hand the drive train back.
    pub fn release(
        &mut self,
        token: DriveToken,
    ) -> Result<(), ChassisError> {
        self.check(&token)?;
        self.owner = None;
        tracing::info!(owner = token.owner, "drive train released");
        Ok(())
    }

    /// Current holder of the drive train.
    pub fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    fn check(
        &self,
        token: &DriveToken,
    ) -> Result<(), ChassisError> {
        if self.owner.is_none() {
            return Err(ChassisError::NotClaimed);
        }
        if token.generation != self.generation {
            return Err(ChassisError::StaleToken);
        }
        Ok(())
    }

    /// Tank drive: left pair at `left`, right pair at `right`, each in
    /// [-1, 1].
    pub fn drive_tank(
        &mut self,
        token: &DriveToken,
        left: f32,
        right: f32,
    ) -> Result<(), ChassisError> {
        self.check(token)?;
        self.drive.tank(&mut self.motors, left, right);
        Ok(())
    }

    /// Arcade drive from the joystick's forward and turn axes.
    pub fn drive_joystick<J: Joystick>(
        &mut self,
        token: &DriveToken,
        joystick: &J,
    ) -> Result<(), ChassisError> {
        self.check(token)?;
        self.drive
            .arcade(&mut self.motors, joystick.forward(), joystick.turn());
        Ok(())
    }

    pub fn stop(
        &mut self,
        token: &DriveToken,
    ) -> Result<(), ChassisError> {
        self.drive_tank(token, 0.0, 0.0)
    }

    /// Heading in degrees.
    pub fn heading(&self) -> f32 {
        self.gyro.angle()
    }

    /// Zero the gyro and both encoders.
    pub fn reset(&mut self) {
        self.gyro.reset();
        self.left_encoder.reset();
        self.right_encoder.reset();
    }

    /// Distance driven: mean of the left and right encoders.
    pub fn distance(&self) -> f32 {
        (self.left_encoder.distance() + self.right_encoder.distance()) / 2.0
    }

    /// Distance to the obstacle ahead.
    ///
    /// Raw rangefinder voltage times the calibration's obstacle scale. No
    /// filtering beyond the sensor's own averaging.
    pub fn distance_to_obstacle(&mut self) -> f32 {
        self.rangefinder.average_voltage() * self.calibration.obstacle_scale
    }

    /// Sample both encoders once. A loop faster than the control tick can
    /// call this between `periodic` calls to avoid missing transitions.
    pub fn poll_encoders(&mut self) {
        self.left_encoder.poll();
        self.right_encoder.poll();
    }

    /// Let time-derived sensor readings catch up. Call once per control tick.
    ///
    /// Samples the encoders first, so a chassis ticked only through here
    /// still counts.
    pub fn periodic(
        &mut self,
        elapsed: Duration,
    ) {
        self.poll_encoders();
        self.left_encoder.update(elapsed);
        self.right_encoder.update(elapsed);
        self.gyro.update(elapsed);
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn motors(&self) -> &DriveMotors<M> {
        &self.motors
    }

    pub fn left_encoder(&self) -> &E {
        &self.left_encoder
    }

    pub fn right_encoder(&self) -> &E {
        &self.right_encoder
    }
}

fn direction_label(forward: bool) -> &'static str {
    if forward {
        "FWRD"
    } else {
        "BKWD"
    }
}
