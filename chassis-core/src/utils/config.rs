//! Chassis configuration: hardware mode, calibration constants, channel map
//! and drive tuning.
//!
//! Everything that differs between the real robot and the simulator is
//! resolved once into a [`Calibration`] when the chassis is built.

use core::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Dashboard group every drive-train item is published under.
pub const DRIVE_TRAIN: &str = "Drive Train";

/// Distance travelled per encoder pulse on the real robot.
///
/// Placeholder until the encoders are measured on the carpet.
pub const REAL_DISTANCE_PER_PULSE: f32 = 0.042;
/// Wheel diameter in inches.
pub const WHEEL_DIAMETER_IN: f32 = 4.0;
/// Ticks per revolution of the simulated encoders.
pub const SIM_TICKS_PER_REV: f32 = 360.0;
/// Wheel circumference in feet divided by the simulated tick count.
pub const SIM_DISTANCE_PER_PULSE: f32 = (WHEEL_DIAMETER_IN / 12.0 * PI) / SIM_TICKS_PER_REV;
/// Rangefinder volts-to-distance factor on the real robot (1 V = 0.1 m).
///
/// Placeholder until the rangefinder is calibrated.
pub const REAL_OBSTACLE_SCALE: f32 = 0.1;

/// Whether the chassis runs against physical devices or the simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    #[default]
    Real,
    Simulated,
}

/// Calibration constants, fixed for the lifetime of a chassis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Encoder distance per pulse (feet).
    pub encoder_distance_per_pulse: f32,
    /// Multiplier applied to the averaged rangefinder voltage.
    pub obstacle_scale: f32,
}

impl Calibration {
    /// Calibration for the given hardware mode.
    ///
    /// The simulator reports rangefinder readings already in distance units,
    /// so its obstacle scale is 1.
    pub fn for_mode(mode: HardwareMode) -> Self {
        match mode {
            HardwareMode::Real => Calibration {
                encoder_distance_per_pulse: REAL_DISTANCE_PER_PULSE,
                obstacle_scale: REAL_OBSTACLE_SCALE,
            },
            HardwareMode::Simulated => Calibration {
                encoder_distance_per_pulse: SIM_DISTANCE_PER_PULSE,
                obstacle_scale: 1.0,
            },
        }
    }
}

/// The three channel namespaces devices are addressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelClass {
    Pwm,
    Digital,
    Analog,
}

/// Fixed hardware channel addresses of the drive-train devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub front_left: u8,
    pub back_left: u8,
    pub front_right: u8,
    pub back_right: u8,
    pub left_encoder: (u8, u8),
    pub right_encoder: (u8, u8),
    pub rangefinder: u8,
    pub gyro: u8,
}

impl Default for ChannelMap {
    fn default() -> Self {
        ChannelMap {
            front_left: 1,
            back_left: 2,
            front_right: 3,
            back_right: 4,
            left_encoder: (1, 2),
            right_encoder: (3, 4),
            rangefinder: 6,
            gyro: 1,
        }
    }
}

impl ChannelMap {
    /// First channel used twice within the same namespace, if any.
    pub fn conflict(&self) -> Option<(ChannelClass, u8)> {
        let pwm = [self.front_left, self.back_left, self.front_right, self.back_right];
        let digital = [
            self.left_encoder.0,
            self.left_encoder.1,
            self.right_encoder.0,
            self.right_encoder.1,
        ];
        let analog = [self.rangefinder, self.gyro];

        first_duplicate(&pwm)
            .map(|c| (ChannelClass::Pwm, c))
            .or_else(|| first_duplicate(&digital).map(|c| (ChannelClass::Digital, c)))
            .or_else(|| first_duplicate(&analog).map(|c| (ChannelClass::Analog, c)))
    }
}

fn first_duplicate(channels: &[u8]) -> Option<u8> {
    channels
        .iter()
        .enumerate()
        .find(|&(i, c)| channels[i + 1..].contains(c))
        .map(|(_, &c)| c)
}

/// Output shaping for the differential-drive combiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Scale applied to every motor command.
    pub max_output: f32,
    /// Square arcade axes (keeping sign) before mixing.
    pub squared_inputs: bool,
    pub invert_left: bool,
    pub invert_right: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig {
            max_output: 1.0,
            squared_inputs: false,
            invert_left: false,
            invert_right: false,
        }
    }
}

/// Everything needed to build a [`Chassis`](crate::utils::controllers::Chassis).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mode: HardwareMode,
    /// Overrides the mode's calibration when set.
    pub calibration: Option<Calibration>,
    pub channels: ChannelMap,
    pub drive: DriveConfig,
}

impl ChassisConfig {
    pub fn for_mode(mode: HardwareMode) -> Self {
        ChassisConfig {
            mode,
            ..Default::default()
        }
    }

    /// Calibration in effect: the override if present, else the mode default.
    pub fn calibration(&self) -> Calibration {
        self.calibration
            .unwrap_or_else(|| Calibration::for_mode(self.mode))
    }
}
