//! Utility re-exports and helper macros for the chassis.
//!
//! This module re-exports the drive-train subsystem, its configuration and
//! the ports it talks to:
//!
//! - `command`: scheduler and joystick ports, and the joystick drive behavior
//! - `config`: hardware mode, calibration, channel map and drive tuning
//! - `controllers`: the chassis, device ports and real-bus device backends
//! - `math`: differential-drive mixing
//! - `sim`: simulated devices sharing one plant
//! - `telemetry`: dashboard port and in-memory dashboard
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod command;
pub mod config;
pub mod controllers;
pub mod math;
pub mod sim;
pub mod telemetry;

pub use command::{Axes, Behavior, DriveWithJoystick, Joystick, Scheduler};
pub use config::{Calibration, ChannelMap, ChassisConfig, DriveConfig, HardwareMode};
pub use controllers::{Chassis, ChassisDevices, ChassisError, DriveToken};
pub use embassy_time::Duration;
pub use math::drive::DifferentialDrive;
pub use telemetry::{Dashboard, TelemetryTable};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::static_cell::StaticCell<$t> =
            $crate::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
