//! Module Exports
//!
//! Dashboard port the chassis publishes to, and an in-memory implementation.
//!
//! # Modules
//! - `table`: Keeps the latest value per key plus the device registry, and
//!   renders JSON snapshots.

/// In-memory dashboard backing store.
pub mod table;

use serde::{Deserialize, Serialize};

pub use table::{Entry, Registration, Role, TelemetryTable};

/// Descriptor of a registered device. The dashboard never owns hardware, so
/// it is told what a device is and where it is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceInfo {
    Motor { channel: u8 },
    Encoder { a: u8, b: u8 },
    Rangefinder { channel: u8 },
    Gyro { channel: u8 },
}

/// Live dashboard sink. Every call is fire-and-forget.
pub trait Dashboard {
    fn put_number(
        &mut self,
        group: &str,
        key: &str,
        value: f32,
    );

    fn put_string(
        &mut self,
        group: &str,
        key: &str,
        value: &str,
    );

    fn add_actuator(
        &mut self,
        group: &str,
        label: &str,
        device: DeviceInfo,
    );

    fn add_sensor(
        &mut self,
        group: &str,
        label: &str,
        device: DeviceInfo,
    );
}
