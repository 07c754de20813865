//! In-memory dashboard.
//!
//! `TelemetryTable` keeps the most recent value for every `(group, key)` and
//! the list of registered devices. The host renders it to JSON for display.

extern crate alloc;

use alloc::{
    borrow::ToOwned,
    string::{String, ToString},
    vec::Vec,
};

use hashbrown::HashMap;
use serde::Serialize;

use super::{Dashboard, DeviceInfo};

/// A published value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entry {
    Number(f32),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Actuator,
    Sensor,
}

/// A device shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub group: String,
    pub label: String,
    pub role: Role,
    pub device: DeviceInfo,
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetryTable {
    values: HashMap<String, HashMap<String, Entry>>,
    devices: Vec<Registration>,
    #[serde(skip)]
    publishes: usize,
}

impl TelemetryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        group: &str,
        key: &str,
    ) -> Option<&Entry> {
        self.values.get(group)?.get(key)
    }

    pub fn number(
        &self,
        group: &str,
        key: &str,
    ) -> Option<f32> {
        match self.get(group, key)? {
            Entry::Number(v) => Some(*v),
            Entry::Text(_) => None,
        }
    }

    pub fn text(
        &self,
        group: &str,
        key: &str,
    ) -> Option<&str> {
        match self.get(group, key)? {
            Entry::Text(s) => Some(s.as_str()),
            Entry::Number(_) => None,
        }
    }

    /// Keys published under `group`, in no particular order.
    pub fn keys<'a>(
        &'a self,
        group: &str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .get(group)
            .into_iter()
            .flat_map(|entries| entries.keys().map(String::as_str))
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.devices
    }

    /// Total number of `put_*` calls received.
    pub fn publish_count(&self) -> usize {
        self.publishes
    }

    /// Snapshot of all values and registrations as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn put(
        &mut self,
        group: &str,
        key: &str,
        entry: Entry,
    ) {
        self.publishes += 1;
        match self.values.get_mut(group) {
            Some(entries) => {
                entries.insert(key.to_owned(), entry);
            }
            None => {
                let mut entries = HashMap::new();
                entries.insert(key.to_owned(), entry);
                self.values.insert(group.to_owned(), entries);
            }
        }
    }

    fn register(
        &mut self,
        group: &str,
        label: &str,
        role: Role,
        device: DeviceInfo,
    ) {
        tracing::debug!(group, label, ?role, ?device, "device registered");
        self.devices.push(Registration {
            group: group.to_string(),
            label: label.to_string(),
            role,
            device,
        });
    }
}

impl Dashboard for TelemetryTable {
    fn put_number(
        &mut self,
        group: &str,
        key: &str,
        value: f32,
    ) {
        self.put(group, key, Entry::Number(value));
    }

    fn put_string(
        &mut self,
        group: &str,
        key: &str,
        value: &str,
    ) {
        self.put(group, key, Entry::Text(value.to_string()));
    }

    fn add_actuator(
        &mut self,
        group: &str,
        label: &str,
        device: DeviceInfo,
    ) {
        self.register(group, label, Role::Actuator, device);
    }

    fn add_sensor(
        &mut self,
        group: &str,
        label: &str,
        device: DeviceInfo,
    ) {
        self.register(group, label, Role::Sensor, device);
    }
}
