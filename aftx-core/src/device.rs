//! Device discovery for the two transport modes.
//!
//! ADB mode assumes a single attached handset and reports the first online serial. Fastboot
//! mode reports every device in tool output order.

use crate::commands::TransportCommands;
use crate::config::{AppConfig, MarkerConfig};
use crate::device_report::DeviceDetails;
use crate::errors::FlashToolError;
use aftx_hal::ProcessOps;
use std::fmt;
use std::sync::Arc;

fn warn_not_started(program: &str) {
    let err = FlashToolError::ProcessSpawnFailure {
        program: program.to_string(),
        reason: "not found on PATH or not executable".to_string(),
    };
    log::warn!("{}; treating as no devices", err);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Adb,
    Fastboot,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Adb => write!(f, "adb"),
            Transport::Fastboot => write!(f, "fastboot"),
        }
    }
}

/// A handset seen by one discovery scan.
///
/// Only valid for the session that found it: rebooting into another transport mode
/// invalidates it and a fresh scan is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub transport: Transport,
    pub serial: String,
    pub state: String,
}

impl Device {
    pub fn new(transport: Transport, serial: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            transport,
            serial: serial.into(),
            state: state.into(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.serial, self.transport, self.state)
    }
}

/// First line containing `online_marker`; the text left of the marker is the serial.
pub fn parse_adb_devices(output: &str, online_marker: &str) -> Option<Device> {
    if online_marker.is_empty() {
        return None;
    }
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| {
            let (serial, _) = line.split_once(online_marker)?;
            let serial = serial.trim();
            if serial.is_empty() {
                return None;
            }
            Some(Device::new(
                Transport::Adb,
                serial,
                online_marker.trim(),
            ))
        })
}

/// Every `SERIAL STATE` line whose state is one of `state_tags`, in output order.
pub fn parse_fastboot_devices<S: AsRef<str>>(output: &str, state_tags: &[S]) -> Vec<Device> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let serial = tokens.next()?;
            let state = tokens.next()?;
            state_tags
                .iter()
                .any(|tag| tag.as_ref() == state)
                .then(|| Device::new(Transport::Fastboot, serial, state))
        })
        .collect()
}

const DETAIL_PROPERTIES: [&str; 5] = [
    "ro.product.model",
    "ro.product.brand",
    "ro.product.device",
    "ro.build.version.release",
    "ro.build.version.sdk",
];

/// Runs the listing commands and parses their output.
#[derive(Clone)]
pub struct DeviceScanner {
    hal: Arc<dyn ProcessOps>,
    commands: TransportCommands,
    markers: MarkerConfig,
}

impl DeviceScanner {
    pub fn new(hal: Arc<dyn ProcessOps>, commands: TransportCommands, markers: MarkerConfig) -> Self {
        Self {
            hal,
            commands,
            markers,
        }
    }

    pub fn from_config(hal: Arc<dyn ProcessOps>, cfg: &AppConfig) -> Self {
        Self::new(hal, TransportCommands::new(cfg), cfg.markers.clone())
    }

    pub fn commands(&self) -> &TransportCommands {
        &self.commands
    }

    /// The first online ADB device, if any.
    pub fn adb_device(&self) -> Option<Device> {
        let out = self.hal.run(&self.commands.adb_devices());
        if !out.started() {
            warn_not_started(self.commands.adb_program());
            return None;
        }
        let device = parse_adb_devices(&out.text, &self.markers.adb_online);
        log::debug!("adb scan: {:?}", device);
        device
    }

    pub fn fastboot_devices(&self) -> Vec<Device> {
        let out = self.hal.run(&self.commands.fastboot_devices());
        if !out.started() {
            warn_not_started(self.commands.fastboot_program());
            return Vec::new();
        }
        let devices = parse_fastboot_devices(&out.text, &self.markers.fastboot_states);
        log::debug!("fastboot scan: {} device(s)", devices.len());
        devices
    }

    /// Read the identifying properties of an ADB device.
    ///
    /// A property that cannot be read is left empty.
    pub fn properties(&self, serial: &str) -> DeviceDetails {
        let mut values = DETAIL_PROPERTIES.iter().map(|key| {
            let out = self.hal.run(&self.commands.getprop(serial, key));
            if out.succeeded() {
                out.text.trim().to_string()
            } else {
                log::warn!("could not read {} from {}", key, serial);
                String::new()
            }
        });
        let mut next = || values.next().unwrap_or_default();
        DeviceDetails {
            serial: serial.to_string(),
            model: next(),
            brand: next(),
            device: next(),
            android_version: next(),
            sdk_version: next(),
        }
    }

    /// Ask an ADB device to restart into its bootloader.
    ///
    /// Consumes the device: its ADB identity no longer holds once this returns.
    pub fn reboot_to_bootloader(&self, device: Device) -> bool {
        let out = self.hal.run(&self.commands.reboot_bootloader(&device.serial));
        if !out.succeeded() {
            log::warn!("reboot bootloader on {} reported: {}", device.serial, out.text);
        }
        out.started()
    }
}
