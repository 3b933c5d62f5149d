//! USB device lookup
//!
//! Enumerates devices through the host USB stack and opens their usbfs
//! nodes. Enumeration is per request; nothing is cached between commands,
//! so a device reference is only as fresh as the request that looked it up.

use common::OpenError;
use rusb::{Context, UsbContext};
use std::os::fd::OwnedFd;
use std::os::unix::fs::FileTypeExt;
use tracing::{debug, warn};

/// Linux Foundation root hubs are virtual and never exposed to callers
const ROOT_HUB_VENDOR: u16 = 0x1d6b;
const CLASS_HUB: u8 = 9;

pub struct DeviceManager {
    context: Context,
    filters: Vec<String>,
}

impl DeviceManager {
    pub fn new(filters: Vec<String>) -> Result<Self, rusb::Error> {
        Ok(Self {
            context: Context::new()?,
            filters,
        })
    }

    /// Node path for a device, matching the host's usbfs layout
    pub fn device_node(bus: u8, address: u8) -> String {
        format!("/dev/bus/usb/{:03}/{:03}", bus, address)
    }

    /// Enumerate devices that pass the configured filters
    pub fn list(&self) -> Vec<String> {
        let devices = match self.context.devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device enumeration failed: {}", e);
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if desc.vendor_id() == ROOT_HUB_VENDOR && desc.class_code() == CLASS_HUB {
                continue;
            }
            if !check_filter(desc.vendor_id(), desc.product_id(), &self.filters) {
                debug!(
                    "Device {:04x}:{:04x} ignored by filter",
                    desc.vendor_id(),
                    desc.product_id()
                );
                continue;
            }
            names.push(Self::device_node(device.bus_number(), device.address()));
        }
        names
    }

    /// Open the named device's node
    ///
    /// The path is rebuilt from the matched device's bus and address rather
    /// than taken from the request, so only enumerated devices are ever
    /// opened. The descriptor is validated to refer to a character device.
    pub fn open(&self, name: &str) -> Result<OwnedFd, OpenError> {
        let path = self.find(name).ok_or(OpenError::Vanished)?;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| OpenError::Node(e.to_string()))?;

        let file_type = file
            .metadata()
            .map_err(|e| OpenError::Node(e.to_string()))?
            .file_type();
        if !file_type.is_char_device() {
            return Err(OpenError::BadDescriptor);
        }

        Ok(OwnedFd::from(file))
    }

    /// Find an enumerated, filter-allowed device by node name
    fn find(&self, name: &str) -> Option<String> {
        let devices = self.context.devices().ok()?;
        for device in devices.iter() {
            let node = Self::device_node(device.bus_number(), device.address());
            if node != name {
                continue;
            }
            let desc = device.device_descriptor().ok()?;
            if !check_filter(desc.vendor_id(), desc.product_id(), &self.filters) {
                return None;
            }
            return Some(node);
        }
        None
    }
}

/// Check a VID/PID pair against the configured filter patterns
///
/// An empty filter list allows every device. Patterns are "VID:PID" with
/// each side either "0x"-prefixed hex or "*".
pub(crate) fn check_filter(vid: u16, pid: u16, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().any(|filter| {
        let Some((fv, fp)) = filter.split_once(':') else {
            return false;
        };
        side_matches(fv, vid) && side_matches(fp, pid)
    })
}

fn side_matches(pattern: &str, value: u16) -> bool {
    pattern == "*"
        || u16::from_str_radix(pattern.trim_start_matches("0x"), 16).is_ok_and(|p| p == value)
}
