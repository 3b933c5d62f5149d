//! Open-handle registry
//!
//! Process-wide table of device descriptors the gateway has opened, keyed
//! by raw descriptor value. Each entry records the device reference so the
//! close action can address it; entries otherwise live for the process
//! lifetime, mirroring the duplicate the caller holds.

use std::collections::HashMap;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

struct Entry {
    device: String,
    fd: OwnedFd,
}

#[derive(Default)]
pub struct HandleRegistry {
    inner: Mutex<HashMap<RawFd, Entry>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an opened descriptor, returning its raw value
    pub fn insert(&self, device: &str, fd: OwnedFd) -> RawFd {
        let raw = fd.as_raw_fd();
        self.table().insert(
            raw,
            Entry {
                device: device.to_string(),
                fd,
            },
        );
        raw
    }

    /// Release every held descriptor for a device
    ///
    /// Returns how many descriptors were closed.
    pub fn close_device(&self, device: &str) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, entry| {
            if entry.device == device {
                debug!("Released descriptor {} for {}", entry.fd.as_raw_fd(), device);
                false
            } else {
                true
            }
        });
        before - table.len()
    }

    /// Number of descriptors currently held
    pub fn held(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RawFd, Entry>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_fd() -> OwnedFd {
        OwnedFd::from(std::fs::File::open("/dev/null").unwrap())
    }

    #[test]
    fn test_insert_and_close() {
        let registry = HandleRegistry::new();
        assert_eq!(registry.held(), 0);

        registry.insert("/dev/bus/usb/001/002", null_fd());
        registry.insert("/dev/bus/usb/001/002", null_fd());
        registry.insert("/dev/bus/usb/001/003", null_fd());
        assert_eq!(registry.held(), 3);

        assert_eq!(registry.close_device("/dev/bus/usb/001/002"), 2);
        assert_eq!(registry.held(), 1);
        assert_eq!(registry.close_device("/dev/bus/usb/001/002"), 0);
    }

    #[test]
    fn test_close_unknown_device() {
        let registry = HandleRegistry::new();
        assert_eq!(registry.close_device("/dev/bus/usb/009/009"), 0);
    }
}
