//! Granted-device bookkeeping
//!
//! Devices the daemon has authorized. Grants are keyed by device reference
//! and optionally persisted to a TOML file so they survive restarts; a
//! replugged device gets a fresh reference and therefore a fresh prompt.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct GrantFile {
    #[serde(default)]
    devices: Vec<String>,
}

/// Set of authorized device references
pub struct GrantStore {
    granted: Mutex<HashSet<String>>,
    path: Option<PathBuf>,
}

impl GrantStore {
    /// Store without persistence; grants last for the process lifetime
    pub fn in_memory() -> Self {
        Self {
            granted: Mutex::new(HashSet::new()),
            path: None,
        }
    }

    /// Store backed by a TOML file
    ///
    /// A missing or unreadable file starts the store empty.
    pub fn load(path: PathBuf) -> Self {
        let granted = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<GrantFile>(&content) {
                Ok(file) => {
                    debug!("Loaded {} grants from {}", file.devices.len(), path.display());
                    file.devices.into_iter().collect()
                }
                Err(e) => {
                    warn!("Ignoring malformed grants file {}: {}", path.display(), e);
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };

        Self {
            granted: Mutex::new(granted),
            path: Some(path),
        }
    }

    /// Whether the device is currently authorized
    pub fn contains(&self, device: &str) -> bool {
        self.set().contains(device)
    }

    /// Record an authorization, persisting when a file is configured
    pub fn grant(&self, device: &str) {
        let mut set = self.set();
        if !set.insert(device.to_string()) {
            return;
        }
        if let Some(path) = &self.path {
            let file = GrantFile {
                devices: set.iter().cloned().collect(),
            };
            drop(set);
            let result = toml::to_string_pretty(&file)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    std::fs::write(path, content).map_err(|e| e.to_string())
                });
            if let Err(e) = result {
                warn!("Failed to persist grants to {}: {}", path.display(), e);
            }
        }
    }

    fn set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.granted.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_grant() {
        let store = GrantStore::in_memory();
        assert!(!store.contains("/dev/bus/usb/001/002"));

        store.grant("/dev/bus/usb/001/002");
        assert!(store.contains("/dev/bus/usb/001/002"));
        assert!(!store.contains("/dev/bus/usb/001/003"));
    }

    #[test]
    fn test_persisted_grants_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.toml");

        let store = GrantStore::load(path.clone());
        store.grant("/dev/bus/usb/002/005");
        store.grant("/dev/bus/usb/002/005"); // idempotent

        let reloaded = GrantStore::load(path);
        assert!(reloaded.contains("/dev/bus/usb/002/005"));
    }

    #[test]
    fn test_malformed_grants_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.toml");
        std::fs::write(&path, "not toml [").unwrap();

        let store = GrantStore::load(path);
        assert!(!store.contains("/dev/bus/usb/001/001"));
    }
}
