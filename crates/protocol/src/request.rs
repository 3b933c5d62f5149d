//! Gateway request type
//!
//! A request is a named action plus an optional device reference. Both
//! fields are optional at the parse level; the dispatcher decides what a
//! missing field means for each action.

use serde::{Deserialize, Serialize};

/// A single gateway request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Action name: "list", "permission", "open" or "close"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Device reference (usbfs node path) for device-scoped actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl Request {
    /// Enumerate devices
    pub fn list() -> Self {
        Self {
            action: Some("list".into()),
            device: None,
        }
    }

    /// Negotiate authorization for a device
    pub fn permission(device: impl Into<String>) -> Self {
        Self {
            action: Some("permission".into()),
            device: Some(device.into()),
        }
    }

    /// Open a device and receive its descriptor
    pub fn open(device: impl Into<String>) -> Self {
        Self {
            action: Some("open".into()),
            device: Some(device.into()),
        }
    }

    /// Release descriptors the gateway holds for a device
    pub fn close(device: impl Into<String>) -> Self {
        Self {
            action: Some("close".into()),
            device: Some(device.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Request::list().action.as_deref(), Some("list"));
        assert!(Request::list().device.is_none());

        let req = Request::open("/dev/bus/usb/001/002");
        assert_eq!(req.action.as_deref(), Some("open"));
        assert_eq!(req.device.as_deref(), Some("/dev/bus/usb/001/002"));
    }

    #[test]
    fn test_missing_fields_deserialize() {
        let req: Request = serde_json::from_str("{}").unwrap();
        assert!(req.action.is_none());
        assert!(req.device.is_none());

        let req: Request = serde_json::from_str(r#"{"action":"list"}"#).unwrap();
        assert_eq!(req.action.as_deref(), Some("list"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let req: Request =
            serde_json::from_str(r#"{"action":"open","device":"x","extra":1}"#).unwrap();
        assert_eq!(req.action.as_deref(), Some("open"));
    }
}
