//! Common utilities for usbgate
//!
//! Shared plumbing between the gateway daemon and the client: error types,
//! logging setup, and the async channel bridge that carries USB commands
//! from the Tokio runtime to the dedicated USB thread.

pub mod channel;
pub mod error;
pub mod logging;

pub use channel::{UsbBridge, UsbCommand, UsbWorker, create_usb_bridge};
pub use error::{Error, OpenError, Result};
pub use logging::setup_logging;
