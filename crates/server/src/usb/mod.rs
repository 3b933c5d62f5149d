//! USB subsystem
//!
//! Device enumeration and node opening run in a dedicated thread so the
//! libusb calls never block the Tokio runtime. The async side talks to the
//! thread only through the channel bridge.

pub mod manager;
pub mod worker;

pub use worker::spawn_usb_worker;
