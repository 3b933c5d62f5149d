//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB error: {0}")]
    Usb(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why opening a device failed
///
/// The variants are distinguished for logging; every one of them surfaces
/// to the caller as the same one-line open-failure reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    /// Device disappeared between lookup and open
    #[error("device no longer present")]
    Vanished,

    /// Opening the device node failed
    #[error("could not open device node: {0}")]
    Node(String),

    /// The opened descriptor does not refer to a device node
    #[error("descriptor is not a device node")]
    BadDescriptor,
}
