//! Async channel bridge between the Tokio runtime and the USB thread

use crate::error::OpenError;
use async_channel::{Receiver, Sender, bounded};
use std::os::fd::OwnedFd;
use tokio::sync::oneshot;

/// Commands from the Tokio runtime to the USB thread
#[derive(Debug)]
pub enum UsbCommand {
    /// Enumerate connected devices, returning their node names
    ListDevices {
        response: oneshot::Sender<Vec<String>>,
    },

    /// Open the named device's node
    OpenDevice {
        device: String,
        response: oneshot::Sender<Result<OwnedFd, OpenError>>,
    },

    /// Shut the USB thread down gracefully
    Shutdown,
}

/// Handle for the Tokio runtime (async)
#[derive(Clone)]
pub struct UsbBridge {
    cmd_tx: Sender<UsbCommand>,
}

impl UsbBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: UsbCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Enumerate devices via the USB thread
    pub async fn list_devices(&self) -> crate::Result<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.send_command(UsbCommand::ListDevices { response: tx })
            .await?;
        rx.await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Open the named device via the USB thread
    pub async fn open_device(&self, device: &str) -> crate::Result<Result<OwnedFd, OpenError>> {
        let (tx, rx) = oneshot::channel();
        self.send_command(UsbCommand::OpenDevice {
            device: device.to_string(),
            response: tx,
        })
        .await?;
        rx.await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the USB thread (blocking)
pub struct UsbWorker {
    cmd_rx: Receiver<UsbCommand>,
}

impl UsbWorker {
    /// Receive a command from the Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<UsbCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the USB thread
///
/// Returns (UsbBridge for Tokio, UsbWorker for the USB thread)
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (cmd_tx, cmd_rx) = bounded(64);
    (UsbBridge { cmd_tx }, UsbWorker { cmd_rx })
}
