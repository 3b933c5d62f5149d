//! USB worker thread
//!
//! Dedicated thread owning the libusb context. Processes commands from the
//! Tokio runtime until it is told to shut down or the command channel
//! closes.

use crate::usb::manager::DeviceManager;
use common::{UsbCommand, UsbWorker};
use tracing::{debug, info};

pub struct UsbWorkerThread {
    manager: DeviceManager,
    worker: UsbWorker,
}

impl UsbWorkerThread {
    pub fn new(worker: UsbWorker, filters: Vec<String>) -> Result<Self, rusb::Error> {
        Ok(Self {
            manager: DeviceManager::new(filters)?,
            worker,
        })
    }

    /// Run the command loop until Shutdown or channel close
    pub fn run(self) {
        info!("USB worker thread started");

        while let Ok(cmd) = self.worker.recv_command() {
            match cmd {
                UsbCommand::Shutdown => {
                    info!("USB worker shutting down");
                    break;
                }
                cmd => self.handle_command(cmd),
            }
        }

        info!("USB worker thread stopped");
    }

    fn handle_command(&self, cmd: UsbCommand) {
        match cmd {
            UsbCommand::ListDevices { response } => {
                let devices = self.manager.list();
                debug!("Listing {} devices", devices.len());
                let _ = response.send(devices);
            }

            UsbCommand::OpenDevice { device, response } => {
                debug!("Opening device {}", device);
                let _ = response.send(self.manager.open(&device));
            }

            // Handled in the main loop
            UsbCommand::Shutdown => unreachable!(),
        }
    }
}

/// Spawn the USB worker thread
///
/// The thread runs until a Shutdown command arrives or every bridge handle
/// is dropped.
pub fn spawn_usb_worker(
    worker: UsbWorker,
    filters: Vec<String>,
) -> std::thread::JoinHandle<Result<(), rusb::Error>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let thread = UsbWorkerThread::new(worker, filters)?;
            thread.run();
            Ok(())
        })
        .expect("Failed to spawn USB worker thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::create_usb_bridge;

    #[test]
    fn test_usb_worker_creation() {
        let (_bridge, worker) = create_usb_bridge();

        // Context creation may fail in sandboxes without USB access; either
        // outcome is acceptable here.
        match UsbWorkerThread::new(worker, vec![]) {
            Ok(_) => {}
            Err(e) => {
                eprintln!("USB worker creation failed (expected without USB access): {}", e);
            }
        }
    }
}
