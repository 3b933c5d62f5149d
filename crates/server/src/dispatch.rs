//! Command dispatch
//!
//! Routes a parsed request to its action and renders the reply. This is
//! the only place reply texts are chosen; transport concerns stay in
//! `ipc`. Command-surface failures render as reply text; only
//! infrastructure failures (USB thread gone, channel closed) surface as
//! errors and terminate the connection.

use crate::permission::Authorizer;
use crate::registry::HandleRegistry;
use common::{Error, Result, UsbBridge};
use protocol::{Request, replies};
use std::os::fd::OwnedFd;
use tracing::{debug, warn};

/// A rendered reply: text plus an optional descriptor to transfer
pub struct Reply {
    pub text: String,
    pub fd: Option<OwnedFd>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fd: None,
        }
    }

    pub fn with_fd(fd: OwnedFd) -> Self {
        Self {
            text: String::new(),
            fd: Some(fd),
        }
    }
}

/// Request router over the USB bridge, the authorizer and the registry
pub struct Gateway {
    bridge: UsbBridge,
    authorizer: Authorizer,
    registry: HandleRegistry,
}

impl Gateway {
    pub fn new(bridge: UsbBridge, authorizer: Authorizer) -> Self {
        Self {
            bridge,
            authorizer,
            registry: HandleRegistry::new(),
        }
    }

    /// Handle one request
    pub async fn handle(&self, request: Request) -> Result<Reply> {
        let Some(action) = request.action.as_deref() else {
            return Ok(Reply::text(replies::MISSING_ACTION));
        };

        match action {
            "list" => self.list().await,
            "permission" => self.permission(request.device.as_deref()).await,
            "open" => self.open(request.device.as_deref()).await,
            "close" => Ok(self.close(request.device.as_deref())),
            _ => Ok(Reply::text(replies::INVALID_ACTION)),
        }
    }

    async fn list(&self) -> Result<Reply> {
        let devices = self.bridge.list_devices().await?;
        let mut text =
            serde_json::to_string(&devices).map_err(|e| Error::Other(e.to_string()))?;
        text.push('\n');
        Ok(Reply::text(text))
    }

    async fn permission(&self, device: Option<&str>) -> Result<Reply> {
        let Some(device) = self.lookup(device).await? else {
            return Ok(Reply::text(replies::NO_SUCH_DEVICE));
        };

        let granted = self.authorizer.authorize(&device).await;
        Ok(Reply::text(if granted {
            replies::GRANTED
        } else {
            replies::DENIED
        }))
    }

    async fn open(&self, device: Option<&str>) -> Result<Reply> {
        let Some(device) = self.lookup(device).await? else {
            return Ok(Reply::text(replies::NO_SUCH_DEVICE));
        };

        if !self.authorizer.authorize(&device).await {
            return Ok(Reply::text(replies::NO_PERMISSION));
        }

        match self.bridge.open_device(&device).await? {
            Ok(fd) => match fd.try_clone() {
                Ok(transfer) => {
                    let raw = self.registry.insert(&device, fd);
                    debug!("Opened {} as descriptor {}", device, raw);
                    Ok(Reply::with_fd(transfer))
                }
                Err(e) => {
                    warn!("Failed to duplicate descriptor for {}: {}", device, e);
                    Ok(Reply::text(replies::FAILED_OPEN))
                }
            },
            Err(e) => {
                warn!("Open failed for {}: {}", device, e);
                Ok(Reply::text(replies::FAILED_OPEN))
            }
        }
    }

    fn close(&self, device: Option<&str>) -> Reply {
        let Some(device) = device else {
            return Reply::text(replies::NO_SUCH_DEVICE);
        };

        // Held descriptors may outlive an unplug, so close consults only
        // the registry, not the current enumeration.
        let closed = self.registry.close_device(device);
        if closed > 0 {
            debug!(
                "Released {} descriptor(s) for {}, {} still held",
                closed,
                device,
                self.registry.held()
            );
            Reply::text(replies::CLOSED)
        } else {
            Reply::text(replies::NOT_OPEN)
        }
    }

    /// Per-request lookup against a fresh enumeration
    async fn lookup(&self, device: Option<&str>) -> Result<Option<String>> {
        let Some(name) = device else {
            return Ok(None);
        };
        let devices = self.bridge.list_devices().await?;
        Ok(devices.into_iter().find(|d| d == name))
    }
}
