//! Systemd service integration
//!
//! sd-notify lifecycle messages for running under a Type=notify unit.
//! Every function is a no-op outside systemd.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use tracing::debug;

fn sd_notify(message: &str) -> Result<()> {
    let Ok(socket_path) = env::var("NOTIFY_SOCKET") else {
        debug!("NOTIFY_SOCKET not set, skipping systemd notification");
        return Ok(());
    };

    let socket = UnixDatagram::unbound().context("Failed to create notify socket")?;
    socket
        .send_to(message.as_bytes(), &socket_path)
        .with_context(|| format!("Failed to send {} to systemd", message))?;
    Ok(())
}

/// Notify systemd that initialization is complete
pub fn notify_ready() -> Result<()> {
    sd_notify("READY=1")
}

/// Notify systemd that shutdown has begun
pub fn notify_stopping() -> Result<()> {
    sd_notify("STOPPING=1")
}

/// Publish a status line visible in `systemctl status`
pub fn notify_status(status: &str) -> Result<()> {
    sd_notify(&format!("STATUS={}", status))
}

/// Check if running under systemd
pub fn is_systemd() -> bool {
    env::var("NOTIFY_SOCKET").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_socket_is_noop() {
        unsafe {
            env::remove_var("NOTIFY_SOCKET");
        }

        assert!(!is_systemd());
        assert!(notify_ready().is_ok());
        assert!(notify_stopping().is_ok());
        assert!(notify_status("test").is_ok());
    }
}
