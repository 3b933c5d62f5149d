//! Unix-socket front end
//!
//! One request per connection: read a framed request line, dispatch it,
//! write the reply text back, and attach the device descriptor as an
//! SCM_RIGHTS control message when one is transferred.

use crate::dispatch::{Gateway, Reply};
use anyhow::{Context, Result};
use nix::sys::socket::{ControlMessage, MsgFlags, sendmsg};
use protocol::{FD_CARRIER, ProtocolError, replies};
use std::io::IoSlice;
use std::os::fd::AsRawFd;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

pub struct IpcServer {
    listener: UnixListener,
    gateway: Arc<Gateway>,
}

impl IpcServer {
    /// Bind the gateway socket, replacing a stale one
    ///
    /// The socket is restricted to the daemon's own user.
    pub fn bind(path: &Path, gateway: Arc<Gateway>) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind socket {}", path.display()))?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict socket {}", path.display()))?;

        info!("Listening on {}", path.display());
        Ok(Self { listener, gateway })
    }

    /// Accept connections until the task is aborted
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, _addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept connection")?;

            let gateway = self.gateway.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(gateway, stream).await {
                    warn!("Connection failed: {:#}", e);
                }
            });
        }
    }
}

async fn handle_connection(gateway: Arc<Gateway>, stream: UnixStream) -> Result<()> {
    let mut reader = BufReader::new(stream);

    let reply = match protocol::read_request(&mut reader).await {
        Ok(Some(request)) => {
            debug!("Request: {:?}", request);
            gateway.handle(request).await?
        }
        // Closed without sending a request
        Ok(None) => return Ok(()),
        Err(ProtocolError::Io(e)) => return Err(e.into()),
        // No action is discernible in a line we could not parse
        Err(e) => {
            debug!("Unreadable request: {}", e);
            Reply::text(replies::MISSING_ACTION)
        }
    };

    let stream = reader
        .into_inner()
        .into_std()
        .context("Failed to detach stream")?;
    stream
        .set_nonblocking(false)
        .context("Failed to switch stream to blocking")?;

    tokio::task::spawn_blocking(move || write_reply(&stream, &reply))
        .await
        .context("Reply task failed")?
}

/// Single sendmsg carrying the reply text and, when present, the descriptor
fn write_reply(stream: &std::os::unix::net::UnixStream, reply: &Reply) -> Result<()> {
    // SCM_RIGHTS needs at least one payload byte to ride on.
    let payload: &[u8] = if reply.text.is_empty() {
        &[FD_CARRIER]
    } else {
        reply.text.as_bytes()
    };

    let raw_fds;
    let cmsgs: Vec<ControlMessage> = match &reply.fd {
        Some(fd) => {
            raw_fds = [fd.as_raw_fd()];
            vec![ControlMessage::ScmRights(&raw_fds)]
        }
        None => Vec::new(),
    };

    let iov = [IoSlice::new(payload)];
    let sent = sendmsg::<()>(
        stream.as_raw_fd(),
        &iov,
        &cmsgs,
        MsgFlags::empty(),
        None,
    )
    .context("Failed to send reply")?;

    if sent < payload.len() {
        use std::io::Write;
        (&*stream)
            .write_all(&payload[sent..])
            .context("Failed to finish reply")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Authorizer, GrantStore, PermissionBroker, StaticPrompter};
    use common::{UsbCommand, create_usb_bridge};
    use nix::sys::socket::{ControlMessageOwned, recvmsg};
    use protocol::Request;
    use std::io::{IoSliceMut, Write};
    use std::os::fd::{FromRawFd, OwnedFd, RawFd};
    use std::os::unix::fs::FileTypeExt;

    fn test_gateway(devices: Vec<&str>, verdict: bool) -> Arc<Gateway> {
        let devices: Vec<String> = devices.into_iter().map(String::from).collect();
        let (bridge, worker) = create_usb_bridge();

        std::thread::spawn(move || {
            while let Ok(cmd) = worker.recv_command() {
                match cmd {
                    UsbCommand::ListDevices { response } => {
                        let _ = response.send(devices.clone());
                    }
                    UsbCommand::OpenDevice { response, .. } => {
                        let fd = OwnedFd::from(std::fs::File::open("/dev/null").unwrap());
                        let _ = response.send(Ok(fd));
                    }
                    UsbCommand::Shutdown => break,
                }
            }
        });

        let broker = Arc::new(PermissionBroker::new());
        let authorizer = Authorizer::new(
            GrantStore::in_memory(),
            broker.clone(),
            Arc::new(StaticPrompter::new(broker, verdict)),
            None,
        );
        Arc::new(Gateway::new(bridge, authorizer))
    }

    /// Blocking client side: send one request, read text and any descriptor
    fn roundtrip(path: &Path, request: &Request) -> (String, Option<OwnedFd>) {
        let mut stream = std::os::unix::net::UnixStream::connect(path).unwrap();
        stream
            .write_all(&protocol::encode_request(request).unwrap())
            .unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();

        let mut text = Vec::new();
        let mut fd = None;
        loop {
            let mut buf = [0u8; 1024];
            let nread;
            let mut received = Vec::new();
            {
                let mut iov = [IoSliceMut::new(&mut buf)];
                let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);
                let msg = recvmsg::<()>(
                    stream.as_raw_fd(),
                    &mut iov,
                    Some(&mut cmsg_space),
                    MsgFlags::empty(),
                )
                .unwrap();
                nread = msg.bytes;
                for cmsg in msg.cmsgs().unwrap() {
                    if let ControlMessageOwned::ScmRights(fds) = cmsg {
                        received.extend(fds);
                    }
                }
            }
            for raw in received {
                let owned = unsafe { OwnedFd::from_raw_fd(raw) };
                fd.get_or_insert(owned);
            }
            if nread == 0 {
                break;
            }
            text.extend_from_slice(&buf[..nread]);
        }

        text.retain(|b| *b != FD_CARRIER);
        (String::from_utf8(text).unwrap(), fd)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.sock");
        let server = IpcServer::bind(&path, test_gateway(vec!["/dev/bus/usb/001/002"], true))
            .unwrap();
        let handle = tokio::spawn(server.run());

        let (text, fd) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || roundtrip(&path, &Request::list()))
                .await
                .unwrap()
        };
        assert_eq!(text, "[\"/dev/bus/usb/001/002\"]\n");
        assert!(fd.is_none());

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_transfers_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.sock");
        let server = IpcServer::bind(&path, test_gateway(vec!["/dev/bus/usb/001/002"], true))
            .unwrap();
        let handle = tokio::spawn(server.run());

        let (text, fd) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                roundtrip(&path, &Request::open("/dev/bus/usb/001/002"))
            })
            .await
            .unwrap()
        };
        assert_eq!(text, "");
        let fd = fd.expect("descriptor transferred");
        let file = std::fs::File::from(fd);
        assert!(file.metadata().unwrap().file_type().is_char_device());

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_denied_open_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.sock");
        let server = IpcServer::bind(&path, test_gateway(vec!["/dev/bus/usb/001/002"], false))
            .unwrap();
        let handle = tokio::spawn(server.run());

        let (text, fd) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                roundtrip(&path, &Request::open("/dev/bus/usb/001/002"))
            })
            .await
            .unwrap()
        };
        assert_eq!(text, replies::NO_PERMISSION);
        assert!(fd.is_none());

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_garbage_request_reports_missing_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.sock");
        let server = IpcServer::bind(&path, test_gateway(vec![], true)).unwrap();
        let handle = tokio::spawn(server.run());

        let (text, _fd) = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || {
                let mut stream = std::os::unix::net::UnixStream::connect(&path).unwrap();
                stream.write_all(b"not json\n").unwrap();
                stream.shutdown(std::net::Shutdown::Write).unwrap();
                use std::io::Read;
                let mut text = String::new();
                stream.read_to_string(&mut text).unwrap();
                (text, Option::<OwnedFd>::None)
            })
            .await
            .unwrap()
        };
        assert_eq!(text, replies::MISSING_ACTION);

        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.sock");
        std::fs::write(&path, b"stale").unwrap();

        let server = IpcServer::bind(&path, test_gateway(vec![], true));
        assert!(server.is_ok());
    }
}
