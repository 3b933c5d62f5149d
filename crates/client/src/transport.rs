//! Socket transport
//!
//! Blocking request/reply against the gateway socket. The reply is read to
//! EOF with `recvmsg` so an SCM_RIGHTS descriptor can arrive alongside the
//! text.

use anyhow::{Context, Result};
use nix::sys::socket::{ControlMessageOwned, MsgFlags, recvmsg};
use protocol::{FD_CARRIER, Request, encode_request};
use std::io::{IoSliceMut, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Reply text plus the transferred descriptor, if any
pub struct GatewayReply {
    pub text: String,
    pub fd: Option<OwnedFd>,
}

/// Send one request and collect the whole reply
pub fn roundtrip(socket: &Path, request: &Request) -> Result<GatewayReply> {
    let mut stream = UnixStream::connect(socket).context("Failed to connect")?;

    let bytes = encode_request(request).context("Failed to encode request")?;
    stream.write_all(&bytes).context("Failed to send request")?;
    stream
        .shutdown(std::net::Shutdown::Write)
        .context("Failed to close write side")?;

    recv_reply(&stream)
}

fn recv_reply(stream: &UnixStream) -> Result<GatewayReply> {
    let mut text = Vec::new();
    let mut fd = None;

    loop {
        let mut buf = [0u8; 4096];
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
            .context("Failed to receive reply")?;

            nread = msg.bytes;
            for cmsg in msg.cmsgs().context("Failed to read control messages")? {
                if let ControlMessageOwned::ScmRights(fds) = cmsg {
                    received.extend(fds);
                }
            }
        }

        for raw in received {
            // Ownership of received descriptors passes to us either way;
            // extras beyond the first are dropped closed.
            let owned = unsafe { OwnedFd::from_raw_fd(raw) };
            fd.get_or_insert(owned);
        }

        if nread == 0 {
            break;
        }
        text.extend_from_slice(&buf[..nread]);
    }

    // Strip the carrier byte that ferries an fd-only reply.
    text.retain(|b| *b != FD_CARRIER);

    Ok(GatewayReply {
        text: String::from_utf8_lossy(&text).into_owned(),
        fd,
    })
}

/// Run a program with the received descriptor
///
/// Descriptors from recvmsg arrive without close-on-exec, so the child
/// inherits it as-is; its number is appended as the final argument. Returns
/// the child's exit status.
pub fn run_with_fd(argv: &[String], fd: OwnedFd) -> Result<u8> {
    let (program, args) = argv.split_first().context("Empty command")?;

    let status = std::process::Command::new(program)
        .args(args)
        .arg(fd.as_raw_fd().to_string())
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    drop(fd);
    Ok(status.code().map_or(1, |code| code.clamp(0, 255) as u8))
}
