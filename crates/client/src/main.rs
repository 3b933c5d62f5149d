//! usbgate client
//!
//! Thin CLI for the gateway daemon: send one request over the gateway
//! socket, print the reply text, and for `open` receive the transferred
//! device descriptor, optionally running a program with it.

mod transport;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use protocol::{Request, replies};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "usbgate")]
#[command(author, version, about = "Talk to the usbgate daemon")]
struct Args {
    /// Gateway socket path
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List connected USB devices
    List,

    /// Request authorization for a device
    Permission {
        /// Device reference, e.g. /dev/bus/usb/001/004
        device: String,
    },

    /// Open a device and receive its descriptor
    Open {
        /// Device reference, e.g. /dev/bus/usb/001/004
        device: String,

        /// Run CMD with the descriptor number appended as its last argument
        #[arg(short, long, value_name = "CMD", num_args = 1..)]
        execute: Option<Vec<String>>,
    },

    /// Release descriptors the daemon holds for a device
    Close {
        /// Device reference, e.g. /dev/bus/usb/001/004
        device: String,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let socket = args.socket.clone().unwrap_or_else(default_socket_path);

    let request = match &args.command {
        Command::List => Request::list(),
        Command::Permission { device } => Request::permission(device),
        Command::Open { device, .. } => Request::open(device),
        Command::Close { device } => Request::close(device),
    };

    let reply = transport::roundtrip(&socket, &request)
        .with_context(|| format!("Failed to reach gateway at {}", socket.display()))?;

    print!("{}", reply.text);
    if replies::is_failure(&reply.text) {
        return Ok(ExitCode::FAILURE);
    }

    if let Command::Open {
        execute: Some(argv), ..
    } = &args.command
    {
        let fd = reply
            .fd
            .ok_or_else(|| anyhow!("Gateway transferred no descriptor"))?;
        return Ok(ExitCode::from(transport::run_with_fd(argv, fd)?));
    }

    Ok(ExitCode::SUCCESS)
}

fn default_socket_path() -> PathBuf {
    if let Some(runtime_dir) = dirs::runtime_dir() {
        runtime_dir.join("usbgate.sock")
    } else {
        PathBuf::from("/run/usbgate.sock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_with_execute() {
        let args = Args::try_parse_from([
            "usbgate",
            "open",
            "/dev/bus/usb/001/002",
            "--execute",
            "lsusb",
        ])
        .unwrap();

        match args.command {
            Command::Open { device, execute } => {
                assert_eq!(device, "/dev/bus/usb/001/002");
                assert_eq!(execute.unwrap(), vec!["lsusb"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_socket_override() {
        let args =
            Args::try_parse_from(["usbgate", "--socket", "/tmp/test.sock", "list"]).unwrap();
        assert_eq!(args.socket.unwrap(), PathBuf::from("/tmp/test.sock"));
    }

    #[test]
    fn test_device_required_for_permission() {
        assert!(Args::try_parse_from(["usbgate", "permission"]).is_err());
    }
}
