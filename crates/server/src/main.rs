//! usbgate daemon
//!
//! Exposes host USB devices to local callers over a Unix socket: enumerate
//! devices, negotiate authorization per device, and hand an opened device
//! descriptor to the caller via SCM_RIGHTS.

mod config;
mod dispatch;
mod ipc;
mod permission;
mod registry;
mod service;
mod usb;

use anyhow::{Context, Result};
use clap::Parser;
use common::{UsbBridge, UsbCommand, create_usb_bridge, setup_logging};
use permission::{Authorizer, CommandPrompter, GrantStore, PermissionBroker, Prompter, StaticPrompter};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use usb::spawn_usb_worker;

#[derive(Parser, Debug)]
#[command(name = "usbgated")]
#[command(
    author,
    version,
    about = "USB gateway daemon - hand host USB devices to local callers"
)]
#[command(long_about = "
A small daemon exposing host USB devices over a Unix socket. Callers
enumerate devices, negotiate per-device authorization, and receive an
opened device descriptor via SCM_RIGHTS.

EXAMPLES:
    # Run with default config
    usbgated

    # Run with custom config
    usbgated --config /path/to/gateway.toml

    # List USB devices without starting the gateway
    usbgated --list-devices

    # Run with debug logging
    usbgated --log-level debug

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbgate/gateway.toml
    3. /etc/usbgate/gateway.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to the default location and exit
    #[arg(long)]
    save_config: bool,

    /// Gateway socket path override
    #[arg(short, long, value_name = "PATH")]
    socket: Option<std::path::PathBuf>,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config before loading anything
    if args.save_config {
        let config = config::GatewayConfig::default();
        let path = config::GatewayConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::GatewayConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        config::GatewayConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.server.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbgate daemon v{}", env!("CARGO_PKG_VERSION"));

    let (usb_bridge, worker) = create_usb_bridge();
    let usb_worker_handle = spawn_usb_worker(worker, config.usb.filters.clone());

    let result = if args.list_devices {
        list_devices_mode(&usb_bridge).await
    } else {
        run_gateway(&args, config, usb_bridge.clone()).await
    };

    info!("Shutting down USB subsystem...");
    if let Err(e) = usb_bridge.send_command(UsbCommand::Shutdown).await {
        error!("Error shutting down USB worker: {:#}", e);
    }
    match usb_worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("USB worker failed: {}", e),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    result
}

/// List USB devices and exit
async fn list_devices_mode(usb_bridge: &UsbBridge) -> Result<()> {
    let devices = usb_bridge
        .list_devices()
        .await
        .context("Failed to list devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
    } else {
        println!("Found {} USB device(s):", devices.len());
        for device in devices {
            println!("  {}", device);
        }
    }

    Ok(())
}

/// Run the gateway until Ctrl+C
async fn run_gateway(
    args: &Args,
    config: config::GatewayConfig,
    usb_bridge: UsbBridge,
) -> Result<()> {
    if service::is_systemd() {
        info!("Running under systemd");
    }

    let broker = Arc::new(PermissionBroker::new());

    let grants = match config.grants_path() {
        Some(path) => {
            info!("Persisting grants to {}", path.display());
            GrantStore::load(path)
        }
        None => GrantStore::in_memory(),
    };

    let prompter: Arc<dyn Prompter> = match &config.permission.prompt_command {
        Some(argv) => {
            info!("Authorization prompts handled by: {}", argv.join(" "));
            Arc::new(CommandPrompter::new(broker.clone(), argv.clone()))
        }
        None if config.permission.auto_grant => {
            warn!("No prompt helper configured, granting every request");
            Arc::new(StaticPrompter::new(broker.clone(), true))
        }
        None => {
            info!("No prompt helper configured, denying unauthorized requests");
            Arc::new(StaticPrompter::new(broker.clone(), false))
        }
    };

    let authorizer = Authorizer::new(
        grants,
        broker.clone(),
        prompter,
        config.permission.prompt_timeout(),
    );
    let gateway = Arc::new(dispatch::Gateway::new(usb_bridge, authorizer));

    let socket_path = args.socket.clone().unwrap_or_else(|| config.socket_path());
    let server = ipc::IpcServer::bind(&socket_path, gateway)?;

    service::notify_ready().context("Failed to notify systemd ready")?;
    service::notify_status("Running - waiting for requests")
        .context("Failed to send status to systemd")?;

    info!("Press Ctrl+C to shutdown");
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {:#}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }

    service::notify_stopping().context("Failed to notify systemd stopping")?;
    server_handle.abort();

    let pending = broker.pending_count();
    if pending > 0 {
        warn!("Abandoning {} pending authorization prompt(s)", pending);
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!("Failed to remove socket {}: {}", socket_path.display(), e);
    }

    info!("Gateway shutdown complete");
    Ok(())
}
