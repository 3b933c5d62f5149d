//! Gateway configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub permission: PermissionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Gateway socket path; defaults to the runtime directory when unset
    pub socket_path: Option<PathBuf>,
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsbSettings {
    /// VID:PID patterns restricting which devices are exposed (empty = all)
    #[serde(default)]
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSettings {
    /// Helper command answering authorization prompts
    ///
    /// The device reference is appended as the final argument; exit status
    /// zero grants. Unset means no prompting: requests are decided by
    /// `auto_grant`.
    #[serde(default)]
    pub prompt_command: Option<Vec<String>>,

    /// Seconds to wait for a prompt outcome; zero waits forever
    #[serde(default = "PermissionSettings::default_timeout")]
    pub prompt_timeout_secs: u64,

    /// Grant every prompt when no helper command is configured
    #[serde(default)]
    pub auto_grant: bool,

    /// File persisting granted devices across restarts
    #[serde(default)]
    pub grants_path: Option<PathBuf>,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            prompt_command: None,
            prompt_timeout_secs: Self::default_timeout(),
            auto_grant: false,
            grants_path: None,
        }
    }
}

impl PermissionSettings {
    fn default_timeout() -> u64 {
        60
    }

    /// Bounded prompt wait, or None when configured to wait forever
    pub fn prompt_timeout(&self) -> Option<Duration> {
        (self.prompt_timeout_secs > 0).then(|| Duration::from_secs(self.prompt_timeout_secs))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                socket_path: None,
                log_level: "info".to_string(),
            },
            usb: UsbSettings::default(),
            permission: PermissionSettings::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbgate/gateway.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: GatewayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbgate").join("gateway.toml")
        } else {
            PathBuf::from(".config/usbgate/gateway.toml")
        }
    }

    /// Effective socket path
    pub fn socket_path(&self) -> PathBuf {
        self.server
            .socket_path
            .clone()
            .unwrap_or_else(Self::default_socket_path)
    }

    /// Default gateway socket location
    pub fn default_socket_path() -> PathBuf {
        if let Some(runtime_dir) = dirs::runtime_dir() {
            runtime_dir.join("usbgate.sock")
        } else {
            PathBuf::from("/run/usbgate.sock")
        }
    }

    /// Grants file with a tilde expanded, if one is configured
    pub fn grants_path(&self) -> Option<PathBuf> {
        self.permission
            .grants_path
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.server.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.server.log_level,
                valid_levels.join(", ")
            ));
        }

        for filter in &self.usb.filters {
            Self::validate_filter(filter)?;
        }

        if let Some(argv) = &self.permission.prompt_command {
            if argv.is_empty() {
                return Err(anyhow!("prompt_command must name a program"));
            }
        }

        Ok(())
    }

    /// Validate a USB device filter pattern (VID:PID)
    fn validate_filter(filter: &str) -> Result<()> {
        let Some((vid, pid)) = filter.split_once(':') else {
            return Err(anyhow!(
                "Invalid filter format '{}', expected VID:PID (e.g., '0x1234:0x5678' or '0x1234:*')",
                filter
            ));
        };

        for (name, part) in [("VID", vid), ("PID", pid)] {
            if part == "*" {
                continue;
            }
            let hex = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .ok_or_else(|| {
                    anyhow!("Invalid {} '{}', must start with '0x' (e.g., '0x1234')", name, part)
                })?;
            if hex.is_empty() || hex.len() > 4 {
                return Err(anyhow!(
                    "Invalid {} '{}', hex part must be 1-4 digits",
                    name,
                    part
                ));
            }
            u16::from_str_radix(hex, 16)
                .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, part))?;
        }

        Ok(())
    }
}
