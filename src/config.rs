//! Configuration management for mptcpctl

use crate::error::{NetctlError, NetctlResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main mptcpctl configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MptcpctlConfig {
    /// Kernel text sources
    #[serde(default)]
    pub paths: ConfigPaths,
    /// Command execution settings
    #[serde(default)]
    pub shell: ShellSettings,
    /// Interface discovery settings
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Policy routing settings
    #[serde(default)]
    pub routing: RoutingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPaths {
    /// Per-device state directory; one entry per live device
    #[serde(default = "default_sys_class_net")]
    pub sys_class_net: PathBuf,
    /// Kernel network-device counter table
    #[serde(default = "default_proc_net_dev")]
    pub proc_net_dev: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Shell used to interpret command lines
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Elevated shell that reads commands from stdin
    #[serde(default = "default_root_shell")]
    pub root_shell: String,
    /// Per-command timeout (seconds, 0 disables)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Interface configuration display tool
    #[serde(default = "default_ifconfig")]
    pub ifconfig: String,
    /// iproute2 binary
    #[serde(default = "default_ip")]
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Devices that never count as live (loopback and other pseudo-devices)
    #[serde(default = "default_excluded_devices")]
    pub excluded_devices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Upper bound on default-route deletions per clear
    #[serde(default = "default_clear_attempts")]
    pub clear_default_max_attempts: u32,
    /// Route changes go through the root shell
    #[serde(default = "default_use_root_shell")]
    pub use_root_shell: bool,
    /// Device name -> table name overrides for classification
    #[serde(default)]
    pub device_tables: BTreeMap<String, String>,
}

fn default_sys_class_net() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

fn default_proc_net_dev() -> PathBuf {
    PathBuf::from("/proc/net/dev")
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_root_shell() -> String {
    "su".to_string()
}

fn default_command_timeout() -> u64 {
    10
}

fn default_ifconfig() -> String {
    "ifconfig".to_string()
}

fn default_ip() -> String {
    "ip".to_string()
}

fn default_excluded_devices() -> Vec<String> {
    vec!["lo".to_string()]
}

fn default_clear_attempts() -> u32 {
    8
}

fn default_use_root_shell() -> bool {
    true
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            sys_class_net: default_sys_class_net(),
            proc_net_dev: default_proc_net_dev(),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            root_shell: default_root_shell(),
            command_timeout_secs: default_command_timeout(),
            ifconfig: default_ifconfig(),
            ip: default_ip(),
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            excluded_devices: default_excluded_devices(),
        }
    }
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            clear_default_max_attempts: default_clear_attempts(),
            use_root_shell: default_use_root_shell(),
            device_tables: BTreeMap::new(),
        }
    }
}

impl ShellSettings {
    /// Command timeout, `None` when disabled
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}

impl MptcpctlConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> NetctlResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NetctlError::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| NetctlError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> NetctlResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NetctlError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| NetctlError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
