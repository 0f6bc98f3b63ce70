//! Interface discovery and refresh
//!
//! The registry owns the set of known [`NetworkInterface`] records. Liveness
//! is the presence of the device's directory under `/sys/class/net`; a dead
//! device is reset to the blank state without any further query. A live one
//! has its MAC read from sysfs, its addressing taken from `ifconfig` output
//! and its counters from the kernel counter table.
//!
//! Every query failure is absorbed into that field's default so one
//! misbehaving device never aborts a whole pass.

use crate::config::MptcpctlConfig;
use crate::interface::{
    InterfaceCounters, NetworkInterface, BLANK_BROADCAST, BLANK_IP, BLANK_MAC, BLANK_NETMASK,
};
use crate::shell::ShellGateway;
use crate::stats;
use crate::validation;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Addressing columns of the `inet` line of interface configuration output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InetFields {
    pub ip: Option<String>,
    pub broadcast: Option<String>,
    pub mask: Option<String>,
}

impl InetFields {
    /// Extract addressing from `ifconfig <dev>` text.
    ///
    /// Columns of the `inet` line: field 2 = IP, field 3 = broadcast,
    /// field 4 = mask, with `addr:`/`Bcast:`/`Mask:` labels stripped. A
    /// labelled token wins over its column position, so a line without a
    /// broadcast column does not shift the mask into it. The keyword layout
    /// of newer net-tools (`inet A netmask M broadcast B`) is accepted too.
    /// Values that are not IPv4 addresses are dropped.
    pub fn parse(text: &str) -> Self {
        let Some(line) = text
            .lines()
            .find(|line| line.split_whitespace().next() == Some("inet"))
        else {
            return Self::default();
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let mut fields = Self::default();
        if tokens.contains(&"netmask") {
            let after = |keyword: &str| {
                tokens
                    .iter()
                    .position(|t| *t == keyword)
                    .and_then(|i| tokens.get(i + 1))
                    .map(|v| v.to_string())
            };
            fields.ip = tokens.get(1).map(|v| v.to_string());
            fields.mask = after("netmask");
            fields.broadcast = after("broadcast");
        } else {
            for (pos, token) in tokens.iter().enumerate().skip(1) {
                let (label, value) = match token.split_once(':') {
                    Some((label, value)) => (Some(label.to_ascii_lowercase()), value),
                    None => (None, *token),
                };
                let slot = match (label.as_deref(), pos) {
                    (Some("addr") | Some("inet"), _) | (None, 1) => &mut fields.ip,
                    (Some("bcast") | Some("broadcast"), _) | (None, 2) => &mut fields.broadcast,
                    (Some("mask") | Some("netmask"), _) | (None, 3) => &mut fields.mask,
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(value.to_string());
                }
            }
        }

        let ipv4 = |v: Option<String>| v.filter(|v| validation::validate_ipv4_address(v).is_ok());
        Self {
            ip: ipv4(fields.ip),
            broadcast: ipv4(fields.broadcast),
            mask: ipv4(fields.mask),
        }
    }
}

/// Owner of the known interface set
pub struct InterfaceRegistry {
    shell: Arc<dyn ShellGateway>,
    sys_class_net: PathBuf,
    proc_net_dev: PathBuf,
    ifconfig: String,
    excluded_devices: Vec<String>,
    interfaces: RwLock<Vec<NetworkInterface>>,
    // One discovery/refresh pass at a time
    pass_lock: Mutex<()>,
}

impl InterfaceRegistry {
    pub fn new(shell: Arc<dyn ShellGateway>, config: &MptcpctlConfig) -> Self {
        Self {
            shell,
            sys_class_net: config.paths.sys_class_net.clone(),
            proc_net_dev: config.paths.proc_net_dev.clone(),
            ifconfig: config.shell.ifconfig.clone(),
            excluded_devices: config.registry.excluded_devices.clone(),
            interfaces: RwLock::new(Vec::new()),
            pass_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the known interfaces
    pub async fn interfaces(&self) -> Vec<NetworkInterface> {
        self.interfaces.read().await.clone()
    }

    /// Snapshot of one known interface
    pub async fn get(&self, device: &str) -> Option<NetworkInterface> {
        self.interfaces
            .read()
            .await
            .iter()
            .find(|iface| iface.device == device)
            .cloned()
    }

    /// Rebuild the interface set from the live devices.
    ///
    /// Returns one refreshed record per live device in discovery order; an
    /// empty set when nothing is live.
    pub async fn discover(&self) -> Vec<NetworkInterface> {
        let _pass = self.pass_lock.lock().await;
        let live = self.live_devices().await;
        self.rebuild(live).await
    }

    /// Refresh every known interface.
    ///
    /// When the live device set no longer matches the known set the whole
    /// set is dropped and rediscovered instead of reconciled.
    pub async fn refresh(&self) -> Vec<NetworkInterface> {
        let _pass = self.pass_lock.lock().await;
        let known = self.interfaces.read().await.clone();
        let live = self.live_devices().await;

        let unchanged = live.len() == known.len()
            && live.iter().zip(&known).all(|(name, iface)| *name == iface.device);
        if !unchanged {
            info!(
                "Interface set changed ({} known, {} live), rediscovering",
                known.len(),
                live.len()
            );
            return self.rebuild(live).await;
        }

        let mut refreshed = Vec::with_capacity(known.len());
        for iface in &known {
            refreshed.push(self.refresh_one(iface).await);
        }
        *self.interfaces.write().await = refreshed.clone();
        refreshed
    }

    /// Refresh a single known interface in place
    pub async fn refresh_device(&self, device: &str) -> Option<NetworkInterface> {
        let _pass = self.pass_lock.lock().await;
        let current = self.get(device).await?;
        let updated = self.refresh_one(&current).await;

        let mut interfaces = self.interfaces.write().await;
        if let Some(slot) = interfaces.iter_mut().find(|iface| iface.device == device) {
            *slot = updated.clone();
        }
        Some(updated)
    }

    /// Build the replacement record for one interface.
    ///
    /// Does not touch the registry's set. A dead device yields the blank
    /// state with its name preserved. For a live device each addressing
    /// field falls back to its own default, and counters are replaced only
    /// when a complete row of sixteen parses; otherwise the previous
    /// counters are kept.
    pub async fn refresh_one(&self, iface: &NetworkInterface) -> NetworkInterface {
        let device = iface.device.as_str();
        if !self.is_live(device).await {
            debug!("{} is not live, resetting to blank", device);
            return NetworkInterface::blank(device);
        }

        let mac_address = self.query_mac(device).await;
        let inet = self.query_inet(device).await;
        let counters = self.query_counters(device).await.unwrap_or(iface.counters);

        NetworkInterface {
            device: device.to_string(),
            mac_address,
            ip_address: inet.ip.unwrap_or_else(|| BLANK_IP.to_string()),
            broadcast_address: inet.broadcast.unwrap_or_else(|| BLANK_BROADCAST.to_string()),
            network_mask: inet.mask.unwrap_or_else(|| BLANK_NETMASK.to_string()),
            counters,
        }
    }

    /// Liveness check: the device's state directory exists and the name is
    /// not excluded by policy
    pub async fn is_live(&self, device: &str) -> bool {
        if let Err(e) = validation::validate_interface_name(device) {
            debug!("Skipping {}: {}", device, e);
            return false;
        }
        if self.excluded_devices.iter().any(|excluded| excluded == device) {
            return false;
        }
        fs::metadata(self.sys_class_net.join(device))
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    // === Helper functions ===

    async fn rebuild(&self, live: Vec<String>) -> Vec<NetworkInterface> {
        let mut fresh = Vec::with_capacity(live.len());
        for device in live {
            fresh.push(self.refresh_one(&NetworkInterface::blank(device)).await);
        }
        info!("Discovered {} interface(s)", fresh.len());
        *self.interfaces.write().await = fresh.clone();
        fresh
    }

    async fn live_devices(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.sys_class_net).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.sys_class_net.display(), e);
                return Vec::new();
            }
        };

        let mut candidates = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Some(name) = entry.file_name().to_str() {
                        candidates.push(name.to_string());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Error listing {}: {}", self.sys_class_net.display(), e);
                    break;
                }
            }
        }
        candidates.sort();

        let mut live = Vec::with_capacity(candidates.len());
        for name in candidates {
            if self.is_live(&name).await {
                live.push(name);
            }
        }
        live
    }

    async fn query_mac(&self, device: &str) -> String {
        let path = self.sys_class_net.join(device).join("address");
        match fs::read_to_string(&path).await {
            Ok(mac) if validation::validate_mac_address(mac.trim()).is_ok() => mac.trim().to_string(),
            Ok(mac) => {
                debug!("{}: unusable MAC '{}'", device, mac.trim());
                BLANK_MAC.to_string()
            }
            Err(e) => {
                debug!("{}: cannot read MAC: {}", device, e);
                BLANK_MAC.to_string()
            }
        }
    }

    async fn query_inet(&self, device: &str) -> InetFields {
        let command = format!("{} {}", self.ifconfig, device);
        match self.shell.run(&command).await {
            Ok(output) => InetFields::parse(&output),
            Err(e) => {
                warn!("{}: addressing query failed: {}", device, e);
                InetFields::default()
            }
        }
    }

    async fn query_counters(&self, device: &str) -> Option<InterfaceCounters> {
        let table = match fs::read_to_string(&self.proc_net_dev).await {
            Ok(table) => table,
            Err(e) => {
                warn!("Cannot read {}: {}", self.proc_net_dev.display(), e);
                return None;
            }
        };

        let Some(row) = stats::device_row(&table, device) else {
            debug!("{}: no counter row", device);
            return None;
        };

        match stats::parse(row) {
            Ok(values) => Some(InterfaceCounters::from_array(values)),
            Err(e) => {
                warn!("{}: keeping previous counters: {}", device, e);
                None
            }
        }
    }
}
