//! Per-interface policy routing tables
//!
//! Each uplink class owns a numbered table so packets from that interface
//! can be routed out of it regardless of the main table. The numbering must
//! already exist in `/etc/iproute2/rt_tables`:
//!
//! ```text
//! 255     local
//! 254     main
//! 253     default
//! 0       unspec
//! 2       ethernet
//! 3       wireless
//! 4       modem
//! ```
//!
//! When an interface comes up its table receives a link-scope route for the
//! local network and a default route via the interface gateway:
//!
//! ```text
//! ip route add table 2 to 192.168.1.0/24 dev eth0 scope link
//! ip route add table 2 default via 192.168.1.1 dev eth0
//! ```
//!
//! Only the interface tables (ethernet, wireless, modem) may be targeted;
//! anything else is rejected before a command is issued.

use crate::config::MptcpctlConfig;
use crate::error::{NetctlError, NetctlResult};
use crate::interface::{InterfaceKind, NetworkInterface};
use crate::shell::ShellGateway;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The closed set of routing tables known to this system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTable {
    Unspec,
    Ethernet,
    Wireless,
    Modem,
    Default,
    Main,
    Local,
}

impl RouteTable {
    pub const ALL: [RouteTable; 7] = [
        RouteTable::Local,
        RouteTable::Main,
        RouteTable::Default,
        RouteTable::Unspec,
        RouteTable::Ethernet,
        RouteTable::Wireless,
        RouteTable::Modem,
    ];

    /// Kernel table number
    pub fn id(self) -> u32 {
        match self {
            RouteTable::Unspec => 0,
            RouteTable::Ethernet => 2,
            RouteTable::Wireless => 3,
            RouteTable::Modem => 4,
            RouteTable::Default => 253,
            RouteTable::Main => 254,
            RouteTable::Local => 255,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RouteTable::Unspec => "unspec",
            RouteTable::Ethernet => "ethernet",
            RouteTable::Wireless => "wireless",
            RouteTable::Modem => "modem",
            RouteTable::Default => "default",
            RouteTable::Main => "main",
            RouteTable::Local => "local",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.id() == id)
    }

    /// Tables that interface provisioning may write to
    pub fn is_interface_table(self) -> bool {
        matches!(self, RouteTable::Ethernet | RouteTable::Wireless | RouteTable::Modem)
    }

    pub fn for_kind(kind: InterfaceKind) -> Option<Self> {
        match kind {
            InterfaceKind::Ethernet => Some(RouteTable::Ethernet),
            InterfaceKind::Wireless => Some(RouteTable::Wireless),
            InterfaceKind::Modem => Some(RouteTable::Modem),
            InterfaceKind::Other => None,
        }
    }

    /// Expected `/etc/iproute2/rt_tables` content
    pub fn rt_tables_entries() -> String {
        Self::ALL
            .iter()
            .map(|table| format!("{}\t{}\n", table.id(), table.name()))
            .collect()
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

impl FromStr for RouteTable {
    type Err = NetctlError;

    /// Accepts a table name or number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let found = match s.parse::<u32>() {
            Ok(id) => Self::from_id(id),
            Err(_) => Self::ALL.into_iter().find(|table| table.name().eq_ignore_ascii_case(s)),
        };
        found.ok_or_else(|| NetctlError::PolicyViolation(format!("unknown routing table '{}'", s)))
    }
}

/// Reject any table outside the interface set
pub fn ensure_interface_table(table: RouteTable) -> NetctlResult<RouteTable> {
    if table.is_interface_table() {
        Ok(table)
    } else {
        Err(NetctlError::PolicyViolation(format!(
            "table {} is not an interface table",
            table
        )))
    }
}

/// Parse a subnet given either as a dotted mask or a prefix length
pub fn mask_prefix_len(mask: &str) -> NetctlResult<u8> {
    let mask = mask.trim();
    match mask.parse::<u8>() {
        Ok(prefix) if prefix <= 32 => Ok(prefix),
        Ok(prefix) => Err(NetctlError::InvalidParameter(format!(
            "Prefix length {} exceeds maximum 32",
            prefix
        ))),
        Err(_) => validation::validate_netmask(mask),
    }
}

/// Network address of `ip` under `mask` (`10.0.5.12` & `255.255.255.0` = `10.0.5.0`)
pub fn network_address(ip: &str, mask: &str) -> NetctlResult<Ipv4Addr> {
    let ip = validation::validate_ipv4_address(ip)?;
    let prefix = mask_prefix_len(mask)?;
    Ok(mask_address(ip, prefix))
}

fn mask_address(addr: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    Ipv4Addr::from(u32::from(addr) & mask)
}

/// Issues policy routing changes through the shell gateway
pub struct RouteTableManager {
    shell: Arc<dyn ShellGateway>,
    ip: String,
    use_root_shell: bool,
    clear_max_attempts: u32,
    device_tables: BTreeMap<String, String>,
}

impl RouteTableManager {
    pub fn new(shell: Arc<dyn ShellGateway>, config: &MptcpctlConfig) -> Self {
        Self {
            shell,
            ip: config.shell.ip.clone(),
            use_root_shell: config.routing.use_root_shell,
            clear_max_attempts: config.routing.clear_default_max_attempts.max(1),
            device_tables: config.routing.device_tables.clone(),
        }
    }

    /// Parse a caller-supplied table and check it is an interface table
    pub fn resolve_table(&self, table: &str) -> NetctlResult<RouteTable> {
        ensure_interface_table(table.parse()?)
    }

    /// Pick the table for a device: configured override first, then the
    /// device class
    pub fn table_for_device(&self, device: &str) -> NetctlResult<RouteTable> {
        if let Some(table) = self.device_tables.get(device) {
            return self.resolve_table(table);
        }
        RouteTable::for_kind(InterfaceKind::classify(device)).ok_or_else(|| {
            NetctlError::PolicyViolation(format!("no routing table for device '{}'", device))
        })
    }

    /// Install a link-scope route for `network_address/subnet_mask` via
    /// `device` into `table`
    pub async fn add_network_route(
        &self,
        table: RouteTable,
        device: &str,
        network_address: &str,
        subnet_mask: &str,
    ) -> NetctlResult<()> {
        let table = ensure_interface_table(table)?;
        validation::validate_interface_name(device)?;
        let address = validation::validate_ipv4_address(network_address)?;
        let prefix = mask_prefix_len(subnet_mask)?;
        let network = mask_address(address, prefix);

        self.run_ip(&format!(
            "route add table {} to {}/{} dev {} scope link",
            table.id(),
            network,
            prefix,
            device
        ))
        .await
    }

    /// Install a default route via `gateway` on `device` into `table`
    pub async fn add_gateway_route(&self, table: RouteTable, device: &str, gateway: &str) -> NetctlResult<()> {
        let table = ensure_interface_table(table)?;
        validation::validate_interface_name(device)?;
        let gateway = validation::validate_ipv4_address(gateway)?;

        self.run_ip(&format!(
            "route add table {} default via {} dev {}",
            table.id(),
            gateway,
            device
        ))
        .await
    }

    /// Install the main-table fallback default route with an explicit next hop
    pub async fn add_default_hop(&self, address: &str, device: &str) -> NetctlResult<()> {
        let address = validation::validate_ipv4_address(address)?;
        validation::validate_interface_name(device)?;

        self.run_ip(&format!(
            "route add default scope global nexthop via {} dev {}",
            address, device
        ))
        .await
    }

    /// Delete main-table default routes until none is left.
    ///
    /// Stops when the delete reports no matching route, or after the
    /// configured number of attempts. Returns how many routes were deleted.
    pub async fn clear_default_routes(&self) -> NetctlResult<u32> {
        let mut deleted = 0;
        while deleted < self.clear_max_attempts {
            match self.run_ip("route del 0.0.0.0/0 table main").await {
                Ok(()) => deleted += 1,
                Err(e) if is_no_such_route(&e) => {
                    debug!("No default route left after {} deletion(s)", deleted);
                    return Ok(deleted);
                }
                Err(e) => return Err(e),
            }
        }
        warn!(
            "Stopped clearing default routes after {} deletions, more may remain",
            deleted
        );
        Ok(deleted)
    }

    /// Remove every route from `table`
    pub async fn flush_table(&self, table: RouteTable) -> NetctlResult<()> {
        let table = ensure_interface_table(table)?;
        self.run_ip(&format!("route flush table {}", table.id())).await
    }

    /// Build `table` for an interface that just acquired its address:
    /// the local network route, then the gateway route
    pub async fn provision(&self, table: RouteTable, iface: &NetworkInterface, gateway: &str) -> NetctlResult<()> {
        let table = ensure_interface_table(table)?;
        if !iface.has_address() {
            return Err(NetctlError::InvalidParameter(format!(
                "{} has no address to provision",
                iface.device
            )));
        }
        let network = network_address(&iface.ip_address, &iface.network_mask)?;
        validation::validate_ipv4_address(gateway)?;

        self.add_network_route(table, &iface.device, &network.to_string(), &iface.network_mask)
            .await?;
        self.add_gateway_route(table, &iface.device, gateway).await?;
        info!("{}: table {} built via {}", iface.device, table, gateway);
        Ok(())
    }

    /// Return `table` to the unprovisioned state
    pub async fn teardown(&self, table: RouteTable) -> NetctlResult<()> {
        self.flush_table(table).await?;
        info!("Table {} flushed", table);
        Ok(())
    }

    /// Ping `address` once through `device`
    pub async fn check_connection(&self, address: &str, device: &str) -> bool {
        if validation::validate_ipv4_address(address).is_err()
            || validation::validate_interface_name(device).is_err()
        {
            return false;
        }
        let command = format!("ping -c 1 -W 2 -I {} {}", device, address);
        match self.shell.run(&command).await {
            Ok(_) => true,
            Err(e) => {
                debug!("{}: {} unreachable: {}", device, address, e);
                false
            }
        }
    }

    // === Helper functions ===

    async fn run_ip(&self, args: &str) -> NetctlResult<()> {
        let command = format!("{} {}", self.ip, args);
        debug!("route change: {}", command);
        if self.use_root_shell {
            self.shell.run_as_root(&command).await?;
        } else {
            self.shell.run(&command).await?;
        }
        Ok(())
    }
}

fn is_no_such_route(error: &NetctlError) -> bool {
    match error {
        NetctlError::CommandFailed { stderr, .. } => {
            stderr.contains("No such process") || stderr.contains("Cannot find")
        }
        _ => false,
    }
}
