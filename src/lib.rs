//! mptcpctl - Multipath Interface Control Library
//!
//! Async library for hosts that run several uplinks side by side:
//! - Interface discovery with addressing and traffic counters
//! - Per-interface policy routing tables (ethernet, wireless, modem)
//! - Main-table default route fallbacks
//! - MPTCP kernel switches and DHCP lease properties
//!
//! All kernel state is read from sysfs/procfs text or by running commands
//! through a [`ShellGateway`], which tests replace with a fake.

pub mod error;
pub mod validation;
pub mod config;
pub mod shell;
pub mod stats;
pub mod interface;
pub mod registry;
pub mod routing;
pub mod sysctl;
pub mod property;

// Re-export commonly used types
pub use error::{NetctlError, NetctlResult};
pub use config::MptcpctlConfig;
pub use shell::{ShellGateway, SystemShell};
pub use stats::StatsParseError;
pub use interface::{InterfaceCounters, InterfaceKind, NetworkInterface, ReceiveCounters, TransmitCounters};
pub use registry::InterfaceRegistry;
pub use routing::{RouteTable, RouteTableManager};
pub use sysctl::{MptcpControl, Sysctl};
pub use property::{dhcp_lease, DhcpLease, GetpropStore, PropertyStore};
