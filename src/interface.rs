//! Network interface entity model
//!
//! A [`NetworkInterface`] is either blank (device absent or unknown) or
//! populated from the most recent successful query. The registry replaces
//! records wholesale; nothing else mutates them.

use crate::stats::COUNTER_COUNT;
use serde::{Deserialize, Serialize};

pub const BLANK_MAC: &str = "FF:FF:FF:FF:FF:FF";
pub const BLANK_IP: &str = "0.0.0.0";
pub const BLANK_BROADCAST: &str = "0.0.0.0";
pub const BLANK_NETMASK: &str = "255.0.0.0";

/// Transmit-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errors: u64,
    pub drops: u64,
    pub fifo: u64,
    pub frame: u64,
    pub compressed: u64,
    pub multicast: u64,
}

/// Receive-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveCounters {
    pub bytes: u64,
    pub packets: u64,
    pub errors: u64,
    pub drops: u64,
    pub fifo: u64,
    pub collisions: u64,
    pub carrier: u64,
    pub compressed: u64,
}

/// The sixteen traffic counters of one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub tx: TransmitCounters,
    pub rx: ReceiveCounters,
}

impl InterfaceCounters {
    /// Map a parsed counter row, transmit group first
    pub fn from_array(values: [u64; COUNTER_COUNT]) -> Self {
        let [t0, t1, t2, t3, t4, t5, t6, t7, r0, r1, r2, r3, r4, r5, r6, r7] = values;
        Self {
            tx: TransmitCounters {
                bytes: t0,
                packets: t1,
                errors: t2,
                drops: t3,
                fifo: t4,
                frame: t5,
                compressed: t6,
                multicast: t7,
            },
            rx: ReceiveCounters {
                bytes: r0,
                packets: r1,
                errors: r2,
                drops: r3,
                fifo: r4,
                collisions: r5,
                carrier: r6,
                compressed: r7,
            },
        }
    }

    pub fn to_array(&self) -> [u64; COUNTER_COUNT] {
        let (tx, rx) = (&self.tx, &self.rx);
        [
            tx.bytes, tx.packets, tx.errors, tx.drops, tx.fifo, tx.frame, tx.compressed, tx.multicast,
            rx.bytes, rx.packets, rx.errors, rx.drops, rx.fifo, rx.collisions, rx.carrier, rx.compressed,
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&v| v == 0)
    }
}

/// One network device and its last known addressing and traffic state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub device: String,
    pub mac_address: String,
    pub ip_address: String,
    pub broadcast_address: String,
    pub network_mask: String,
    pub counters: InterfaceCounters,
}

impl NetworkInterface {
    /// Create a blank record for `device`
    pub fn blank(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            mac_address: BLANK_MAC.to_string(),
            ip_address: BLANK_IP.to_string(),
            broadcast_address: BLANK_BROADCAST.to_string(),
            network_mask: BLANK_NETMASK.to_string(),
            counters: InterfaceCounters::default(),
        }
    }

    /// True when every field holds its blank value
    pub fn is_blank(&self) -> bool {
        self.mac_address == BLANK_MAC
            && self.ip_address == BLANK_IP
            && self.broadcast_address == BLANK_BROADCAST
            && self.network_mask == BLANK_NETMASK
            && self.counters.is_zero()
    }

    /// True once the device has a usable IPv4 address
    pub fn has_address(&self) -> bool {
        self.ip_address != BLANK_IP
    }

    pub fn kind(&self) -> InterfaceKind {
        InterfaceKind::classify(&self.device)
    }
}

/// Uplink class of a device, used to pick its policy routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wireless,
    Modem,
    Other,
}

impl InterfaceKind {
    /// Classify a device by its kernel name prefix
    pub fn classify(device: &str) -> Self {
        const ETHERNET: &[&str] = &["eth", "en"];
        const WIRELESS: &[&str] = &["wlan", "wl"];
        const MODEM: &[&str] = &["rmnet", "ppp", "wwan", "usb"];

        let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| device.starts_with(p));
        if has_prefix(WIRELESS) {
            InterfaceKind::Wireless
        } else if has_prefix(ETHERNET) {
            InterfaceKind::Ethernet
        } else if has_prefix(MODEM) {
            InterfaceKind::Modem
        } else {
            InterfaceKind::Other
        }
    }
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InterfaceKind::Ethernet => "ethernet",
            InterfaceKind::Wireless => "wireless",
            InterfaceKind::Modem => "modem",
            InterfaceKind::Other => "other",
        };
        f.write_str(name)
    }
}
