//! Device property store
//!
//! On Android hosts the DHCP client publishes each lease as system
//! properties (`dhcp.<dev>.ipaddress`, `dhcp.<dev>.mask`,
//! `dhcp.<dev>.gateway`). That is an alternative to querying the interface
//! when provisioning its table.

use crate::error::NetctlResult;
use crate::interface::NetworkInterface;
use crate::shell::ShellGateway;
use crate::validation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Value of `key`, empty when unset
    async fn get_property(&self, key: &str) -> NetctlResult<String>;
}

/// [`PropertyStore`] backed by the `getprop` tool
pub struct GetpropStore {
    shell: Arc<dyn ShellGateway>,
}

impl GetpropStore {
    pub fn new(shell: Arc<dyn ShellGateway>) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl PropertyStore for GetpropStore {
    async fn get_property(&self, key: &str) -> NetctlResult<String> {
        validation::validate_key(key)?;
        let output = self.shell.run(&format!("getprop {}", key)).await?;
        Ok(output.trim().to_string())
    }
}

/// Addressing learned by the DHCP client for one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpLease {
    pub device: String,
    pub ip_address: String,
    pub network_mask: Option<String>,
    pub gateway: String,
}

impl DhcpLease {
    /// Take the lease addressing for a record the live query left without
    /// an address
    pub fn fill(&self, iface: &mut NetworkInterface) {
        if iface.has_address() {
            return;
        }
        debug!("{}: using DHCP lease address {}", iface.device, self.ip_address);
        iface.ip_address = self.ip_address.clone();
        if let Some(mask) = &self.network_mask {
            iface.network_mask = mask.clone();
        }
    }
}

/// Read the DHCP lease of `device`, `None` unless both the address and the
/// gateway are present and well formed
pub async fn dhcp_lease(store: &dyn PropertyStore, device: &str) -> NetctlResult<Option<DhcpLease>> {
    validation::validate_interface_name(device)?;

    let ip_address = store.get_property(&format!("dhcp.{}.ipaddress", device)).await?;
    let mask = store.get_property(&format!("dhcp.{}.mask", device)).await?;
    let gateway = store.get_property(&format!("dhcp.{}.gateway", device)).await?;

    if validation::validate_ipv4_address(&ip_address).is_err()
        || validation::validate_ipv4_address(&gateway).is_err()
    {
        debug!("{}: no usable DHCP lease ({:?} via {:?})", device, ip_address, gateway);
        return Ok(None);
    }

    let network_mask = validation::validate_netmask(&mask).is_ok().then_some(mask);

    Ok(Some(DhcpLease {
        device: device.to_string(),
        ip_address,
        network_mask,
        gateway,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::MockShellGateway;

    #[tokio::test]
    async fn test_dhcp_lease() {
        let mut mock = MockShellGateway::new();
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.wlan0.ipaddress")
            .returning(|_| Ok("192.168.43.17\n".to_string()));
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.wlan0.mask")
            .returning(|_| Ok("255.255.255.0\n".to_string()));
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.wlan0.gateway")
            .returning(|_| Ok("192.168.43.1\n".to_string()));

        let store = GetpropStore::new(Arc::new(mock));
        let lease = dhcp_lease(&store, "wlan0").await.unwrap().unwrap();
        assert_eq!(lease.ip_address, "192.168.43.17");
        assert_eq!(lease.network_mask.as_deref(), Some("255.255.255.0"));
        assert_eq!(lease.gateway, "192.168.43.1");
    }

    #[tokio::test]
    async fn test_dhcp_lease_without_mask() {
        let mut mock = MockShellGateway::new();
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.rmnet0.ipaddress")
            .returning(|_| Ok("10.64.1.7\n".to_string()));
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.rmnet0.mask")
            .returning(|_| Ok("\n".to_string()));
        mock.expect_run()
            .withf(|cmd: &str| cmd == "getprop dhcp.rmnet0.gateway")
            .returning(|_| Ok("10.64.1.1\n".to_string()));

        let store = GetpropStore::new(Arc::new(mock));
        let lease = dhcp_lease(&store, "rmnet0").await.unwrap().unwrap();
        assert_eq!(lease.network_mask, None);
    }

    #[test]
    fn test_fill_only_when_address_missing() {
        let lease = DhcpLease {
            device: "wlan0".to_string(),
            ip_address: "192.168.43.17".to_string(),
            network_mask: Some("255.255.255.0".to_string()),
            gateway: "192.168.43.1".to_string(),
        };

        let mut blank = NetworkInterface::blank("wlan0");
        lease.fill(&mut blank);
        assert_eq!(blank.ip_address, "192.168.43.17");
        assert_eq!(blank.network_mask, "255.255.255.0");

        let mut live = NetworkInterface::blank("wlan0");
        live.ip_address = "10.0.0.5".to_string();
        lease.fill(&mut live);
        assert_eq!(live.ip_address, "10.0.0.5");
        assert_eq!(live.network_mask, "255.0.0.0");
    }

    #[tokio::test]
    async fn test_dhcp_lease_unset() {
        let mut mock = MockShellGateway::new();
        mock.expect_run().returning(|_| Ok("\n".to_string()));

        let store = GetpropStore::new(Arc::new(mock));
        assert_eq!(dhcp_lease(&store, "rmnet0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_bad_device() {
        let store = GetpropStore::new(Arc::new(MockShellGateway::new()));
        assert!(dhcp_lease(&store, "wlan0;id").await.is_err());
    }
}
