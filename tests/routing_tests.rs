//! Policy routing integration tests
//!
//! Routing changes are recorded by the fake shell instead of reaching the
//! kernel, so these run without root or a provisioned rt_tables.

mod common;

use common::{ifconfig_output, FakeHost, FakeShell};
use libmptcpctl::{
    dhcp_lease, GetpropStore, InterfaceRegistry, MptcpctlConfig, NetctlError, NetworkInterface,
    RouteTable, RouteTableManager,
};
use std::sync::Arc;

fn manager(shell: &Arc<FakeShell>) -> RouteTableManager {
    RouteTableManager::new(shell.clone(), &MptcpctlConfig::default())
}

fn targets_system_table(command: &str) -> bool {
    ["table 254", "table 255", "table main", "table local"]
        .iter()
        .any(|t| command.contains(t))
}

#[tokio::test]
async fn test_ethernet_table_pair() {
    let shell = Arc::new(FakeShell::new());
    let manager = manager(&shell);

    manager
        .add_network_route(RouteTable::Ethernet, "eth0", "192.168.1.0", "255.255.255.0")
        .await
        .unwrap();
    manager
        .add_gateway_route(RouteTable::Ethernet, "eth0", "192.168.1.1")
        .await
        .unwrap();

    let commands = shell.commands();
    assert_eq!(
        commands,
        vec![
            "ip route add table 2 to 192.168.1.0/24 dev eth0 scope link".to_string(),
            "ip route add table 2 default via 192.168.1.1 dev eth0".to_string(),
        ]
    );
    assert!(commands.iter().all(|c| !targets_system_table(c)));
    assert!(shell.calls().iter().all(|(as_root, _)| *as_root));
}

#[tokio::test]
async fn test_system_tables_rejected_by_name_and_number() {
    let shell = Arc::new(FakeShell::new());
    let manager = manager(&shell);

    for name in ["main", "254", "local", "255"] {
        let result = manager.resolve_table(name);
        assert!(matches!(result, Err(NetctlError::PolicyViolation(_))), "{name} accepted");
    }
    for table in [RouteTable::Main, RouteTable::Local] {
        assert!(manager.flush_table(table).await.is_err());
        assert!(manager
            .add_network_route(table, "eth0", "192.168.1.0", "24")
            .await
            .is_err());
        assert!(manager.add_gateway_route(table, "eth0", "192.168.1.1").await.is_err());
    }
    assert!(shell.calls().is_empty());
}

#[tokio::test]
async fn test_provision_discovered_interface_then_teardown() {
    let shell = Arc::new(FakeShell::new());
    let host = FakeHost::new();
    host.add_device("wlan0", Some("00:aa:bb:cc:dd:ee"));
    shell.respond(
        "ifconfig wlan0",
        &ifconfig_output("wlan0", "10.20.30.40", "10.20.31.255", "255.255.254.0"),
    );

    let registry = InterfaceRegistry::new(shell.clone(), &host.config());
    let wlan0 = registry.discover().await.remove(0);

    let manager = manager(&shell);
    let table = manager.table_for_device(&wlan0.device).unwrap();
    assert_eq!(table, RouteTable::Wireless);

    manager.provision(table, &wlan0, "10.20.30.1").await.unwrap();
    manager.teardown(table).await.unwrap();

    let routing: Vec<String> = shell
        .calls()
        .into_iter()
        .filter(|(as_root, _)| *as_root)
        .map(|(_, cmd)| cmd)
        .collect();
    assert_eq!(
        routing,
        vec![
            "ip route add table 3 to 10.20.30.0/23 dev wlan0 scope link".to_string(),
            "ip route add table 3 default via 10.20.30.1 dev wlan0".to_string(),
            "ip route flush table 3".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_provision_stops_when_network_route_fails() {
    let shell = Arc::new(FakeShell::new());
    shell.fail(
        "ip route add table 4 to 10.64.1.0/24 dev rmnet0 scope link",
        "Error: ipv4: FIB table does not exist.",
    );

    let mut rmnet0 = NetworkInterface::blank("rmnet0");
    rmnet0.ip_address = "10.64.1.7".to_string();
    rmnet0.network_mask = "255.255.255.0".to_string();

    let result = manager(&shell).provision(RouteTable::Modem, &rmnet0, "10.64.1.1").await;
    assert!(matches!(result, Err(NetctlError::CommandFailed { .. })));
    assert_eq!(shell.commands().len(), 1);
}

#[tokio::test]
async fn test_clear_default_routes_drains_then_stops() {
    let shell = Arc::new(FakeShell::new());
    // Nothing left to delete on the first attempt
    shell.fail("ip route del 0.0.0.0/0 table main", "RTNETLINK answers: No such process");

    let deleted = manager(&shell).clear_default_routes().await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(shell.commands().len(), 1);
}

#[tokio::test]
async fn test_clear_default_routes_respects_ceiling() {
    let shell = Arc::new(FakeShell::new());
    let mut config = MptcpctlConfig::default();
    config.routing.clear_default_max_attempts = 4;

    let deleted = RouteTableManager::new(shell.clone(), &config)
        .clear_default_routes()
        .await
        .unwrap();
    assert_eq!(deleted, 4);
    assert_eq!(shell.commands(), vec!["ip route del 0.0.0.0/0 table main".to_string(); 4]);
}

#[tokio::test]
async fn test_default_hop_goes_to_main_table() {
    let shell = Arc::new(FakeShell::new());
    manager(&shell).add_default_hop("192.168.1.1", "eth0").await.unwrap();
    assert_eq!(
        shell.commands(),
        vec!["ip route add default scope global nexthop via 192.168.1.1 dev eth0".to_string()]
    );
}

#[tokio::test]
async fn test_provision_from_dhcp_lease_when_ifconfig_fails() {
    let shell = Arc::new(FakeShell::new());
    let host = FakeHost::new();
    host.add_device("wlan0", Some("00:aa:bb:cc:dd:ee"));
    shell.fail("ifconfig wlan0", "ifconfig: wlan0: error fetching interface information");
    shell.respond("getprop dhcp.wlan0.ipaddress", "192.168.43.17\n");
    shell.respond("getprop dhcp.wlan0.mask", "255.255.255.0\n");
    shell.respond("getprop dhcp.wlan0.gateway", "192.168.43.1\n");

    let registry = InterfaceRegistry::new(shell.clone(), &host.config());
    let mut wlan0 = registry.discover().await.remove(0);
    assert!(!wlan0.has_address());

    let lease = dhcp_lease(&GetpropStore::new(shell.clone()), "wlan0")
        .await
        .unwrap()
        .unwrap();
    lease.fill(&mut wlan0);

    manager(&shell)
        .provision(RouteTable::Wireless, &wlan0, &lease.gateway)
        .await
        .unwrap();

    let routing: Vec<String> = shell
        .calls()
        .into_iter()
        .filter(|(as_root, _)| *as_root)
        .map(|(_, cmd)| cmd)
        .collect();
    assert_eq!(
        routing,
        vec![
            "ip route add table 3 to 192.168.43.0/24 dev wlan0 scope link".to_string(),
            "ip route add table 3 default via 192.168.43.1 dev wlan0".to_string(),
        ]
    );
}
