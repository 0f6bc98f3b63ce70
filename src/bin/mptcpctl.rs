//! mptcpctl - Multipath interface control CLI
//!
//! ```bash
//! # Show every live interface with addressing and counters
//! mptcpctl list
//!
//! # Build the wireless table for wlan0 using its DHCP lease
//! sudo mptcpctl provision wlan0 --dhcp
//!
//! # Drop the modem table
//! sudo mptcpctl teardown modem
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use libmptcpctl::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "mptcpctl")]
#[command(version)]
#[command(about = "Multipath interface registry and policy routing control", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List live interfaces
    List,
    /// Show one interface
    Show {
        device: String,
    },
    /// Print the routing table numbering expected in rt_tables
    Tables,
    /// Build the policy routing table for an interface
    Provision {
        device: String,
        /// Table name or number (default: chosen from the device name)
        #[arg(short, long)]
        table: Option<String>,
        /// Gateway address
        #[arg(short, long, conflicts_with = "dhcp")]
        gateway: Option<String>,
        /// Take the gateway from the DHCP lease properties
        #[arg(long)]
        dhcp: bool,
        /// Also install a main-table default hop via the gateway
        #[arg(long)]
        default_hop: bool,
    },
    /// Flush a policy routing table
    Teardown {
        table: String,
    },
    /// Add a main-table default route with an explicit next hop
    DefaultHop {
        address: String,
        device: String,
    },
    /// Delete all main-table default routes
    ClearDefaults,
    /// Ping an address through a device
    Check {
        address: String,
        device: String,
    },
    /// MPTCP kernel switches
    Mptcp {
        #[command(subcommand)]
        action: MptcpAction,
    },
}

#[derive(Subcommand, Debug)]
enum MptcpAction {
    /// Show enabled/checksum flags and version
    Status,
    Enable,
    Disable,
    /// Turn checksums on or off
    Checksum {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => MptcpctlConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MptcpctlConfig::default(),
    };
    let shell: Arc<dyn ShellGateway> = Arc::new(SystemShell::new(&config.shell));

    match args.command {
        Commands::List => {
            let registry = InterfaceRegistry::new(shell, &config);
            let interfaces = registry.discover().await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&interfaces)?);
            } else if interfaces.is_empty() {
                println!("No interfaces");
            } else {
                println!("{:<12} {:<18} {:<16} {:<16} {:<16}", "DEVICE", "MAC", "ADDRESS", "NETMASK", "BROADCAST");
                for iface in &interfaces {
                    println!(
                        "{:<12} {:<18} {:<16} {:<16} {:<16}",
                        iface.device, iface.mac_address, iface.ip_address, iface.network_mask, iface.broadcast_address
                    );
                }
            }
        }
        Commands::Show { device } => {
            validation::validate_interface_name(&device)?;
            let registry = InterfaceRegistry::new(shell, &config);
            let iface = registry.refresh_one(&NetworkInterface::blank(device)).await;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&iface)?);
            } else {
                print_interface(&iface);
            }
        }
        Commands::Tables => {
            print!("{}", RouteTable::rt_tables_entries());
        }
        Commands::Provision { device, table, gateway, dhcp, default_hop } => {
            validation::validate_interface_name(&device)?;
            let manager = RouteTableManager::new(shell.clone(), &config);
            let table = match table {
                Some(table) => manager.resolve_table(&table)?,
                None => manager.table_for_device(&device)?,
            };

            let lease = if dhcp {
                let store = GetpropStore::new(shell.clone());
                match dhcp_lease(&store, &device).await? {
                    Some(lease) => Some(lease),
                    None => bail!("{} has no DHCP lease", device),
                }
            } else {
                None
            };
            let gateway = match (gateway, &lease) {
                (Some(gateway), _) => gateway,
                (None, Some(lease)) => lease.gateway.clone(),
                (None, None) => bail!("either --gateway or --dhcp is required"),
            };

            let registry = InterfaceRegistry::new(shell, &config);
            if !registry.is_live(&device).await {
                return Err(NetctlError::InterfaceNotFound(device).into());
            }
            let mut iface = registry.refresh_one(&NetworkInterface::blank(device)).await;
            if let Some(lease) = &lease {
                lease.fill(&mut iface);
            }
            manager.provision(table, &iface, &gateway).await?;
            info!("{} provisioned in {}", iface.device, table);
            if default_hop {
                manager.add_default_hop(&gateway, &iface.device).await?;
            }
            println!("{}: table {} provisioned via {}", iface.device, table, gateway);
        }
        Commands::Teardown { table } => {
            let manager = RouteTableManager::new(shell, &config);
            let table = manager.resolve_table(&table)?;
            manager.teardown(table).await?;
            println!("Table {} flushed", table);
        }
        Commands::DefaultHop { address, device } => {
            RouteTableManager::new(shell, &config)
                .add_default_hop(&address, &device)
                .await?;
        }
        Commands::ClearDefaults => {
            let deleted = RouteTableManager::new(shell, &config).clear_default_routes().await?;
            println!("Deleted {} default route(s)", deleted);
        }
        Commands::Check { address, device } => {
            let reachable = RouteTableManager::new(shell, &config)
                .check_connection(&address, &device)
                .await;
            println!("{} via {}: {}", address, device, if reachable { "reachable" } else { "unreachable" });
            if !reachable {
                std::process::exit(1);
            }
        }
        Commands::Mptcp { action } => {
            let control = MptcpControl::new(shell);
            match action {
                MptcpAction::Status => {
                    let version = control.version().await;
                    println!("enabled:  {}", control.enabled().await);
                    println!("checksum: {}", control.checksum().await);
                    match version {
                        Some(release) => {
                            println!("version:  {} ({})", sysctl::short_version(&release), release)
                        }
                        None => println!("version:  No MPTCP"),
                    }
                }
                MptcpAction::Enable => control.set_enabled(true).await?,
                MptcpAction::Disable => control.set_enabled(false).await?,
                MptcpAction::Checksum { state } => control.set_checksum(state == "on").await?,
            }
        }
    }

    Ok(())
}

fn print_interface(iface: &NetworkInterface) {
    let (tx, rx) = (&iface.counters.tx, &iface.counters.rx);
    println!("{} ({})", iface.device, iface.kind());
    println!("  mac:       {}", iface.mac_address);
    println!("  address:   {}", iface.ip_address);
    println!("  netmask:   {}", iface.network_mask);
    println!("  broadcast: {}", iface.broadcast_address);
    println!(
        "  tx: bytes {} packets {} errors {} drops {} fifo {} frame {} compressed {} multicast {}",
        tx.bytes, tx.packets, tx.errors, tx.drops, tx.fifo, tx.frame, tx.compressed, tx.multicast
    );
    println!(
        "  rx: bytes {} packets {} errors {} drops {} fifo {} collisions {} carrier {} compressed {}",
        rx.bytes, rx.packets, rx.errors, rx.drops, rx.fifo, rx.collisions, rx.carrier, rx.compressed
    );
}

/// Initialize logging; `RUST_LOG` wins over `--log-level`
fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mptcpctl={},libmptcpctl={}", log_level, log_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}
