//! Kernel MPTCP flags via sysctl

use crate::error::{NetctlError, NetctlResult};
use crate::shell::ShellGateway;
use crate::validation;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MPTCP_ENABLED: &str = "net.mptcp.mptcp_enabled";
pub const MPTCP_CHECKSUM: &str = "net.mptcp.mptcp_checksum";

const FLAG_ON: &str = "1";
const FLAG_OFF: &str = "2";

/// Scalar sysctl access through the shell gateway
pub struct Sysctl {
    shell: Arc<dyn ShellGateway>,
}

impl Sysctl {
    pub fn new(shell: Arc<dyn ShellGateway>) -> Self {
        Self { shell }
    }

    /// Read a sysctl value (`sysctl name` prints `name = value`)
    pub async fn read_flag(&self, name: &str) -> NetctlResult<String> {
        validation::validate_key(name)?;
        let output = self.shell.run(&format!("sysctl {}", name)).await?;
        Ok(parse_sysctl_value(&output))
    }

    /// Write a sysctl value, checking that sysctl echoed it back
    pub async fn write_flag(&self, name: &str, value: &str) -> NetctlResult<()> {
        validation::validate_key(name)?;
        validation::validate_key(value)?;
        let output = self
            .shell
            .run_as_root(&format!("sysctl -w {}={}", name, value))
            .await?;

        let echoed = parse_sysctl_value(&output);
        if echoed != value {
            return Err(NetctlError::ParseError(format!(
                "sysctl -w {} returned '{}', expected '{}'",
                name,
                output.trim(),
                value
            )));
        }
        debug!("{} = {}", name, value);
        Ok(())
    }
}

fn parse_sysctl_value(output: &str) -> String {
    let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    match line.split_once('=') {
        Some((_, value)) => value.trim().to_string(),
        None => line.trim().to_string(),
    }
}

/// MPTCP enable and checksum switches
pub struct MptcpControl {
    sysctl: Sysctl,
    shell: Arc<dyn ShellGateway>,
}

impl MptcpControl {
    pub fn new(shell: Arc<dyn ShellGateway>) -> Self {
        Self {
            sysctl: Sysctl::new(shell.clone()),
            shell,
        }
    }

    pub async fn enabled(&self) -> bool {
        self.read_bool(MPTCP_ENABLED).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> NetctlResult<()> {
        self.sysctl.write_flag(MPTCP_ENABLED, flag_value(enabled)).await
    }

    pub async fn checksum(&self) -> bool {
        self.read_bool(MPTCP_CHECKSUM).await
    }

    pub async fn set_checksum(&self, enabled: bool) -> NetctlResult<()> {
        self.sysctl.write_flag(MPTCP_CHECKSUM, flag_value(enabled)).await
    }

    /// Release string from the kernel log, e.g. `Stable release v0.89.2`
    pub async fn version(&self) -> Option<String> {
        let log = match self.shell.run("dmesg").await {
            Ok(log) => log,
            Err(e) => {
                debug!("Cannot read kernel log: {}", e);
                return None;
            }
        };
        parse_mptcp_version(&log)
    }

    async fn read_bool(&self, name: &str) -> bool {
        match self.sysctl.read_flag(name).await {
            Ok(value) => value == FLAG_ON,
            Err(e) => {
                warn!("Cannot read {}: {}", name, e);
                false
            }
        }
    }
}

fn flag_value(enabled: bool) -> &'static str {
    if enabled {
        FLAG_ON
    } else {
        FLAG_OFF
    }
}

/// Find `MPTCP: <release>` in kernel log text
fn parse_mptcp_version(log: &str) -> Option<String> {
    log.lines().find_map(|line| {
        let (_, rest) = line.split_once("MPTCP: ")?;
        let release = rest.trim();
        (!release.is_empty()).then(|| release.to_string())
    })
}

/// Version tag of a release string (`Stable release v0.89.2` -> `v0.89.2`)
pub fn short_version(release: &str) -> &str {
    release
        .split_whitespace()
        .rev()
        .find(|token| token.starts_with('v'))
        .unwrap_or(release)
}
