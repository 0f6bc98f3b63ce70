//! Shared fixtures for integration tests
//!
//! `FakeShell` records every command line and answers from a table of canned
//! outputs. `FakeHost` lays out a temporary `/sys/class/net` and
//! `/proc/net/dev` pair.

#![allow(dead_code)]

use async_trait::async_trait;
use libmptcpctl::{MptcpctlConfig, NetctlError, NetctlResult, ShellGateway};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// One recorded command: (ran through the root shell, command line)
pub type Call = (bool, String);

#[derive(Default)]
pub struct FakeShell {
    responses: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `stdout`
    pub fn respond(&self, command: &str, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Ok(stdout.to_string()));
    }

    /// Fail `command` with `stderr`
    pub fn fail(&self, command: &str, stderr: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Err(stderr.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, cmd)| cmd).collect()
    }

    fn answer(&self, command_line: &str, as_root: bool) -> NetctlResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((as_root, command_line.to_string()));

        // Unknown commands succeed silently, like most `ip route` changes
        match self.responses.lock().unwrap().get(command_line) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => Err(NetctlError::CommandFailed {
                cmd: command_line.to_string(),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl ShellGateway for FakeShell {
    async fn run(&self, command_line: &str) -> NetctlResult<String> {
        self.answer(command_line, false)
    }

    async fn run_as_root(&self, command_line: &str) -> NetctlResult<String> {
        self.answer(command_line, true)
    }
}

pub const PROC_NET_DEV_HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

/// Temporary kernel text sources
pub struct FakeHost {
    dir: TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("net")).unwrap();
        fs::write(dir.path().join("dev"), PROC_NET_DEV_HEADER).unwrap();
        Self { dir }
    }

    pub fn sys_class_net(&self) -> PathBuf {
        self.dir.path().join("net")
    }

    pub fn proc_net_dev(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    /// Create a device directory, with an `address` file when `mac` is given
    pub fn add_device(&self, name: &str, mac: Option<&str>) {
        let dev = self.sys_class_net().join(name);
        fs::create_dir_all(&dev).unwrap();
        if let Some(mac) = mac {
            fs::write(dev.join("address"), format!("{}\n", mac)).unwrap();
        }
    }

    pub fn remove_device(&self, name: &str) {
        fs::remove_dir_all(self.sys_class_net().join(name)).unwrap();
    }

    /// Replace the counter table rows
    pub fn set_counters(&self, rows: &[(&str, &str)]) {
        let mut table = PROC_NET_DEV_HEADER.to_string();
        for (device, counters) in rows {
            table.push_str(&format!("{:>6}:{}\n", device, counters));
        }
        fs::write(self.proc_net_dev(), table).unwrap();
    }

    pub fn config(&self) -> MptcpctlConfig {
        let mut config = MptcpctlConfig::default();
        config.paths.sys_class_net = self.sys_class_net();
        config.paths.proc_net_dev = self.proc_net_dev();
        config
    }
}

pub fn ifconfig_output(device: &str, ip: &str, bcast: &str, mask: &str) -> String {
    format!(
        "{:<10}Link encap:Ethernet  HWaddr 00:11:22:33:44:55\n          inet addr:{}  Bcast:{}  Mask:{}\n          UP BROADCAST RUNNING MULTICAST  MTU:1500  Metric:1\n",
        device, ip, bcast, mask
    )
}
