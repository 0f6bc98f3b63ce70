//! Input validation and sanitization
//!
//! Every value that ends up on a shell command line passes through here first.

use crate::error::{NetctlError, NetctlResult};
use std::net::Ipv4Addr;

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum length for command error output kept in errors and logs
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Maximum length for property store and sysctl keys
const MAX_KEY_LEN: usize = 128;

/// Validate interface name to prevent command injection
///
/// Interface names must be alphanumeric with optional dashes, dots and
/// underscores, and no longer than 15 characters (Linux kernel limit)
pub fn validate_interface_name(name: &str) -> NetctlResult<()> {
    if name.is_empty() {
        return Err(NetctlError::InvalidParameter(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(NetctlError::InvalidParameter(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    // VLAN devices use dots (eth0.100)
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(NetctlError::InvalidParameter(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    if name.starts_with('-') {
        return Err(NetctlError::InvalidParameter(
            "Interface name cannot start with dash".to_string()
        ));
    }

    if name == "." || name == ".." {
        return Err(NetctlError::InvalidParameter(
            format!("Invalid interface name '{}'", name)
        ));
    }

    Ok(())
}

/// Validate an IPv4 address in dotted-quad form
pub fn validate_ipv4_address(addr: &str) -> NetctlResult<Ipv4Addr> {
    addr.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| NetctlError::InvalidParameter(
            format!("Invalid IPv4 address: {}", addr)
        ))
}

/// Validate MAC address format
///
/// Accepts standard MAC format: XX:XX:XX:XX:XX:XX (hex digits)
pub fn validate_mac_address(mac: &str) -> NetctlResult<()> {
    if mac.len() != 17 {
        return Err(NetctlError::InvalidParameter(
            "MAC address must be in format XX:XX:XX:XX:XX:XX".to_string()
        ));
    }

    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return Err(NetctlError::InvalidParameter(
            "MAC address must have 6 octets separated by colons".to_string()
        ));
    }

    for part in parts {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NetctlError::InvalidParameter(
                format!("Invalid MAC address octet: {}", part)
            ));
        }
    }

    Ok(())
}

/// Validate a dotted-quad network mask and return its prefix length
///
/// The set bits must be contiguous from the left (255.255.0.255 is rejected).
pub fn validate_netmask(mask: &str) -> NetctlResult<u8> {
    let bits = u32::from(validate_ipv4_address(mask)?);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(NetctlError::InvalidParameter(
            format!("Non-contiguous network mask: {}", mask)
        ));
    }
    Ok(prefix as u8)
}

/// Validate a sysctl or property key (`net.mptcp.mptcp_enabled`, `dhcp.wlan0.gateway`)
pub fn validate_key(key: &str) -> NetctlResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(NetctlError::InvalidParameter(
            format!("Key must be 1-{} characters", MAX_KEY_LEN)
        ));
    }

    if let Some(c) = key
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '_' | '-' | '/'))
    {
        return Err(NetctlError::InvalidParameter(
            format!("Invalid key '{}': contains invalid character '{}'", key, c)
        ));
    }

    if key.starts_with('-') {
        return Err(NetctlError::InvalidParameter(
            "Key cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Sanitize command error output before it is stored in an error or logged
pub fn sanitize_error_message(stderr: &str) -> String {
    let mut sanitized = stderr.trim().to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("... (truncated)");
    }

    sanitized
}
