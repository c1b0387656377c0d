//! # Client Configuration
//!
//! Connection parameters for an S7 controller. Every field has a default that
//! matches an S7-300/400 CPU in rack 0, slot 2, reachable on TCP port 102.
//!
//! ## TSAP Addressing
//!
//! The remote TSAP selects the CPU the connection talks to:
//!
//! ```text
//! remote_tsap = (connection_type << 8) + rack * 0x20 + slot
//! ```
//!
//! With the PG connection type (1) and rack 0 / slot 2 this gives `0x0102`.

use std::time::Duration;

use crate::constants::{
    CONNECTION_TYPE_PG, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LOCAL_TSAP, DEFAULT_PDU_SIZE,
    DEFAULT_PORT, DEFAULT_RACK, DEFAULT_READ_TIMEOUT, DEFAULT_SLOT,
};
use crate::error::{S7Error, S7Result};

/// Connection settings for one controller.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use s7_plc::ClientConfig;
///
/// let config = ClientConfig::new("192.168.1.101")
///     .with_rack_slot(0, 1)
///     .with_read_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.remote_tsap, 0x0101);
/// assert_eq!(config.endpoint().unwrap(), "192.168.1.101:102");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `host` or `host:port`
    pub address: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// PDU length proposed during negotiation
    pub pdu_size: u16,
    pub local_tsap: u16,
    pub remote_tsap: u16,
    /// Hex-dump every frame at info level
    pub packet_logging: bool,
}

impl ClientConfig {
    /// Defaults for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            pdu_size: DEFAULT_PDU_SIZE,
            local_tsap: DEFAULT_LOCAL_TSAP,
            remote_tsap: remote_tsap(CONNECTION_TYPE_PG, DEFAULT_RACK, DEFAULT_SLOT),
            packet_logging: false,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_pdu_size(mut self, pdu_size: u16) -> Self {
        self.pdu_size = pdu_size;
        self
    }

    /// Derive the remote TSAP from the CPU position (PG connection).
    pub fn with_rack_slot(mut self, rack: u16, slot: u16) -> Self {
        self.remote_tsap = remote_tsap(CONNECTION_TYPE_PG, rack, slot);
        self
    }

    /// Set both TSAPs explicitly.
    pub fn with_tsap(mut self, local_tsap: u16, remote_tsap: u16) -> Self {
        self.local_tsap = local_tsap;
        self.remote_tsap = remote_tsap;
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// `host:port` with the default port filled in.
    pub fn endpoint(&self) -> S7Result<String> {
        parse_endpoint(&self.address)
    }
}

/// Remote TSAP for a connection type and CPU position.
#[inline]
pub fn remote_tsap(connection_type: u16, rack: u16, slot: u16) -> u16 {
    (connection_type << 8)
        .wrapping_add(rack.wrapping_mul(0x20))
        .wrapping_add(slot)
}

/// Normalize `host[:port]` to `host:port`, defaulting the port to 102.
///
/// Bracketed IPv6 literals (`[::1]` / `[::1]:102`) are accepted.
pub fn parse_endpoint(address: &str) -> S7Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(S7Error::configuration("empty endpoint"));
    }

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| S7Error::configuration(format!("bad endpoint `{}`", address)))?;
        let host = &address[..end + 2];
        let port = rest[end + 1..].strip_prefix(':');
        if port.is_none() && end + 2 != address.len() {
            return Err(S7Error::configuration(format!("bad endpoint `{}`", address)));
        }
        (host, port)
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(S7Error::configuration(format!("bad endpoint `{}`", address)));
    }

    let port = match port {
        Some(p) => p.parse::<u16>().map_err(|_| {
            S7Error::configuration(format!("bad port in endpoint `{}`", address))
        })?,
        None => DEFAULT_PORT,
    };
    Ok(format!("{}:{}", host, port))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(format!("127.0.0.1:{}", DEFAULT_PORT))
    }
}
