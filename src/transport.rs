//! # Transport Layer
//!
//! Owns the TCP socket to one controller and performs blocking
//! request/response exchanges of complete TPKT frames.
//!
//! ## Connection lifecycle
//!
//! ```text
//!  Disconnected --TCP connect + COTP CR/CC--> CotpConnected
//!  CotpConnected --Setup Communication--> PduNegotiated
//!  any state --I/O error / close()--> Disconnected
//! ```
//!
//! The handshake runs lazily on the first [`Transport::exchange`] and again on
//! the first exchange after any failure. There are no retries: a failed call
//! returns its error and the next call starts over with a fresh socket.
//!
//! ## Framing
//!
//! Responses are read by TPKT length: the 4-byte header first, then exactly
//! `length - 4` more bytes. Only one request is in flight at a time.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::constants::{TPKT_HEADER_LEN, TPKT_VERSION};
use crate::error::{S7Error, S7Result};
use crate::packet::PacketBuilder;
use crate::parser::{parse_connect_confirm, parse_setup_response};

/// Format raw bytes as hex string for packet logging
fn format_hex_packet(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_packet(direction: &str, endpoint: &str, data: &[u8]) {
    info!("[S7] {} {} {}", direction, endpoint, format_hex_packet(data));
}

/// Handshake progress of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// COTP connection confirmed, PDU size not yet negotiated
    CotpConnected,
    /// Ready for read/write jobs
    PduNegotiated,
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Completed COTP + PDU handshakes
    pub connects: u64,
}

/// A blocking, framed request/response channel to one controller.
///
/// Implementations connect lazily: `exchange` performs whatever handshake is
/// needed before sending the request.
pub trait Transport {
    /// Send one framed request and return the complete framed response.
    fn exchange(&mut self, request: &[u8]) -> S7Result<Bytes>;

    /// Whether a negotiated connection is currently open.
    fn is_connected(&self) -> bool;

    /// Release the socket. Idempotent.
    fn close(&mut self) -> S7Result<()>;

    fn get_stats(&self) -> TransportStats;

    /// PDU length agreed with the controller, once negotiated.
    fn negotiated_pdu_size(&self) -> Option<u16> {
        None
    }
}

/// ISO-on-TCP transport over `std::net::TcpStream`.
#[derive(Debug)]
pub struct TcpTransport {
    config: ClientConfig,
    endpoint: String,
    stream: Option<TcpStream>,
    state: ConnectionState,
    pdu_size: Option<u16>,
    stats: TransportStats,
    packet_logging: bool,
}

impl TcpTransport {
    /// Validate the configuration. No I/O is performed.
    pub fn new(config: ClientConfig) -> S7Result<Self> {
        let endpoint = config.endpoint()?;
        let packet_logging = config.packet_logging;
        Ok(Self {
            config,
            endpoint,
            stream: None,
            state: ConnectionState::Disconnected,
            pdu_size: None,
            stats: TransportStats::default(),
            packet_logging,
        })
    }

    /// `host:port` this transport connects to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Enable or disable packet logging
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    /// Run the handshake now instead of on the first exchange.
    pub fn connect(&mut self) -> S7Result<()> {
        if self.state == ConnectionState::PduNegotiated {
            return Ok(());
        }
        let result = self.handshake();
        if let Err(e) = &result {
            self.record_failure(e);
            // a half-finished handshake is never reused
            self.drop_stream();
        }
        result
    }

    fn handshake(&mut self) -> S7Result<()> {
        self.drop_stream();
        self.stream = Some(self.open_socket()?);

        let cr = PacketBuilder::connect_request(self.config.local_tsap, self.config.remote_tsap);
        let cc = self.round_trip(&cr)?;
        parse_connect_confirm(&cc)?;
        self.state = ConnectionState::CotpConnected;
        debug!("COTP connected to {}", self.endpoint);

        let setup = PacketBuilder::setup_communication(0, self.config.pdu_size);
        let response = self.round_trip(&setup)?;
        let pdu_size = parse_setup_response(&response)?;
        if pdu_size != self.config.pdu_size {
            debug!(
                "Controller negotiated PDU size {} (proposed {})",
                pdu_size, self.config.pdu_size
            );
        }
        self.pdu_size = Some(pdu_size);
        self.state = ConnectionState::PduNegotiated;
        self.stats.connects += 1;

        info!(
            "Connected to S7 controller {} (pdu_size={})",
            self.endpoint, pdu_size
        );
        Ok(())
    }

    fn open_socket(&self) -> S7Result<TcpStream> {
        let addrs: Vec<SocketAddr> = self
            .endpoint
            .to_socket_addrs()
            .map_err(|e| {
                S7Error::connection(format!("fail to resolve `{}`: {}", self.endpoint, e))
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            debug!("Connecting to {} (timeout {:?})", addr, self.config.connect_timeout);
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.read_timeout))?;
                    stream.set_write_timeout(Some(self.config.read_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        let reason = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no address resolved".to_string());
        Err(S7Error::connection(format!(
            "fail to open tcp connection to `{}`: {}",
            self.endpoint, reason
        )))
    }

    /// Write one frame, read one TPKT-framed response.
    fn round_trip(&mut self, request: &[u8]) -> S7Result<Bytes> {
        let timeout_ms = self.config.read_timeout.as_millis() as u64;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| S7Error::connection("not connected"))?;

        if self.packet_logging {
            log_packet("send", &self.endpoint, request);
        }
        stream
            .write_all(request)
            .and_then(|_| stream.flush())
            .map_err(|e| map_io_error(e, "send request", timeout_ms))?;
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += request.len() as u64;

        let mut header = [0u8; TPKT_HEADER_LEN];
        stream
            .read_exact(&mut header)
            .map_err(|e| map_io_error(e, "read response header", timeout_ms))?;

        if header[0] != TPKT_VERSION {
            return Err(S7Error::BadProtocol { version: header[0] });
        }
        let length = u16::from_be_bytes([header[2], header[3]]) as usize;
        if length < TPKT_HEADER_LEN {
            return Err(S7Error::Truncated {
                needed: TPKT_HEADER_LEN,
                available: length,
            });
        }

        let mut frame = vec![0u8; length];
        frame[..TPKT_HEADER_LEN].copy_from_slice(&header);
        stream
            .read_exact(&mut frame[TPKT_HEADER_LEN..])
            .map_err(|e| map_io_error(e, "read response data", timeout_ms))?;

        self.stats.responses_received += 1;
        self.stats.bytes_received += frame.len() as u64;
        if self.packet_logging {
            log_packet("receive", &self.endpoint, &frame);
        }
        Ok(Bytes::from(frame))
    }

    fn record_failure(&mut self, error: &S7Error) {
        self.stats.errors += 1;
        if matches!(error, S7Error::Timeout { .. }) {
            self.stats.timeouts += 1;
        }
        if error.is_transport_error() && self.stream.is_some() {
            warn!("Dropping connection to {}: {}", self.endpoint, error);
            self.drop_stream();
        }
    }

    fn drop_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.state = ConnectionState::Disconnected;
        self.pdu_size = None;
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, request: &[u8]) -> S7Result<Bytes> {
        self.connect()?;
        let result = self.round_trip(request);
        if let Err(e) = &result {
            self.record_failure(e);
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some() && self.state == ConnectionState::PduNegotiated
    }

    fn close(&mut self) -> S7Result<()> {
        if self.stream.is_some() {
            debug!("Closing connection to {}", self.endpoint);
        }
        self.drop_stream();
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats.clone()
    }

    fn negotiated_pdu_size(&self) -> Option<u16> {
        self.pdu_size
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn map_io_error(e: io::Error, what: &str, timeout_ms: u64) -> S7Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => S7Error::timeout(what, timeout_ms),
        io::ErrorKind::UnexpectedEof => {
            S7Error::connection(format!("{}: empty response", what))
        }
        _ => S7Error::Io(e),
    }
}
