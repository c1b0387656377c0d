//! High-level S7 client
//!
//! [`S7Client`] ties the protocol pieces together:
//!
//! ```text
//! addresses -> ItemDescriptor -> ItemCodec -> PacketBuilder
//!           -> Transport::exchange -> parser -> S7Value
//! ```
//!
//! # Usage
//!
//! One-shot calls open a connection, run one job and close it again:
//!
//! ```rust,no_run
//! use s7_plc::{S7Client, S7Value};
//!
//! # fn main() -> s7_plc::S7Result<()> {
//! S7Client::write_plc("192.168.1.101", &[
//!     ("DB21.0:int32", S7Value::from(70000i32)),
//!     ("DB21.4:float", S7Value::from(3.14f32)),
//! ])?;
//! let values = S7Client::read_plc("192.168.1.101", &["DB21.0:int32", "DB21.4:float"])?;
//! # Ok(())
//! # }
//! ```
//!
//! A client instance keeps its connection open between calls:
//!
//! ```rust,no_run
//! use s7_plc::{PlcClient, S7Client, S7Value};
//!
//! # fn main() -> s7_plc::S7Result<()> {
//! let mut plc = S7Client::new("192.168.1.101")?; // no I/O yet
//! plc.write(&[("DB21.12.0:bit", S7Value::from(true))])?;
//! let values = plc.read(&["DB21.12.0:bit"])?;
//! plc.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! All operations take `&mut self`, so one client serves one caller at a time.
//! Wrap it in a `Mutex` to share it between threads.

use tracing::debug;

use crate::address::{parse_items, ItemDescriptor};
use crate::codec::{ItemCodec, WriteItem};
use crate::config::ClientConfig;
use crate::error::S7Result;
use crate::packet::PacketBuilder;
use crate::parser::{parse_read_response, parse_write_response};
use crate::transport::{TcpTransport, Transport, TransportStats};
use crate::value::S7Value;

/// Read/write access to a controller by textual item address.
///
/// This is the whole contract a protocol-selecting facade needs; it is
/// object safe so backends can be stored as `Box<dyn PlcClient>`.
pub trait PlcClient {
    /// Read every address in one job; values come back in request order.
    fn read(&mut self, addresses: &[&str]) -> S7Result<Vec<S7Value>>;

    /// Write every `(address, value)` pair in one job.
    fn write(&mut self, items: &[(&str, S7Value)]) -> S7Result<()>;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> S7Result<()>;
}

/// S7 client over any [`Transport`].
pub struct S7Client<T: Transport = TcpTransport> {
    transport: T,
    sequence: u16,
}

impl S7Client<TcpTransport> {
    /// Client for `host[:port]` with default settings. Connects on first use.
    pub fn new(endpoint: &str) -> S7Result<Self> {
        Self::with_config(ClientConfig::new(endpoint))
    }

    pub fn with_config(config: ClientConfig) -> S7Result<Self> {
        Ok(Self::from_transport(TcpTransport::new(config)?))
    }

    /// Connect, read `addresses`, disconnect.
    pub fn read_plc(endpoint: &str, addresses: &[&str]) -> S7Result<Vec<S7Value>> {
        let mut client = Self::new(endpoint)?;
        let result = client.read(addresses);
        let _ = client.close();
        result
    }

    /// Connect, write `items`, disconnect.
    pub fn write_plc(endpoint: &str, items: &[(&str, S7Value)]) -> S7Result<()> {
        let mut client = Self::new(endpoint)?;
        let result = client.write(items);
        let _ = client.close();
        result
    }

    /// Enable or disable hex dumps of every frame.
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.transport.set_packet_logging(enabled);
    }
}

impl<T: Transport> S7Client<T> {
    pub fn from_transport(transport: T) -> Self {
        Self {
            transport,
            sequence: 0,
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Next job sequence number, never 0.
    fn next_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.sequence
    }

    /// Read pre-parsed items in one job.
    ///
    /// An empty batch returns immediately without touching the connection.
    pub fn read_items(&mut self, items: &[ItemDescriptor]) -> S7Result<Vec<S7Value>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let sequence = self.next_sequence();
        let request = PacketBuilder::read_request(sequence, items)?;
        debug!("Reading {} items (seq={})", items.len(), sequence);

        let response = self.transport.exchange(&request)?;
        parse_read_response(&response, sequence, items)
    }

    /// Write pre-parsed items in one job.
    ///
    /// All values are normalized before anything is sent, so a bad value
    /// fails the call without I/O.
    pub fn write_items(&mut self, items: &[(ItemDescriptor, S7Value)]) -> S7Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let prepared = items
            .iter()
            .map(|(item, value)| ItemCodec::prepare_write(item, value))
            .collect::<S7Result<Vec<WriteItem>>>()?;

        let sequence = self.next_sequence();
        let request = PacketBuilder::write_request(sequence, &prepared)?;
        debug!("Writing {} items (seq={})", prepared.len(), sequence);

        let response = self.transport.exchange(&request)?;
        let codes: Vec<&str> = items.iter().map(|(item, _)| item.code.as_str()).collect();
        parse_write_response(&response, sequence, &codes)
    }

    /// PDU length agreed during the last handshake.
    pub fn negotiated_pdu_size(&self) -> Option<u16> {
        self.transport.negotiated_pdu_size()
    }

    pub fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

impl<T: Transport> PlcClient for S7Client<T> {
    fn read(&mut self, addresses: &[&str]) -> S7Result<Vec<S7Value>> {
        let items = parse_items(addresses)?;
        self.read_items(&items)
    }

    fn write(&mut self, items: &[(&str, S7Value)]) -> S7Result<()> {
        let parsed = items
            .iter()
            .map(|(raw, value)| Ok((ItemDescriptor::parse(raw)?, value.clone())))
            .collect::<S7Result<Vec<_>>>()?;
        self.write_items(&parsed)
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn close(&mut self) -> S7Result<()> {
        self.transport.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::S7Error;
    use bytes::Bytes;
    use std::collections::VecDeque;

    // =========================================================================
    // MockTransport
    // =========================================================================

    /// Transport that replays canned responses and records requests.
    #[derive(Default)]
    struct MockTransport {
        requests: Vec<Vec<u8>>,
        responses: VecDeque<S7Result<Bytes>>,
        connected: bool,
        handshakes: u32,
    }

    impl MockTransport {
        fn add_response(&mut self, response: Vec<u8>) {
            self.responses.push_back(Ok(Bytes::from(response)));
        }
    }

    impl Transport for MockTransport {
        fn exchange(&mut self, request: &[u8]) -> S7Result<Bytes> {
            if !self.connected {
                self.connected = true;
                self.handshakes += 1;
            }
            self.requests.push(request.to_vec());
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(S7Error::connection("No response prepared in mock")))
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn close(&mut self) -> S7Result<()> {
            self.connected = false;
            Ok(())
        }

        fn get_stats(&self) -> TransportStats {
            TransportStats {
                requests_sent: self.requests.len() as u64,
                ..TransportStats::default()
            }
        }

        fn negotiated_pdu_size(&self) -> Option<u16> {
            self.connected.then_some(480)
        }
    }

    /// Ack-data frame echoing `seq`.
    fn ack(seq: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
        let total = 19 + params.len() + data.len();
        let mut f = vec![0x03, 0x00, 0x00, total as u8, 0x02, 0xF0, 0x80];
        f.extend_from_slice(&[0x32, 0x03, 0x00, 0x00]);
        f.extend_from_slice(&seq.to_be_bytes());
        f.extend_from_slice(&(params.len() as u16).to_be_bytes());
        f.extend_from_slice(&(data.len() as u16).to_be_bytes());
        f.extend_from_slice(&[0x00, 0x00]);
        f.extend_from_slice(params);
        f.extend_from_slice(data);
        f
    }

    fn client() -> S7Client<MockTransport> {
        S7Client::from_transport(MockTransport::default())
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[test]
    fn test_new_is_lazy() {
        let client = S7Client::new("127.0.0.1:1").unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.negotiated_pdu_size(), None);
        assert_eq!(client.get_stats(), TransportStats::default());
    }

    #[test]
    fn test_read_decodes_values() {
        let mut plc = client();
        plc.transport_mut().add_response(ack(
            1,
            &[0x04, 0x03],
            &[
                0xFF, 0x05, 0x00, 0x20, 0x00, 0x01, 0x11, 0x70, //
                0xFF, 0x07, 0x00, 0x04, 0x40, 0x48, 0xF5, 0xC3, //
                0xFF, 0x03, 0x00, 0x01, 0x01,
            ],
        ));

        let values = plc
            .read(&["DB21.0:int32", "DB21.4:float", "DB21.12.0:bit"])
            .unwrap();
        assert_eq!(values[0], S7Value::I32(70000));
        assert!((values[1].as_f64() - 3.14).abs() < 1e-6);
        assert_eq!(values[2], S7Value::Bit(true));

        let request = &plc.transport().requests[0];
        assert_eq!(request[17], 0x04);
        assert_eq!(request[18], 3);
        assert!(plc.is_connected());
        assert_eq!(plc.negotiated_pdu_size(), Some(480));
    }

    #[test]
    fn test_write_sends_normalized_values() {
        let mut plc = client();
        plc.transport_mut()
            .add_response(ack(1, &[0x05, 0x02], &[0xFF, 0xFF]));

        plc.write(&[
            ("DB1.0:string[4]", S7Value::from("hello")),
            ("DB1.6.0:bit", S7Value::from(5i32)),
        ])
        .unwrap();

        let request = &plc.transport().requests[0];
        let data = &request[17 + 2 + 24..];
        assert_eq!(
            data,
            &[0x00, 0x09, 0x00, 0x06, 4, 4, b'h', b'e', b'l', b'l', 0x00, 0x03, 0x00, 0x01, 0x01]
        );
    }

    #[test]
    fn test_item_count_mismatch() {
        let mut plc = client();
        plc.transport_mut()
            .add_response(ack(1, &[0x04, 0x02], &[0xFF, 0x04, 0x00, 0x08, 0x01]));
        let err = plc.read(&["DB1.0:uint8"]).unwrap_err();
        assert!(matches!(err, S7Error::ItemCountMismatch { expected: 1, actual: 2 }));
    }

    #[test]
    fn test_write_item_status_error() {
        let mut plc = client();
        plc.transport_mut()
            .add_response(ack(1, &[0x05, 0x02], &[0xFF, 0x0A]));
        let err = plc
            .write(&[
                ("DB1.0:uint8", S7Value::U8(1)),
                ("DB9.0:uint8", S7Value::U8(2)),
            ])
            .unwrap_err();
        match err {
            S7Error::ItemStatusError { index, code, raw } => {
                assert_eq!((index, code), (1, 0x0A));
                assert_eq!(raw, "DB9.0:uint8");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_address_errors_send_nothing() {
        let mut plc = client();
        assert!(plc.read(&["DB1.0:int16", "DB1.0.1:int16"]).is_err());
        assert!(plc
            .write(&[("DB1.0:int16[2]", S7Value::I16(1))])
            .is_err());
        assert!(plc.transport().requests.is_empty());
        assert_eq!(plc.transport().handshakes, 0);
    }

    #[test]
    fn test_empty_batches_send_nothing() {
        let mut plc = client();
        assert!(plc.read(&[]).unwrap().is_empty());
        plc.write(&[]).unwrap();
        assert!(plc.transport().requests.is_empty());
    }

    #[test]
    fn test_long_connection_reuses_handshake() {
        let mut plc = client();
        for seq in 1..=3u16 {
            plc.transport_mut()
                .add_response(ack(seq, &[0x04, 0x01], &[0xFF, 0x04, 0x00, 0x08, seq as u8]));
        }
        for seq in 1..=3u8 {
            let values = plc.read(&["DB1.0:uint8"]).unwrap();
            assert_eq!(values, vec![S7Value::U8(seq)]);
        }
        assert_eq!(plc.transport().handshakes, 1);

        // sequence numbers advance per job
        let seqs: Vec<u16> = plc
            .transport()
            .requests
            .iter()
            .map(|r| u16::from_be_bytes([r[11], r[12]]))
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(plc.get_stats().requests_sent, 3);
    }

    #[test]
    fn test_close_then_reconnect() {
        let mut plc = client();
        plc.transport_mut()
            .add_response(ack(1, &[0x05, 0x01], &[0xFF]));
        plc.transport_mut()
            .add_response(ack(2, &[0x05, 0x01], &[0xFF]));

        plc.write(&[("DB1.0:uint8", S7Value::U8(1))]).unwrap();
        plc.close().unwrap();
        assert!(!plc.is_connected());
        plc.write(&[("DB1.0:uint8", S7Value::U8(1))]).unwrap();
        assert_eq!(plc.transport().handshakes, 2);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut plc = client();
        let err = plc.read(&["DB1.0:uint8"]).unwrap_err();
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_sequence_skips_zero() {
        let mut plc = client();
        plc.sequence = u16::MAX;
        assert_eq!(plc.next_sequence(), 1);
    }

    #[test]
    fn test_dyn_plc_client() {
        let mut backends: Vec<Box<dyn PlcClient>> = vec![Box::new(client())];
        assert!(!backends[0].is_connected());
        backends[0].close().unwrap();
    }
}
