//! S7 request packet construction
//!
//! Every request is a TPKT frame wrapping a COTP data-transfer TPDU wrapping
//! an S7 job:
//!
//! ```text
//! +------+------+-------------------+------------+--------------+
//! | TPKT | COTP | S7 header (10B)   | parameters | data (write) |
//! |  4B  |  3B  | 32 01 0000 seq .. |            |              |
//! +------+------+-------------------+------------+--------------+
//! ```
//!
//! The only exception is the COTP Connection Request sent once per connection.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::address::ItemDescriptor;
use crate::codec::WriteItem;
use crate::constants::{
    length_in_bits, COTP_CONNECT_REQUEST, COTP_CR_LEN, COTP_DATA, COTP_DT_HEADER_LEN, COTP_EOT,
    COTP_PARAM_DST_TSAP, COTP_PARAM_SRC_TSAP, COTP_PARAM_TPDU_SIZE, COTP_TPDU_SIZE_1024,
    DATA_ITEM_HEADER_LEN, DEFAULT_MAX_AMQ, FN_READ_VAR, FN_SETUP_COMMUNICATION, FN_WRITE_VAR,
    ISO_HEADER_LEN, ITEM_SPEC, MAX_FRAME_LEN, REQUEST_ITEM_LEN, S7_PDU_REQUEST, S7_PROTOCOL_ID,
    S7_REQUEST_HEADER_LEN, TPKT_VERSION,
};
use crate::error::{S7Error, S7Result};

/// Most items a single read or write job can carry (one-byte count field).
pub const MAX_ITEMS_PER_REQUEST: usize = u8::MAX as usize;

/// Builds framed S7 request packets.
pub struct PacketBuilder;

impl PacketBuilder {
    /// Read Var request for `items`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use s7_plc::{ItemDescriptor, PacketBuilder};
    ///
    /// let item = ItemDescriptor::parse("DB21.0:int32").unwrap();
    /// let packet = PacketBuilder::read_request(1, &[item]).unwrap();
    /// assert_eq!(packet.len(), 31);
    /// assert_eq!(&packet[17..19], &[0x04, 0x01]); // Read Var, one item
    /// ```
    pub fn read_request(sequence: u16, items: &[ItemDescriptor]) -> S7Result<Bytes> {
        check_item_count(items.len())?;

        let mut params = BytesMut::with_capacity(2 + items.len() * REQUEST_ITEM_LEN);
        params.put_u8(FN_READ_VAR);
        params.put_u8(items.len() as u8);
        for item in items {
            let count = item.read_element_count();
            let count = u16::try_from(count).map_err(|_| S7Error::FrameTooLarge {
                size: count as usize,
                limit: u16::MAX as usize,
            })?;
            put_item_spec(&mut params, item, count)?;
        }

        debug!(
            "Building read request: seq={}, items={}, param_len={}",
            sequence,
            items.len(),
            params.len()
        );
        frame_job(sequence, &params, &[])
    }

    /// Write Var request for normalized `items`.
    ///
    /// Each data segment is followed by one pad byte when its length is odd,
    /// except the segment of the last item.
    pub fn write_request(sequence: u16, items: &[WriteItem]) -> S7Result<Bytes> {
        check_item_count(items.len())?;

        let mut params = BytesMut::with_capacity(2 + items.len() * REQUEST_ITEM_LEN);
        params.put_u8(FN_WRITE_VAR);
        params.put_u8(items.len() as u8);

        let mut data = BytesMut::new();
        for (i, w) in items.iter().enumerate() {
            put_item_spec(&mut params, &w.item, w.wire_count)?;

            let ts = w.transport_size();
            let size = w.byte_len();
            let len = if length_in_bits(ts) { size * 8 } else { size };
            let len = u16::try_from(len).map_err(|_| S7Error::FrameTooLarge {
                size: len,
                limit: u16::MAX as usize,
            })?;

            data.reserve(DATA_ITEM_HEADER_LEN + size + 1);
            data.put_u8(0x00);
            data.put_u8(ts);
            data.put_u16(len);
            data.put_slice(&w.payload);
            if size % 2 != 0 && i + 1 != items.len() {
                data.put_u8(0x00);
            }
        }

        debug!(
            "Building write request: seq={}, items={}, param_len={}, data_len={}",
            sequence,
            items.len(),
            params.len(),
            data.len()
        );
        frame_job(sequence, &params, &data)
    }

    /// COTP Connection Request (CR) with TPDU size 1024 and the given TSAPs.
    pub fn connect_request(local_tsap: u16, remote_tsap: u16) -> Bytes {
        let mut buf = BytesMut::with_capacity(COTP_CR_LEN);
        // TPKT
        buf.put_u8(TPKT_VERSION);
        buf.put_u8(0x00);
        buf.put_u16(COTP_CR_LEN as u16);
        // COTP fixed part
        buf.put_u8((COTP_CR_LEN - 5) as u8); // LI excludes itself
        buf.put_u8(COTP_CONNECT_REQUEST);
        buf.put_u16(0x0000); // dst ref
        buf.put_u16(0x0001); // src ref
        buf.put_u8(0x00); // class 0
        // variable part
        buf.put_slice(&[COTP_PARAM_TPDU_SIZE, 0x01, COTP_TPDU_SIZE_1024]);
        buf.put_slice(&[COTP_PARAM_SRC_TSAP, 0x02]);
        buf.put_u16(local_tsap);
        buf.put_slice(&[COTP_PARAM_DST_TSAP, 0x02]);
        buf.put_u16(remote_tsap);

        debug!(
            "Building COTP connect request: local_tsap={:04X}, remote_tsap={:04X}",
            local_tsap, remote_tsap
        );
        buf.freeze()
    }

    /// Setup Communication job proposing `pdu_size` and one parallel job each way.
    pub fn setup_communication(sequence: u16, pdu_size: u16) -> Bytes {
        let mut params = BytesMut::with_capacity(8);
        params.put_u8(FN_SETUP_COMMUNICATION);
        params.put_u8(0x00);
        params.put_u16(DEFAULT_MAX_AMQ); // calling
        params.put_u16(DEFAULT_MAX_AMQ); // called
        params.put_u16(pdu_size);

        debug!("Building setup communication: pdu_size={}", pdu_size);
        let mut buf = BytesMut::with_capacity(ISO_HEADER_LEN + S7_REQUEST_HEADER_LEN + params.len());
        put_envelope(&mut buf, sequence, &params, &[]);
        buf.freeze()
    }
}

fn check_item_count(count: usize) -> S7Result<()> {
    if count > MAX_ITEMS_PER_REQUEST {
        return Err(S7Error::FrameTooLarge {
            size: count,
            limit: MAX_ITEMS_PER_REQUEST,
        });
    }
    Ok(())
}

/// Descriptors built by hand can carry offsets the 24-bit address field cannot hold.
fn put_item_spec(buf: &mut BytesMut, item: &ItemDescriptor, count: u16) -> S7Result<()> {
    let address = item.address_word().ok_or_else(|| {
        let offset_pos = item.code.find('.').map_or(0, |p| p + 1);
        S7Error::bad_address(item.code.as_str(), offset_pos)
    })?;
    buf.put_slice(&ITEM_SPEC);
    buf.put_u8(item.spec().word_len);
    buf.put_u16(count);
    buf.put_u16(item.data_block);
    buf.put_u32(address);
    Ok(())
}

fn frame_job(sequence: u16, params: &[u8], data: &[u8]) -> S7Result<Bytes> {
    let total = ISO_HEADER_LEN + S7_REQUEST_HEADER_LEN + params.len() + data.len();
    if total > MAX_FRAME_LEN {
        return Err(S7Error::FrameTooLarge {
            size: total,
            limit: MAX_FRAME_LEN,
        });
    }
    let mut buf = BytesMut::with_capacity(total);
    put_envelope(&mut buf, sequence, params, data);
    Ok(buf.freeze())
}

/// TPKT + COTP DT + S7 request header, then `params` and `data`.
///
/// Caller guarantees the total fits in a TPKT length.
fn put_envelope(buf: &mut BytesMut, sequence: u16, params: &[u8], data: &[u8]) {
    let total = ISO_HEADER_LEN + S7_REQUEST_HEADER_LEN + params.len() + data.len();

    buf.put_u8(TPKT_VERSION);
    buf.put_u8(0x00);
    buf.put_u16(total as u16);

    buf.put_u8((COTP_DT_HEADER_LEN - 1) as u8);
    buf.put_u8(COTP_DATA);
    buf.put_u8(COTP_EOT);

    buf.put_u8(S7_PROTOCOL_ID);
    buf.put_u8(S7_PDU_REQUEST);
    buf.put_u16(0x0000); // AB_EX
    buf.put_u16(sequence);
    buf.put_u16(params.len() as u16);
    buf.put_u16(data.len() as u16);

    buf.put_slice(params);
    buf.put_slice(data);
}
