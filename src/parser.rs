//! S7 response parsing
//!
//! Responses are parsed through [`FrameReader`], a bounds-checked cursor over
//! the received frame. Running past the end yields [`S7Error::Truncated`]
//! instead of a panic.

use tracing::{debug, warn};

use crate::address::ItemDescriptor;
use crate::codec::ItemCodec;
use crate::constants::{
    length_in_bits, COTP_CONNECT_CONFIRM, COTP_DATA, FN_READ_VAR, FN_SETUP_COMMUNICATION,
    FN_WRITE_VAR, ISO_HEADER_LEN, RETURN_CODE_SUCCESS, S7_PDU_ACK_DATA, S7_RESPONSE_HEADER_LEN,
    TPKT_VERSION,
};
use crate::error::{S7Error, S7Result};
use crate::value::S7Value;

/// Offset of the COTP PDU type inside a frame.
const COTP_TYPE_OFFSET: usize = 5;

// ============================================================================
// Cursor
// ============================================================================

/// Bounds-checked big-endian reader over a response frame.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn need(&self, n: usize) -> S7Result<()> {
        if self.remaining() < n {
            return Err(S7Error::Truncated {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> S7Result<u8> {
        self.need(1)?;
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> S7Result<u16> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: usize) -> S7Result<&'a [u8]> {
        self.need(n)?;
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> S7Result<()> {
        self.need(n)?;
        self.pos += n;
        Ok(())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The 12-byte S7 ack-data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub protocol_id: u8,
    pub pdu_type: u8,
    pub sequence: u16,
    pub param_len: u16,
    pub data_len: u16,
    pub error_code: u16,
}

fn check_tpkt(frame: &[u8]) -> S7Result<()> {
    let version = *frame.first().ok_or(S7Error::Truncated {
        needed: 1,
        available: 0,
    })?;
    if version != TPKT_VERSION {
        return Err(S7Error::BadProtocol { version });
    }
    Ok(())
}

/// Validate TPKT, skip TPKT + COTP and read the S7 response header.
///
/// A non-zero header error code fails with [`S7Error::ServerError`]. The
/// returned reader is positioned at the response parameters.
pub fn parse_envelope(frame: &[u8]) -> S7Result<(ResponseHeader, FrameReader<'_>)> {
    check_tpkt(frame)?;

    let mut r = FrameReader::new(frame);
    r.skip(ISO_HEADER_LEN)?;
    r.need(S7_RESPONSE_HEADER_LEN)?;
    let protocol_id = r.read_u8()?;
    let pdu_type = r.read_u8()?;
    let _ab_ex = r.read_u16()?;
    let header = ResponseHeader {
        protocol_id,
        pdu_type,
        sequence: r.read_u16()?,
        param_len: r.read_u16()?,
        data_len: r.read_u16()?,
        error_code: r.read_u16()?,
    };

    if header.pdu_type != S7_PDU_ACK_DATA {
        warn!(
            "Unexpected S7 PDU type {:02X} (expected ack-data {:02X})",
            header.pdu_type, S7_PDU_ACK_DATA
        );
    }
    if header.error_code != 0 {
        return Err(S7Error::ServerError {
            code: header.error_code,
        });
    }
    Ok((header, r))
}

/// Envelope plus the two-byte `(function, item count)` response parameters.
fn parse_job_response<'a>(
    frame: &'a [u8],
    sequence: u16,
    function: u8,
    expected_items: usize,
) -> S7Result<FrameReader<'a>> {
    let (header, mut r) = parse_envelope(frame)?;
    if header.sequence != sequence {
        warn!(
            "Response sequence mismatch: sent {}, received {}",
            sequence, header.sequence
        );
    }

    let fc = r.read_u8()?;
    if fc != function {
        warn!("Response function mismatch: sent {:02X}, received {:02X}", function, fc);
    }
    let count = r.read_u8()? as usize;
    if count != expected_items {
        return Err(S7Error::ItemCountMismatch {
            expected: expected_items,
            actual: count,
        });
    }
    Ok(r)
}

// ============================================================================
// Job responses
// ============================================================================

/// Decode a Read Var response into one value per requested item.
pub fn parse_read_response(
    frame: &[u8],
    sequence: u16,
    items: &[ItemDescriptor],
) -> S7Result<Vec<S7Value>> {
    let mut r = parse_job_response(frame, sequence, FN_READ_VAR, items.len())?;

    let mut values = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let code = r.read_u8()?;
        if code != RETURN_CODE_SUCCESS {
            return Err(S7Error::ItemStatusError {
                index,
                code,
                raw: item.code.clone(),
            });
        }
        let ts = r.read_u8()?;
        let raw_len = r.read_u16()? as usize;
        let len = if length_in_bits(ts) {
            raw_len.div_ceil(8)
        } else {
            raw_len
        };

        let segment = r.read_bytes(len)?;
        values.push(ItemCodec::decode_value(item, segment)?);

        // fill byte after odd segments, absent after the last one
        if len % 2 != 0 && index + 1 != items.len() {
            r.skip(1)?;
        }
    }

    debug!("Parsed read response: {} items", values.len());
    Ok(values)
}

/// Check a Write Var response: one status byte per item, each 0xFF.
///
/// `codes` are the address strings of the written items, in request order.
pub fn parse_write_response<S: AsRef<str>>(
    frame: &[u8],
    sequence: u16,
    codes: &[S],
) -> S7Result<()> {
    let mut r = parse_job_response(frame, sequence, FN_WRITE_VAR, codes.len())?;

    for (index, raw) in codes.iter().enumerate() {
        let code = r.read_u8()?;
        if code != RETURN_CODE_SUCCESS {
            return Err(S7Error::ItemStatusError {
                index,
                code,
                raw: raw.as_ref().to_string(),
            });
        }
    }

    debug!("Parsed write response: {} items ok", codes.len());
    Ok(())
}

// ============================================================================
// Handshake responses
// ============================================================================

fn cotp_type(frame: &[u8]) -> S7Result<u8> {
    check_tpkt(frame)?;
    frame
        .get(COTP_TYPE_OFFSET)
        .copied()
        .ok_or(S7Error::Truncated {
            needed: COTP_TYPE_OFFSET + 1,
            available: frame.len(),
        })
}

/// Require a COTP Connection Confirm.
pub fn parse_connect_confirm(frame: &[u8]) -> S7Result<()> {
    let pdu_type = cotp_type(frame)?;
    if pdu_type != COTP_CONNECT_CONFIRM {
        return Err(S7Error::handshake(format!(
            "expected COTP connection confirm (0x{:02X}), got 0x{:02X}",
            COTP_CONNECT_CONFIRM, pdu_type
        )));
    }
    debug!("COTP connection confirmed");
    Ok(())
}

/// Validate a Setup Communication response and return the negotiated PDU length.
pub fn parse_setup_response(frame: &[u8]) -> S7Result<u16> {
    let pdu_type = cotp_type(frame)?;
    if pdu_type != COTP_DATA {
        return Err(S7Error::handshake(format!(
            "expected COTP data transfer (0x{:02X}), got 0x{:02X}",
            COTP_DATA, pdu_type
        )));
    }

    let (_, mut r) = parse_envelope(frame)?;
    let fc = r.read_u8()?;
    if fc != FN_SETUP_COMMUNICATION {
        return Err(S7Error::handshake(format!(
            "expected setup communication response, got function 0x{:02X}",
            fc
        )));
    }
    r.skip(1)?; // reserved
    let _amq_calling = r.read_u16()?;
    let _amq_called = r.read_u16()?;
    let pdu_size = r.read_u16()?;

    debug!("Negotiated PDU size: {}", pdu_size);
    Ok(pdu_size)
}
