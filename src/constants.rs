//! S7comm protocol constants
//!
//! Byte values of the ISO-on-TCP (RFC1006) / COTP (ISO 8073) / S7comm stack.
//! All multi-byte wire fields are big-endian.

use std::time::Duration;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// TPKT header length: Version(1) + Reserved(1) + Length(2)
pub const TPKT_HEADER_LEN: usize = 4;

/// COTP data-transfer header length: LI(1) + PDU type(1) + EOT/number(1)
pub const COTP_DT_HEADER_LEN: usize = 3;

/// Offset of the S7 header inside a data-transfer frame
pub const ISO_HEADER_LEN: usize = TPKT_HEADER_LEN + COTP_DT_HEADER_LEN;

/// S7 request header: ID(1) + PDU type(1) + AB_EX(2) + Sequence(2) + ParamLen(2) + DataLen(2)
pub const S7_REQUEST_HEADER_LEN: usize = 10;

/// S7 response header: request header + Error(2)
pub const S7_RESPONSE_HEADER_LEN: usize = 12;

/// One read/write item in the parameter block:
/// Spec(1) + Len(1) + Syntax(1) + WordLen(1) + Count(2) + DB(2) + Area/Address(4)
pub const REQUEST_ITEM_LEN: usize = 12;

/// Per-item data sub-header: ReturnCode(1) + TransportSize(1) + Length(2)
pub const DATA_ITEM_HEADER_LEN: usize = 4;

/// Maximum response size accepted from the wire.
///
/// TPKT lengths are 16 bit, so nothing bigger can be framed.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

// ============================================================================
// TPKT / COTP
// ============================================================================

/// RFC1006 version byte
pub const TPKT_VERSION: u8 = 0x03;

/// COTP Connection Request
pub const COTP_CONNECT_REQUEST: u8 = 0xE0;

/// COTP Connection Confirm
pub const COTP_CONNECT_CONFIRM: u8 = 0xD0;

/// COTP Data Transfer
pub const COTP_DATA: u8 = 0xF0;

/// COTP last-data-unit flag
pub const COTP_EOT: u8 = 0x80;

/// COTP parameter: TPDU size
pub const COTP_PARAM_TPDU_SIZE: u8 = 0xC0;

/// COTP parameter: calling (source) TSAP
pub const COTP_PARAM_SRC_TSAP: u8 = 0xC1;

/// COTP parameter: called (destination) TSAP
pub const COTP_PARAM_DST_TSAP: u8 = 0xC2;

/// TPDU size code 0x0A = 1024 bytes
pub const COTP_TPDU_SIZE_1024: u8 = 0x0A;

/// Connection Request telegram size
///
/// - TPKT: 4 bytes
/// - COTP fixed part: LI(1) + Type(1) + DstRef(2) + SrcRef(2) + Class(1) = 7 bytes
/// - TPDU size param: 3 bytes
/// - Two TSAP params: 2 × 4 bytes
/// - Total: 4 + 7 + 3 + 8 = 22 bytes
pub const COTP_CR_LEN: usize = 22;

// ============================================================================
// S7 header
// ============================================================================

/// S7comm protocol ID
pub const S7_PROTOCOL_ID: u8 = 0x32;

/// PDU type: job request
pub const S7_PDU_REQUEST: u8 = 0x01;

/// PDU type: ack-data response
pub const S7_PDU_ACK_DATA: u8 = 0x03;

// ============================================================================
// S7 functions and item encoding
// ============================================================================

/// Read Var
pub const FN_READ_VAR: u8 = 0x04;

/// Write Var
pub const FN_WRITE_VAR: u8 = 0x05;

/// Setup Communication
pub const FN_SETUP_COMMUNICATION: u8 = 0xF0;

/// Variable specification tag that opens every item
pub const ITEM_SPEC: [u8; 3] = [0x12, 0x0A, 0x10];

/// Area code for data blocks, stored in the top byte of the address word
pub const AREA_DATA_BLOCK: u8 = 0x84;

/// Per-item return code meaning success
pub const RETURN_CODE_SUCCESS: u8 = 0xFF;

// ============================================================================
// Transport size codes (data section)
// ============================================================================

/// Bit access, length in bytes
pub const TS_BIT: u8 = 0x03;

/// Byte/word/dword access, length in bits
pub const TS_BYTE: u8 = 0x04;

/// Integer access, length in bits
pub const TS_INT: u8 = 0x05;

/// Real access, length in bytes
pub const TS_REAL: u8 = 0x07;

/// Octet string, length in bytes
pub const TS_OCTET: u8 = 0x09;

// ============================================================================
// Word length codes (parameter section)
// ============================================================================

pub const WL_BIT: u8 = 0x01;
pub const WL_BYTE: u8 = 0x02;
pub const WL_CHAR: u8 = 0x03;
pub const WL_WORD: u8 = 0x04;
pub const WL_DWORD: u8 = 0x06;
pub const WL_REAL: u8 = 0x08;

// ============================================================================
// Defaults
// ============================================================================

/// ISO-on-TCP port
pub const DEFAULT_PORT: u16 = 102;

/// PDU length proposed during Setup Communication
pub const DEFAULT_PDU_SIZE: u16 = 480;

/// Parallel jobs proposed for both calling and called side
pub const DEFAULT_MAX_AMQ: u16 = 1;

/// TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Response read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Local TSAP used for the COTP connection request
pub const DEFAULT_LOCAL_TSAP: u16 = 0x0100;

/// Connection type "PG" in the high byte of the remote TSAP
pub const CONNECTION_TYPE_PG: u16 = 0x0001;

/// Rack 0 / slot 2 (S7-300 CPU position)
pub const DEFAULT_RACK: u16 = 0;
pub const DEFAULT_SLOT: u16 = 2;

/// Whether a transport size expresses its data length in bits.
///
/// Octet strings, reals and bits carry byte counts; every other class
/// (byte/word/dword/int) carries bit counts.
#[inline]
pub fn length_in_bits(transport_size: u8) -> bool {
    !matches!(transport_size, TS_OCTET | TS_REAL | TS_BIT)
}
