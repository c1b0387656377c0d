//! Error types for the S7 protocol engine
//!
//! Every failure is surfaced synchronously to the caller. Errors carry the
//! original address text, the item index or the raw status code whenever one
//! is available, so a failed batch can be diagnosed without packet captures.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type S7Result<T> = Result<T, S7Error>;

/// Errors produced while parsing addresses, framing packets or talking to a PLC.
#[derive(Debug, Error)]
pub enum S7Error {
    // ===== Address errors =====
    /// The item address does not follow `DB<n>.<byte>[.<bit>]:<type>[<count>]`.
    #[error("bad plc item addr `{raw}` at position {position}")]
    BadAddress { raw: String, position: usize },

    /// The type name after `:` is neither a canonical name nor an alias.
    #[error("unknown plc item type: `{raw}`")]
    UnknownType { raw: String },

    /// A bit offset was given for a non-bit type.
    #[error("require bit type for `{raw}`")]
    BitTypeMismatch { raw: String },

    /// An array item was written with a scalar value.
    #[error("require array value for `{raw}`")]
    ArrayValueRequired { raw: String },

    /// The value cannot be represented by the item's type (e.g. text for a float).
    #[error("value {value} does not fit item `{raw}`")]
    ValueTypeMismatch { raw: String, value: String },

    // ===== Transport errors =====
    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection could not be opened or was lost.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// No response within the configured read timeout.
    #[error("timeout after {timeout_ms}ms: {message}")]
    Timeout { message: String, timeout_ms: u64 },

    /// The response does not start with a TPKT version 3 header.
    #[error("bad response: bad protocol (TPKT version {version})")]
    BadProtocol { version: u8 },

    /// A request would not fit in one TPKT frame.
    #[error("request too large: {size} bytes exceeds frame limit {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    /// The response ended before a field could be read.
    #[error("truncated response: needed {needed} bytes, available {available}")]
    Truncated { needed: usize, available: usize },

    // ===== Protocol errors =====
    /// The S7 response header carries a non-zero error code.
    #[error("server returns error: 0x{code:04X}")]
    ServerError { code: u16 },

    /// The response item count differs from the request item count.
    #[error("bad server item count: expected {expected}, got {actual}")]
    ItemCountMismatch { expected: usize, actual: usize },

    /// A per-item return code other than 0xFF.
    #[error("fail to access `{raw}` (item {index}): return code=0x{code:02X}")]
    ItemStatusError { index: usize, code: u8, raw: String },

    /// COTP connect or PDU negotiation answered with an unexpected PDU.
    #[error("handshake failed: {message}")]
    HandshakeError { message: String },

    // ===== Configuration errors =====
    /// Invalid client configuration (e.g. malformed endpoint).
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl S7Error {
    pub fn bad_address(raw: impl Into<String>, position: usize) -> Self {
        S7Error::BadAddress {
            raw: raw.into(),
            position,
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        S7Error::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        S7Error::Timeout {
            message: message.into(),
            timeout_ms,
        }
    }

    pub fn handshake(message: impl Into<String>) -> Self {
        S7Error::HandshakeError {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        S7Error::Configuration {
            message: message.into(),
        }
    }

    /// True for errors that leave the socket in an unknown state.
    ///
    /// Callers that keep a long connection should close and reconnect after one of these.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            S7Error::Io(_)
                | S7Error::Connection { .. }
                | S7Error::Timeout { .. }
                | S7Error::BadProtocol { .. }
                | S7Error::Truncated { .. }
                | S7Error::HandshakeError { .. }
        )
    }

    /// True for errors raised before anything is sent on the wire.
    pub fn is_address_error(&self) -> bool {
        matches!(
            self,
            S7Error::BadAddress { .. }
                | S7Error::UnknownType { .. }
                | S7Error::BitTypeMismatch { .. }
                | S7Error::ArrayValueRequired { .. }
                | S7Error::ValueTypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = S7Error::ItemStatusError {
            index: 2,
            code: 0x0A,
            raw: "DB1.0:int16".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DB1.0:int16"));
        assert!(msg.contains("0x0A"));

        let err = S7Error::ServerError { code: 0x8104 };
        assert_eq!(err.to_string(), "server returns error: 0x8104");
    }

    #[test]
    fn test_classification() {
        assert!(S7Error::timeout("read", 3000).is_transport_error());
        assert!(S7Error::handshake("no CC").is_transport_error());
        assert!(!S7Error::ServerError { code: 1 }.is_transport_error());
        assert!(S7Error::bad_address("DB", 2).is_address_error());
        assert!(!S7Error::connection("refused").is_address_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: S7Error = io.into();
        assert!(matches!(err, S7Error::Io(_)));
    }
}
