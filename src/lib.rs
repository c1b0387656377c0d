//! # s7_plc - Siemens S7 Data Block Client
//!
//! A synchronous client for reading and writing data-block variables on
//! Siemens S7-300/400/1200/1500 controllers over ISO-on-TCP (RFC1006),
//! COTP (ISO 8073) and S7comm.
//!
//! ## Features
//!
//! - **Textual addressing**: `DB21.0:int32`, `DB21.12.0:bit`, `DB5.10:string[20]`
//! - **Batching**: up to 255 items in one read or write job
//! - **Lazy connections**: the COTP and PDU handshake run on first use
//! - **Bounds-checked parsing**: malformed frames become errors, never panics
//! - **Packet logging**: optional hex dumps of every frame via `tracing`
//!
//! ## Address Syntax
//!
//! ```text
//! DB<db>.<byte>[.<bit>]:<type>[<count>]
//! ```
//!
//! | Type | Width | Alias |
//! |------|-------|-------|
//! | bit | 1 bit | bool |
//! | int8 / uint8 | 1 | byte (uint8) |
//! | int16 / uint16 | 2 | int, word |
//! | int32 / uint32 | 4 | dint, dword |
//! | float | 4 | |
//! | char[n] | n | |
//! | string[n] | n + 2 | |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use s7_plc::{PlcClient, S7Client, S7Result, S7Value};
//!
//! fn main() -> S7Result<()> {
//!     let mut plc = S7Client::new("192.168.1.101")?;
//!
//!     plc.write(&[
//!         ("DB21.0:int32", S7Value::from(70000i32)),
//!         ("DB21.4:float", S7Value::from(3.14f32)),
//!         ("DB21.12.0:bit", S7Value::from(true)),
//!     ])?;
//!
//!     let values = plc.read(&["DB21.0:int32", "DB21.4:float", "DB21.12.0:bit"])?;
//!     println!("Read values: {:?}", values);
//!
//!     plc.close()?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result handling
pub mod error;

/// S7comm protocol constants
pub mod constants;

/// Item type catalog
pub mod types;

/// Textual item addresses
pub mod address;

/// Dynamic item values
pub mod value;

/// Value normalization and wire encoding
pub mod codec;

/// Request frame construction
pub mod packet;

/// Response frame parsing
pub mod parser;

/// Connection settings
pub mod config;

/// ISO-on-TCP transport layer
pub mod transport;

/// S7 client implementation
pub mod client;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Core client API ===
pub use client::{PlcClient, S7Client};
pub use config::{parse_endpoint, ClientConfig};

// === Error handling ===
pub use error::{S7Error, S7Result};

// === Core types ===
pub use address::{parse_items, ItemDescriptor};
pub use types::{TypeId, TypeRegistry, TypeSpec};
pub use value::S7Value;

// === Protocol (advanced usage) ===
pub use codec::{ItemCodec, WriteItem};
pub use packet::PacketBuilder;

// === Monitoring ===
pub use transport::{ConnectionState, TcpTransport, Transport, TransportStats};

/// ISO-on-TCP default port
pub const DEFAULT_TCP_PORT: u16 = constants::DEFAULT_PORT;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("s7_plc v{} - Siemens S7 data-block client", VERSION)
}
