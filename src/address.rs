//! # Item Address Parser
//!
//! Parses textual item addresses of the form
//!
//! ```text
//! DB<db>.<byte>[.<bit>]:<type>[\[<count>\]]
//! ```
//!
//! into an [`ItemDescriptor`]. Examples:
//!
//! | Address | Meaning |
//! |---------|---------|
//! | `DB21.0:int32` | one signed dword at byte 0 of DB21 |
//! | `DB21.12.3:bit` | bit 3 of byte 12 |
//! | `DB5.100:float[4]` | four reals starting at byte 100 |
//! | `DB1.0:string[20]` | S7 string with capacity 20 |
//!
//! The grammar is parsed by a small cursor so that syntax errors report the
//! byte position where parsing stopped.

use std::fmt;
use std::str::FromStr;

use crate::error::{S7Error, S7Result};
use crate::types::{TypeId, TypeRegistry, TypeSpec};

/// One parsed read/write target inside a data block.
///
/// # Example
///
/// ```rust
/// use s7_plc::{ItemDescriptor, TypeId};
///
/// let item: ItemDescriptor = "DB21.12.3:bool".parse().unwrap();
/// assert_eq!(item.data_block, 21);
/// assert_eq!(item.byte_offset, 12);
/// assert_eq!(item.bit_offset, 3);
/// assert_eq!(item.type_id, TypeId::Bit);
/// assert!(!item.is_array);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    /// Address text as given by the caller
    pub code: String,
    pub data_block: u16,
    pub byte_offset: u32,
    /// Always 0 unless `type_id` is `Bit`
    pub bit_offset: u8,
    pub type_id: TypeId,
    /// Declared element count, at least 1
    pub element_count: u32,
    /// A bracketed count was present in the address
    pub is_array: bool,
}

impl ItemDescriptor {
    /// Parse an address string.
    pub fn parse(raw: &str) -> S7Result<Self> {
        Cursor::new(raw).item()
    }

    #[inline]
    pub fn spec(&self) -> &'static TypeSpec {
        self.type_id.spec()
    }

    /// Number of wire bytes a read of this item asks for.
    ///
    /// Strings add their two header bytes.
    pub fn read_capacity(&self) -> u32 {
        let spec = self.spec();
        match self.type_id {
            TypeId::String => self.element_count.saturating_add(2),
            _ => self.element_count.saturating_mul(spec.byte_width as u32),
        }
    }

    /// Element count sent in a read request parameter block.
    pub fn read_element_count(&self) -> u32 {
        match self.type_id {
            TypeId::String => self.element_count.saturating_add(2),
            _ => self.element_count,
        }
    }

    /// Absolute bit address inside the data block, if it fits the 24-bit wire field.
    pub fn bit_address(&self) -> Option<u32> {
        bit_address(self.byte_offset, self.bit_offset)
    }

    /// 32-bit area/address word: DB area in the top byte, bit address below.
    ///
    /// Returns `None` when the offset does not fit the 24-bit address field.
    #[inline]
    pub fn address_word(&self) -> Option<u32> {
        let bits = self.bit_address()?;
        Some((u32::from(crate::constants::AREA_DATA_BLOCK) << 24) | bits)
    }
}

impl FromStr for ItemDescriptor {
    type Err = S7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemDescriptor::parse(s)
    }
}

impl fmt::Display for ItemDescriptor {
    /// Canonical form: aliases resolved, bit suffix only for bit items.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DB{}.{}", self.data_block, self.byte_offset)?;
        if self.type_id == TypeId::Bit {
            write!(f, ".{}", self.bit_offset)?;
        }
        write!(f, ":{}", self.type_id)?;
        if self.is_array {
            write!(f, "[{}]", self.element_count)?;
        }
        Ok(())
    }
}

/// Parse a batch of addresses, failing on the first bad one.
pub fn parse_items<S: AsRef<str>>(addresses: &[S]) -> S7Result<Vec<ItemDescriptor>> {
    addresses
        .iter()
        .map(|a| ItemDescriptor::parse(a.as_ref()))
        .collect()
}

/// Highest bit address the 24-bit address field can carry.
pub const MAX_BIT_ADDRESS: u32 = 0x00FF_FFFF;

fn bit_address(byte_offset: u32, bit_offset: u8) -> Option<u32> {
    byte_offset
        .checked_mul(8)
        .and_then(|bits| bits.checked_add(u32::from(bit_offset)))
        .filter(|&bits| bits <= MAX_BIT_ADDRESS)
}

/// Largest count that still fits the 16-bit wire field once a string header is added.
const MAX_ELEMENT_COUNT: u32 = u16::MAX as u32 - 2;

// ============================================================================
// Cursor
// ============================================================================

struct Cursor<'a> {
    raw: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            bytes: raw.as_bytes(),
            pos: 0,
        }
    }

    fn fail(&self) -> S7Error {
        S7Error::bad_address(self.raw, self.pos)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, b: u8) -> S7Result<()> {
        if self.eat(b) {
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn expect_str(&mut self, s: &str) -> S7Result<()> {
        for b in s.bytes() {
            self.expect(b)?;
        }
        Ok(())
    }

    /// Decimal digits into `u32`; overflow is a syntax error at the first digit.
    fn number(&mut self) -> S7Result<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b @ b'0'..=b'9') = self.peek() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u32::from(b - b'0')))
                .ok_or_else(|| S7Error::bad_address(self.raw, start))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail());
        }
        Ok(value)
    }

    /// `\w+` run: ASCII letters, digits and underscore.
    fn word(&mut self) -> S7Result<&'a str> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail());
        }
        Ok(&self.raw[start..self.pos])
    }

    fn item(mut self) -> S7Result<ItemDescriptor> {
        self.expect_str("DB")?;

        let db_pos = self.pos;
        let data_block =
            u16::try_from(self.number()?).map_err(|_| S7Error::bad_address(self.raw, db_pos))?;

        self.expect(b'.')?;
        let offset_pos = self.pos;
        let byte_offset = self.number()?;

        let bit = if self.eat(b'.') {
            let bit_pos = self.pos;
            let bit = self.number()?;
            if bit > 7 {
                return Err(S7Error::bad_address(self.raw, bit_pos));
            }
            Some(bit as u8)
        } else {
            None
        };
        if bit_address(byte_offset, bit.unwrap_or(0)).is_none() {
            return Err(S7Error::bad_address(self.raw, offset_pos));
        }

        self.expect(b':')?;
        let type_name = self.word()?;

        let count = if self.eat(b'[') {
            let count_pos = self.pos;
            let count = self.number()?;
            if count == 0 || count > MAX_ELEMENT_COUNT {
                return Err(S7Error::bad_address(self.raw, count_pos));
            }
            self.expect(b']')?;
            Some(count)
        } else {
            None
        };

        if self.pos != self.bytes.len() {
            return Err(self.fail());
        }

        let spec = TypeRegistry::global()
            .lookup(type_name)
            .map_err(|_| S7Error::UnknownType {
                raw: self.raw.to_string(),
            })?;

        if bit.is_some() && !spec.is_bit() {
            return Err(S7Error::BitTypeMismatch {
                raw: self.raw.to_string(),
            });
        }

        Ok(ItemDescriptor {
            code: self.raw.to_string(),
            data_block,
            byte_offset,
            bit_offset: bit.unwrap_or(0),
            type_id: spec.id,
            element_count: count.unwrap_or(1),
            is_array: count.is_some(),
        })
    }
}
