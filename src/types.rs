//! # S7 Type Registry
//!
//! Maps the logical type names used in item addresses to their wire
//! representation.
//!
//! | Type | Bytes | Word length | Transport size | Aliases |
//! |------|-------|-------------|----------------|---------|
//! | bit | 1 | 0x01 | 0x03 | bool |
//! | int8 | 1 | 0x02 | 0x04 | |
//! | uint8 | 1 | 0x02 | 0x04 | byte |
//! | int16 | 2 | 0x04 | 0x05 | int |
//! | uint16 | 2 | 0x04 | 0x05 | word |
//! | int32 | 4 | 0x06 | 0x05 | dint |
//! | uint32 | 4 | 0x06 | 0x05 | dword |
//! | float | 4 | 0x08 | 0x07 | |
//! | char | 1 | 0x03 | 0x09 | |
//! | string | 1 | 0x03 | 0x09 | |

use std::fmt;

use crate::constants::{
    TS_BIT, TS_BYTE, TS_INT, TS_OCTET, TS_REAL, WL_BIT, WL_BYTE, WL_CHAR, WL_DWORD, WL_REAL,
    WL_WORD,
};
use crate::error::{S7Error, S7Result};

/// Logical item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Bit,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float,
    Char,
    String,
}

impl TypeId {
    /// Canonical name as accepted in addresses.
    pub fn name(&self) -> &'static str {
        match self {
            TypeId::Bit => "bit",
            TypeId::Int8 => "int8",
            TypeId::Uint8 => "uint8",
            TypeId::Int16 => "int16",
            TypeId::Uint16 => "uint16",
            TypeId::Int32 => "int32",
            TypeId::Uint32 => "uint32",
            TypeId::Float => "float",
            TypeId::Char => "char",
            TypeId::String => "string",
        }
    }

    /// Registry entry for this type.
    #[inline]
    pub fn spec(&self) -> &'static TypeSpec {
        TypeRegistry::global().spec(*self)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Special-handling class of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Fixed-width number
    Scalar,
    /// Single bit, coerced to 0/1
    Bit,
    /// Fixed-length byte buffer
    Char,
    /// Length-prefixed S7 string
    String,
}

/// Wire specification of one logical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub id: TypeId,
    /// Width of one element in bytes
    pub byte_width: usize,
    /// Word-length code used in the request parameter block
    pub word_len: u8,
    /// Transport-size code used in the data section
    pub transport_size: u8,
    pub signed: bool,
    pub kind: TypeKind,
}

impl TypeSpec {
    const fn new(
        id: TypeId,
        byte_width: usize,
        word_len: u8,
        transport_size: u8,
        signed: bool,
        kind: TypeKind,
    ) -> Self {
        Self {
            id,
            byte_width,
            word_len,
            transport_size,
            signed,
            kind,
        }
    }

    #[inline]
    pub fn is_bit(&self) -> bool {
        self.kind == TypeKind::Bit
    }

    /// Char and string items carry raw bytes rather than numbers.
    #[inline]
    pub fn is_textual(&self) -> bool {
        matches!(self.kind, TypeKind::Char | TypeKind::String)
    }
}

// Ordered like `TypeId` so lookups by id are a plain index.
static SPECS: [TypeSpec; 10] = [
    TypeSpec::new(TypeId::Bit, 1, WL_BIT, TS_BIT, false, TypeKind::Bit),
    TypeSpec::new(TypeId::Int8, 1, WL_BYTE, TS_BYTE, true, TypeKind::Scalar),
    TypeSpec::new(TypeId::Uint8, 1, WL_BYTE, TS_BYTE, false, TypeKind::Scalar),
    TypeSpec::new(TypeId::Int16, 2, WL_WORD, TS_INT, true, TypeKind::Scalar),
    TypeSpec::new(TypeId::Uint16, 2, WL_WORD, TS_INT, false, TypeKind::Scalar),
    TypeSpec::new(TypeId::Int32, 4, WL_DWORD, TS_INT, true, TypeKind::Scalar),
    TypeSpec::new(TypeId::Uint32, 4, WL_DWORD, TS_INT, false, TypeKind::Scalar),
    TypeSpec::new(TypeId::Float, 4, WL_REAL, TS_REAL, true, TypeKind::Scalar),
    TypeSpec::new(TypeId::Char, 1, WL_CHAR, TS_OCTET, false, TypeKind::Char),
    TypeSpec::new(TypeId::String, 1, WL_CHAR, TS_OCTET, false, TypeKind::String),
];

static ALIASES: [(&str, &str); 6] = [
    ("bool", "bit"),
    ("byte", "uint8"),
    ("word", "uint16"),
    ("dword", "uint32"),
    ("int", "int16"),
    ("dint", "int32"),
];

static REGISTRY: TypeRegistry = TypeRegistry {
    specs: &SPECS,
    aliases: &ALIASES,
};

/// Immutable name → [`TypeSpec`] table.
///
/// There is exactly one registry per process, see [`TypeRegistry::global`].
#[derive(Debug)]
pub struct TypeRegistry {
    specs: &'static [TypeSpec],
    aliases: &'static [(&'static str, &'static str)],
}

impl TypeRegistry {
    /// The process-wide registry.
    #[inline]
    pub fn global() -> &'static TypeRegistry {
        &REGISTRY
    }

    /// Resolve a type name (alias first, then canonical name). Case-sensitive.
    ///
    /// # Example
    ///
    /// ```rust
    /// use s7_plc::types::{TypeId, TypeRegistry};
    ///
    /// let spec = TypeRegistry::global().lookup("dint").unwrap();
    /// assert_eq!(spec.id, TypeId::Int32);
    /// assert_eq!(spec.byte_width, 4);
    /// ```
    pub fn lookup(&self, name: &str) -> S7Result<&'static TypeSpec> {
        let canonical = self.resolve_alias(name);
        self.specs
            .iter()
            .find(|spec| spec.id.name() == canonical)
            .ok_or_else(|| S7Error::UnknownType {
                raw: name.to_string(),
            })
    }

    /// Alias substitution only; unknown names pass through unchanged.
    pub fn resolve_alias<'a>(&self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, canonical)| *canonical)
            .unwrap_or(name)
    }

    /// Entry for a known id.
    #[inline]
    pub fn spec(&self, id: TypeId) -> &'static TypeSpec {
        &self.specs[id as usize]
    }

    /// All registered types, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static TypeSpec> {
        self.specs.iter()
    }
}
