//! # S7 Value Types
//!
//! Typed values exchanged with a PLC. Reads return one [`S7Value`] per item;
//! writes accept anything convertible into one.

use std::fmt;

/// A value read from, or written to, a data-block item.
///
/// # Item Mapping
///
/// | Item type | Variant |
/// |-----------|---------|
/// | bit | `Bit` |
/// | int8 / uint8 | `I8` / `U8` |
/// | int16 / uint16 | `I16` / `U16` |
/// | int32 / uint32 | `I32` / `U32` |
/// | float | `F32` |
/// | char / string | `Bytes` |
/// | any `[n]` except char/string | `Array` |
///
/// # Example
///
/// ```rust
/// use s7_plc::S7Value;
///
/// let v = S7Value::from(70000i32);
/// assert_eq!(v.as_i64(), 70000);
///
/// let text = S7Value::from("ab");
/// assert_eq!(text.as_bytes(), Some(&b"ab"[..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum S7Value {
    Bit(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(f32),
    /// Raw bytes of a char buffer or string payload
    Bytes(Vec<u8>),
    Array(Vec<S7Value>),
}

impl S7Value {
    /// Numeric view. Byte strings and arrays yield `NaN`.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            S7Value::Bit(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            S7Value::I8(v) => f64::from(*v),
            S7Value::U8(v) => f64::from(*v),
            S7Value::I16(v) => f64::from(*v),
            S7Value::U16(v) => f64::from(*v),
            S7Value::I32(v) => f64::from(*v),
            S7Value::U32(v) => f64::from(*v),
            S7Value::F32(v) => f64::from(*v),
            S7Value::Bytes(_) | S7Value::Array(_) => f64::NAN,
        }
    }

    /// Integer view. Floats are rounded; byte strings and arrays yield 0.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        match self {
            S7Value::Bit(b) => i64::from(*b),
            S7Value::I8(v) => i64::from(*v),
            S7Value::U8(v) => i64::from(*v),
            S7Value::I16(v) => i64::from(*v),
            S7Value::U16(v) => i64::from(*v),
            S7Value::I32(v) => i64::from(*v),
            S7Value::U32(v) => i64::from(*v),
            S7Value::F32(v) => v.round() as i64,
            S7Value::Bytes(_) | S7Value::Array(_) => 0,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            S7Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[S7Value]> {
        match self {
            S7Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Byte payload as text, lossy for non-UTF-8 content.
    pub fn as_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        !matches!(self, S7Value::Bytes(_) | S7Value::Array(_))
    }

    /// Check if the value is zero, false or empty.
    pub fn is_zero(&self) -> bool {
        match self {
            S7Value::Bit(b) => !*b,
            S7Value::F32(v) => *v == 0.0,
            S7Value::Bytes(b) => b.iter().all(|x| *x == 0),
            S7Value::Array(items) => items.iter().all(S7Value::is_zero),
            other => other.as_i64() == 0,
        }
    }

    /// Returns the type name as a string for logging/debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            S7Value::Bit(_) => "bit",
            S7Value::I8(_) => "i8",
            S7Value::U8(_) => "u8",
            S7Value::I16(_) => "i16",
            S7Value::U16(_) => "u16",
            S7Value::I32(_) => "i32",
            S7Value::U32(_) => "u32",
            S7Value::F32(_) => "f32",
            S7Value::Bytes(_) => "bytes",
            S7Value::Array(_) => "array",
        }
    }
}

impl fmt::Display for S7Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            S7Value::Bit(v) => write!(f, "{}", u8::from(*v)),
            S7Value::I8(v) => write!(f, "{}", v),
            S7Value::U8(v) => write!(f, "{}", v),
            S7Value::I16(v) => write!(f, "{}", v),
            S7Value::U16(v) => write!(f, "{}", v),
            S7Value::I32(v) => write!(f, "{}", v),
            S7Value::U32(v) => write!(f, "{}", v),
            S7Value::F32(v) => write!(f, "{}", v),
            S7Value::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            S7Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Default for S7Value {
    fn default() -> Self {
        S7Value::U8(0)
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for S7Value {
                fn from(v: $ty) -> Self {
                    S7Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bit,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
}

impl From<f64> for S7Value {
    fn from(v: f64) -> Self {
        S7Value::F32(v as f32)
    }
}

impl From<&str> for S7Value {
    fn from(v: &str) -> Self {
        S7Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for S7Value {
    fn from(v: String) -> Self {
        S7Value::Bytes(v.into_bytes())
    }
}

impl From<&[u8]> for S7Value {
    fn from(v: &[u8]) -> Self {
        S7Value::Bytes(v.to_vec())
    }
}

impl<T: Into<S7Value>> From<Vec<T>> for S7Value {
    fn from(v: Vec<T>) -> Self {
        S7Value::Array(v.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
