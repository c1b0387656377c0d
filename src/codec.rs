//! # Item Codec
//!
//! Converts between [`S7Value`]s and the byte segments carried in S7 read and
//! write data sections.
//!
//! ## Write normalization
//!
//! | Item type | Rule |
//! |-----------|------|
//! | char[n] | zero-pad or truncate to `n` bytes |
//! | string[n] | truncate to `n` bytes, prefix `(n, len)` |
//! | bit | any non-zero value becomes 1 |
//! | other `[n]` | zero-pad or truncate to `n` elements |
//! | numbers | saturate to the target range |
//!
//! Reads reverse the mapping. All multi-byte numbers are big-endian and
//! signed types are decoded as two's complement.

use bytes::{BufMut, Bytes, BytesMut};

use crate::address::ItemDescriptor;
use crate::error::{S7Error, S7Result};
use crate::types::{TypeId, TypeKind, TypeSpec};
use crate::value::S7Value;

/// An item ready to be framed into a write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteItem {
    pub item: ItemDescriptor,
    /// Normalized wire bytes
    pub payload: Bytes,
    /// Element count for the request parameter block
    pub wire_count: u16,
}

impl WriteItem {
    #[inline]
    pub fn transport_size(&self) -> u8 {
        self.item.spec().transport_size
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }
}

/// Value preparation and decoding for data-block items.
pub struct ItemCodec;

impl ItemCodec {
    /// Normalize `value` for `item` and encode it to wire bytes.
    ///
    /// # Example
    ///
    /// ```rust
    /// use s7_plc::{ItemCodec, ItemDescriptor, S7Value};
    ///
    /// let item = ItemDescriptor::parse("DB1.0:string[5]").unwrap();
    /// let w = ItemCodec::prepare_write(&item, &S7Value::from("ab")).unwrap();
    /// assert_eq!(&w.payload[..], &[5, 2, b'a', b'b']);
    /// assert_eq!(w.wire_count, 4);
    /// ```
    pub fn prepare_write(item: &ItemDescriptor, value: &S7Value) -> S7Result<WriteItem> {
        let spec = item.spec();
        let payload = match spec.kind {
            TypeKind::Char => encode_char(item, value)?,
            TypeKind::String => encode_string(item, value)?,
            _ if item.is_array => encode_array(item, spec, value)?,
            _ => {
                let mut buf = BytesMut::with_capacity(spec.byte_width);
                encode_scalar(item, spec, value, &mut buf)?;
                buf.freeze()
            }
        };

        let wire_count = match spec.kind {
            TypeKind::String => payload.len(),
            _ => item.element_count as usize,
        };
        let wire_count = u16::try_from(wire_count).map_err(|_| S7Error::FrameTooLarge {
            size: wire_count,
            limit: u16::MAX as usize,
        })?;

        Ok(WriteItem {
            item: item.clone(),
            payload,
            wire_count,
        })
    }

    /// Decode one response data segment for `item`.
    pub fn decode_value(item: &ItemDescriptor, segment: &[u8]) -> S7Result<S7Value> {
        let spec = item.spec();
        match spec.kind {
            TypeKind::Char => {
                let n = segment.len().min(item.element_count as usize);
                Ok(S7Value::Bytes(segment[..n].to_vec()))
            }
            TypeKind::String => decode_string(item, segment),
            _ if item.is_array => {
                let needed = spec.byte_width * item.element_count as usize;
                ensure_len(segment, needed)?;
                segment[..needed]
                    .chunks_exact(spec.byte_width)
                    .map(|chunk| decode_scalar(spec, chunk))
                    .collect::<S7Result<Vec<_>>>()
                    .map(S7Value::Array)
            }
            _ => {
                ensure_len(segment, spec.byte_width)?;
                decode_scalar(spec, &segment[..spec.byte_width])
            }
        }
    }
}

/// Clamp a numeric value to the range of an integer item type.
///
/// Floats and bits pass through unchanged.
pub fn clamp_to_type(value: f64, type_id: TypeId) -> f64 {
    let (min, max): (f64, f64) = match type_id {
        TypeId::Int8 => (i8::MIN.into(), i8::MAX.into()),
        TypeId::Uint8 => (0.0, u8::MAX.into()),
        TypeId::Int16 => (i16::MIN.into(), i16::MAX.into()),
        TypeId::Uint16 => (0.0, u16::MAX.into()),
        TypeId::Int32 => (i32::MIN.into(), i32::MAX.into()),
        TypeId::Uint32 => (0.0, u32::MAX.into()),
        _ => return value,
    };
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(min, max)
}

// ============================================================================
// Encoding
// ============================================================================

fn mismatch(item: &ItemDescriptor, value: &S7Value) -> S7Error {
    S7Error::ValueTypeMismatch {
        raw: item.code.clone(),
        value: value.to_string(),
    }
}

fn encode_scalar(
    item: &ItemDescriptor,
    spec: &TypeSpec,
    value: &S7Value,
    buf: &mut BytesMut,
) -> S7Result<()> {
    if !value.is_numeric() {
        return Err(mismatch(item, value));
    }

    if spec.id == TypeId::Float {
        buf.put_f32(value.as_f64() as f32);
        return Ok(());
    }
    if spec.is_bit() {
        buf.put_u8(u8::from(!value.is_zero()));
        return Ok(());
    }

    let n = clamp_to_type(value.as_f64(), spec.id);
    match spec.id {
        TypeId::Int8 => buf.put_i8(n as i8),
        TypeId::Uint8 => buf.put_u8(n as u8),
        TypeId::Int16 => buf.put_i16(n as i16),
        TypeId::Uint16 => buf.put_u16(n as u16),
        TypeId::Int32 => buf.put_i32(n as i32),
        TypeId::Uint32 => buf.put_u32(n as u32),
        _ => return Err(mismatch(item, value)),
    }
    Ok(())
}

fn encode_array(item: &ItemDescriptor, spec: &TypeSpec, value: &S7Value) -> S7Result<Bytes> {
    let elements = value.as_array().ok_or_else(|| S7Error::ArrayValueRequired {
        raw: item.code.clone(),
    })?;

    let count = item.element_count as usize;
    let mut buf = BytesMut::with_capacity(count * spec.byte_width);
    for element in elements.iter().take(count) {
        encode_scalar(item, spec, element, &mut buf)?;
    }
    buf.put_bytes(0, (count * spec.byte_width).saturating_sub(buf.len()));
    Ok(buf.freeze())
}

fn text_bytes<'a>(item: &ItemDescriptor, value: &'a S7Value) -> S7Result<&'a [u8]> {
    value.as_bytes().ok_or_else(|| mismatch(item, value))
}

fn encode_char(item: &ItemDescriptor, value: &S7Value) -> S7Result<Bytes> {
    let text = text_bytes(item, value)?;
    let count = item.element_count as usize;
    let mut buf = BytesMut::with_capacity(count);
    buf.put_slice(&text[..text.len().min(count)]);
    buf.put_bytes(0, count - buf.len());
    Ok(buf.freeze())
}

fn encode_string(item: &ItemDescriptor, value: &S7Value) -> S7Result<Bytes> {
    let text = text_bytes(item, value)?;
    // Both header fields are single bytes.
    let capacity = item.element_count.min(u32::from(u8::MAX)) as usize;
    let body = &text[..text.len().min(capacity)];

    let mut buf = BytesMut::with_capacity(body.len() + 2);
    buf.put_u8(capacity as u8);
    buf.put_u8(body.len() as u8);
    buf.put_slice(body);
    Ok(buf.freeze())
}

// ============================================================================
// Decoding
// ============================================================================

fn ensure_len(segment: &[u8], needed: usize) -> S7Result<()> {
    if segment.len() < needed {
        return Err(S7Error::Truncated {
            needed,
            available: segment.len(),
        });
    }
    Ok(())
}

fn decode_scalar(spec: &TypeSpec, b: &[u8]) -> S7Result<S7Value> {
    ensure_len(b, spec.byte_width)?;
    let value = match spec.id {
        TypeId::Bit => S7Value::Bit(b[0] != 0),
        TypeId::Int8 => S7Value::I8(b[0] as i8),
        TypeId::Uint8 => S7Value::U8(b[0]),
        TypeId::Int16 => S7Value::I16(i16::from_be_bytes([b[0], b[1]])),
        TypeId::Uint16 => S7Value::U16(u16::from_be_bytes([b[0], b[1]])),
        TypeId::Int32 => S7Value::I32(i32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        TypeId::Uint32 => S7Value::U32(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        TypeId::Float => S7Value::F32(f32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        TypeId::Char | TypeId::String => S7Value::Bytes(b.to_vec()),
    };
    Ok(value)
}

fn decode_string(item: &ItemDescriptor, segment: &[u8]) -> S7Result<S7Value> {
    ensure_len(segment, 2)?;
    let actual = segment[1] as usize;
    let body = &segment[2..];
    let n = actual.min(body.len()).min(item.element_count as usize);
    Ok(S7Value::Bytes(body[..n].to_vec()))
}

// ============================================================================
// Tests
// ============================================================================
