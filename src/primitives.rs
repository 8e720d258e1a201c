use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::record::Record;
use crate::stream::{BitReader, BitWriter};
use crate::text::TextCodec;
use crate::value::{BitString, Value};

fn range_error(value: i128, bits: usize) -> Error {
    Error::new(ErrorKind::RangeError { value, bits })
}

#[derive(Debug)]
struct UIntDescriptor {
    bits: usize,
}

impl<C> Descriptor<C> for UIntDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        Ok(Value::UInt(reader.take(self.bits)?))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let v = value.as_uint()?;
        let fits = self.bits == 64 || v < (1u64 << self.bits);
        if !fits {
            return Err(range_error(v as i128, self.bits));
        }
        writer.put(v, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }
}

/// An unsigned, big-endian integer occupying exactly `bits` bits of the
/// stream. `bits` may be 0 (a zero-width field whose only legal value is 0).
pub fn uint<C: 'static>(bits: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(UIntDescriptor { bits })
}

#[derive(Debug)]
struct IntDescriptor {
    bits: usize,
}

fn sign_extend(raw: u64, bits: usize) -> i64 {
    if bits == 0 || bits == 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}

impl<C> Descriptor<C> for IntDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take(self.bits)?;
        Ok(Value::Int(sign_extend(raw, self.bits)))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let v = value.as_int()?;
        let fits = if self.bits == 0 {
            v == 0
        } else if self.bits >= 64 {
            true
        } else {
            let half = 1i64 << (self.bits - 1);
            v >= -half && v < half
        };
        if !fits {
            return Err(range_error(v as i128, self.bits));
        }
        let mask = if self.bits == 64 { u64::MAX } else { (1u64 << self.bits) - 1 };
        writer.put((v as u64) & mask, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }
}

/// A signed, two's-complement integer occupying exactly `bits` bits.
pub fn int<C: 'static>(bits: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(IntDescriptor { bits })
}

#[derive(Debug)]
struct BoolDescriptor;

impl<C> Descriptor<C> for BoolDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        Ok(Value::Bool(reader.take(1)? != 0))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        writer.put(u64::from(value.as_bool()?), 1)
    }

    fn length(&self) -> Option<usize> {
        Some(1)
    }
}

/// A single bit, decoded as `false`/`true`.
pub fn bool_<C: 'static>() -> Arc<dyn Descriptor<C>> {
    Arc::new(BoolDescriptor)
}

#[derive(Debug)]
struct BytesDescriptor {
    len: usize,
}

impl<C> Descriptor<C> for BytesDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        Ok(Value::Bytes(reader.take_bytes(self.len)?))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let bytes = value.as_bytes()?;
        if bytes.len() != self.len {
            return Err(range_error(bytes.len() as i128, self.len * 8));
        }
        writer.put_bytes(bytes)
    }

    fn length(&self) -> Option<usize> {
        Some(self.len * 8)
    }
}

/// A fixed-size, uninterpreted byte sequence of exactly `len` bytes.
pub fn bytes<C: 'static>(len: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(BytesDescriptor { len })
}

#[derive(Debug)]
struct BitsDescriptor {
    bits: usize,
}

impl<C> Descriptor<C> for BitsDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take(self.bits)?;
        Ok(Value::Bits(BitString::new(raw, self.bits)))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let bs = value.as_bits()?;
        if bs.len() != self.bits {
            return Err(range_error(bs.len() as i128, self.bits));
        }
        writer.put(bs.bits(), self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }
}

/// `bits` raw bits with no integer interpretation, decoded as a `BitString`.
pub fn bits<C: 'static>(bits: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(BitsDescriptor { bits })
}

#[derive(Debug)]
struct NoneDescriptor;

impl<C> Descriptor<C> for NoneDescriptor {
    fn decode(&self, _reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        Ok(Value::None)
    }

    fn encode(&self, _writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        if !value.is_none() {
            return Err(Error::new(ErrorKind::SchemaError(
                "expected the absent value for a none() field".into(),
            )));
        }
        Ok(())
    }

    fn length(&self) -> Option<usize> {
        Some(0)
    }

    fn default_value(&self) -> Option<Value<C>> {
        Some(Value::None)
    }
}

/// A zero-bit placeholder field that always decodes/encodes to the absent
/// value. Useful as the inner descriptor a `dynamic(...)` factory resolves
/// to when there's nothing left to read.
pub fn none<C: 'static>() -> Arc<dyn Descriptor<C>> {
    Arc::new(NoneDescriptor)
}

struct StrDescriptor {
    len: usize,
    codec: Arc<dyn TextCodec>,
}

impl fmt::Debug for StrDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrDescriptor").field("len", &self.len).finish()
    }
}

impl<C> Descriptor<C> for StrDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take_bytes(self.len)?;
        let trimmed_len = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Ok(Value::Str(self.codec.decode(&raw[..trimmed_len])?))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let s = value.as_str()?;
        let mut encoded = self.codec.encode(s);
        if encoded.len() > self.len {
            return Err(range_error(encoded.len() as i128, self.len * 8));
        }
        encoded.resize(self.len, 0);
        writer.put_bytes(&encoded)
    }

    fn length(&self) -> Option<usize> {
        Some(self.len * 8)
    }
}

/// A fixed-size, null-padded text field occupying exactly `len` bytes.
/// Decoding right-trims trailing NUL bytes before applying `codec`
/// (interior NULs are preserved); encoding pads with NUL up to `len`.
/// `codec` defaults to UTF-8 when `None`.
pub fn str_<C: 'static>(len: usize, codec: Option<Arc<dyn TextCodec>>) -> Arc<dyn Descriptor<C>> {
    Arc::new(StrDescriptor {
        len,
        codec: codec.unwrap_or_else(|| Arc::new(crate::text::Utf8Codec)),
    })
}

/// A value that's a fixed, finite set of named alternatives over an
/// unsigned wire representation, e.g. a C-style enum.
pub trait UIntEnum: Sized + fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    fn to_uint(&self) -> u64;
    fn from_uint(value: u64) -> Option<Self>;
}

/// Like [`UIntEnum`], but over a signed wire representation.
pub trait IntEnum: Sized + fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    fn to_int(&self) -> i64;
    fn from_int(value: i64) -> Option<Self>;
}

struct UIntEnumDescriptor<E> {
    bits: usize,
    _marker: PhantomData<E>,
}

impl<E> fmt::Debug for UIntEnumDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UIntEnumDescriptor").field("bits", &self.bits).finish()
    }
}

impl<C, E: UIntEnum> Descriptor<C> for UIntEnumDescriptor<E> {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take(self.bits)?;
        let variant = E::from_uint(raw).ok_or(ErrorKind::EnumOutOfRange { value: raw as i128 })?;
        Ok(Value::mapped(variant))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let variant = value
            .as_mapped::<E>()
            .ok_or_else(|| Error::new(ErrorKind::SchemaError("expected an enum value".into())))?;
        let raw = variant.to_uint();
        if self.bits != 64 && raw >= (1u64 << self.bits) {
            return Err(range_error(raw as i128, self.bits));
        }
        writer.put(raw, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }
}

/// An enum whose variants are distinguished by an unsigned wire value of
/// `bits` width.
pub fn uint_enum<C: 'static, E: UIntEnum>(bits: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(UIntEnumDescriptor::<E> { bits, _marker: PhantomData })
}

struct IntEnumDescriptor<E> {
    bits: usize,
    _marker: PhantomData<E>,
}

impl<E> fmt::Debug for IntEnumDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntEnumDescriptor").field("bits", &self.bits).finish()
    }
}

impl<C, E: IntEnum> Descriptor<C> for IntEnumDescriptor<E> {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = sign_extend(reader.take(self.bits)?, self.bits);
        let variant = E::from_int(raw).ok_or(ErrorKind::EnumOutOfRange { value: raw as i128 })?;
        Ok(Value::mapped(variant))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let variant = value
            .as_mapped::<E>()
            .ok_or_else(|| Error::new(ErrorKind::SchemaError("expected an enum value".into())))?;
        let raw = variant.to_int();
        let mask = if self.bits == 64 { u64::MAX } else { (1u64 << self.bits) - 1 };
        writer.put((raw as u64) & mask, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }
}

/// An enum whose variants are distinguished by a signed wire value of
/// `bits` width.
pub fn int_enum<C: 'static, E: IntEnum>(bits: usize) -> Arc<dyn Descriptor<C>> {
    Arc::new(IntEnumDescriptor::<E> { bits, _marker: PhantomData })
}

#[derive(Debug)]
struct LitUIntDescriptor {
    bits: usize,
    value: u64,
}

impl<C> Descriptor<C> for LitUIntDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take(self.bits)?;
        if raw != self.value {
            return Err(ErrorKind::LiteralMismatch {
                expected: self.value.to_string(),
                found: raw.to_string(),
            }
            .into());
        }
        Ok(Value::UInt(raw))
    }

    fn encode(&self, writer: &mut BitWriter, _value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        writer.put(self.value, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }

    fn default_value(&self) -> Option<Value<C>> {
        Some(Value::UInt(self.value))
    }
}

/// A fixed unsigned constant: decoding checks the wire value matches and
/// fails with `LiteralMismatch` otherwise; encoding always writes `value`
/// regardless of what (if anything) the caller supplied for this field.
pub fn lit_uint<C: 'static>(bits: usize, value: u64) -> Arc<dyn Descriptor<C>> {
    Arc::new(LitUIntDescriptor { bits, value })
}

#[derive(Debug)]
struct LitIntDescriptor {
    bits: usize,
    value: i64,
}

impl<C> Descriptor<C> for LitIntDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = sign_extend(reader.take(self.bits)?, self.bits);
        if raw != self.value {
            return Err(ErrorKind::LiteralMismatch {
                expected: self.value.to_string(),
                found: raw.to_string(),
            }
            .into());
        }
        Ok(Value::Int(raw))
    }

    fn encode(&self, writer: &mut BitWriter, _value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        let mask = if self.bits == 64 { u64::MAX } else { (1u64 << self.bits) - 1 };
        writer.put((self.value as u64) & mask, self.bits)
    }

    fn length(&self) -> Option<usize> {
        Some(self.bits)
    }

    fn default_value(&self) -> Option<Value<C>> {
        Some(Value::Int(self.value))
    }
}

/// A fixed signed constant, analogous to [`lit_uint`].
pub fn lit_int<C: 'static>(bits: usize, value: i64) -> Arc<dyn Descriptor<C>> {
    Arc::new(LitIntDescriptor { bits, value })
}

#[derive(Debug)]
struct LitBytesDescriptor {
    value: Vec<u8>,
}

impl<C> Descriptor<C> for LitBytesDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let raw = reader.take_bytes(self.value.len())?;
        if raw != self.value {
            return Err(ErrorKind::LiteralMismatch {
                expected: format!("{:02x?}", self.value),
                found: format!("{raw:02x?}"),
            }
            .into());
        }
        Ok(Value::Bytes(raw))
    }

    fn encode(&self, writer: &mut BitWriter, _value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        writer.put_bytes(&self.value)
    }

    fn length(&self) -> Option<usize> {
        Some(self.value.len() * 8)
    }

    fn default_value(&self) -> Option<Value<C>> {
        Some(Value::Bytes(self.value.clone()))
    }
}

/// A fixed byte-string constant, e.g. a magic number.
pub fn lit_bytes<C: 'static>(value: impl Into<Vec<u8>>) -> Arc<dyn Descriptor<C>> {
    Arc::new(LitBytesDescriptor { value: value.into() })
}

struct LitStrDescriptor {
    value: String,
    codec: Arc<dyn TextCodec>,
}

impl fmt::Debug for LitStrDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LitStrDescriptor").field("value", &self.value).finish()
    }
}

impl<C> Descriptor<C> for LitStrDescriptor {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, _ctx: &C) -> Result<Value<C>> {
        let encoded = self.codec.encode(&self.value);
        let raw = reader.take_bytes(encoded.len())?;
        if raw != encoded {
            return Err(ErrorKind::LiteralMismatch {
                expected: self.value.clone(),
                found: self.codec.decode(&raw).unwrap_or_else(|_| format!("{raw:02x?}")),
            }
            .into());
        }
        Ok(Value::Str(self.value.clone()))
    }

    fn encode(&self, writer: &mut BitWriter, _value: &Value<C>, _partial: &Record<C>, _ctx: &C) -> Result<()> {
        writer.put_bytes(&self.codec.encode(&self.value))
    }

    fn length(&self) -> Option<usize> {
        Some(self.codec.encode(&self.value).len() * 8)
    }

    fn default_value(&self) -> Option<Value<C>> {
        Some(Value::Str(self.value.clone()))
    }
}

/// A fixed, unpadded text constant (no NUL padding, unlike `str_`).
pub fn lit_str<C: 'static>(value: impl Into<String>, codec: Option<Arc<dyn TextCodec>>) -> Arc<dyn Descriptor<C>> {
    Arc::new(LitStrDescriptor {
        value: value.into(),
        codec: codec.unwrap_or_else(|| Arc::new(crate::text::Utf8Codec)),
    })
}
