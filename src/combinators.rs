use std::fmt;
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::record::{Record, Schema};
use crate::stream::{BitReader, BitWriter};
use crate::value::Value;

/// How many elements a `list(...)` descriptor has. A fixed count gives the
/// list a static length (when the inner descriptor has one too); a
/// sibling-derived count never does, since it isn't known until decode
/// time reaches this field.
pub enum Count<C = ()> {
    Fixed(usize),
    FromPartial(Arc<dyn Fn(&Record<C>) -> Result<usize> + Send + Sync>),
}

impl<C> fmt::Debug for Count<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Count::FromPartial(_) => f.debug_tuple("FromPartial").finish(),
        }
    }
}

impl<C> Count<C> {
    fn resolve(&self, partial: &Record<C>) -> Result<usize> {
        match self {
            Count::Fixed(n) => Ok(*n),
            Count::FromPartial(f) => f(partial),
        }
    }
}

struct ListDescriptor<C> {
    inner: Arc<dyn Descriptor<C>>,
    count: Count<C>,
}

impl<C> fmt::Debug for ListDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListDescriptor").field("inner", &self.inner).field("count", &self.count).finish()
    }
}

impl<C> Descriptor<C> for ListDescriptor<C> {
    fn decode(&self, reader: &mut BitReader, partial: &Record<C>, ctx: &C) -> Result<Value<C>> {
        let n = self.count.resolve(partial)?;
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.inner.decode(reader, partial, ctx)?);
        }
        Ok(Value::List(items))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, partial: &Record<C>, ctx: &C) -> Result<()> {
        let items = value.as_list()?;
        let expected = self.count.resolve(partial)?;
        if items.len() != expected {
            return Err(Error::new(ErrorKind::SchemaError(format!(
                "list has {} elements, but its declared count resolves to {expected}",
                items.len()
            ))));
        }
        for item in items {
            self.inner.encode(writer, item, partial, ctx)?;
        }
        Ok(())
    }

    fn length(&self) -> Option<usize> {
        match &self.count {
            Count::Fixed(n) => self.inner.length().map(|l| l * n),
            Count::FromPartial(_) => None,
        }
    }
}

/// A homogeneous sequence of `inner` elements. With `Count::Fixed`, both
/// decode and encode always produce/consume exactly that many elements;
/// with `Count::FromPartial`, the count is read off the siblings decoded
/// so far (and, on encode, off the siblings the caller already populated).
pub fn list<C: 'static>(inner: Arc<dyn Descriptor<C>>, count: Count<C>) -> Arc<dyn Descriptor<C>> {
    Arc::new(ListDescriptor { inner, count })
}

/// Translates between the wire-level `Value` an inner descriptor produces
/// and a richer domain value. Implementations should return `Err` rather
/// than panic; failures are normalized into `MapperFailed`.
pub trait ValueMapper<C = ()>: fmt::Debug + Send + Sync {
    /// Wire value -> domain value, used while decoding.
    fn forward(&self, value: Value<C>) -> Result<Value<C>>;
    /// Domain value -> wire value, used while encoding.
    fn backward(&self, value: &Value<C>) -> Result<Value<C>>;
}

struct MappedDescriptor<C> {
    inner: Arc<dyn Descriptor<C>>,
    mapper: Arc<dyn ValueMapper<C>>,
}

impl<C> fmt::Debug for MappedDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedDescriptor").field("inner", &self.inner).field("mapper", &self.mapper).finish()
    }
}

fn mapper_failed(e: Error) -> Error {
    Error::new(ErrorKind::MapperFailed(e.to_string()))
}

impl<C> Descriptor<C> for MappedDescriptor<C> {
    fn decode(&self, reader: &mut BitReader, partial: &Record<C>, ctx: &C) -> Result<Value<C>> {
        let raw = self.inner.decode(reader, partial, ctx)?;
        self.mapper.forward(raw).map_err(mapper_failed)
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, partial: &Record<C>, ctx: &C) -> Result<()> {
        let wire = self.mapper.backward(value).map_err(mapper_failed)?;
        self.inner.encode(writer, &wire, partial, ctx)
    }

    fn length(&self) -> Option<usize> {
        self.inner.length()
    }
}

/// Adapt `inner`'s wire `Value` to and from a domain-level `Value`
/// (typically a `Value::Mapped` wrapping some application type) through
/// `mapper`.
pub fn mapped<C: 'static>(inner: Arc<dyn Descriptor<C>>, mapper: Arc<dyn ValueMapper<C>>) -> Arc<dyn Descriptor<C>> {
    Arc::new(MappedDescriptor { inner, mapper })
}

struct BitfieldDescriptor<C> {
    schema: Arc<Schema<C>>,
}

impl<C> fmt::Debug for BitfieldDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitfieldDescriptor").field("schema", self.schema.name()).finish()
    }
}

impl<C> Descriptor<C> for BitfieldDescriptor<C> {
    fn decode(&self, reader: &mut BitReader, _partial: &Record<C>, ctx: &C) -> Result<Value<C>> {
        Ok(Value::Record(self.schema.decode_fields(reader, ctx)?))
    }

    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, _partial: &Record<C>, ctx: &C) -> Result<()> {
        self.schema.encode_fields(writer, value.as_record()?, ctx)
    }

    fn length(&self) -> Option<usize> {
        self.schema.length()
    }
}

/// Nest another schema's fields inline, producing a `Value::Record`.
pub fn bitfield<C: 'static>(schema: Arc<Schema<C>>) -> Arc<dyn Descriptor<C>> {
    Arc::new(BitfieldDescriptor { schema })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::primitives::uint;
    use crate::record::field;

    #[test]
    fn list_with_fixed_count_roundtrips() {
        let d = list::<()>(uint(4), Count::Fixed(3));
        let partial = Record::empty(Arc::new(Schema::new("Test", Vec::<(&str, crate::record::Factory<()>)>::new())));
        let mut w = BitWriter::new();
        let value = Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
        d.encode(&mut w, &value, &partial, &()).unwrap();
        let bytes = w.finish().unwrap();
        let mut r = BitReader::new(&bytes);
        assert_eq!(d.decode(&mut r, &partial, &()).unwrap(), value);
    }

    #[test]
    fn list_encode_rejects_a_length_mismatch() {
        let d = list::<()>(uint(4), Count::Fixed(3));
        let partial = Record::empty(Arc::new(Schema::new("Test", Vec::<(&str, crate::record::Factory<()>)>::new())));
        let mut w = BitWriter::new();
        let value = Value::List(vec![Value::UInt(1), Value::UInt(2)]);
        let err = d.encode(&mut w, &value, &partial, &()).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::SchemaError(_));
    }

    #[test]
    fn list_with_sibling_count_reads_the_partial_record() {
        let count = Count::FromPartial(Arc::new(|partial: &Record<()>| Ok(partial.get("n").unwrap().as_uint()? as usize)));
        let d = list::<()>(uint(8), count);
        let mut partial = Record::empty(Arc::new(Schema::new("Test", Vec::<(&str, crate::record::Factory<()>)>::new())));
        partial.insert("n".into(), Value::UInt(2));
        let mut r = BitReader::new(&[10, 20, 30]);
        let decoded = d.decode(&mut r, &partial, &()).unwrap();
        assert_eq!(decoded, Value::List(vec![Value::UInt(10), Value::UInt(20)]));
    }

    #[derive(Debug)]
    struct Halves;

    impl ValueMapper<()> for Halves {
        fn forward(&self, value: Value<()>) -> Result<Value<()>> {
            Ok(Value::mapped(value.as_uint()? as f64 / 2.0))
        }

        fn backward(&self, value: &Value<()>) -> Result<Value<()>> {
            let v = *value.as_mapped::<f64>().ok_or_else(|| Error::new(ErrorKind::SchemaError("expected f64".into())))?;
            Ok(Value::UInt((v * 2.0) as u64))
        }
    }

    #[test]
    fn mapped_translates_wire_and_domain_values() {
        let d = mapped::<()>(uint(8), Arc::new(Halves));
        let partial = Record::empty(Arc::new(Schema::new("Test", Vec::<(&str, crate::record::Factory<()>)>::new())));
        let mut w = BitWriter::new();
        d.encode(&mut w, &Value::mapped(21.5f64), &partial, &()).unwrap();
        let bytes = w.finish().unwrap();
        let mut r = BitReader::new(&bytes);
        let decoded = d.decode(&mut r, &partial, &()).unwrap();
        assert_eq!(*decoded.as_mapped::<f64>().unwrap(), 21.5);
    }

    #[test]
    fn bitfield_nests_a_schema() {
        let inner: Arc<Schema> = Arc::new(Schema::new("Inner", vec![("a", field(uint(4))), ("b", field(uint(4)))]));
        let d = bitfield::<()>(inner.clone());
        let outer_partial = Record::empty(Arc::new(Schema::new("Outer", Vec::<(&str, crate::record::Factory<()>)>::new())));
        let record = Record::new(inner, vec![("a", Value::UInt(5)), ("b", Value::UInt(6))]);
        let mut w = BitWriter::new();
        d.encode(&mut w, &Value::Record(record.clone()), &outer_partial, &()).unwrap();
        let bytes = w.finish().unwrap();
        let mut r = BitReader::new(&bytes);
        let decoded = d.decode(&mut r, &outer_partial, &()).unwrap();
        assert_eq!(decoded, Value::Record(record));
    }
}
