use std::fmt;
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::error::{Error, ErrorKind, Result};
use crate::stream::{BitReader, BitWriter};
use crate::value::Value;

/// A concrete descriptor, or a closure that picks one once it can see the
/// sibling fields decoded so far (and, for the decode side, how many bits
/// are left). See `combinators::dynamic`/`dynamic_with_remaining`.
pub enum Factory<C = ()> {
    Static(Arc<dyn Descriptor<C>>),
    Dynamic(DynamicFactory<C>),
}

impl<C> Clone for Factory<C> {
    fn clone(&self) -> Self {
        match self {
            Factory::Static(d) => Factory::Static(d.clone()),
            Factory::Dynamic(f) => Factory::Dynamic(f.clone()),
        }
    }
}

impl<C> fmt::Debug for Factory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Static(d) => f.debug_tuple("Static").field(d).finish(),
            Factory::Dynamic(_) => f.debug_tuple("Dynamic").finish(),
        }
    }
}

impl<C> From<Arc<dyn Descriptor<C>>> for Factory<C> {
    fn from(d: Arc<dyn Descriptor<C>>) -> Self {
        Factory::Static(d)
    }
}

type ResolveFn<C> =
    dyn Fn(&Record<C>, Option<usize>) -> Result<Option<Arc<dyn Descriptor<C>>>> + Send + Sync;

pub struct DynamicFactory<C> {
    /// Whether the closure was declared to take a `remaining_bits`
    /// argument. If so, it can never be invoked while encoding (there is
    /// no "remaining bits" during serialization) and the engine falls
    /// back to inferring a self-describing encode from the value itself.
    pub(crate) needs_remaining: bool,
    resolve: Arc<ResolveFn<C>>,
}

impl<C> Clone for DynamicFactory<C> {
    fn clone(&self) -> Self {
        Self {
            needs_remaining: self.needs_remaining,
            resolve: self.resolve.clone(),
        }
    }
}

impl<C> DynamicFactory<C> {
    fn resolve(&self, partial: &Record<C>, remaining_bits: Option<usize>) -> Result<Option<Arc<dyn Descriptor<C>>>> {
        (self.resolve)(partial, remaining_bits)
    }
}

/// Build a dynamic factory that only needs the already-decoded siblings.
/// Returning `Ok(None)` makes the field decode/encode to the absent unit
/// value, consuming/producing zero bits.
pub fn dynamic<C: 'static, F>(factory: F) -> Factory<C>
where
    F: Fn(&Record<C>) -> Result<Option<Arc<dyn Descriptor<C>>>> + Send + Sync + 'static,
{
    Factory::Dynamic(DynamicFactory {
        needs_remaining: false,
        resolve: Arc::new(move |partial, _remaining| factory(partial)),
    })
}

/// Build a dynamic factory that additionally inspects how many bits are
/// left in the stream. Per spec, this shape can only be invoked while
/// decoding; encoding such a field instead infers the wire shape directly
/// from the value (see `Schema::encode_fields`).
pub fn dynamic_with_remaining<C: 'static, F>(factory: F) -> Factory<C>
where
    F: Fn(&Record<C>, usize) -> Result<Option<Arc<dyn Descriptor<C>>>> + Send + Sync + 'static,
{
    Factory::Dynamic(DynamicFactory {
        needs_remaining: true,
        resolve: Arc::new(move |partial, remaining| {
            let remaining = remaining.expect("remaining bits are always supplied while decoding");
            factory(partial, remaining)
        }),
    })
}

/// Wrap a concrete descriptor as a static factory.
pub fn field<C: 'static>(descriptor: Arc<dyn Descriptor<C>>) -> Factory<C> {
    Factory::Static(descriptor)
}

#[derive(Clone)]
pub struct Field<C = ()> {
    pub name: String,
    pub factory: Factory<C>,
}

impl<C> fmt::Debug for Field<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).field("factory", &self.factory).finish()
    }
}

/// An ordered, named sequence of descriptors: the user-facing schema
/// definition. Schemas are always held behind an `Arc` so a decoded
/// nested record can carry a back-reference to the schema that produced
/// it (needed so a nested record can re-encode itself without a
/// descriptor on hand, see `encode_self_describing` below).
#[derive(Clone, derive_getters::Getters)]
pub struct Schema<C = ()> {
    name: String,
    fields: Vec<Field<C>>,
}

impl<C> fmt::Debug for Schema<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("name", &self.name).field("fields", &self.fields).finish()
    }
}

impl<C> Schema<C> {
    pub fn new<S: Into<String>>(name: impl Into<String>, fields: Vec<(S, Factory<C>)>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, factory)| Field { name: name.into(), factory })
            .collect();
        Schema { name: name.into(), fields }
    }

    /// Sum of every field's static length, or `None` as soon as one field
    /// doesn't have one (any `dynamic(...)` field, or a combinator built
    /// on top of one).
    pub fn length(&self) -> Option<usize> {
        let mut total = 0usize;
        for f in &self.fields {
            match &f.factory {
                Factory::Static(d) => total += d.length()?,
                Factory::Dynamic(_) => return None,
            }
        }
        Some(total)
    }

    pub fn encode(self: &Arc<Self>, record: &Record<C>, ctx: &C) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new();
        self.encode_fields(&mut writer, record, ctx)?;
        writer.finish()
    }

    pub fn decode_exact(self: &Arc<Self>, bytes: &[u8], ctx: &C) -> Result<Record<C>> {
        let mut reader = BitReader::new(bytes);
        let record = self.decode_fields(&mut reader, ctx)?;
        if reader.remaining() != 0 {
            return Err(Error::at(
                ErrorKind::TrailingBits { remaining: reader.remaining() },
                reader.bit_position(),
            ));
        }
        Ok(record)
    }

    pub fn decode_one(self: &Arc<Self>, bytes: &[u8], ctx: &C) -> Result<(Record<C>, Vec<u8>)> {
        let mut reader = BitReader::new(bytes);
        let record = self.decode_fields(&mut reader, ctx)?;
        if !reader.is_byte_aligned() {
            return Err(Error::at(
                ErrorKind::UnalignedConsumption { bits: reader.bit_position() },
                reader.bit_position(),
            ));
        }
        let consumed = reader.bit_position() / 8;
        Ok((record, bytes[consumed..].to_vec()))
    }

    /// Repeatedly decode one record at a time until a decode fails. Never
    /// fails itself: a failure on the very first element just terminates
    /// the batch with an empty list, and the returned suffix is whatever
    /// wasn't consumed. Where the first failing decode gave up is not
    /// reported; callers that need that detail should call `decode_one`
    /// themselves in a loop.
    pub fn decode_batch(self: &Arc<Self>, bytes: &[u8], ctx: &C) -> (Vec<Record<C>>, Vec<u8>) {
        let mut results = Vec::new();
        let mut remaining = bytes.to_vec();
        loop {
            match self.decode_one(&remaining, ctx) {
                Ok((record, rest)) if rest.len() < remaining.len() => {
                    results.push(record);
                    remaining = rest;
                }
                _ => break,
            }
        }
        (results, remaining)
    }

    pub(crate) fn decode_fields(self: &Arc<Self>, reader: &mut BitReader, ctx: &C) -> Result<Record<C>> {
        let mut partial = Record::empty(self.clone());
        for f in &self.fields {
            let value = match &f.factory {
                Factory::Static(d) => d
                    .decode(reader, &partial, ctx)
                    .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?,
                Factory::Dynamic(dyn_factory) => {
                    let remaining = reader.remaining();
                    let resolved = dyn_factory
                        .resolve(&partial, Some(remaining))
                        .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?;
                    match resolved {
                        Some(d) => d
                            .decode(reader, &partial, ctx)
                            .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?,
                        None => Value::None,
                    }
                }
            };
            partial.insert(f.name.clone(), value);
        }
        Ok(partial)
    }

    /// Unlike `decode_fields`, this doesn't build an incremental partial
    /// record: the caller already hands over every field's value up
    /// front, so dynamic factories are resolved against the whole
    /// (complete) record rather than a sibling-by-sibling view.
    pub(crate) fn encode_fields(self: &Arc<Self>, writer: &mut BitWriter, record: &Record<C>, ctx: &C) -> Result<()> {
        for f in &self.fields {
            let default_storage;
            let value: &Value<C> = match record.get(&f.name) {
                Some(v) => v,
                None => {
                    default_storage = self.default_for(f).ok_or_else(|| {
                        Error::new(ErrorKind::SchemaError(format!(
                            "field '{}' was omitted and has no default",
                            f.name
                        )))
                        .with_segment(self.name.clone(), f.name.clone())
                    })?;
                    &default_storage
                }
            };
            match &f.factory {
                Factory::Static(d) => d
                    .encode(writer, value, record, ctx)
                    .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?,
                Factory::Dynamic(dyn_factory) if !dyn_factory.needs_remaining => {
                    let resolved = dyn_factory
                        .resolve(record, None)
                        .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?;
                    match resolved {
                        Some(d) => d
                            .encode(writer, value, record, ctx)
                            .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?,
                        None => {}
                    }
                }
                Factory::Dynamic(_) => {
                    self.encode_self_describing(writer, value, ctx)
                        .map_err(|e| e.with_segment(self.name.clone(), f.name.clone()))?;
                }
            }
        }
        Ok(())
    }

    fn default_for(&self, f: &Field<C>) -> Option<Value<C>> {
        match &f.factory {
            Factory::Static(d) => d.default_value(),
            Factory::Dynamic(_) => None,
        }
    }

    /// The encoder has no "remaining bits" to hand a `dynamic(...)`
    /// factory that asked for one, so the only sound policy is to encode
    /// directly from the value's own shape when that shape is
    /// self-describing.
    fn encode_self_describing(&self, writer: &mut BitWriter, value: &Value<C>, ctx: &C) -> Result<()> {
        match value {
            Value::None => Ok(()),
            Value::Bool(b) => writer.put(u64::from(*b), 1),
            Value::Bytes(bytes) => writer.put_bytes(bytes),
            Value::Record(record) => record.schema.clone().encode_fields(writer, record, ctx),
            other => Err(Error::new(ErrorKind::UnsupportedDynamicEncode(format!(
                "cannot encode a {} through a remaining-bits-dependent dynamic factory \
                 without a known descriptor (only none/bool/bytes/nested-record values are self-describing)",
                other.kind_name()
            )))),
        }
    }
}

/// Both the append-only "partial record" seen by later dynamic factories
/// while decoding, and the finished decoded value of a schema — the same
/// type plays both roles, so a schema's own decoded result can be fed
/// straight back in as input to `encode` with no separate conversion.
#[derive(Clone)]
pub struct Record<C = ()> {
    schema: Arc<Schema<C>>,
    fields: Vec<(String, Value<C>)>,
}

impl<C> Record<C> {
    pub fn empty(schema: Arc<Schema<C>>) -> Self {
        Self { schema, fields: Vec::new() }
    }

    pub fn new<S: Into<String>>(schema: Arc<Schema<C>>, fields: Vec<(S, Value<C>)>) -> Self {
        let fields = fields.into_iter().map(|(n, v)| (n.into(), v)).collect();
        Self { schema, fields }
    }

    pub fn get(&self, name: &str) -> Option<&Value<C>> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub(crate) fn insert(&mut self, name: String, value: Value<C>) {
        self.fields.push((name, value));
    }

    pub fn schema(&self) -> &Arc<Schema<C>> {
        &self.schema
    }

    pub fn fields(&self) -> &[(String, Value<C>)] {
        &self.fields
    }
}

impl<C: fmt::Debug> fmt::Debug for Record<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record").field("schema", self.schema.name()).field("fields", &self.fields).finish()
    }
}

impl<C: PartialEq> PartialEq for Record<C> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}
