use std::fmt;

use crate::error::Result;
use crate::record::Record;
use crate::stream::{BitReader, BitWriter};
use crate::value::Value;

/// A field descriptor: the decode/encode/length trio every primitive and
/// combinator implements, generic over a context type `C` so callers can
/// thread arbitrary state (locale, protocol version, ...) through a
/// decode/encode pass without the engine ever inspecting it. Object-safe,
/// so schemas hold these as `Arc<dyn Descriptor<C>>` and compose them into
/// trees at runtime rather than deriving impls at compile time.
pub trait Descriptor<C = ()>: fmt::Debug + Send + Sync {
    /// Read this field's value from `reader`. `partial` holds every
    /// sibling decoded so far in the enclosing record (empty for a
    /// descriptor used outside a record, e.g. directly inside a `list`).
    fn decode(&self, reader: &mut BitReader, partial: &Record<C>, ctx: &C) -> Result<Value<C>>;

    /// Write `value` to `writer`, mirroring `decode`.
    fn encode(&self, writer: &mut BitWriter, value: &Value<C>, partial: &Record<C>, ctx: &C) -> Result<()>;

    /// The statically known bit width, or `None` if it depends on the
    /// value being encoded/decoded (e.g. a `list` with a sibling-derived
    /// count, or anything built from a `dynamic` factory).
    fn length(&self) -> Option<usize>;

    /// The value to substitute when a user-built record omits this field
    /// at encode time. Only literal descriptors (and anything explicitly
    /// flagged as defaulted) override this.
    fn default_value(&self) -> Option<Value<C>> {
        None
    }
}
