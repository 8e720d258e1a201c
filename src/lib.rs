//! A declarative bitfield codec: binary packet layouts are described as
//! runtime schema values built from a small set of primitives and
//! combinators, then used to decode and encode bit-granular records
//! symmetrically.
//!
//! A [`Schema`](record::Schema) is an ordered list of named fields, each
//! wired to a [`Descriptor`](descriptor::Descriptor) — the decode/encode/
//! length trio every primitive (`uint`, `int`, `bytes`, ...) and combinator
//! (`list`, `mapped`, `bitfield`, `dynamic`) implements. Decoding and
//! encoding both produce and consume the same [`Value`](value::Value), so
//! there's no generated Rust type standing between the schema and the
//! wire.

pub mod combinators;
pub mod descriptor;
pub mod error;
pub mod primitives;
pub mod record;
pub mod stream;
pub mod text;
pub mod value;

pub use descriptor::Descriptor;
pub use error::{Error, ErrorKind, Result};
pub use record::{dynamic, dynamic_with_remaining, field, Factory, Field, Record, Schema};
pub use stream::{BitReader, BitWriter};
pub use text::{TextCodec, Utf8Codec};
pub use value::{BitString, Value};

pub mod prelude {
    //! Everything needed to define a schema and run it, in one import.
    pub use crate::combinators::{bitfield, list, mapped, Count, ValueMapper};
    pub use crate::primitives::{
        bits, bool_, bytes, int, int_enum, lit_bytes, lit_int, lit_str, lit_uint, none, str_, uint, uint_enum,
        IntEnum, UIntEnum,
    };
    pub use crate::record::{dynamic, dynamic_with_remaining, field, Factory, Record, Schema};
    pub use crate::{Descriptor, Error, ErrorKind, Result, Value};
}
