use std::fmt;

use crate::error::{Error, ErrorKind, Result};

/// The seam `str_`/`lit_str` encode/decode through. Catalogues beyond
/// UTF-8 (Latin-1, Shift-JIS, and the like) are out of scope for the core
/// engine; callers who need one supply their own `Arc<dyn TextCodec>`.
pub trait TextCodec: fmt::Debug + Send + Sync {
    fn encode(&self, s: &str) -> Vec<u8>;
    fn decode(&self, bytes: &[u8]) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn encode(&self, s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::new(ErrorKind::EncodingFailed(e.to_string())))
    }
}
