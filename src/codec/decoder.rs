//! Streaming decoder with one-byte lookahead.
//!
//! The decoder reads one value at a time from a [`Source`]. Its only buffer
//! is a single peeked head byte, which lets the type predicates
//! (`is_nil`, `is_str`, ...) inspect the next value without consuming it.
//!
//! # Example
//!
//! ```
//! use packwire::codec::Decoder;
//!
//! let mut decoder = Decoder::from_bytes(vec![0x93u8, 0x01, 0xa1, b'x', 0xc3]);
//! assert!(decoder.is_array().unwrap());
//!
//! let header = decoder.unpack_collection().unwrap();
//! assert_eq!(header.len, 3);
//! assert_eq!(decoder.unpack_value::<i32>().unwrap(), 1);
//! assert_eq!(decoder.unpack_value::<String>().unwrap(), "x");
//! assert!(decoder.unpack_value::<bool>().unwrap());
//! ```

use bytes::Bytes;

use super::encoder::CollectionKind;
use super::extract::{self, Decoded, Extraction, Number, Scalar, ScalarKind, Unpack, Unpacked};
use super::io::{read_exact, SliceSource, Source};
use crate::error::{PackError, Result};
use crate::format::{Category, FormatTag, Payload};

/// Default maximum str/bin length accepted by the decoder (1 GB).
pub const DEFAULT_MAX_SEQUENCE_LEN: u32 = 1_073_741_824;

/// Default maximum collection nesting followed by [`Decoder::skip`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Limits applied while decoding.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Longest str/bin payload accepted; longer ones fail before allocating.
    pub max_sequence_len: u32,
    /// Deepest collection nesting [`Decoder::skip`] will descend into.
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Decoded array or map header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionHeader {
    /// Array or map.
    pub kind: CollectionKind,
    /// Count stored in the header: items for arrays, pairs for maps.
    pub len: u32,
}

impl CollectionHeader {
    /// Number of values that follow the header (keys and values for maps).
    pub fn elements(&self) -> u64 {
        match self.kind {
            CollectionKind::Array => u64::from(self.len),
            CollectionKind::Map => u64::from(self.len) * 2,
        }
    }
}

/// MessagePack decoder bound to one source.
#[derive(Debug)]
pub struct Decoder<R> {
    source: R,
    peeked: Option<u8>,
    config: DecoderConfig,
}

impl Decoder<SliceSource> {
    /// Create a decoder over an in-memory buffer.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::new(SliceSource::new(data))
    }

    /// Bytes not yet consumed, including a peeked head byte.
    pub fn remaining(&self) -> usize {
        self.source.remaining() + usize::from(self.peeked.is_some())
    }
}

impl<R: Source> Decoder<R> {
    /// Create a decoder with the default limits.
    pub fn new(source: R) -> Self {
        Self::with_config(source, DecoderConfig::default())
    }

    /// Create a decoder with custom limits.
    pub fn with_config(source: R, config: DecoderConfig) -> Self {
        Self {
            source,
            peeked: None,
            config,
        }
    }

    /// Active limits.
    #[inline]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Get a reference to the source.
    #[inline]
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Unwrap the source. A peeked byte, if any, is lost.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Run `f` against this decoder with the source type erased.
    ///
    /// A peeked byte travels into the erased decoder and back.
    pub(crate) fn with_dyn_source<T>(
        &mut self,
        f: impl FnOnce(&mut Decoder<&mut dyn Source>) -> Result<T>,
    ) -> Result<T> {
        let mut erased = Decoder {
            source: &mut self.source as &mut dyn Source,
            peeked: self.peeked.take(),
            config: self.config.clone(),
        };
        let out = f(&mut erased);
        self.peeked = erased.peeked;
        out
    }

    /// Return the next byte without consuming it.
    ///
    /// Repeated calls return the same byte and read from the source once.
    pub fn peek_byte(&mut self) -> Result<u8> {
        if let Some(byte) = self.peeked {
            return Ok(byte);
        }
        let mut buf = [0u8; 1];
        read_exact(&mut self.source, &mut buf)?;
        self.peeked = Some(buf[0]);
        Ok(buf[0])
    }

    /// Consume and return the next byte, preferring a peeked one.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Fill `buf` completely, starting with a peeked byte if present.
    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match self.peeked.take() {
            Some(byte) => {
                buf[0] = byte;
                read_exact(&mut self.source, &mut buf[1..])
            }
            None => read_exact(&mut self.source, buf),
        }
    }

    /// Read a big-endian length field of `width` bytes.
    fn read_len(&mut self, width: usize) -> Result<u64> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf[..width])?;
        let mut wide = [0u8; 8];
        wide[8 - width..].copy_from_slice(&buf[..width]);
        Ok(u64::from_be_bytes(wide))
    }

    fn read_head(&mut self) -> Result<(u8, FormatTag)> {
        let head = self.read_byte()?;
        let tag = FormatTag::from_head_byte(head).ok_or(PackError::InvalidHeadByte(head))?;
        Ok((head, tag))
    }

    /// Read an array or map header.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::InvalidHeadByte`] if the next value is not a collection.
    pub fn unpack_collection(&mut self) -> Result<CollectionHeader> {
        let (head, tag) = self.read_head()?;
        let kind = match tag.category() {
            Category::Array => CollectionKind::Array,
            Category::Map => CollectionKind::Map,
            _ => return Err(PackError::InvalidHeadByte(head)),
        };
        let len = match tag.payload() {
            Payload::Collection { len_width: 0 } => tag.embedded_value(head) as u64,
            Payload::Collection { len_width } => self.read_len(len_width)?,
            _ => return Err(PackError::InvalidHeadByte(head)),
        };
        Ok(CollectionHeader {
            kind,
            len: len as u32,
        })
    }

    /// Read an array header and return its item count.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::IncompatibleUnpackType`] if the next value is not
    /// an array. Nothing is consumed in that case.
    pub fn unpack_array(&mut self) -> Result<u32> {
        let head = self.peek_byte()?;
        let tag = FormatTag::from_head_byte(head).ok_or(PackError::InvalidHeadByte(head))?;
        if tag.category() != Category::Array {
            return Err(PackError::IncompatibleUnpackType {
                expected: "array",
                found: tag,
            });
        }
        self.unpack_collection().map(|header| header.len)
    }

    /// Read one non-collection value and hand it to `extraction`.
    ///
    /// # Errors
    ///
    /// - [`PackError::InvalidHeadByte`] for collection, extension or unused head bytes
    /// - [`PackError::IncompatibleUnpackType`] if the value does not suit the strategy
    /// - [`PackError::SequenceTooLarge`] if a str/bin exceeds the configured limit
    pub fn unpack(&mut self, extraction: Extraction<'_>) -> Result<Unpacked> {
        let (head, tag) = self.read_head()?;
        let decoded = self.decode_tag(head, tag)?;
        extract::apply(self, tag, decoded, extraction)
    }

    /// Read one bool/integer/float and cast it into `kind`.
    pub fn unpack_scalar(&mut self, kind: ScalarKind) -> Result<Scalar> {
        let (head, tag) = self.read_head()?;
        let decoded = self.decode_tag(head, tag)?;
        extract::scalar(tag, decoded, kind)
    }

    /// Decode one value into any [`Unpack`] destination.
    #[inline]
    pub fn unpack_value<T: Unpack>(&mut self) -> Result<T> {
        T::unpack(self)
    }

    /// Consume the header and fixed payload of `tag`, leaving any sequence
    /// payload in the source.
    fn decode_tag(&mut self, head: u8, tag: FormatTag) -> Result<Decoded> {
        match tag.payload() {
            Payload::None => Ok(match tag {
                FormatTag::True => Decoded::Number(Number::Bool(true)),
                FormatTag::False => Decoded::Number(Number::Bool(false)),
                _ => Decoded::Nil,
            }),
            Payload::Embedded { .. } => Ok(Decoded::Number(Number::Int(tag.embedded_value(head)))),
            Payload::Fixed { width } => {
                let mut buf = [0u8; 8];
                self.read_exact(&mut buf[..width])?;
                Number::from_be(tag, &buf[..width])
                    .map(Decoded::Number)
                    .ok_or(PackError::InvalidHeadByte(head))
            }
            Payload::Sequence { len_width } => {
                let len = if len_width == 0 {
                    tag.embedded_value(head) as u64
                } else {
                    self.read_len(len_width)?
                };
                if len > u64::from(self.config.max_sequence_len) {
                    return Err(PackError::SequenceTooLarge {
                        len,
                        max: self.config.max_sequence_len,
                    });
                }
                Ok(Decoded::Sequence(len as usize))
            }
            Payload::Collection { .. } | Payload::Extension => {
                Err(PackError::InvalidHeadByte(head))
            }
        }
    }

    /// Consume one complete value, descending into collections.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::DepthExceeded`] if collections nest deeper than
    /// the configured limit.
    pub fn skip(&mut self) -> Result<()> {
        self.skip_nested(0)
    }

    fn skip_nested(&mut self, depth: usize) -> Result<()> {
        if self.peek_category()?.is_some_and(is_collection) {
            if depth >= self.config.max_depth {
                return Err(PackError::DepthExceeded(self.config.max_depth));
            }
            let header = self.unpack_collection()?;
            for _ in 0..header.elements() {
                self.skip_nested(depth + 1)?;
            }
            return Ok(());
        }
        self.unpack(Extraction::Skip).map(drop)
    }

    fn peek_tag(&mut self) -> Result<Option<FormatTag>> {
        let head = self.peek_byte()?;
        Ok(FormatTag::from_head_byte(head))
    }

    fn peek_category(&mut self) -> Result<Option<Category>> {
        Ok(self.peek_tag()?.map(FormatTag::category))
    }

    fn peek_is(&mut self, category: Category) -> Result<bool> {
        Ok(self.peek_category()? == Some(category))
    }

    /// Next value is nil.
    pub fn is_nil(&mut self) -> Result<bool> {
        self.peek_is(Category::Nil)
    }

    /// Next value is a boolean.
    pub fn is_bool(&mut self) -> Result<bool> {
        self.peek_is(Category::Bool)
    }

    /// Next value is an integer of any width or sign.
    pub fn is_integer(&mut self) -> Result<bool> {
        self.peek_is(Category::Integer)
    }

    /// Next value is a signed integer format (negative fixint or int 8-64).
    pub fn is_signed(&mut self) -> Result<bool> {
        Ok(self.peek_tag()?.is_some_and(FormatTag::is_signed))
    }

    /// Next value is an unsigned integer format (positive fixint or uint 8-64).
    pub fn is_unsigned(&mut self) -> Result<bool> {
        Ok(self.peek_tag()?.is_some_and(FormatTag::is_unsigned))
    }

    /// Next value is a float 32 or float 64.
    pub fn is_float(&mut self) -> Result<bool> {
        self.peek_is(Category::Float)
    }

    /// Next value is an integer or float.
    pub fn is_arithmetic(&mut self) -> Result<bool> {
        Ok(matches!(
            self.peek_category()?,
            Some(Category::Integer | Category::Float)
        ))
    }

    /// Next value is a string.
    pub fn is_str(&mut self) -> Result<bool> {
        self.peek_is(Category::Str)
    }

    /// Next value is a binary blob.
    pub fn is_bin(&mut self) -> Result<bool> {
        self.peek_is(Category::Bin)
    }

    /// Next value is a string or binary blob.
    pub fn is_sequence(&mut self) -> Result<bool> {
        Ok(matches!(
            self.peek_category()?,
            Some(Category::Str | Category::Bin)
        ))
    }

    /// Next value is an array header.
    pub fn is_array(&mut self) -> Result<bool> {
        self.peek_is(Category::Array)
    }

    /// Next value is a map header.
    pub fn is_map(&mut self) -> Result<bool> {
        self.peek_is(Category::Map)
    }
}

fn is_collection(category: Category) -> bool {
    matches!(category, Category::Array | Category::Map)
}
