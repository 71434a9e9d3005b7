//! Streaming encoder.
//!
//! Writes framed MessagePack values to a [`Sink`]. The encoder keeps a stack
//! of collection frames so that every array or map closes itself the moment
//! its declared number of values has been written:
//!
//! ```text
//! begin_array(2)          frames: [root:1] [array 0/2]
//!   pack_int(1)           frames: [root:1] [array 1/2]
//!   begin_map(1)          frames: [root:1] [map 0/2]      (array closed)
//!     pack_str("k")       frames: [root:1] [map 1/2]
//!     pack_bool(true)     frames: [root:1]                (map closed)
//! ```
//!
//! The root frame never closes. Its count is the number of top-level values
//! written, which is what [`Fragment`] splicing relies on.
//!
//! # Example
//!
//! ```
//! use packwire::codec::Encoder;
//!
//! let mut encoder = Encoder::buffered();
//! encoder.begin_array(3).unwrap();
//! encoder.pack_int(1).unwrap().pack_str("x").unwrap().pack_bool(true).unwrap();
//!
//! let bytes = encoder.into_bytes().unwrap();
//! assert_eq!(&bytes[..], &[0x93, 0x01, 0xa1, b'x', 0xc3]);
//! ```

use bytes::Bytes;

use super::extract::Pack;
use super::io::{write_exact, BytesSink, Sink};
use crate::error::{PackError, Result};
use crate::format::{FormatTag, MAX_FIXSTR_LEN, MAX_FIX_COLLECTION_LEN, MAX_WIRE_LEN};

/// Kind of collection a header opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Sequence of values.
    Array,
    /// Sequence of key/value pairs.
    Map,
}

/// Bookkeeping for one open collection.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Values the collection was declared with (`None` for the root).
    expected: Option<u64>,
    /// Values written into it so far.
    emitted: u64,
}

impl Frame {
    fn root() -> Self {
        Self {
            expected: None,
            emitted: 0,
        }
    }

    fn with_limit(expected: u64) -> Self {
        Self {
            expected: Some(expected),
            emitted: 0,
        }
    }
}

/// Pre-encoded values ready to be spliced into another encoder.
///
/// Produced by [`Encoder::into_fragment`]; consumed by
/// [`Encoder::splice_collection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    items: u64,
    bytes: Bytes,
}

impl Fragment {
    /// Number of top-level values in the fragment.
    #[inline]
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Encoded bytes of the fragment.
    #[inline]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Encoded size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the fragment holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }
}

/// MessagePack encoder bound to one sink.
#[derive(Debug)]
pub struct Encoder<W> {
    sink: W,
    frames: Vec<Frame>,
}

impl Encoder<BytesSink> {
    /// Create an encoder writing into a growable in-memory buffer.
    pub fn buffered() -> Self {
        Self::new(BytesSink::new())
    }

    /// Finish and return the encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::UnclosedCollection`] if a collection is still open.
    pub fn into_bytes(self) -> Result<Bytes> {
        Ok(self.finish()?.freeze())
    }

    /// Finish and package the output for splicing into another encoder.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::UnclosedCollection`] if a collection is still open.
    pub fn into_fragment(self) -> Result<Fragment> {
        let items = self.items();
        let bytes = self.into_bytes()?;
        Ok(Fragment { items, bytes })
    }
}

impl<W: Sink> Encoder<W> {
    /// Create an encoder over `sink` with only the root frame open.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            frames: vec![Frame::root()],
        }
    }

    /// Number of top-level values written so far.
    #[inline]
    pub fn items(&self) -> u64 {
        self.frames[0].emitted
    }

    /// Number of collections currently open (the root is not counted).
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Get a reference to the sink.
    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Get a mutable reference to the sink.
    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Unwrap the sink without checking for open collections.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Unwrap the sink, checking that every collection has been completed.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::UnclosedCollection`] describing the innermost
    /// open collection.
    pub fn finish(self) -> Result<W> {
        if let Some(open) = self.frames.last().filter(|_| self.frames.len() > 1) {
            return Err(PackError::UnclosedCollection {
                expected: open.expected.unwrap_or_default(),
                emitted: open.emitted,
            });
        }
        Ok(self.sink)
    }

    /// Run `f` against this encoder with the sink type erased.
    ///
    /// The frame stack is moved into the erased encoder and back, so values
    /// written by `f` count against the collections open here.
    pub(crate) fn with_dyn_sink<T>(
        &mut self,
        f: impl FnOnce(&mut Encoder<&mut dyn Sink>) -> Result<T>,
    ) -> Result<T> {
        let mut erased = Encoder {
            sink: &mut self.sink as &mut dyn Sink,
            frames: std::mem::take(&mut self.frames),
        };
        let out = f(&mut erased);
        self.frames = erased.frames;
        out
    }

    /// Encode nil.
    pub fn pack_nil(&mut self) -> Result<&mut Self> {
        self.emit(FormatTag::Nil.head_byte(), &[])
    }

    /// Encode a boolean.
    pub fn pack_bool(&mut self, value: bool) -> Result<&mut Self> {
        let tag = if value {
            FormatTag::True
        } else {
            FormatTag::False
        };
        self.emit(tag.head_byte(), &[])
    }

    /// Encode an integer of any width using the narrowest format.
    ///
    /// Non-negative values try positive fixint, uint 8, 16, 32, 64 in that
    /// order; negative values try negative fixint (down to -32), int 8, 16,
    /// 32, 64.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::OutOfRange`] for `i128` values outside the
    /// 64-bit wire range.
    pub fn pack_int<N: Into<i128>>(&mut self, value: N) -> Result<&mut Self> {
        let n: i128 = value.into();
        if n >= 0 {
            if n <= 0x7f {
                self.emit(n as u8, &[])
            } else if n <= i128::from(u8::MAX) {
                self.emit(FormatTag::Uint8.head_byte(), &(n as u8).to_be_bytes())
            } else if n <= i128::from(u16::MAX) {
                self.emit(FormatTag::Uint16.head_byte(), &(n as u16).to_be_bytes())
            } else if n <= i128::from(u32::MAX) {
                self.emit(FormatTag::Uint32.head_byte(), &(n as u32).to_be_bytes())
            } else if n <= i128::from(u64::MAX) {
                self.emit(FormatTag::Uint64.head_byte(), &(n as u64).to_be_bytes())
            } else {
                Err(out_of_range("integer", n.unsigned_abs()))
            }
        } else if n >= -32 {
            self.emit(n as i8 as u8, &[])
        } else if n >= i128::from(i8::MIN) {
            self.emit(FormatTag::Int8.head_byte(), &(n as i8).to_be_bytes())
        } else if n >= i128::from(i16::MIN) {
            self.emit(FormatTag::Int16.head_byte(), &(n as i16).to_be_bytes())
        } else if n >= i128::from(i32::MIN) {
            self.emit(FormatTag::Int32.head_byte(), &(n as i32).to_be_bytes())
        } else if n >= i128::from(i64::MIN) {
            self.emit(FormatTag::Int64.head_byte(), &(n as i64).to_be_bytes())
        } else {
            Err(out_of_range("integer", n.unsigned_abs()))
        }
    }

    /// Encode a float 32.
    pub fn pack_float(&mut self, value: f32) -> Result<&mut Self> {
        self.emit(FormatTag::Float32.head_byte(), &value.to_be_bytes())
    }

    /// Encode a float 64.
    pub fn pack_double(&mut self, value: f64) -> Result<&mut Self> {
        self.emit(FormatTag::Float64.head_byte(), &value.to_be_bytes())
    }

    /// Encode a string. The bytes are written as-is; no UTF-8 check is made.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::OutOfRange`] if the length exceeds `u32::MAX`.
    pub fn pack_str<B: AsRef<[u8]> + ?Sized>(&mut self, value: &B) -> Result<&mut Self> {
        let bytes = value.as_ref();
        let len = bytes.len();
        if len <= MAX_FIXSTR_LEN {
            self.emit_sequence(FormatTag::FixStr.head_byte() | len as u8, &[], bytes)
        } else if len <= usize::from(u8::MAX) {
            self.emit_sequence(FormatTag::Str8.head_byte(), &[len as u8], bytes)
        } else if len <= usize::from(u16::MAX) {
            self.emit_sequence(
                FormatTag::Str16.head_byte(),
                &(len as u16).to_be_bytes(),
                bytes,
            )
        } else if len <= MAX_WIRE_LEN {
            self.emit_sequence(
                FormatTag::Str32.head_byte(),
                &(len as u32).to_be_bytes(),
                bytes,
            )
        } else {
            Err(out_of_range("string length", len as u128))
        }
    }

    /// Encode a binary blob.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::OutOfRange`] if the length exceeds `u32::MAX`.
    pub fn pack_bin(&mut self, value: &[u8]) -> Result<&mut Self> {
        let len = value.len();
        if len <= usize::from(u8::MAX) {
            self.emit_sequence(FormatTag::Bin8.head_byte(), &[len as u8], value)
        } else if len <= usize::from(u16::MAX) {
            self.emit_sequence(
                FormatTag::Bin16.head_byte(),
                &(len as u16).to_be_bytes(),
                value,
            )
        } else if len <= MAX_WIRE_LEN {
            self.emit_sequence(
                FormatTag::Bin32.head_byte(),
                &(len as u32).to_be_bytes(),
                value,
            )
        } else {
            Err(out_of_range("binary length", len as u128))
        }
    }

    /// Encode any [`Pack`] value.
    #[inline]
    pub fn pack<T: Pack + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        value.pack(self)?;
        Ok(self)
    }

    /// Open a collection of `count` elements.
    ///
    /// For maps `count` is the number of keys plus values and must be even;
    /// the header records `count / 2` pairs. The collection closes itself
    /// after `count` further values. A zero count closes immediately.
    ///
    /// # Errors
    ///
    /// - [`PackError::OddMapElements`] for a map with an odd `count`
    /// - [`PackError::OutOfRange`] if the header count exceeds `u32::MAX`
    pub fn begin_collection(&mut self, kind: CollectionKind, count: usize) -> Result<&mut Self> {
        self.write_collection_header(kind, count)?;
        if count > 0 {
            self.frames.push(Frame::with_limit(count as u64));
        }
        Ok(self)
    }

    /// Open an array of `len` values.
    #[inline]
    pub fn begin_array(&mut self, len: usize) -> Result<&mut Self> {
        self.begin_collection(CollectionKind::Array, len)
    }

    /// Open a map of `pairs` key/value pairs.
    pub fn begin_map(&mut self, pairs: usize) -> Result<&mut Self> {
        let elements = pairs
            .checked_mul(2)
            .ok_or_else(|| out_of_range("map pairs", pairs as u128))?;
        self.begin_collection(CollectionKind::Map, elements)
    }

    /// Write a collection whose values were encoded ahead of time.
    ///
    /// The header announces `fragment.items()` elements, the fragment bytes
    /// are copied verbatim and no frame is left open.
    ///
    /// # Example
    ///
    /// ```
    /// use packwire::codec::{CollectionKind, Encoder};
    ///
    /// let mut inner = Encoder::buffered();
    /// inner.pack_int(1).unwrap().pack_int(2).unwrap();
    /// let fragment = inner.into_fragment().unwrap();
    ///
    /// let mut outer = Encoder::buffered();
    /// outer.splice_collection(CollectionKind::Array, &fragment).unwrap();
    /// assert_eq!(&outer.into_bytes().unwrap()[..], &[0x92, 0x01, 0x02]);
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`begin_collection`](Self::begin_collection).
    pub fn splice_collection(
        &mut self,
        kind: CollectionKind,
        fragment: &Fragment,
    ) -> Result<&mut Self> {
        let count = usize::try_from(fragment.items)
            .map_err(|_| out_of_range("fragment items", u128::from(fragment.items)))?;
        self.write_collection_header(kind, count)?;
        tracing::trace!(
            items = fragment.items,
            bytes = fragment.len(),
            "splicing pre-encoded fragment"
        );
        write_exact(&mut self.sink, &fragment.bytes)?;
        Ok(self)
    }

    /// Write the values of `fragment` in place, without a collection header.
    ///
    /// Each spliced value counts against the innermost open collection.
    pub fn splice_values(&mut self, fragment: &Fragment) -> Result<&mut Self> {
        tracing::trace!(
            items = fragment.items,
            bytes = fragment.len(),
            "splicing pre-encoded values"
        );
        write_exact(&mut self.sink, &fragment.bytes)?;
        for _ in 0..fragment.items {
            self.new_item();
        }
        Ok(self)
    }

    fn write_collection_header(&mut self, kind: CollectionKind, count: usize) -> Result<()> {
        let (fix, tag16, tag32, header_len) = match kind {
            CollectionKind::Array => (
                FormatTag::FixArray,
                FormatTag::Array16,
                FormatTag::Array32,
                count,
            ),
            CollectionKind::Map => {
                if count % 2 != 0 {
                    return Err(PackError::OddMapElements(count));
                }
                (FormatTag::FixMap, FormatTag::Map16, FormatTag::Map32, count / 2)
            }
        };

        if header_len <= MAX_FIX_COLLECTION_LEN {
            self.emit(fix.head_byte() | header_len as u8, &[])?;
        } else if header_len <= usize::from(u16::MAX) {
            self.emit(tag16.head_byte(), &(header_len as u16).to_be_bytes())?;
        } else if header_len <= MAX_WIRE_LEN {
            self.emit(tag32.head_byte(), &(header_len as u32).to_be_bytes())?;
        } else {
            return Err(out_of_range("collection length", header_len as u128));
        }
        Ok(())
    }

    /// Write a head byte plus fixed payload and count one value.
    fn emit(&mut self, head: u8, payload: &[u8]) -> Result<&mut Self> {
        let mut buf = [0u8; 9];
        buf[0] = head;
        buf[1..=payload.len()].copy_from_slice(payload);
        write_exact(&mut self.sink, &buf[..=payload.len()])?;
        self.new_item();
        Ok(self)
    }

    /// Write a head byte, length prefix and body and count one value.
    fn emit_sequence(&mut self, head: u8, len_prefix: &[u8], body: &[u8]) -> Result<&mut Self> {
        let mut buf = [0u8; 5];
        buf[0] = head;
        buf[1..=len_prefix.len()].copy_from_slice(len_prefix);
        write_exact(&mut self.sink, &buf[..=len_prefix.len()])?;
        if !body.is_empty() {
            write_exact(&mut self.sink, body)?;
        }
        self.new_item();
        Ok(self)
    }

    /// Count one value against the innermost frame, closing it when full.
    fn new_item(&mut self) {
        let depth = self.frames.len();
        let top = self
            .frames
            .last_mut()
            .expect("root frame is never popped");
        top.emitted += 1;
        if depth > 1 && top.expected == Some(top.emitted) {
            self.frames.pop();
        }
    }
}

fn out_of_range(what: &'static str, len: u128) -> PackError {
    PackError::OutOfRange { what, len }
}
