//! Extraction strategies and destination traits.
//!
//! After the decoder has read a head byte (and any fixed payload or length
//! prefix) it hands the decoded tag to one of three strategies chosen by the
//! caller:
//!
//! | Strategy | Accepts | Effect |
//! |---|---|---|
//! | [`Extraction::Skip`] | anything but collections | payload consumed and dropped |
//! | [`Extraction::Scalar`] | bool, integers, floats | value cast into the requested [`ScalarKind`] |
//! | [`Extraction::Sequence`] | str, bin | destination resized to the length and filled in one read |
//!
//! A scalar tag under `Sequence`, or a str/bin/nil tag under `Scalar`, is
//! [`PackError::IncompatibleUnpackType`].
//!
//! [`Unpack`] and [`Pack`] map Rust types onto these strategies and onto the
//! encoder, so typed code rarely needs to build an `Extraction` by hand.

use bytes::Bytes;
use serde::Serialize;

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::io::{Sink, Source};
use crate::error::{PackError, Result};
use crate::format::FormatTag;

/// Scratch size used when discarding sequence payloads.
const SKIP_CHUNK: usize = 256;

/// Numeric kind a scalar is cast into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

/// Strategy descriptor without a destination, used to describe parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Discard the value.
    Skip,
    /// Cast into a numeric kind.
    Scalar(ScalarKind),
    /// Copy str/bin bytes.
    Sequence,
    /// Read an array header and decode each element in turn.
    Collection,
}

/// Extraction strategy passed to [`Decoder::unpack`].
#[derive(Debug)]
pub enum Extraction<'a> {
    /// Consume and discard the value.
    Skip,
    /// Cast a bool/integer/float into the given kind.
    Scalar(ScalarKind),
    /// Copy a str/bin payload into the destination, replacing its contents.
    Sequence(&'a mut Vec<u8>),
}

impl Extraction<'_> {
    /// The destination-free descriptor of this extraction.
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Skip => Strategy::Skip,
            Self::Scalar(kind) => Strategy::Scalar(*kind),
            Self::Sequence(_) => Strategy::Sequence,
        }
    }
}

/// A scalar cast into its requested kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Outcome of [`Decoder::unpack`].
#[derive(Debug, Clone, PartialEq)]
pub enum Unpacked {
    /// Nil was read under [`Extraction::Skip`].
    Nil,
    /// A non-nil value was read and discarded.
    Skipped(FormatTag),
    /// A scalar was cast into the requested kind.
    Scalar(Scalar),
    /// `len` bytes of a str/bin payload were copied into the destination.
    Sequence {
        /// The str or bin tag that was read.
        tag: FormatTag,
        /// Payload length.
        len: usize,
    },
}

/// Value decoded from a head byte and its fixed payload, before extraction.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Decoded {
    Nil,
    Number(Number),
    /// A str/bin payload of this length is next in the source.
    Sequence(usize),
}

/// Raw numeric value as carried on the wire.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
}

impl Number {
    /// Decode a big-endian fixed payload for `tag`.
    pub(crate) fn from_be(tag: FormatTag, bytes: &[u8]) -> Option<Self> {
        let mut wide = [0u8; 8];
        wide[8 - bytes.len()..].copy_from_slice(bytes);
        let raw = u64::from_be_bytes(wide);
        let number = match tag {
            FormatTag::Uint8 | FormatTag::Uint16 | FormatTag::Uint32 | FormatTag::Uint64 => {
                Self::Uint(raw)
            }
            FormatTag::Int8 => Self::Int(i64::from(raw as u8 as i8)),
            FormatTag::Int16 => Self::Int(i64::from(raw as u16 as i16)),
            FormatTag::Int32 => Self::Int(i64::from(raw as u32 as i32)),
            FormatTag::Int64 => Self::Int(raw as i64),
            FormatTag::Float32 => Self::F32(f32::from_bits(raw as u32)),
            FormatTag::Float64 => Self::F64(f64::from_bits(raw)),
            _ => return None,
        };
        Some(number)
    }

    /// Cast into `kind` with `as` semantics; bool is `!= 0`.
    fn cast(self, kind: ScalarKind) -> Scalar {
        match kind {
            ScalarKind::Bool => Scalar::Bool(bool::from_number(self)),
            ScalarKind::I8 => Scalar::I8(i8::from_number(self)),
            ScalarKind::I16 => Scalar::I16(i16::from_number(self)),
            ScalarKind::I32 => Scalar::I32(i32::from_number(self)),
            ScalarKind::I64 => Scalar::I64(i64::from_number(self)),
            ScalarKind::U8 => Scalar::U8(u8::from_number(self)),
            ScalarKind::U16 => Scalar::U16(u16::from_number(self)),
            ScalarKind::U32 => Scalar::U32(u32::from_number(self)),
            ScalarKind::U64 => Scalar::U64(u64::from_number(self)),
            ScalarKind::F32 => Scalar::F32(f32::from_number(self)),
            ScalarKind::F64 => Scalar::F64(f64::from_number(self)),
        }
    }
}

/// Primitive conversion out of a wire number.
trait FromNumber {
    fn from_number(number: Number) -> Self;
}

macro_rules! from_number {
    ($($t:ty),*) => {$(
        impl FromNumber for $t {
            #[inline]
            fn from_number(number: Number) -> Self {
                match number {
                    Number::Bool(b) => u8::from(b) as $t,
                    Number::Int(v) => v as $t,
                    Number::Uint(v) => v as $t,
                    Number::F32(v) => v as $t,
                    Number::F64(v) => v as $t,
                }
            }
        }
    )*};
}

from_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FromNumber for bool {
    fn from_number(number: Number) -> Self {
        match number {
            Number::Bool(b) => b,
            Number::Int(v) => v != 0,
            Number::Uint(v) => v != 0,
            Number::F32(v) => v != 0.0,
            Number::F64(v) => v != 0.0,
        }
    }
}

impl Scalar {
    fn number(self) -> Number {
        match self {
            Self::Bool(b) => Number::Bool(b),
            Self::I8(v) => Number::Int(i64::from(v)),
            Self::I16(v) => Number::Int(i64::from(v)),
            Self::I32(v) => Number::Int(i64::from(v)),
            Self::I64(v) => Number::Int(v),
            Self::U8(v) => Number::Uint(u64::from(v)),
            Self::U16(v) => Number::Uint(u64::from(v)),
            Self::U32(v) => Number::Uint(u64::from(v)),
            Self::U64(v) => Number::Uint(v),
            Self::F32(v) => Number::F32(v),
            Self::F64(v) => Number::F64(v),
        }
    }

    /// Re-cast into another kind with the same rules the decoder uses.
    pub fn cast(self, kind: ScalarKind) -> Scalar {
        self.number().cast(kind)
    }
}

/// Dispatch a decoded tag to the caller's strategy.
pub(crate) fn apply<R: Source>(
    decoder: &mut Decoder<R>,
    tag: FormatTag,
    decoded: Decoded,
    extraction: Extraction<'_>,
) -> Result<Unpacked> {
    match extraction {
        Extraction::Skip => skip(decoder, tag, decoded),
        Extraction::Scalar(kind) => scalar(tag, decoded, kind).map(Unpacked::Scalar),
        Extraction::Sequence(dest) => {
            sequence(decoder, tag, decoded, dest).map(|len| Unpacked::Sequence { tag, len })
        }
    }
}

/// Scalar strategy: header or fixed-payload value cast into `kind`.
pub(crate) fn scalar(tag: FormatTag, decoded: Decoded, kind: ScalarKind) -> Result<Scalar> {
    match decoded {
        Decoded::Number(number) => Ok(number.cast(kind)),
        Decoded::Nil | Decoded::Sequence(_) => Err(PackError::IncompatibleUnpackType {
            expected: "bool, integer or float",
            found: tag,
        }),
    }
}

/// Sequence strategy: resize `dest` to the payload length and fill it.
fn sequence<R: Source>(
    decoder: &mut Decoder<R>,
    tag: FormatTag,
    decoded: Decoded,
    dest: &mut Vec<u8>,
) -> Result<usize> {
    let len = match decoded {
        Decoded::Sequence(len) => len,
        Decoded::Nil | Decoded::Number(_) => {
            return Err(PackError::IncompatibleUnpackType {
                expected: "str or bin",
                found: tag,
            })
        }
    };

    dest.clear();
    if len == 0 {
        return Ok(0);
    }
    dest.resize(len, 0);
    decoder.read_exact(dest)?;
    Ok(len)
}

/// No-op strategy: fixed payloads are already consumed, sequences are drained.
fn skip<R: Source>(decoder: &mut Decoder<R>, tag: FormatTag, decoded: Decoded) -> Result<Unpacked> {
    match decoded {
        Decoded::Nil => Ok(Unpacked::Nil),
        Decoded::Number(_) => Ok(Unpacked::Skipped(tag)),
        Decoded::Sequence(len) => {
            let mut scratch = [0u8; SKIP_CHUNK];
            let mut remaining = len;
            while remaining > 0 {
                let n = remaining.min(SKIP_CHUNK);
                decoder.read_exact(&mut scratch[..n])?;
                remaining -= n;
            }
            Ok(Unpacked::Skipped(tag))
        }
    }
}

// ============================================================================
// Destination types
// ============================================================================

/// A Rust type that can be decoded from one MessagePack value.
pub trait Unpack: Sized {
    /// Strategy this destination decodes with.
    const STRATEGY: Strategy;

    /// Decode one value from `decoder`.
    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self>;
}

macro_rules! unpack_scalar {
    ($($t:ty => $kind:ident),* $(,)?) => {$(
        impl Unpack for $t {
            const STRATEGY: Strategy = Strategy::Scalar(ScalarKind::$kind);

            fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
                let scalar = decoder.unpack_scalar(ScalarKind::$kind)?;
                Ok(<$t>::from_number(scalar.number()))
            }
        }
    )*};
}

unpack_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl Unpack for Vec<u8> {
    const STRATEGY: Strategy = Strategy::Sequence;

    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        let mut out = Vec::new();
        decoder.unpack(Extraction::Sequence(&mut out))?;
        Ok(out)
    }
}

impl Unpack for String {
    const STRATEGY: Strategy = Strategy::Sequence;

    /// Rust strings must be UTF-8, so this destination rejects other bytes.
    /// Use `Vec<u8>` to receive str payloads unchecked.
    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        let bytes = Vec::<u8>::unpack(decoder)?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl Unpack for Bytes {
    const STRATEGY: Strategy = Strategy::Sequence;

    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        Vec::<u8>::unpack(decoder).map(Bytes::from)
    }
}

/// Destination that discards whatever scalar or sequence value it receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ignored;

impl Unpack for Ignored {
    const STRATEGY: Strategy = Strategy::Skip;

    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.unpack(Extraction::Skip)?;
        Ok(Ignored)
    }
}

impl Unpack for () {
    const STRATEGY: Strategy = Strategy::Skip;

    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        decoder.unpack(Extraction::Skip)?;
        Ok(())
    }
}

impl<T: Unpack> Unpack for Option<T> {
    const STRATEGY: Strategy = T::STRATEGY;

    fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
        if decoder.is_nil()? {
            decoder.unpack(Extraction::Skip)?;
            return Ok(None);
        }
        T::unpack(decoder).map(Some)
    }
}

// ============================================================================
// Tuples as fixed-length arrays
// ============================================================================

macro_rules! tuple_impls {
    ($($len:expr => ($($name:ident)+))+) => {$(
        impl<$($name: Unpack),+> Unpack for ($($name,)+) {
            const STRATEGY: Strategy = Strategy::Collection;

            fn unpack<R: Source>(decoder: &mut Decoder<R>) -> Result<Self> {
                let len = decoder.unpack_array()?;
                if len as usize != $len {
                    return Err(PackError::ArgumentCount {
                        expected: $len,
                        actual: u64::from(len),
                    });
                }
                Ok(($($name::unpack(decoder)?,)+))
            }
        }

        impl<$($name: Pack),+> Pack for ($($name,)+) {
            #[allow(non_snake_case)]
            fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
                let ($($name,)+) = self;
                encoder.begin_array($len)?;
                $($name.pack(encoder)?;)+
                Ok(())
            }
        }
    )+};
}

tuple_impls! {
    1 => (A)
    2 => (A B)
    3 => (A B C)
    4 => (A B C D)
    5 => (A B C D E)
    6 => (A B C D E F)
    7 => (A B C D E F G)
    8 => (A B C D E F G H)
}

// ============================================================================
// Source values
// ============================================================================

/// A Rust value that can be encoded as one MessagePack value.
pub trait Pack {
    /// Encode `self` into `encoder`.
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()>;
}

macro_rules! pack_int {
    ($($t:ty),*) => {$(
        impl Pack for $t {
            #[inline]
            fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
                encoder.pack_int(*self as i128).map(drop)
            }
        }
    )*};
}

pack_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl Pack for bool {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_bool(*self).map(drop)
    }
}

impl Pack for f32 {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_float(*self).map(drop)
    }
}

impl Pack for f64 {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_double(*self).map(drop)
    }
}

impl Pack for str {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_str(self).map(drop)
    }
}

impl Pack for String {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_str(self.as_str()).map(drop)
    }
}

impl Pack for [u8] {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_bin(self).map(drop)
    }
}

impl Pack for Vec<u8> {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_bin(self).map(drop)
    }
}

impl Pack for Bytes {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_bin(self).map(drop)
    }
}

/// Unit encodes as nil.
impl Pack for () {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.pack_nil().map(drop)
    }
}

impl<T: Pack> Pack for Option<T> {
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        match self {
            Some(value) => value.pack(encoder),
            None => encoder.pack_nil().map(drop),
        }
    }
}

impl<T: Pack + ?Sized> Pack for &T {
    #[inline]
    fn pack<W: Sink>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        (**self).pack(encoder)
    }
}
