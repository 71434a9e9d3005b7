//! Tag catalog: classification of head bytes.
//!
//! Every MessagePack value starts with a head byte. Some formats use the
//! whole byte as their identifier, others reserve the high bits as a pattern
//! and embed a small value or length in the low bits:
//!
//! ```text
//! positive fixint  0xxxxxxx   value  = byte
//! fixmap           1000xxxx   pairs  = byte & 0x0f
//! fixarray         1001xxxx   items  = byte & 0x0f
//! fixstr           101xxxxx   length = byte & 0x1f
//! negative fixint  111xxxxx   value  = byte - 0x100
//! ```
//!
//! All multi-byte length and value fields that follow a head byte are
//! Big Endian.

use std::fmt;

/// Largest value a positive fixint can carry.
pub const MAX_POSITIVE_FIXINT: i128 = 0x7f;

/// Smallest value a negative fixint can carry.
pub const MIN_NEGATIVE_FIXINT: i128 = -32;

/// Longest string a fixstr can carry.
pub const MAX_FIXSTR_LEN: usize = 0x1f;

/// Largest count a fixarray or fixmap can carry.
pub const MAX_FIX_COLLECTION_LEN: usize = 0x0f;

/// Largest length or count representable on the wire (32-bit prefix).
pub const MAX_WIRE_LEN: usize = u32::MAX as usize;

/// Every wire format the catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    PositiveFixint,
    NegativeFixint,
    Nil,
    False,
    True,
    Float32,
    Float64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    FixStr,
    Str8,
    Str16,
    Str32,
    Bin8,
    Bin16,
    Bin32,
    FixArray,
    Array16,
    Array32,
    FixMap,
    Map16,
    Map32,
    FixExt1,
    FixExt2,
    FixExt4,
    FixExt8,
    FixExt16,
    Ext8,
    Ext16,
    Ext32,
}

/// Shape of the bytes that follow (or are embedded in) a head byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Nothing follows; the head byte is the whole value (nil, bool).
    None,
    /// The value lives in the low `bits` of the head byte.
    Embedded {
        /// Number of low bits holding the value.
        bits: u32,
    },
    /// A big-endian scalar of `width` bytes follows.
    Fixed {
        /// Payload width in bytes.
        width: usize,
    },
    /// A length prefix of `len_width` bytes follows, then that many bytes.
    /// `len_width` is 0 when the length is embedded (fixstr).
    Sequence {
        /// Width of the length prefix in bytes.
        len_width: usize,
    },
    /// A count prefix of `len_width` bytes follows, then that many values.
    /// `len_width` is 0 when the count is embedded (fixarray, fixmap).
    Collection {
        /// Width of the count prefix in bytes.
        len_width: usize,
    },
    /// Extension types: recognized but not implemented.
    Extension,
}

/// Broad value category of a tag, used by predicates and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Nil,
    Bool,
    Integer,
    Float,
    Str,
    Bin,
    Array,
    Map,
    Extension,
}

impl FormatTag {
    /// Classify a head byte. Returns `None` for 0xc1, which is never used.
    ///
    /// # Example
    ///
    /// ```
    /// use packwire::format::FormatTag;
    ///
    /// assert_eq!(FormatTag::from_head_byte(0xa3), Some(FormatTag::FixStr));
    /// assert_eq!(FormatTag::from_head_byte(0xff), Some(FormatTag::NegativeFixint));
    /// assert_eq!(FormatTag::from_head_byte(0xc1), None);
    /// ```
    pub fn from_head_byte(byte: u8) -> Option<Self> {
        let tag = match byte {
            0x00..=0x7f => Self::PositiveFixint,
            0x80..=0x8f => Self::FixMap,
            0x90..=0x9f => Self::FixArray,
            0xa0..=0xbf => Self::FixStr,
            0xc0 => Self::Nil,
            0xc1 => return None,
            0xc2 => Self::False,
            0xc3 => Self::True,
            0xc4 => Self::Bin8,
            0xc5 => Self::Bin16,
            0xc6 => Self::Bin32,
            0xc7 => Self::Ext8,
            0xc8 => Self::Ext16,
            0xc9 => Self::Ext32,
            0xca => Self::Float32,
            0xcb => Self::Float64,
            0xcc => Self::Uint8,
            0xcd => Self::Uint16,
            0xce => Self::Uint32,
            0xcf => Self::Uint64,
            0xd0 => Self::Int8,
            0xd1 => Self::Int16,
            0xd2 => Self::Int32,
            0xd3 => Self::Int64,
            0xd4 => Self::FixExt1,
            0xd5 => Self::FixExt2,
            0xd6 => Self::FixExt4,
            0xd7 => Self::FixExt8,
            0xd8 => Self::FixExt16,
            0xd9 => Self::Str8,
            0xda => Self::Str16,
            0xdb => Self::Str32,
            0xdc => Self::Array16,
            0xdd => Self::Array32,
            0xde => Self::Map16,
            0xdf => Self::Map32,
            0xe0..=0xff => Self::NegativeFixint,
        };
        Some(tag)
    }

    /// Head byte of an exact tag, or the fixed high-bit pattern of a masked one.
    pub const fn head_byte(self) -> u8 {
        match self {
            Self::PositiveFixint => 0x00,
            Self::FixMap => 0x80,
            Self::FixArray => 0x90,
            Self::FixStr => 0xa0,
            Self::Nil => 0xc0,
            Self::False => 0xc2,
            Self::True => 0xc3,
            Self::Bin8 => 0xc4,
            Self::Bin16 => 0xc5,
            Self::Bin32 => 0xc6,
            Self::Ext8 => 0xc7,
            Self::Ext16 => 0xc8,
            Self::Ext32 => 0xc9,
            Self::Float32 => 0xca,
            Self::Float64 => 0xcb,
            Self::Uint8 => 0xcc,
            Self::Uint16 => 0xcd,
            Self::Uint32 => 0xce,
            Self::Uint64 => 0xcf,
            Self::Int8 => 0xd0,
            Self::Int16 => 0xd1,
            Self::Int32 => 0xd2,
            Self::Int64 => 0xd3,
            Self::FixExt1 => 0xd4,
            Self::FixExt2 => 0xd5,
            Self::FixExt4 => 0xd6,
            Self::FixExt8 => 0xd7,
            Self::FixExt16 => 0xd8,
            Self::Str8 => 0xd9,
            Self::Str16 => 0xda,
            Self::Str32 => 0xdb,
            Self::Array16 => 0xdc,
            Self::Array32 => 0xdd,
            Self::Map16 => 0xde,
            Self::Map32 => 0xdf,
            Self::NegativeFixint => 0xe0,
        }
    }

    /// Number of low head-byte bits that carry a value, for masked tags.
    ///
    /// Exact tags return `None`.
    pub const fn payload_len_bits(self) -> Option<u32> {
        match self {
            Self::PositiveFixint => Some(7),
            Self::NegativeFixint | Self::FixStr => Some(5),
            Self::FixArray | Self::FixMap => Some(4),
            _ => None,
        }
    }

    /// Check whether `byte` is a head byte of this format.
    pub fn is_match(self, byte: u8) -> bool {
        match self.payload_len_bits() {
            Some(bits) => {
                let mask = !((1u16 << bits) - 1) as u8;
                byte & mask == self.head_byte()
            }
            None => byte == self.head_byte(),
        }
    }

    /// Extract the value embedded in the low bits of a masked head byte.
    ///
    /// For negative fixint the result is sign-extended, so `0xff` yields -1.
    /// Exact tags yield 0.
    pub fn embedded_value(self, byte: u8) -> i64 {
        match self {
            Self::NegativeFixint => i64::from(byte as i8),
            _ => match self.payload_len_bits() {
                Some(bits) => i64::from(byte & ((1u16 << bits) - 1) as u8),
                None => 0,
            },
        }
    }

    /// Payload shape of this format.
    pub const fn payload(self) -> Payload {
        match self {
            Self::Nil | Self::False | Self::True => Payload::None,
            Self::PositiveFixint => Payload::Embedded { bits: 7 },
            Self::NegativeFixint => Payload::Embedded { bits: 5 },
            Self::Uint8 | Self::Int8 => Payload::Fixed { width: 1 },
            Self::Uint16 | Self::Int16 => Payload::Fixed { width: 2 },
            Self::Uint32 | Self::Int32 | Self::Float32 => Payload::Fixed { width: 4 },
            Self::Uint64 | Self::Int64 | Self::Float64 => Payload::Fixed { width: 8 },
            Self::FixStr => Payload::Sequence { len_width: 0 },
            Self::Str8 | Self::Bin8 => Payload::Sequence { len_width: 1 },
            Self::Str16 | Self::Bin16 => Payload::Sequence { len_width: 2 },
            Self::Str32 | Self::Bin32 => Payload::Sequence { len_width: 4 },
            Self::FixArray | Self::FixMap => Payload::Collection { len_width: 0 },
            Self::Array16 | Self::Map16 => Payload::Collection { len_width: 2 },
            Self::Array32 | Self::Map32 => Payload::Collection { len_width: 4 },
            Self::FixExt1
            | Self::FixExt2
            | Self::FixExt4
            | Self::FixExt8
            | Self::FixExt16
            | Self::Ext8
            | Self::Ext16
            | Self::Ext32 => Payload::Extension,
        }
    }

    /// Value category of this format.
    pub const fn category(self) -> Category {
        match self {
            Self::Nil => Category::Nil,
            Self::False | Self::True => Category::Bool,
            Self::PositiveFixint
            | Self::NegativeFixint
            | Self::Uint8
            | Self::Uint16
            | Self::Uint32
            | Self::Uint64
            | Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64 => Category::Integer,
            Self::Float32 | Self::Float64 => Category::Float,
            Self::FixStr | Self::Str8 | Self::Str16 | Self::Str32 => Category::Str,
            Self::Bin8 | Self::Bin16 | Self::Bin32 => Category::Bin,
            Self::FixArray | Self::Array16 | Self::Array32 => Category::Array,
            Self::FixMap | Self::Map16 | Self::Map32 => Category::Map,
            _ => Category::Extension,
        }
    }

    /// Whether this tag heads an array or map.
    #[inline]
    pub const fn is_collection(self) -> bool {
        matches!(self.payload(), Payload::Collection { .. })
    }

    /// Whether this tag carries a signed integer on the wire.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::NegativeFixint | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    /// Whether this tag carries an unsigned integer on the wire.
    ///
    /// Positive fixint counts as unsigned.
    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::PositiveFixint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64
        )
    }

    /// Lowercase format name as used in the MessagePack specification.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PositiveFixint => "positive fixint",
            Self::NegativeFixint => "negative fixint",
            Self::Nil => "nil",
            Self::False => "false",
            Self::True => "true",
            Self::Float32 => "float 32",
            Self::Float64 => "float 64",
            Self::Uint8 => "uint 8",
            Self::Uint16 => "uint 16",
            Self::Uint32 => "uint 32",
            Self::Uint64 => "uint 64",
            Self::Int8 => "int 8",
            Self::Int16 => "int 16",
            Self::Int32 => "int 32",
            Self::Int64 => "int 64",
            Self::FixStr => "fixstr",
            Self::Str8 => "str 8",
            Self::Str16 => "str 16",
            Self::Str32 => "str 32",
            Self::Bin8 => "bin 8",
            Self::Bin16 => "bin 16",
            Self::Bin32 => "bin 32",
            Self::FixArray => "fixarray",
            Self::Array16 => "array 16",
            Self::Array32 => "array 32",
            Self::FixMap => "fixmap",
            Self::Map16 => "map 16",
            Self::Map32 => "map 32",
            Self::FixExt1 => "fixext 1",
            Self::FixExt2 => "fixext 2",
            Self::FixExt4 => "fixext 4",
            Self::FixExt8 => "fixext 8",
            Self::FixExt16 => "fixext 16",
            Self::Ext8 => "ext 8",
            Self::Ext16 => "ext 16",
            Self::Ext32 => "ext 32",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a head byte (standalone function).
#[inline]
pub fn classify(byte: u8) -> Option<FormatTag> {
    FormatTag::from_head_byte(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_byte_classifies_to_matching_tag() {
        for byte in 0u8..=0xff {
            match FormatTag::from_head_byte(byte) {
                Some(tag) => assert!(tag.is_match(byte), "{tag} should match 0x{byte:02x}"),
                None => assert_eq!(byte, 0xc1),
            }
        }
    }

    #[test]
    fn test_masked_ranges() {
        assert_eq!(classify(0x00), Some(FormatTag::PositiveFixint));
        assert_eq!(classify(0x7f), Some(FormatTag::PositiveFixint));
        assert_eq!(classify(0x80), Some(FormatTag::FixMap));
        assert_eq!(classify(0x8f), Some(FormatTag::FixMap));
        assert_eq!(classify(0x90), Some(FormatTag::FixArray));
        assert_eq!(classify(0x9f), Some(FormatTag::FixArray));
        assert_eq!(classify(0xa0), Some(FormatTag::FixStr));
        assert_eq!(classify(0xbf), Some(FormatTag::FixStr));
        assert_eq!(classify(0xe0), Some(FormatTag::NegativeFixint));
        assert_eq!(classify(0xff), Some(FormatTag::NegativeFixint));
    }

    #[test]
    fn test_is_match_rejects_neighbours() {
        assert!(!FormatTag::FixArray.is_match(0x8f));
        assert!(!FormatTag::FixArray.is_match(0xa0));
        assert!(!FormatTag::FixStr.is_match(0xc0));
        assert!(!FormatTag::PositiveFixint.is_match(0x80));
        assert!(!FormatTag::NegativeFixint.is_match(0xdf));
        assert!(FormatTag::Nil.is_match(0xc0));
        assert!(!FormatTag::Nil.is_match(0xc2));
    }

    #[test]
    fn test_payload_len_bits() {
        assert_eq!(FormatTag::PositiveFixint.payload_len_bits(), Some(7));
        assert_eq!(FormatTag::NegativeFixint.payload_len_bits(), Some(5));
        assert_eq!(FormatTag::FixStr.payload_len_bits(), Some(5));
        assert_eq!(FormatTag::FixArray.payload_len_bits(), Some(4));
        assert_eq!(FormatTag::FixMap.payload_len_bits(), Some(4));
        assert_eq!(FormatTag::Uint8.payload_len_bits(), None);
    }

    #[test]
    fn test_embedded_values() {
        assert_eq!(FormatTag::PositiveFixint.embedded_value(0x7f), 127);
        assert_eq!(FormatTag::NegativeFixint.embedded_value(0xff), -1);
        assert_eq!(FormatTag::NegativeFixint.embedded_value(0xe0), -32);
        assert_eq!(FormatTag::FixStr.embedded_value(0xa3), 3);
        assert_eq!(FormatTag::FixArray.embedded_value(0x9f), 15);
        assert_eq!(FormatTag::FixMap.embedded_value(0x82), 2);
        assert_eq!(FormatTag::Uint8.embedded_value(0xcc), 0);
    }

    #[test]
    fn test_payload_shapes() {
        assert_eq!(FormatTag::Nil.payload(), Payload::None);
        assert_eq!(FormatTag::Uint16.payload(), Payload::Fixed { width: 2 });
        assert_eq!(FormatTag::Float64.payload(), Payload::Fixed { width: 8 });
        assert_eq!(FormatTag::FixStr.payload(), Payload::Sequence { len_width: 0 });
        assert_eq!(FormatTag::Bin32.payload(), Payload::Sequence { len_width: 4 });
        assert_eq!(FormatTag::Map16.payload(), Payload::Collection { len_width: 2 });
        assert_eq!(FormatTag::FixExt4.payload(), Payload::Extension);
        assert!(FormatTag::Array32.is_collection());
        assert!(!FormatTag::Str8.is_collection());
    }

    #[test]
    fn test_signedness() {
        assert!(FormatTag::NegativeFixint.is_signed());
        assert!(!FormatTag::NegativeFixint.is_unsigned());
        assert!(FormatTag::PositiveFixint.is_unsigned());
        assert!(FormatTag::Int32.is_signed());
        assert!(FormatTag::Uint64.is_unsigned());
        assert!(!FormatTag::Float32.is_signed());
    }

    #[test]
    fn test_category_and_name() {
        assert_eq!(FormatTag::True.category(), Category::Bool);
        assert_eq!(FormatTag::Str16.category(), Category::Str);
        assert_eq!(FormatTag::Ext8.category(), Category::Extension);
        assert_eq!(FormatTag::Uint8.to_string(), "uint 8");
    }
}
