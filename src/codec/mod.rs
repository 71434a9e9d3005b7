//! Codec module - streaming MessagePack encoding and decoding.
//!
//! This module provides the two halves of the wire codec and the byte
//! channels they run over:
//!
//! - [`Encoder`] - framed writer that closes collections automatically
//! - [`Decoder`] - reader with one-byte lookahead and pluggable [`Extraction`]
//! - [`Sink`] / [`Source`] - byte channels, with in-memory, `std::io` and closure adapters
//! - [`Pack`] / [`Unpack`] - Rust types mapped onto the codec
//!
//! # Design
//!
//! Neither side buffers whole messages. The encoder writes each value to its
//! sink as soon as it is packed; the decoder reads exactly the bytes of one
//! value per call. Pre-encoded values travel between encoders as
//! [`Fragment`]s.
//!
//! # Example
//!
//! ```
//! use packwire::codec::{Decoder, Encoder};
//!
//! let mut encoder = Encoder::buffered();
//! encoder.begin_map(1).unwrap();
//! encoder.pack_str("answer").unwrap().pack_int(42).unwrap();
//! let bytes = encoder.into_bytes().unwrap();
//!
//! let mut decoder = Decoder::from_bytes(bytes);
//! assert_eq!(decoder.unpack_collection().unwrap().len, 1);
//! assert_eq!(decoder.unpack_value::<String>().unwrap(), "answer");
//! assert_eq!(decoder.unpack_value::<u8>().unwrap(), 42);
//! ```

mod decoder;
mod encoder;
mod extract;
mod io;

pub use decoder::{
    CollectionHeader, Decoder, DecoderConfig, DEFAULT_MAX_DEPTH, DEFAULT_MAX_SEQUENCE_LEN,
};
pub use encoder::{CollectionKind, Encoder, Fragment};
pub use extract::{Extraction, Ignored, Pack, Scalar, ScalarKind, Strategy, Unpack, Unpacked};
pub use io::{
    sink_fn, source_fn, BytesSink, FnSink, FnSource, IoSink, IoSource, SliceSource, Sink, Source,
    DEFAULT_SINK_CAPACITY,
};
