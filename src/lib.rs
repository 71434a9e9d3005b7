//! # packwire
//!
//! Streaming MessagePack codec with a method adapter for RPC.
//!
//! The crate writes and reads the MessagePack wire format one value at a time
//! over caller-supplied byte channels, and binds native Rust callables so
//! that a packed argument array goes in and a packed result comes out.
//!
//! ## Architecture
//!
//! - **Format** ([`format`]): classification of head bytes into wire formats
//! - **Codec** ([`codec`]): [`Encoder`] with automatic collection framing,
//!   [`Decoder`] with one-byte lookahead, [`Sink`]/[`Source`] byte channels
//! - **RPC** ([`rpc`]): [`PackedMethod`], [`ProcedureRegistry`] and the
//!   MessagePack-RPC envelope
//!
//! ## Example
//!
//! ```
//! use packwire::{BytesSink, ProcedureRegistry, SliceSource};
//!
//! let mut registry = ProcedureRegistry::new();
//! registry.register("add", |a: i32, b: i32| a + b);
//!
//! // [1, 2]
//! let request = SliceSource::from_slice(&[0x92, 0x01, 0x02]);
//! let mut response = BytesSink::new();
//! registry.dispatch("add", &mut response, request).unwrap();
//!
//! assert_eq!(response.as_slice(), &[0x03]);
//! ```

pub mod codec;
pub mod error;
pub mod format;
pub mod rpc;

pub use codec::{
    BytesSink, CollectionKind, Decoder, DecoderConfig, Encoder, Extraction, Fragment, Pack,
    SliceSource, Sink, Source, Unpack,
};
pub use error::{PackError, Result};
pub use format::FormatTag;
pub use rpc::{PackedMethod, ProcedureRegistry};
