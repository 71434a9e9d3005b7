//! Format module - the MessagePack tag catalog.
//!
//! This module classifies head bytes into wire formats:
//! - [`FormatTag`] - closed set of every format, with byte pattern and payload shape
//! - [`Payload`] - what follows a head byte (nothing, embedded bits, fixed scalar, sequence, collection)
//! - [`Category`] - broad value kind used by decoder predicates

mod tag;

pub use tag::{
    classify, Category, FormatTag, Payload, MAX_FIXSTR_LEN, MAX_FIX_COLLECTION_LEN,
    MAX_POSITIVE_FIXINT, MAX_WIRE_LEN, MIN_NEGATIVE_FIXINT,
};
