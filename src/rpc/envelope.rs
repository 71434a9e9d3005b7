//! MessagePack-RPC call envelope.
//!
//! Wraps calls into the registry with request/response framing:
//!
//! ```text
//! request   [0, msgid, method_name, [args...]]
//! response  [1, msgid, error, result]
//! ```
//!
//! `error` is nil on success. A call to an unknown procedure, or with the
//! wrong number of arguments, is answered with an error string and a nil
//! result; the request stream stays usable for the next call. An argument
//! that fails to decode is answered the same way, but the error is also
//! returned since the rest of that request is left unread.
//!
//! # Example
//!
//! ```
//! use packwire::codec::{BytesSink, Decoder, Encoder, SliceSource};
//! use packwire::rpc::{envelope, ProcedureRegistry};
//!
//! let mut registry = ProcedureRegistry::new();
//! registry.register("add", |a: i32, b: i32| a + b);
//!
//! let mut args = Encoder::buffered();
//! args.pack_int(1).unwrap().pack_int(2).unwrap();
//! let mut request = Encoder::buffered();
//! envelope::write_request(&mut request, 7, "add", &args.into_fragment().unwrap()).unwrap();
//!
//! let mut response = BytesSink::new();
//! let source = SliceSource::new(request.into_bytes().unwrap());
//! envelope::serve_request(&registry, &mut response, source).unwrap();
//!
//! let mut decoder = Decoder::from_bytes(response.freeze());
//! let reply = envelope::read_response::<_, i32>(&mut decoder).unwrap();
//! assert_eq!(reply.msgid, 7);
//! assert_eq!(reply.result, Ok(3));
//! ```

use super::registry::ProcedureRegistry;
use crate::codec::{CollectionKind, Decoder, Encoder, Fragment, Sink, Source, Unpack};
use crate::error::{PackError, Result};

/// Type field of a request.
pub const REQUEST: u8 = 0;

/// Type field of a response.
pub const RESPONSE: u8 = 1;

/// Number of elements in both request and response envelopes.
pub const ENVELOPE_LEN: usize = 4;

/// Decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// Message id copied from the request.
    pub msgid: u32,
    /// Result value, or the error string sent by the server.
    pub result: std::result::Result<T, String>,
}

/// Write a request envelope whose arguments were encoded ahead of time.
pub fn write_request<W: Sink>(
    encoder: &mut Encoder<W>,
    msgid: u32,
    name: &str,
    args: &Fragment,
) -> Result<()> {
    encoder
        .begin_array(ENVELOPE_LEN)?
        .pack_int(REQUEST)?
        .pack_int(msgid)?
        .pack_str(name)?
        .splice_collection(CollectionKind::Array, args)?;
    Ok(())
}

/// Read one request from `source`, dispatch it and write one response to `sink`.
///
/// Returns the message id of the request.
///
/// # Errors
///
/// - [`PackError::Envelope`] if the request is not a well-formed envelope
/// - any decode error raised by an argument, after an error response is written
/// - any encode error raised while writing the response
pub fn serve_request<W: Sink, R: Source>(
    registry: &ProcedureRegistry,
    sink: W,
    source: R,
) -> Result<u32> {
    let mut encoder = Encoder::new(sink);
    let mut decoder = Decoder::new(source);
    let msgid = serve_with(registry, &mut encoder, &mut decoder)?;
    encoder.finish()?;
    Ok(msgid)
}

/// Same as [`serve_request`] on caller-owned encoder and decoder, so several
/// requests can be served from one stream.
pub fn serve_with<W: Sink, R: Source>(
    registry: &ProcedureRegistry,
    encoder: &mut Encoder<W>,
    decoder: &mut Decoder<R>,
) -> Result<u32> {
    let (msgid, name) = read_request_head(decoder)?;
    let argc = decoder.unpack_array()?;

    let Some(method) = registry.get(&name) else {
        tracing::warn!(procedure = %name, msgid, "unknown procedure");
        skip_args(decoder, argc)?;
        write_error(encoder, msgid, &PackError::UnknownProcedure(name))?;
        return Ok(msgid);
    };

    if let Err(error) = method.check_arity(argc) {
        skip_args(decoder, argc)?;
        write_error(encoder, msgid, &error)?;
        return Ok(msgid);
    }

    tracing::debug!(procedure = %name, msgid, "serving request");
    let mut result = Encoder::buffered();
    if let Err(error) = method.invoke(&mut result, decoder) {
        // Arguments are partly consumed: answer, then report.
        tracing::warn!(procedure = %name, msgid, %error, "call failed");
        write_error(encoder, msgid, &error)?;
        return Err(error);
    }
    let result = result.into_fragment()?;
    write_head(encoder, msgid)?
        .pack_nil()?
        .splice_values(&result)?;
    Ok(msgid)
}

/// Read the fixed head of a request: `[0, msgid, name` up to the arguments.
fn read_request_head<R: Source>(decoder: &mut Decoder<R>) -> Result<(u32, String)> {
    let len = decoder
        .unpack_array()
        .map_err(|e| malformed(e, "request is not an array"))?;
    if len as usize != ENVELOPE_LEN {
        return Err(PackError::Envelope(format!(
            "request must have {ENVELOPE_LEN} elements, got {len}"
        )));
    }

    expect_unsigned(decoder, "message type")?;
    let kind = decoder.unpack_value::<u64>()?;
    if kind != u64::from(REQUEST) {
        return Err(PackError::Envelope(format!(
            "expected message type {REQUEST}, got {kind}"
        )));
    }

    let msgid = read_msgid(decoder)?;

    if !decoder.is_str()? {
        return Err(PackError::Envelope("method name must be a string".into()));
    }
    let name = decoder.unpack_value::<String>()?;

    if !decoder.is_array()? {
        return Err(PackError::Envelope("arguments must be an array".into()));
    }
    Ok((msgid, name))
}

fn skip_args<R: Source>(decoder: &mut Decoder<R>, argc: u32) -> Result<()> {
    for _ in 0..argc {
        decoder.skip()?;
    }
    Ok(())
}

fn write_head<W: Sink>(encoder: &mut Encoder<W>, msgid: u32) -> Result<&mut Encoder<W>> {
    encoder
        .begin_array(ENVELOPE_LEN)?
        .pack_int(RESPONSE)?
        .pack_int(msgid)
}

/// Answer with an error string and a nil result.
fn write_error<W: Sink>(encoder: &mut Encoder<W>, msgid: u32, error: &PackError) -> Result<()> {
    write_head(encoder, msgid)?
        .pack_str(&error.to_string())?
        .pack_nil()?;
    Ok(())
}

/// Decode one response envelope.
///
/// # Errors
///
/// Returns [`PackError::Envelope`] if the response is not a well-formed
/// envelope or its error field is neither nil nor a string.
pub fn read_response<R: Source, T: Unpack>(decoder: &mut Decoder<R>) -> Result<Response<T>> {
    let len = decoder
        .unpack_array()
        .map_err(|e| malformed(e, "response is not an array"))?;
    if len as usize != ENVELOPE_LEN {
        return Err(PackError::Envelope(format!(
            "response must have {ENVELOPE_LEN} elements, got {len}"
        )));
    }

    expect_unsigned(decoder, "message type")?;
    let kind = decoder.unpack_value::<u64>()?;
    if kind != u64::from(RESPONSE) {
        return Err(PackError::Envelope(format!(
            "expected message type {RESPONSE}, got {kind}"
        )));
    }

    let msgid = read_msgid(decoder)?;

    let result = if decoder.is_nil()? {
        decoder.skip()?;
        Ok(T::unpack(decoder)?)
    } else if decoder.is_str()? {
        let error = decoder.unpack_value::<String>()?;
        decoder.skip()?;
        Err(error)
    } else {
        return Err(PackError::Envelope("error field must be nil or a string".into()));
    };

    Ok(Response { msgid, result })
}

fn read_msgid<R: Source>(decoder: &mut Decoder<R>) -> Result<u32> {
    expect_unsigned(decoder, "message id")?;
    let msgid = decoder.unpack_value::<u64>()?;
    u32::try_from(msgid)
        .map_err(|_| PackError::Envelope(format!("message id {msgid} exceeds 32 bits")))
}

fn expect_unsigned<R: Source>(decoder: &mut Decoder<R>, what: &str) -> Result<()> {
    if decoder.is_unsigned()? {
        return Ok(());
    }
    Err(PackError::Envelope(format!("{what} must be an unsigned integer")))
}

/// Turn a type mismatch into an envelope error, keeping I/O errors as they are.
fn malformed(error: PackError, what: &str) -> PackError {
    match error {
        PackError::IncompatibleUnpackType { .. } | PackError::InvalidHeadByte(_) => {
            PackError::Envelope(what.to_string())
        }
        other => other,
    }
}

/// Whether the next value on `decoder` looks like an envelope.
pub fn is_envelope<R: Source>(decoder: &mut Decoder<R>) -> Result<bool> {
    Ok(decoder.is_array()? && decoder.peek_byte()? == 0x94)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::codec::{BytesSink, SliceSource};

    fn registry() -> ProcedureRegistry {
        let mut registry = ProcedureRegistry::new();
        registry.register("add", |a: i32, b: i32| a + b);
        registry.register("touch", || {});
        registry
    }

    fn request(msgid: u32, name: &str, build: impl FnOnce(&mut Encoder<BytesSink>)) -> Bytes {
        let mut args = Encoder::buffered();
        build(&mut args);
        let mut request = Encoder::buffered();
        write_request(&mut request, msgid, name, &args.into_fragment().unwrap()).unwrap();
        request.into_bytes().unwrap()
    }

    #[test]
    fn test_request_layout() {
        let bytes = request(5, "add", |e| {
            e.pack_int(1).unwrap().pack_int(2).unwrap();
        });
        assert_eq!(
            &bytes[..],
            &[0x94, 0x00, 0x05, 0xa3, b'a', b'd', b'd', 0x92, 0x01, 0x02]
        );
    }

    #[test]
    fn test_serve_success() {
        let bytes = request(9, "add", |e| {
            e.pack_int(40).unwrap().pack_int(2).unwrap();
        });
        let mut response = BytesSink::new();
        let msgid = serve_request(&registry(), &mut response, SliceSource::new(bytes)).unwrap();
        assert_eq!(msgid, 9);
        assert_eq!(response.as_slice(), &[0x94, 0x01, 0x09, 0xc0, 42]);
    }

    #[test]
    fn test_serve_unknown_procedure() {
        let bytes = request(3, "nope", |e| {
            e.pack_str("ignored").unwrap();
            e.begin_array(1).unwrap().pack_nil().unwrap();
        });
        let mut response = BytesSink::new();
        serve_request(&registry(), &mut response, SliceSource::new(bytes)).unwrap();

        let mut decoder = Decoder::from_bytes(response.freeze());
        let reply = read_response::<_, ()>(&mut decoder).unwrap();
        assert_eq!(reply.msgid, 3);
        assert_eq!(reply.result, Err("unknown procedure: nope".to_string()));
    }

    #[test]
    fn test_serve_argument_count_error() {
        let bytes = request(4, "add", |e| {
            e.pack_int(1).unwrap();
        });
        let mut response = BytesSink::new();
        serve_request(&registry(), &mut response, SliceSource::new(bytes)).unwrap();

        let mut decoder = Decoder::from_bytes(response.freeze());
        let reply = read_response::<_, i32>(&mut decoder).unwrap();
        assert_eq!(
            reply.result,
            Err("argument count mismatch: expected 2, got 1".to_string())
        );
    }

    #[test]
    fn test_serve_argument_type_error_answers_peer() {
        let bytes = request(5, "add", |e| {
            e.pack_str("x").unwrap().pack_int(2).unwrap();
        });
        let mut response = BytesSink::new();
        let err = serve_request(&registry(), &mut response, SliceSource::new(bytes)).unwrap_err();
        assert!(matches!(err, PackError::IncompatibleUnpackType { .. }));

        let mut decoder = Decoder::from_bytes(response.freeze());
        let reply = read_response::<_, i32>(&mut decoder).unwrap();
        assert_eq!(reply.msgid, 5);
        assert_eq!(reply.result, Err(err.to_string()));
        assert_eq!(decoder.remaining(), 0);
    }

    #[test]
    fn test_serve_invalid_utf8_answers_peer() {
        let mut registry = ProcedureRegistry::new();
        registry.register("upper", |s: String| s.to_uppercase());
        let bytes = request(6, "upper", |e| {
            e.pack_str(&[0xffu8, 0xfe][..]).unwrap();
        });

        let mut response = BytesSink::new();
        let err = serve_request(&registry, &mut response, SliceSource::new(bytes)).unwrap_err();
        assert!(matches!(err, PackError::InvalidUtf8(_)));

        let mut decoder = Decoder::from_bytes(response.freeze());
        let reply = read_response::<_, String>(&mut decoder).unwrap();
        assert_eq!(reply.msgid, 6);
        assert!(reply.result.is_err());
    }

    #[test]
    fn test_truncated_arguments_write_nothing() {
        // "nope" with one declared argument that never arrives
        let bytes = [0x94, 0x00, 0x01, 0xa4, b'n', b'o', b'p', b'e', 0x91];
        let mut response = BytesSink::new();
        let err = serve_request(&registry(), &mut response, SliceSource::from_slice(&bytes))
            .unwrap_err();
        assert!(matches!(err, PackError::ShortIo { .. }));
        assert!(response.as_slice().is_empty());
    }

    #[test]
    fn test_response_msgid_over_32_bits_rejected() {
        let bytes = [0x94, 0x01, 0xcf, 0, 0, 0, 0x01, 0, 0, 0, 0x07, 0xc0, 0xc0];
        let mut decoder = Decoder::from_bytes(bytes.to_vec());
        let err = read_response::<_, ()>(&mut decoder).unwrap_err();
        assert!(matches!(err, PackError::Envelope(ref m) if m.contains("exceeds 32 bits")));
    }

    #[test]
    fn test_serve_stream_of_requests() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&request(1, "touch", |_| {}));
        stream.extend_from_slice(&request(2, "missing", |_| {}));
        stream.extend_from_slice(&request(3, "add", |e| {
            e.pack_int(-1).unwrap().pack_int(-2).unwrap();
        }));

        let registry = registry();
        let mut decoder = Decoder::from_bytes(stream);
        let mut encoder = Encoder::buffered();
        for expected in 1..=3 {
            assert!(is_envelope(&mut decoder).unwrap());
            assert_eq!(serve_with(&registry, &mut encoder, &mut decoder).unwrap(), expected);
        }

        let mut replies = Decoder::from_bytes(encoder.into_bytes().unwrap());
        assert_eq!(read_response::<_, ()>(&mut replies).unwrap().result, Ok(()));
        assert!(read_response::<_, ()>(&mut replies).unwrap().result.is_err());
        assert_eq!(read_response::<_, i32>(&mut replies).unwrap().result, Ok(-3));
    }

    #[test]
    fn test_malformed_envelopes() {
        let cases: [&[u8]; 5] = [
            &[0x01],                               // not an array
            &[0x93, 0x00, 0x01, 0xa0],             // wrong length
            &[0x94, 0x02, 0x01, 0xa0, 0x90],       // notification type
            &[0x94, 0x00, 0x01, 0x05, 0x90],       // name not a string
            &[0x94, 0x00, 0x01, 0xa3, b'a', b'd', b'd', 0x05], // args not an array
        ];
        for bytes in cases {
            let err = serve_request(&registry(), BytesSink::new(), SliceSource::from_slice(bytes))
                .unwrap_err();
            assert!(matches!(err, PackError::Envelope(_)), "{bytes:02x?}: {err}");
        }
    }

    #[test]
    fn test_truncated_request_is_io_error() {
        let err = serve_request(
            &registry(),
            BytesSink::new(),
            SliceSource::from_slice(&[0x94, 0x00]),
        )
        .unwrap_err();
        assert!(matches!(err, PackError::ShortIo { .. }));
    }
}
