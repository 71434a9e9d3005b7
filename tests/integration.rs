//! Integration tests for packwire.
//!
//! These tests drive the public API end to end and check wire compatibility
//! against `rmp-serde`.

use std::collections::BTreeMap;

use bytes::Bytes;
use packwire::codec::{
    BytesSink, CollectionKind, Decoder, Encoder, Extraction, Fragment, IoSink, SliceSource,
    Unpacked,
};
use packwire::rpc::{envelope, ProcedureRegistry};
use packwire::{PackError, PackedMethod};
use proptest::prelude::*;

fn encode(build: impl FnOnce(&mut Encoder<BytesSink>)) -> Bytes {
    let mut encoder = Encoder::buffered();
    build(&mut encoder);
    encoder.into_bytes().unwrap()
}

fn fragment(build: impl FnOnce(&mut Encoder<BytesSink>)) -> Fragment {
    let mut encoder = Encoder::buffered();
    build(&mut encoder);
    encoder.into_fragment().unwrap()
}

fn encode_int(value: i128) -> Bytes {
    encode(|e| {
        e.pack_int(value).unwrap();
    })
}

/// Test the six reference scenarios byte for byte.
#[test]
fn test_reference_scenarios() {
    assert_eq!(&encode(|e| { e.pack_nil().unwrap(); })[..], &[0xc0]);
    assert_eq!(&encode_int(1)[..], &[0x01]);
    assert_eq!(&encode_int(-1)[..], &[0xff]);
    assert_eq!(
        &encode(|e| {
            e.pack_str("abc").unwrap();
        })[..],
        &[0xa3, b'a', b'b', b'c']
    );
    assert_eq!(
        &encode(|e| {
            e.begin_collection(CollectionKind::Array, 3)
                .unwrap()
                .pack_int(1)
                .unwrap()
                .pack_str("x")
                .unwrap()
                .pack_bool(true)
                .unwrap();
        })[..],
        &[0x93, 0x01, 0xa1, b'x', 0xc3]
    );

    let add = PackedMethod::new(|a: i32, b: i32| a + b);
    let mut response = BytesSink::new();
    add.call(&mut response, SliceSource::from_slice(&[0x92, 0x01, 0x02]))
        .unwrap();
    assert_eq!(response.as_slice(), &[0x03]);
}

/// Test that every integer lands in the narrowest format.
#[test]
fn test_integer_minimal_width() {
    let cases: [(i128, u8, usize); 18] = [
        (0, 0x00, 1),
        (127, 0x7f, 1),
        (128, 0xcc, 2),
        (255, 0xcc, 2),
        (256, 0xcd, 3),
        (65535, 0xcd, 3),
        (65536, 0xce, 5),
        ((1 << 32) - 1, 0xce, 5),
        (1 << 32, 0xcf, 9),
        (u64::MAX as i128, 0xcf, 9),
        (-1, 0xff, 1),
        (-32, 0xe0, 1),
        (-33, 0xd0, 2),
        (-128, 0xd0, 2),
        (-129, 0xd1, 3),
        (-32768, 0xd1, 3),
        (-32769, 0xd2, 5),
        (i64::MIN as i128, 0xd3, 9),
    ];
    for (value, head, len) in cases {
        let bytes = encode_int(value);
        assert_eq!(bytes[0], head, "head byte for {value}");
        assert_eq!(bytes.len(), len, "encoded length for {value}");

        let mut decoder = Decoder::from_bytes(bytes);
        if value < 0 {
            assert_eq!(decoder.unpack_value::<i64>().unwrap() as i128, value);
        } else {
            assert_eq!(decoder.unpack_value::<u64>().unwrap() as i128, value);
        }
    }

    let mut encoder = Encoder::buffered();
    assert!(matches!(
        encoder.pack_int(i128::from(u64::MAX) + 1).unwrap_err(),
        PackError::OutOfRange { .. }
    ));
}

/// Test str and bin round trips across every length tier.
#[test]
fn test_sequence_length_tiers() {
    let lengths: [(usize, u8, usize, u8, usize); 8] = [
        // len, str head, str header size, bin head, bin header size
        (0, 0xa0, 1, 0xc4, 2),
        (1, 0xa1, 1, 0xc4, 2),
        (31, 0xbf, 1, 0xc4, 2),
        (32, 0xd9, 2, 0xc4, 2),
        (255, 0xd9, 2, 0xc4, 2),
        (256, 0xda, 3, 0xc5, 3),
        (65535, 0xda, 3, 0xc5, 3),
        (65536, 0xdb, 5, 0xc6, 5),
    ];
    for (len, str_head, str_header, bin_head, bin_header) in lengths {
        let text = "s".repeat(len);
        let blob = vec![0xabu8; len];

        let bytes = encode(|e| {
            e.pack_str(&text).unwrap().pack_bin(&blob).unwrap();
        });
        assert_eq!(bytes[0], str_head, "str head for {len}");
        assert_eq!(bytes[str_header + len], bin_head, "bin head for {len}");
        assert_eq!(bytes.len(), str_header + bin_header + 2 * len);

        let mut decoder = Decoder::from_bytes(bytes);
        assert!(decoder.is_str().unwrap());
        assert_eq!(decoder.unpack_value::<String>().unwrap(), text);
        assert!(decoder.is_bin().unwrap());
        assert_eq!(decoder.unpack_value::<Vec<u8>>().unwrap(), blob);
    }
}

/// Test collection header tiers and auto-closing frames.
#[test]
fn test_collection_framing() {
    for (len, head) in [(15usize, 0x9fu8), (16, 0xdc), (65536, 0xdd)] {
        let bytes = encode(|e| {
            e.begin_array(len).unwrap();
            for _ in 0..len {
                e.pack_nil().unwrap();
            }
            assert_eq!(e.depth(), 0);
        });
        assert_eq!(bytes[0], head);

        let mut decoder = Decoder::from_bytes(bytes);
        let header = decoder.unpack_collection().unwrap();
        assert_eq!(header.len as usize, len);
        for _ in 0..len {
            assert_eq!(decoder.unpack(Extraction::Skip).unwrap(), Unpacked::Nil);
        }
    }

    let mut encoder = Encoder::buffered();
    encoder.begin_array(3).unwrap().pack_int(1).unwrap();
    assert!(matches!(
        encoder.into_bytes().unwrap_err(),
        PackError::UnclosedCollection {
            expected: 3,
            emitted: 1
        }
    ));

    let mut encoder = Encoder::buffered();
    assert!(matches!(
        encoder
            .begin_collection(CollectionKind::Map, 3)
            .unwrap_err(),
        PackError::OddMapElements(3)
    ));
}

/// Test that our output decodes with rmp-serde.
#[test]
fn test_rmp_serde_reads_our_output() {
    let bytes = encode(|e| {
        e.begin_map(3).unwrap();
        e.pack_str("id").unwrap().pack_int(-70000).unwrap();
        e.pack_str("name").unwrap().pack_str("widget").unwrap();
        e.pack_str("tags").unwrap();
        e.begin_array(3).unwrap();
        e.pack_bool(true).unwrap().pack_nil().unwrap().pack_double(0.25).unwrap();
    });

    let value: BTreeMap<String, serde_json::Value> = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(value["id"], -70000);
    assert_eq!(value["name"], "widget");
    assert_eq!(value["tags"], serde_json::json!([true, null, 0.25]));

    let bytes = encode(|e| {
        e.pack(&(7u8, "seven", -1.5f32)).unwrap();
    });
    let (n, word, f): (u8, String, f32) = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!((n, word.as_str(), f), (7, "seven", -1.5));

    let bytes = encode(|e| {
        e.pack_bin(&[0, 1, 2, 255]).unwrap();
    });
    let blob: serde_bytes::ByteBuf = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(blob.into_vec(), vec![0, 1, 2, 255]);
}

/// Test that rmp-serde output decodes with our decoder.
#[test]
fn test_we_read_rmp_serde_output() {
    let mut map = BTreeMap::new();
    map.insert("alpha".to_string(), vec![1i64, -200, 70000]);
    map.insert("beta".to_string(), vec![]);
    let bytes = rmp_serde::to_vec(&map).unwrap();

    let mut decoder = Decoder::from_bytes(bytes);
    let header = decoder.unpack_collection().unwrap();
    assert_eq!(header.kind, CollectionKind::Map);
    assert_eq!(header.len, 2);

    assert_eq!(decoder.unpack_value::<String>().unwrap(), "alpha");
    assert_eq!(decoder.unpack_collection().unwrap().len, 3);
    assert_eq!(decoder.unpack_value::<i64>().unwrap(), 1);
    assert_eq!(decoder.unpack_value::<i64>().unwrap(), -200);
    assert_eq!(decoder.unpack_value::<i64>().unwrap(), 70000);

    assert_eq!(decoder.unpack_value::<String>().unwrap(), "beta");
    assert_eq!(decoder.unpack_collection().unwrap().len, 0);

    let blob = serde_bytes::ByteBuf::from(vec![9u8; 300]);
    let bytes = rmp_serde::to_vec(&(blob, 2.5f64, ())).unwrap();
    let mut decoder = Decoder::from_bytes(bytes);
    let (blob, x, ()) = decoder.unpack_value::<(Vec<u8>, f64, ())>().unwrap();
    assert_eq!(blob, vec![9u8; 300]);
    assert_eq!(x, 2.5);
}

/// Test the RPC envelope end to end over a shared stream.
#[test]
fn test_rpc_session() {
    let mut registry = ProcedureRegistry::new();
    registry.register("concat", |a: String, b: String| a + &b);
    registry.register("sum", |values: (i64, i64, i64)| values.0 + values.1 + values.2);
    registry.register("noop", || {});

    let calls: [(&str, Fragment); 3] = [
        (
            "concat",
            fragment(|e| {
                e.pack_str("foo").unwrap().pack_str("bar").unwrap();
            }),
        ),
        (
            "sum",
            fragment(|e| {
                e.pack(&(1, 2, 3)).unwrap();
            }),
        ),
        ("noop", fragment(|_| {})),
    ];

    let mut requests = Encoder::buffered();
    for (msgid, (name, args)) in (10u32..).zip(calls) {
        envelope::write_request(&mut requests, msgid, name, &args).unwrap();
    }

    let mut decoder = Decoder::from_bytes(requests.into_bytes().unwrap());
    let mut responses = Encoder::buffered();
    let mut served = Vec::new();
    while decoder.remaining() > 0 {
        served.push(envelope::serve_with(&registry, &mut responses, &mut decoder).unwrap());
    }
    assert_eq!(served, [10, 11, 12]);

    let mut replies = Decoder::from_bytes(responses.into_bytes().unwrap());
    let concat = envelope::read_response::<_, String>(&mut replies).unwrap();
    assert_eq!(concat.result, Ok("foobar".to_string()));
    let sum = envelope::read_response::<_, i64>(&mut replies).unwrap();
    assert_eq!((sum.msgid, sum.result), (11, Ok(6)));
    let noop = envelope::read_response::<_, ()>(&mut replies).unwrap();
    assert_eq!(noop.result, Ok(()));
}

/// Test that each reply reaches a buffered writer once the sink is flushed.
#[test]
fn test_rpc_replies_flushed_per_request() {
    let mut registry = ProcedureRegistry::new();
    registry.register("double", |x: i64| x * 2);

    let mut requests = Encoder::buffered();
    for msgid in 1..=2u32 {
        let args = fragment(|e| {
            e.pack_int(msgid * 10).unwrap();
        });
        envelope::write_request(&mut requests, msgid, "double", &args).unwrap();
    }

    let mut decoder = Decoder::from_bytes(requests.into_bytes().unwrap());
    let writer = std::io::BufWriter::with_capacity(1024, Vec::new());
    let mut encoder = Encoder::new(IoSink::new(writer));
    for msgid in 1..=2u32 {
        envelope::serve_with(&registry, &mut encoder, &mut decoder).unwrap();
        assert!(!encoder.get_ref().get_ref().buffer().is_empty());
        encoder.get_mut().flush().unwrap();
        assert!(encoder.get_ref().get_ref().buffer().is_empty());

        let written = encoder.get_ref().get_ref().get_ref().clone();
        let mut replies = Decoder::from_bytes(written);
        let mut last = None;
        while replies.remaining() > 0 {
            last = Some(envelope::read_response::<_, i64>(&mut replies).unwrap());
        }
        let last = last.unwrap();
        assert_eq!((last.msgid, last.result), (msgid, Ok(i64::from(msgid) * 20)));
    }
}

/// Test that the schema JSON reflects registration order and slots.
#[test]
fn test_schema_json() {
    let mut registry = ProcedureRegistry::new();
    registry.register("scale", |v: f32, by: Option<f32>| v * by.unwrap_or(1.0));
    registry.register("blob", |b: Bytes| b.len() as u64);

    let json: serde_json::Value =
        serde_json::from_str(&registry.build_schema().to_json()).unwrap();
    let procs = json["procedures"].as_array().unwrap();
    assert_eq!(procs[0]["name"], "scale");
    assert_eq!(procs[0]["params"][1]["strategy"]["scalar"], "f32");
    assert_eq!(procs[1]["id"], 2);
    assert_eq!(procs[1]["params"][0]["strategy"], "sequence");
    assert_eq!(procs[1]["result"]["type"], "u64");
}

fn expected_int_len(value: i64) -> usize {
    match value {
        -32..=127 => 1,
        -128..=-33 | 128..=255 => 2,
        -32768..=-129 | 256..=65535 => 3,
        -2147483648..=-32769 | 65536..=4294967295 => 5,
        _ => 9,
    }
}

proptest! {
    #[test]
    fn prop_signed_round_trip(value in any::<i64>()) {
        let bytes = encode_int(i128::from(value));
        prop_assert_eq!(bytes.len(), expected_int_len(value));
        prop_assert_eq!(&bytes[..], &rmp_serde::to_vec(&value).unwrap()[..]);

        let mut decoder = Decoder::from_bytes(bytes);
        prop_assert_eq!(decoder.unpack_value::<i64>().unwrap(), value);
    }

    #[test]
    fn prop_unsigned_round_trip(value in any::<u64>()) {
        let bytes = encode_int(i128::from(value));
        prop_assert_eq!(&bytes[..], &rmp_serde::to_vec(&value).unwrap()[..]);

        let mut decoder = Decoder::from_bytes(bytes);
        prop_assert!(decoder.is_unsigned().unwrap());
        prop_assert_eq!(decoder.unpack_value::<u64>().unwrap(), value);
    }

    #[test]
    fn prop_float_round_trip(single in any::<f32>(), double in any::<f64>()) {
        let bytes = encode(|e| {
            e.pack_float(single).unwrap().pack_double(double).unwrap();
        });
        let mut decoder = Decoder::from_bytes(bytes);
        prop_assert_eq!(decoder.unpack_value::<f32>().unwrap().to_bits(), single.to_bits());
        prop_assert_eq!(decoder.unpack_value::<f64>().unwrap().to_bits(), double.to_bits());
    }

    #[test]
    fn prop_string_matches_rmp_serde(text in ".{0,300}") {
        let bytes = encode(|e| {
            e.pack_str(&text).unwrap();
        });
        prop_assert_eq!(&bytes[..], &rmp_serde::to_vec(&text).unwrap()[..]);

        let mut decoder = Decoder::from_bytes(bytes);
        prop_assert_eq!(decoder.unpack_value::<String>().unwrap(), text);
    }

    #[test]
    fn prop_nested_skip(depth in 0usize..20, width in 0usize..5) {
        let bytes = encode(|e| {
            for _ in 0..depth {
                e.begin_array(width + 1).unwrap();
                for _ in 0..width {
                    e.pack_str("pad").unwrap();
                }
            }
            e.pack_int(1).unwrap();
            e.pack_bool(false).unwrap();
        });

        let mut decoder = Decoder::from_bytes(bytes);
        decoder.skip().unwrap();
        prop_assert!(!decoder.unpack_value::<bool>().unwrap());
        prop_assert_eq!(decoder.remaining(), 0);
    }
}
