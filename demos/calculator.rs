//! Calculator - procedure registry behind a MessagePack-RPC envelope.
//!
//! This example demonstrates:
//! - Registering native closures as procedures
//! - Publishing the procedure schema as JSON
//! - Serving MessagePack-RPC requests and reading the responses
//!
//! # Running
//!
//! ```text
//! cargo run --example calculator            # in-memory round trip
//! cargo run --example calculator -- --stdio # serve requests from stdin to stdout
//! ```

use packwire::codec::{BytesSink, Decoder, Encoder, IoSink, IoSource, SliceSource};
use packwire::rpc::envelope;
use packwire::{PackError, ProcedureRegistry};

fn registry() -> ProcedureRegistry {
    let mut registry = ProcedureRegistry::new();
    registry.register("add", |a: f64, b: f64| a + b);
    registry.register("sub", |a: f64, b: f64| a - b);
    registry.register("mul", |a: f64, b: f64| a * b);
    // nil for a zero divisor
    registry.register("div", |a: f64, b: f64| (b != 0.0).then(|| a / b));
    registry.register("minmax", |a: i64, b: i64| (a.min(b), a.max(b)));
    registry
}

fn request(msgid: u32, name: &str, a: f64, b: f64) -> Result<bytes::Bytes, PackError> {
    let mut args = Encoder::buffered();
    args.pack_double(a)?.pack_double(b)?;
    let mut request = Encoder::buffered();
    envelope::write_request(&mut request, msgid, name, &args.into_fragment()?)?;
    request.into_bytes()
}

fn round_trip(registry: &ProcedureRegistry) -> Result<(), PackError> {
    let calls = [("add", 2.0, 3.5), ("mul", 4.0, 2.5), ("div", 1.0, 0.0), ("pow", 2.0, 8.0)];

    let mut responses = BytesSink::new();
    for (msgid, (name, a, b)) in (1u32..).zip(calls) {
        let source = SliceSource::new(request(msgid, name, a, b)?);
        envelope::serve_request(registry, &mut responses, source)?;
    }

    let mut decoder = Decoder::from_bytes(responses.freeze());
    for (name, a, b) in calls {
        let reply = envelope::read_response::<_, Option<f64>>(&mut decoder)?;
        match reply.result {
            Ok(Some(value)) => println!("#{} {name}({a}, {b}) = {value}", reply.msgid),
            Ok(None) => println!("#{} {name}({a}, {b}) = nil", reply.msgid),
            Err(error) => println!("#{} {name}({a}, {b}) failed: {error}", reply.msgid),
        }
    }
    Ok(())
}

fn serve_stdio(registry: &ProcedureRegistry) -> Result<(), PackError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut decoder = Decoder::new(IoSource::new(stdin.lock()));
    let mut encoder = Encoder::new(IoSink::new(stdout.lock()));

    loop {
        match decoder.peek_byte() {
            Ok(_) => {}
            // Clean end of input between requests
            Err(PackError::ShortIo { actual: 0, .. }) => break,
            Err(e) => return Err(e),
        }
        envelope::serve_with(registry, &mut encoder, &mut decoder)?;
        encoder.get_mut().flush()?;
    }

    encoder.finish()?.flush()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();

    if std::env::args().any(|arg| arg == "--stdio") {
        serve_stdio(&registry)?;
        return Ok(());
    }

    println!("schema: {}", registry.build_schema().to_json());
    round_trip(&registry)?;
    Ok(())
}
