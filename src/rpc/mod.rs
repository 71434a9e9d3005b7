//! RPC module - binding native callables to the codec.
//!
//! - [`PackedMethod`] - one callable with its parameter and result slots
//! - [`ProcedureRegistry`] - name/id lookup and dispatch, ids from 1
//! - [`ProcedureSchema`] - JSON description of a registry
//! - [`envelope`] - MessagePack-RPC request/response framing
//!
//! # Example
//!
//! ```
//! use packwire::codec::{BytesSink, SliceSource};
//! use packwire::rpc::ProcedureRegistry;
//!
//! let mut registry = ProcedureRegistry::new();
//! registry.register("shout", |s: String| s.to_uppercase());
//!
//! let mut response = BytesSink::new();
//! registry
//!     .dispatch("shout", &mut response, SliceSource::from_slice(&[0x91, 0xa2, b'h', b'i']))
//!     .unwrap();
//! assert_eq!(response.as_slice(), b"\xa2HI");
//! ```

pub mod envelope;
mod method;
mod registry;
mod schema;

pub use envelope::Response;
pub use method::{IntoPackedMethod, PackedMethod, ParamSlot, ResultSlot};
pub use registry::ProcedureRegistry;
pub use schema::{ProcedureInfo, ProcedureSchema};
