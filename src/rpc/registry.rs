//! Procedure registry for dispatching calls by name or id.
//!
//! The registry maps procedure names to bound methods and manages id
//! assignment. Ids are assigned sequentially starting from 1 (0 is reserved).
//!
//! # Example
//!
//! ```
//! use packwire::codec::{BytesSink, SliceSource};
//! use packwire::rpc::ProcedureRegistry;
//!
//! let mut registry = ProcedureRegistry::new();
//! let id = registry.register("add", |a: i64, b: i64| a + b);
//! assert_eq!(id, 1);
//!
//! let mut response = BytesSink::new();
//! registry
//!     .dispatch("add", &mut response, SliceSource::from_slice(&[0x92, 0x01, 0x02]))
//!     .unwrap();
//! assert_eq!(response.as_slice(), &[0x03]);
//! ```

use std::collections::HashMap;

use super::method::{IntoPackedMethod, PackedMethod};
use super::schema::ProcedureSchema;
use crate::codec::{Decoder, Encoder, Sink, Source};
use crate::error::{PackError, Result};

/// Entry for a registered procedure.
#[derive(Debug)]
struct ProcedureEntry {
    /// The bound method.
    method: PackedMethod,
    /// Assigned procedure id.
    id: u32,
}

/// Registry mapping procedure names to bound methods.
#[derive(Debug)]
pub struct ProcedureRegistry {
    /// Procedures by name.
    procedures: HashMap<String, ProcedureEntry>,
    /// Procedure id to name mapping (for dispatch).
    id_to_name: HashMap<u32, String>,
    /// Next id to assign.
    next_id: u32,
}

impl ProcedureRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            procedures: HashMap::new(),
            id_to_name: HashMap::new(),
            next_id: 1, // Start from 1, 0 is reserved
        }
    }

    /// Register a callable under `name` and return its id.
    ///
    /// Registering a name again replaces the binding and keeps the id.
    pub fn register<Args, F>(&mut self, name: &str, callable: F) -> u32
    where
        F: IntoPackedMethod<Args>,
    {
        let method = PackedMethod::new(callable);

        if let Some(entry) = self.procedures.get_mut(name) {
            tracing::debug!(procedure = name, id = entry.id, "replacing procedure");
            entry.method = method;
            return entry.id;
        }

        let id = self.next_id;
        self.next_id += 1;

        tracing::debug!(procedure = name, id, arity = method.arity(), "registered procedure");
        self.procedures
            .insert(name.to_string(), ProcedureEntry { method, id });
        self.id_to_name.insert(id, name.to_string());
        id
    }

    /// Get a method by procedure name.
    pub fn get(&self, name: &str) -> Option<&PackedMethod> {
        self.procedures.get(name).map(|e| &e.method)
    }

    /// Get a method by procedure id.
    pub fn get_by_id(&self, id: u32) -> Option<&PackedMethod> {
        self.id_to_name
            .get(&id)
            .and_then(|name| self.procedures.get(name))
            .map(|e| &e.method)
    }

    /// Get procedure id by name.
    pub fn procedure_id(&self, name: &str) -> Option<u32> {
        self.procedures.get(name).map(|e| e.id)
    }

    /// Get procedure name by id.
    pub fn procedure_name(&self, id: u32) -> Option<&str> {
        self.id_to_name.get(&id).map(|s| s.as_str())
    }

    /// Number of registered procedures.
    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    /// Whether no procedure is registered.
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Iterate over `(id, name, method)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str, &PackedMethod)> {
        let mut entries: Vec<_> = self
            .procedures
            .iter()
            .map(|(name, e)| (e.id, name.as_str(), &e.method))
            .collect();
        entries.sort_unstable_by_key(|(id, _, _)| *id);
        entries.into_iter()
    }

    /// Build a schema describing every registered procedure.
    pub fn build_schema(&self) -> ProcedureSchema {
        let mut schema = ProcedureSchema::new();
        for (id, name, method) in self.iter() {
            schema.add_procedure(name, id, method);
        }
        schema
    }

    /// Dispatch a call to the procedure registered under `name`.
    ///
    /// # Arguments
    ///
    /// * `name` - Procedure name
    /// * `sink` - Receives the packed result
    /// * `source` - Supplies the packed argument array
    pub fn dispatch<W: Sink, R: Source>(&self, name: &str, sink: W, source: R) -> Result<()> {
        let method = self.get(name).ok_or_else(|| {
            tracing::warn!(procedure = name, "unknown procedure");
            PackError::UnknownProcedure(name.to_string())
        })?;

        tracing::debug!(procedure = name, "dispatching");
        method.call(sink, source)
    }

    /// Dispatch a call to the procedure registered under `id`.
    pub fn dispatch_by_id<W: Sink, R: Source>(&self, id: u32, sink: W, source: R) -> Result<()> {
        let method = self.get_by_id(id).ok_or_else(|| {
            tracing::warn!(id, "unknown procedure id");
            PackError::UnknownProcedureId(id)
        })?;

        tracing::debug!(id, "dispatching");
        method.call(sink, source)
    }

    /// Dispatch on caller-owned encoder and decoder, see [`PackedMethod::call_with`].
    pub fn dispatch_with<W: Sink, R: Source>(
        &self,
        name: &str,
        encoder: &mut Encoder<W>,
        decoder: &mut Decoder<R>,
    ) -> Result<()> {
        let method = self
            .get(name)
            .ok_or_else(|| PackError::UnknownProcedure(name.to_string()))?;
        method.call_with(encoder, decoder)
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}
